//! Fetch collaborators
//!
//! The compiler needs exactly one capability from the outside world: fetch
//! a JSON document by URI. [`SchemaFetcher`] is that seam. Three
//! implementations ship with the crate:
//!
//! - [`StaticFetcher`] serves documents from memory (tests, embedded schemas)
//! - [`DirectoryFetcher`] maps URIs under a root onto files in a directory
//! - `HttpFetcher` (feature `http`) performs an HTTP GET

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Fetches a JSON document by URI
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError>;
}

/// In-memory fetcher keyed by exact URI
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Value>,
    fetches: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document (builder style)
    pub fn with(mut self, uri: impl Into<String>, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, document: Value) {
        self.documents.insert(uri.into(), document);
    }

    /// Number of fetches served or attempted so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaFetcher for StaticFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Give concurrent resolutions a chance to interleave
        tokio::task::yield_now().await;
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { uri: uri.to_string() })
    }
}

/// Serves URIs under `root_uri` from files under `dir`
///
/// `http://host/schema/geo/point?x=1` with root `http://host/schema/` reads
/// `dir/geo/point` (plus the configured extension). The query string selects
/// nothing on disk, so references differing only in arguments share a file.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root_uri: String,
    dir: PathBuf,
    extension: Option<String>,
}

impl DirectoryFetcher {
    pub fn new(root_uri: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            root_uri: root_uri.into(),
            dir: dir.as_ref().to_path_buf(),
            extension: None,
        }
    }

    /// Append this extension to every looked-up file name (e.g. "json")
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = if extension.is_empty() { None } else { Some(extension) };
        self
    }

    /// The file a URI maps to, if it lies under the root
    pub fn path_for(&self, uri: &str) -> Option<PathBuf> {
        let relative = uri.strip_prefix(&self.root_uri)?;
        let relative = relative.split('#').next().unwrap_or_default();
        let relative = match relative.split_once('?') {
            Some((path, query)) => {
                if !query.is_empty() {
                    debug!(uri, query, "directory lookup ignores reference arguments");
                }
                path
            }
            None => relative,
        };
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
            return None;
        }
        let mut path = self.dir.join(relative);
        if let Some(extension) = &self.extension {
            let mut name = path.file_name()?.to_os_string();
            name.push(".");
            name.push(extension);
            path.set_file_name(name);
        }
        Some(path)
    }
}

#[async_trait]
impl SchemaFetcher for DirectoryFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        let path = self
            .path_for(uri)
            .ok_or_else(|| FetchError::NotFound { uri: uri.to_string() })?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound { uri: uri.to_string() })
            }
            Err(e) => return Err(FetchError::Io(e)),
        };
        serde_json::from_str(&content).map_err(|e| FetchError::Decode {
            uri: uri.to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::SchemaFetcher;
    use crate::error::FetchError;

    /// Fetches schema documents over HTTP(S)
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        pub fn new(timeout: Duration) -> Result<Self, FetchError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FetchError::Transport {
                    uri: String::new(),
                    message: e.to_string(),
                })?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl SchemaFetcher for HttpFetcher {
        async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
            let transport = |e: reqwest::Error| FetchError::Transport {
                uri: uri.to_string(),
                message: e.to_string(),
            };
            let response = self.client.get(uri).send().await.map_err(transport)?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound { uri: uri.to_string() });
            }
            let response = response.error_for_status().map_err(transport)?;
            response.json::<Value>().await.map_err(|e| FetchError::Decode {
                uri: uri.to_string(),
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_fetcher_counts() {
        let fetcher = StaticFetcher::new().with("http://s/a", json!({"type": "string"}));
        assert_eq!(fetcher.fetch_json("http://s/a").await.unwrap(), json!({"type": "string"}));
        assert!(matches!(
            fetcher.fetch_json("http://s/b").await,
            Err(FetchError::NotFound { .. })
        ));
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[test]
    fn test_directory_path_mapping() {
        let fetcher = DirectoryFetcher::new("http://s/schema/", "/data").with_extension("json");
        assert_eq!(
            fetcher.path_for("http://s/schema/geo/point?x=1"),
            Some(PathBuf::from("/data/geo/point.json"))
        );
        assert_eq!(
            fetcher.path_for("http://s/schema/range?min=1"),
            fetcher.path_for("http://s/schema/range?min=5")
        );
        assert_eq!(
            fetcher.path_for("http://s/schema/geo/point#/x"),
            Some(PathBuf::from("/data/geo/point.json"))
        );
        assert_eq!(fetcher.path_for("http://elsewhere/point"), None);
        assert_eq!(fetcher.path_for("http://s/schema/../secret"), None);
    }

    #[tokio::test]
    async fn test_directory_fetcher_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("point"), r#"{"/x": "$number"}"#).unwrap();
        std::fs::write(dir.path().join("broken"), "{not json").unwrap();
        let fetcher = DirectoryFetcher::new("http://s/", dir.path());

        let doc = fetcher.fetch_json("http://s/point").await.unwrap();
        assert_eq!(doc, json!({"/x": "$number"}));
        assert!(matches!(
            fetcher.fetch_json("http://s/missing").await,
            Err(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            fetcher.fetch_json("http://s/broken").await,
            Err(FetchError::Decode { .. })
        ));
    }
}
