//! Resolution Context
//!
//! Tracks what a compile call can see while it expands references:
//!
//! - **Local definitions** (`#name` keys) live in a chain of immutable scope
//!   frames. Registering definitions while expanding an object pushes a new
//!   frame that the object's siblings and descendants see; nothing outside
//!   that subtree does. Frames are shared through `Arc`, so concurrently
//!   expanding sibling branches never contend for them.
//! - **Fetched documents** live in a [`FetchCache`] owned by the compiler and
//!   shared by every compile call it performs. Fetches are keyed by the exact
//!   URI, query string included, and deduplicated while in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{FetchError, Result, SchemaError};
use crate::fetch::SchemaFetcher;
use crate::node::SchemaNode;
use crate::query::args_to_query;

type FetchOutcome = std::result::Result<Arc<Value>, Arc<FetchError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

enum CacheEntry {
    Pending(SharedFetch),
    Resolved(Arc<Value>),
}

/// URI → fetched raw document cache with in-flight deduplication
///
/// The first request for a URI starts the fetch and parks a shared handle
/// to it in the cache; later requests for the same URI await that handle
/// instead of fetching again. The entry moves from pending to resolved
/// once. A failed fetch is handed to every waiter and then evicted, so a
/// later compile can retry. Dropping a waiter never disturbs the entry:
/// the shared handle keeps the fetch alive for the others.
#[derive(Default)]
pub struct FetchCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of resolved documents
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|e| matches!(e, CacheEntry::Resolved(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resolved document for `uri`, if any
    pub fn get(&self, uri: &str) -> Option<Arc<Value>> {
        match self.entries().get(uri) {
            Some(CacheEntry::Resolved(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    /// Forget every resolved document; in-flight fetches are left alone
    pub fn clear(&self) {
        self.entries().retain(|_, e| matches!(e, CacheEntry::Pending(_)));
    }

    /// Return the document for `uri`, fetching it at most once
    pub async fn get_or_fetch(&self, uri: &str, fetcher: &Arc<dyn SchemaFetcher>) -> FetchOutcome {
        let pending = {
            let mut entries = self.entries();
            match entries.get(uri) {
                Some(CacheEntry::Resolved(doc)) => {
                    debug!(uri, "schema cache hit");
                    return Ok(doc.clone());
                }
                Some(CacheEntry::Pending(fetch)) => {
                    debug!(uri, "joining in-flight fetch");
                    fetch.clone()
                }
                None => {
                    debug!(uri, "fetching schema");
                    let fetcher = Arc::clone(fetcher);
                    let target = uri.to_string();
                    let fetch = async move {
                        fetcher
                            .fetch_json(&target)
                            .await
                            .map(Arc::new)
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    entries.insert(uri.to_string(), CacheEntry::Pending(fetch.clone()));
                    fetch
                }
            }
        };

        let outcome = pending.clone().await;

        let mut entries = self.entries();
        let still_ours = matches!(
            entries.get(uri),
            Some(CacheEntry::Pending(current)) if current.ptr_eq(&pending)
        );
        if still_ours {
            match &outcome {
                Ok(doc) => {
                    entries.insert(uri.to_string(), CacheEntry::Resolved(doc.clone()));
                }
                Err(e) => {
                    warn!(uri, error = %e, "schema fetch failed");
                    entries.remove(uri);
                }
            }
        }
        outcome
    }
}

impl fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries();
        let pending = entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Pending(_)))
            .count();
        f.debug_struct("FetchCache")
            .field("resolved", &(entries.len() - pending))
            .field("pending", &pending)
            .finish()
    }
}

struct Frame {
    definitions: HashMap<String, Arc<SchemaNode>>,
    parent: Option<Arc<Frame>>,
}

/// A lexical scope of local definitions
#[derive(Clone, Default)]
pub struct Scope {
    frame: Option<Arc<Frame>>,
}

impl Scope {
    /// A child scope in which `definitions` shadow anything outer
    pub fn with_definitions(&self, definitions: Vec<(String, SchemaNode)>) -> Scope {
        if definitions.is_empty() {
            return self.clone();
        }
        let definitions = definitions
            .into_iter()
            .map(|(name, node)| (name, Arc::new(node)))
            .collect();
        Scope {
            frame: Some(Arc::new(Frame {
                definitions,
                parent: self.frame.clone(),
            })),
        }
    }

    /// Innermost definition of `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<SchemaNode>> {
        let mut frame = self.frame.as_ref();
        while let Some(current) = frame {
            if let Some(node) = current.definitions.get(name) {
                return Some(node.clone());
            }
            frame = current.parent.as_ref();
        }
        None
    }
}

/// Linked list of the definitions and URIs currently being expanded
struct Link {
    key: String,
    next: Option<Arc<Link>>,
}

/// Everything one compile call needs to resolve references
///
/// Cheap to clone; each branch of the expansion carries its own copy.
#[derive(Clone)]
pub struct ResolutionContext {
    root_uri: Arc<str>,
    cache: Arc<FetchCache>,
    fetcher: Arc<dyn SchemaFetcher>,
    scope: Scope,
    expanding: Option<Arc<Link>>,
}

impl ResolutionContext {
    pub fn new(root_uri: &str, cache: Arc<FetchCache>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            root_uri: normalize_root(root_uri).into(),
            cache,
            fetcher,
            scope: Scope::default(),
            expanding: None,
        }
    }

    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    /// Register local definitions for the subtree being expanded
    pub fn define(&self, definitions: Vec<(String, SchemaNode)>) -> Self {
        for (name, _) in &definitions {
            debug!(name = name.as_str(), "registering local definition");
        }
        Self {
            scope: self.scope.with_definitions(definitions),
            ..self.clone()
        }
    }

    /// The local definition of `name`, if one is in scope
    pub fn local(&self, name: &str) -> Option<Arc<SchemaNode>> {
        self.scope.lookup(name)
    }

    /// Mark `key` as being expanded, failing if it already is
    pub fn enter(&self, key: &str, name: &str) -> Result<Self> {
        let mut link = self.expanding.as_ref();
        while let Some(current) = link {
            if current.key == key {
                return Err(SchemaError::RecursiveDefinition { name: name.to_string() });
            }
            link = current.next.as_ref();
        }
        Ok(Self {
            expanding: Some(Arc::new(Link {
                key: key.to_string(),
                next: self.expanding.clone(),
            })),
            ..self.clone()
        })
    }

    /// Fully-qualified URI for a reference name and its arguments
    pub fn qualify(&self, name: &str, args: Option<&Map<String, Value>>) -> String {
        let mut uri = if is_absolute_uri(name) {
            name.to_string()
        } else {
            format!("{}{}", self.root_uri, name)
        };
        if let Some(args) = args.filter(|a| !a.is_empty()) {
            uri.push('?');
            uri.push_str(&args_to_query(args));
        }
        uri
    }

    /// Fetch the raw document behind `uri` through the shared cache
    pub async fn fetch(&self, uri: &str) -> Result<Arc<Value>> {
        self.cache
            .get_or_fetch(uri, &self.fetcher)
            .await
            .map_err(|source| SchemaError::Resolution {
                uri: uri.to_string(),
                source,
            })
    }
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("root_uri", &self.root_uri)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Ensure a root URI ends with `/` so names can be appended to it
pub fn normalize_root(root_uri: &str) -> String {
    if root_uri.ends_with('/') {
        root_uri.to_string()
    } else {
        format!("{root_uri}/")
    }
}

/// Whether a reference name is already an absolute URI (has a scheme and
/// an authority or path after it, e.g. `http://host/x`, `urn:x:y`)
pub fn is_absolute_uri(name: &str) -> bool {
    match url::Url::parse(name) {
        Ok(url) => !url.cannot_be_a_base() || url.scheme() == "urn",
        Err(_) => false,
    }
}
