//! Error types for schema compilation and fetching

use std::sync::Arc;

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema compilation errors
///
/// Validation never produces these; validation failures are reported as
/// [`ValidationError`](crate::validator::ValidationError) values instead.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed schema: {message}")]
    MalformedSchema { message: String },

    #[error("Error resolving schema at \"{uri}\". Details: {source}")]
    Resolution {
        uri: String,
        #[source]
        source: Arc<FetchError>,
    },

    #[error("Cannot resolve schema {name} using given arguments, which must be an object: {message}")]
    InvalidArguments { name: String, message: String },

    #[error("Schema '{name}' expands into itself")]
    RecursiveDefinition { name: String },

    #[error(
        "Unsupported JSON Schema version \"{0}\". Supported versions are: {supported}",
        supported = crate::version::DraftVersion::supported_uris()
    )]
    UnsupportedVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        SchemaError::MalformedSchema { message: message.into() }
    }

    /// The URI that failed to resolve, if this is a resolution failure
    pub fn failing_uri(&self) -> Option<&str> {
        match self {
            SchemaError::Resolution { uri, .. } => Some(uri),
            _ => None,
        }
    }
}

/// Errors reported by a [`SchemaFetcher`](crate::fetch::SchemaFetcher)
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not found: {uri}")]
    NotFound { uri: String },

    #[error("transport failure for {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("could not decode {uri} as JSON: {message}")]
    Decode { uri: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
