//! Error types for node construction and traversal

use std::sync::Arc;

use crate::store::StoreError;

/// Raised while constructing a node, never deferred to first use
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Bucket name must be at least 3 characters: {0}")]
    BucketTooShort(String),

    #[error("Bad configuration: {0}")]
    BadConfig(String),
}

/// Errors surfaced by node queries and listings
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Programmer error, e.g. listing the children of a non-collection
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport, auth or timeout failure reported by a backend client
    #[error("Backend error: {0}")]
    Store(Arc<StoreError>),
}

impl From<StoreError> for NodeError {
    fn from(err: StoreError) -> Self {
        NodeError::Store(Arc::new(err))
    }
}

impl From<Arc<StoreError>> for NodeError {
    fn from(err: Arc<StoreError>) -> Self {
        NodeError::Store(err)
    }
}
