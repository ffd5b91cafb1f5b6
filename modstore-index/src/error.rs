//! Error types for the index layer.

use modstore_cache::CacheError;
use modstore_model::ModelError;
use modstore_storage::StorageError;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while building or serving the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Reading entities or persisting the index failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An entity record could not produce its live document.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("document error: {0}")]
    Model(#[from] ModelError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The identity source could not enumerate entities.
    #[error("identity source error: {0}")]
    Identity(String),
}
