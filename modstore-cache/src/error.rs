//! Error types for the cache layer.

use modstore_model::ModelError;
use modstore_storage::StorageError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backing store failed to load or save.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Module fields could not be read from or written to the document.
    #[error("module mapping error: {0}")]
    Model(#[from] ModelError),

    /// A registered factory failed. Never substituted with a default.
    #[error("failed to construct module {module}: {source}")]
    Construction {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Module type has no factory and no default constructor was offered.
    #[error("no factory registered for module {module}")]
    NoFactory { module: &'static str },
}
