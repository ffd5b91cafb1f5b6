//! Error types for the admin tool.

use axum::http::StatusCode;
use modstore_cache::CacheError;
use modstore_index::IndexError;
use modstore_storage::StorageError;
use thiserror::Error;

/// Result type for admin operations.
pub type AdminResult<T> = Result<T, AdminError>;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    InvalidKey(#[from] modstore_types::Error),

    #[error("no stored document for {0}")]
    NotFound(String),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl AdminError {
    /// HTTP status and message for API responses.
    pub fn status(&self) -> (StatusCode, String) {
        let code = match self {
            Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, self.to_string())
    }
}
