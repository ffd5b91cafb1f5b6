//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data exists but is not a usable document.
    #[error("malformed document {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// Document model error.
    #[error("document error: {0}")]
    Model(#[from] modstore_model::ModelError),

    /// Store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
