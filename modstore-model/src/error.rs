//! Error types for the model layer.

use crate::FieldType;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while addressing documents or mapping module fields.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Path is not a usable JSON pointer.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Document root must be a JSON object.
    #[error("document root is not an object")]
    NotAnObject,

    /// Field is not declared in the module's schema.
    #[error("module '{module}' declares no field '{field}'")]
    UnknownField { module: String, field: String },

    /// Field is absent from the document and has no declared default.
    #[error("module '{module}' field '{field}' is missing and has no default")]
    MissingField { module: String, field: String },

    /// Stored value contradicts the declared field type.
    #[error("field '{field}' at '{path}' expected {expected:?}, found {found}")]
    TypeMismatch {
        field: String,
        path: String,
        expected: FieldType,
        found: &'static str,
    },

    /// Schema declares the same field or path twice.
    #[error("module '{module}' declares '{name}' more than once")]
    DuplicateBinding { module: String, name: String },

    /// Value could not be converted to or from JSON.
    #[error("field '{field}' conversion failed: {source}")]
    Conversion {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}
