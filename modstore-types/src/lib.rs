//! Core type definitions for modstore.
//!
//! This crate defines the identifiers every other layer agrees on:
//! - [`EntityKey`] addresses one owner of persisted state (a user, a world,
//!   or the single global record)
//!
//! Everything document- or module-shaped lives in `modstore-model`.

mod ids;

pub use ids::EntityKey;

/// Errors from parsing identifiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid entity key: {0}")]
    InvalidKey(String),
}
