//! Backing stores for modstore documents.
//!
//! A backing store holds one document per entity plus named aggregate
//! documents (such as the reconciliation index). It never reports "not
//! found": absent documents load as virtual empty documents.
//!
//! # Implementations
//!
//! - [`FileStore`]: one pretty-printed JSON file per document under a root
//!   directory, written via temp file + rename
//! - [`MemoryStore`]: in-process map with write counting and fault
//!   injection, for tests and embedding

mod error;
mod file_store;
mod memory_store;

pub use error::{StorageError, StorageResult};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use modstore_model::Document;
use modstore_types::EntityKey;
use std::fmt;

/// Addresses one stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    /// The document owned by an entity.
    Entity(EntityKey),
    /// A named document that spans entities.
    Aggregate(String),
}

impl DocumentKey {
    pub fn aggregate(name: impl Into<String>) -> Self {
        Self::Aggregate(name.into())
    }

    /// Returns the entity key for entity documents.
    pub fn entity(&self) -> Option<EntityKey> {
        match self {
            Self::Entity(key) => Some(*key),
            Self::Aggregate(_) => None,
        }
    }
}

impl From<EntityKey> for DocumentKey {
    fn from(key: EntityKey) -> Self {
        Self::Entity(key)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(key) => write!(f, "{key}"),
            Self::Aggregate(name) => write!(f, "aggregate:{name}"),
        }
    }
}

/// Persistence medium for documents.
///
/// Calls may block on I/O; callers keep them off latency-sensitive threads.
pub trait BackingStore: Send + Sync {
    /// Loads a document, or a virtual empty one when none is stored.
    fn load_document(&self, key: &DocumentKey) -> StorageResult<Document>;

    /// Persists a document, replacing any stored version.
    fn save_document(&self, key: &DocumentKey, document: &Document) -> StorageResult<()>;

    /// Whether a document is stored for `key`.
    fn contains(&self, key: &DocumentKey) -> StorageResult<bool>;

    /// Every entity with a stored document.
    fn list_entities(&self) -> StorageResult<Vec<EntityKey>>;
}
