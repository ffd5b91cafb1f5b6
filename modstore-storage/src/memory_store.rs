//! In-process backing store.

use crate::{BackingStore, DocumentKey, StorageError, StorageResult};
use modstore_model::Document;
use modstore_types::EntityKey;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Keeps documents in memory.
///
/// Counts loads and saves, and can be told to fail: [`corrupt`](Self::corrupt)
/// makes loads of one key report malformed data, [`fail_saves`](Self::fail_saves)
/// makes every save fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<DocumentKey, Value>,
    corrupted: HashSet<DocumentKey>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a raw tree directly, bypassing any cache (an "external edit").
    pub fn insert(&self, key: impl Into<DocumentKey>, value: Value) {
        self.state().documents.insert(key.into(), value);
    }

    /// Returns the stored tree for `key`.
    pub fn raw(&self, key: impl Into<DocumentKey>) -> Option<Value> {
        self.state().documents.get(&key.into()).cloned()
    }

    /// Makes subsequent loads of `key` fail as malformed.
    pub fn corrupt(&self, key: impl Into<DocumentKey>) {
        self.state().corrupted.insert(key.into());
    }

    /// Undoes [`corrupt`](Self::corrupt).
    pub fn repair(&self, key: impl Into<DocumentKey>) {
        self.state().corrupted.remove(&key.into());
    }

    /// Toggles failure of every save.
    pub fn fail_saves(&self, fail: bool) {
        self.state().fail_saves = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of load attempts.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl BackingStore for MemoryStore {
    fn load_document(&self, key: &DocumentKey) -> StorageResult<Document> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.corrupted.contains(key) {
            return Err(StorageError::Malformed {
                key: key.to_string(),
                reason: "corrupted".into(),
            });
        }
        match state.documents.get(key) {
            Some(value) => Document::from_value(value.clone()).map_err(|e| StorageError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(Document::new_virtual()),
        }
    }

    fn save_document(&self, key: &DocumentKey, document: &Document) -> StorageResult<()> {
        let mut state = self.state();
        if state.fail_saves {
            return Err(StorageError::Unavailable(format!("save of {key} refused")));
        }
        state.documents.insert(key.clone(), document.as_value().clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn contains(&self, key: &DocumentKey) -> StorageResult<bool> {
        Ok(self.state().documents.contains_key(key))
    }

    fn list_entities(&self) -> StorageResult<Vec<EntityKey>> {
        let mut keys: Vec<EntityKey> = self
            .state()
            .documents
            .keys()
            .filter_map(DocumentKey::entity)
            .collect();
        keys.sort();
        Ok(keys)
    }
}
