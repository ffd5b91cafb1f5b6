//! Collaborators the scan consults: who exists, and who is online.

use crate::IndexResult;
use modstore_storage::BackingStore;
use modstore_types::EntityKey;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Enumerates every entity the scan should consider.
pub trait IdentitySource: Send + Sync {
    fn list_known_entity_ids(&self) -> IndexResult<Vec<EntityKey>>;
}

/// Lists the entities persisted in a backing store.
pub struct StoreIdentitySource {
    store: Arc<dyn BackingStore>,
}

impl StoreIdentitySource {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self { store }
    }
}

impl IdentitySource for StoreIdentitySource {
    fn list_known_entity_ids(&self) -> IndexResult<Vec<EntityKey>> {
        Ok(self.store.list_entities()?)
    }
}

impl IdentitySource for Vec<EntityKey> {
    fn list_known_entity_ids(&self) -> IndexResult<Vec<EntityKey>> {
        Ok(self.clone())
    }
}

/// Reports which entities are currently active in the running process.
///
/// Online entities are kept cached during scans and have their summaries
/// refreshed from live state before each query.
pub trait Presence: Send + Sync {
    fn online_entities(&self) -> HashSet<EntityKey>;
}

/// Nobody is ever online.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresence;

impl Presence for NoPresence {
    fn online_entities(&self) -> HashSet<EntityKey> {
        HashSet::new()
    }
}

/// An explicitly maintained online set.
#[derive(Debug, Default)]
pub struct StaticPresence {
    online: RwLock<HashSet<EntityKey>>,
}

impl StaticPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, key: EntityKey) {
        self.online
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    pub fn set_offline(&self, key: &EntityKey) {
        self.online
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl Presence for StaticPresence {
    fn online_entities(&self) -> HashSet<EntityKey> {
        self.online
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
