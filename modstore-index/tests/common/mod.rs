//! Shared fixtures for index tests.

#![allow(dead_code)]

use modstore_cache::{EntityService, ModuleRegistry};
use modstore_index::{IdentitySource, IndexConfig, IndexResult, IndexService, PathExtractor};
use modstore_model::{FieldBinding, FieldReader, FieldWriter, ModelResult, ModuleSchema, PersistentModule};
use modstore_storage::MemoryStore;
use modstore_types::EntityKey;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Flags {
    pub muted: bool,
}

impl PersistentModule for Flags {
    fn schema() -> ModuleSchema {
        ModuleSchema::new("flags").field(FieldBinding::bool("muted", "/flags/muted").with_default(false))
    }

    fn read_fields(&mut self, fields: &FieldReader<'_>) -> ModelResult<()> {
        self.muted = fields.get("muted")?;
        Ok(())
    }

    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> ModelResult<()> {
        fields.set("muted", &self.muted)
    }
}

pub fn extractor() -> PathExtractor {
    PathExtractor::new()
        .flag("muted", "/flags/muted")
        .timestamp("last_seen", "/seen/at")
}

pub fn entities() -> (Arc<MemoryStore>, Arc<EntityService>) {
    let store = Arc::new(MemoryStore::new());
    let entities = Arc::new(EntityService::new(store.clone(), Arc::new(ModuleRegistry::new())));
    (store, entities)
}

/// Index over every entity in the store, with default configuration.
pub fn open_index(entities: &Arc<EntityService>) -> IndexService {
    let identities = Arc::new(modstore_index::StoreIdentitySource::new(Arc::clone(entities.store())));
    IndexService::open(IndexConfig::default(), Arc::clone(entities), identities, Arc::new(extractor()))
        .unwrap()
}

/// Spins until no scan is running on `index`.
pub fn wait_for_scan(index: &IndexService) {
    while index.is_running() {
        std::thread::yield_now();
    }
}

/// Identity source that blocks inside the scan until released.
pub struct GatedIdentities {
    keys: Vec<EntityKey>,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedIdentities {
    pub fn new(keys: Vec<EntityKey>, entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            keys,
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        }
    }
}

impl IdentitySource for GatedIdentities {
    fn list_known_entity_ids(&self) -> IndexResult<Vec<EntityKey>> {
        let _ = self.entered.lock().unwrap_or_else(PoisonError::into_inner).send(());
        let _ = self.release.lock().unwrap_or_else(PoisonError::into_inner).recv();
        Ok(self.keys.clone())
    }
}

/// Identity source that always fails.
pub struct FailingIdentities;

impl IdentitySource for FailingIdentities {
    fn list_known_entity_ids(&self) -> IndexResult<Vec<EntityKey>> {
        Err(modstore_index::IndexError::Identity("directory offline".into()))
    }
}
