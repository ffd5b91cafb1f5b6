//! Feature-facing entry point: one [`EntityRecord`] per entity.

use crate::{CacheError, CacheResult, EntityRecord, ModuleRegistry, SaveOutcome};
use dashmap::DashMap;
use modstore_model::{ModuleRef, PersistentModule, TransientModule};
use modstore_storage::BackingStore;
use modstore_types::EntityKey;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of [`EntityService::save_all`].
#[derive(Debug, Default)]
pub struct SaveAllReport {
    pub saved: Vec<EntityKey>,
    pub skipped: Vec<EntityKey>,
    pub failed: Vec<(EntityKey, CacheError)>,
}

impl SaveAllReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Hands out per-entity records and their modules.
pub struct EntityService {
    store: Arc<dyn BackingStore>,
    registry: Arc<ModuleRegistry>,
    records: DashMap<EntityKey, Arc<EntityRecord>>,
}

impl EntityService {
    pub fn new(store: Arc<dyn BackingStore>, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            store,
            registry,
            records: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Returns the record for `key`, creating an unloaded one if needed.
    pub fn record(&self, key: EntityKey) -> Arc<EntityRecord> {
        self.records
            .entry(key)
            .or_insert_with(|| EntityRecord::new(key, Arc::clone(&self.store), Arc::clone(&self.registry)))
            .clone()
    }

    /// Returns the record for `key` only if it is already cached.
    pub fn cached(&self, key: &EntityKey) -> Option<Arc<EntityRecord>> {
        self.records.get(key).map(|r| Arc::clone(r.value()))
    }

    pub fn cached_keys(&self) -> Vec<EntityKey> {
        self.records.iter().map(|r| *r.key()).collect()
    }

    pub fn cached_len(&self) -> usize {
        self.records.len()
    }

    // ── Modules ──────────────────────────────────────────────────

    pub fn get_module<M: PersistentModule + Default>(&self, key: EntityKey) -> CacheResult<ModuleRef<M>> {
        self.record(key).get::<M>()
    }

    pub fn get_registered_module<M: PersistentModule>(&self, key: EntityKey) -> CacheResult<ModuleRef<M>> {
        self.record(key).get_registered::<M>()
    }

    pub fn set_module<M: PersistentModule>(&self, key: EntityKey, module: M) -> CacheResult<ModuleRef<M>> {
        self.record(key).set(module)
    }

    pub fn get_transient<M: TransientModule + Default>(&self, key: EntityKey) -> CacheResult<ModuleRef<M>> {
        self.record(key).get_transient::<M>()
    }

    pub fn get_transient_registered<M: TransientModule>(&self, key: EntityKey) -> CacheResult<ModuleRef<M>> {
        self.record(key).get_transient_registered::<M>()
    }

    pub fn set_transient<M: TransientModule>(&self, key: EntityKey, module: M) -> ModuleRef<M> {
        self.record(key).set_transient(module)
    }

    // ── Persistence ──────────────────────────────────────────────

    pub fn load(&self, key: EntityKey) -> CacheResult<()> {
        self.record(key).load()
    }

    pub fn save(&self, key: EntityKey) -> CacheResult<SaveOutcome> {
        self.record(key).save()
    }

    /// Saves every cached record, continuing past individual failures.
    pub fn save_all(&self) -> SaveAllReport {
        // Collect first so no map shard stays locked during I/O.
        let records: Vec<Arc<EntityRecord>> = self.records.iter().map(|r| Arc::clone(r.value())).collect();
        let mut report = SaveAllReport::default();
        for record in records {
            match record.save() {
                Ok(SaveOutcome::Saved) => report.saved.push(record.key()),
                Ok(SaveOutcome::Skipped) => report.skipped.push(record.key()),
                Err(e) => {
                    warn!(entity = %record.key(), error = %e, "Save failed during save_all");
                    report.failed.push((record.key(), e));
                }
            }
        }
        info!(
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Saved cached records"
        );
        report
    }

    /// Drops cached records nobody is using.
    ///
    /// A record stays when it is in `keep`, when a caller still holds it,
    /// when it caches any module (which may carry unsaved state), or when its
    /// document has raw edits that were never saved.
    pub fn evict_idle(&self, keep: &HashSet<EntityKey>) -> usize {
        let before = self.records.len();
        self.records.retain(|key, record| {
            keep.contains(key) || Arc::strong_count(record) > 1 || !record.is_idle()
        });
        let evicted = before.saturating_sub(self.records.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.records.len(), "Evicted idle records");
        }
        evicted
    }
}

impl std::fmt::Debug for EntityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("records", &self.records.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
