//! One entity's document and module cache.

use crate::{CacheResult, ModuleContext, ModuleRegistry};
use modstore_model::{
    read_module, write_module, Document, ModelResult, ModuleRef, PersistentModule, TransientModule,
};
use modstore_storage::{BackingStore, DocumentKey, StorageResult};
use modstore_types::EntityKey;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};
use std::time::Instant;
use tracing::{debug, warn};

/// Result of [`EntityRecord::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Document handed to the backing store.
    Saved,
    /// Nothing to persist: no cached modules and a virtual document, or the
    /// record was never touched.
    Skipped,
}

/// A cached persistent module with its type erased.
trait PersistentSlot: Send + Sync {
    fn flush(&self, document: &mut Document) -> ModelResult<()>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn module_name(&self) -> &'static str;
}

impl<M: PersistentModule> PersistentSlot for RwLock<M> {
    fn flush(&self, document: &mut Document) -> ModelResult<()> {
        let module = self.read().unwrap_or_else(PoisonError::into_inner);
        write_module(&*module, document)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn module_name(&self) -> &'static str {
        type_name::<M>()
    }
}

struct RecordState {
    document: Document,
    loaded: bool,
    /// Raw document edits not yet persisted.
    dirty: bool,
    persistent: HashMap<TypeId, Arc<dyn PersistentSlot>>,
    transient: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

/// Owns one entity's document and its cached modules.
///
/// Every operation runs under a single per-record lock, so load, save and
/// module construction for the same entity are mutually exclusive while
/// unrelated entities never contend. The document is fetched lazily on the
/// first operation that needs it.
///
/// Do not hold a module's guard while calling back into its record: save
/// takes the record lock first and then each module's read lock.
pub struct EntityRecord {
    key: EntityKey,
    store: Arc<dyn BackingStore>,
    registry: Arc<ModuleRegistry>,
    this: Weak<EntityRecord>,
    state: Mutex<RecordState>,
}

impl EntityRecord {
    /// Creates an unloaded record. No I/O happens until first use.
    pub fn new(key: EntityKey, store: Arc<dyn BackingStore>, registry: Arc<ModuleRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            key,
            store,
            registry,
            this: this.clone(),
            state: Mutex::new(RecordState {
                document: Document::new_virtual(),
                loaded: false,
                dirty: false,
                persistent: HashMap::new(),
                transient: HashMap::new(),
            }),
        })
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }

    fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> ModuleContext {
        ModuleContext::new(self.key, self.this.clone())
    }

    fn fetch(&self) -> StorageResult<Document> {
        let started = Instant::now();
        let result = self.store.load_document(&DocumentKey::Entity(self.key));
        debug!(
            entity = %self.key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Fetched document"
        );
        result
    }

    fn ensure_loaded(&self, state: &mut RecordState) -> CacheResult<()> {
        if !state.loaded {
            state.document = self.fetch()?;
            state.loaded = true;
        }
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Reloads the document from the store.
    ///
    /// On success every cached persistent module is dropped; the next `get`
    /// builds a fresh instance from the new document. On failure the current
    /// document and caches are left exactly as they were.
    pub fn load(&self) -> CacheResult<()> {
        let mut state = self.lock();
        match self.fetch() {
            Ok(document) => {
                state.document = document;
                state.loaded = true;
                state.dirty = false;
                state.persistent.clear();
                Ok(())
            }
            Err(e) => {
                warn!(entity = %self.key, error = %e, "Load failed, keeping in-memory state");
                Err(e.into())
            }
        }
    }

    /// Flushes cached persistent modules into the document and persists it.
    ///
    /// The module cache is kept either way; a failed save can be retried.
    pub fn save(&self) -> CacheResult<SaveOutcome> {
        let mut state = self.lock();
        if !state.loaded || (state.persistent.is_empty() && state.document.is_virtual()) {
            debug!(entity = %self.key, "Nothing to save");
            state.dirty = false;
            return Ok(SaveOutcome::Skipped);
        }

        let started = Instant::now();
        let snapshot: Vec<Arc<dyn PersistentSlot>> = state.persistent.values().cloned().collect();
        for slot in &snapshot {
            if let Err(e) = slot.flush(&mut state.document) {
                warn!(entity = %self.key, module = slot.module_name(), error = %e, "Flush failed");
                return Err(e.into());
            }
        }

        if let Err(e) = self
            .store
            .save_document(&DocumentKey::Entity(self.key), &state.document)
        {
            warn!(entity = %self.key, error = %e, "Save failed, modules stay cached");
            return Err(e.into());
        }
        state.document.mark_persisted();
        state.dirty = false;
        debug!(
            entity = %self.key,
            modules = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Saved document"
        );
        Ok(SaveOutcome::Saved)
    }

    // ── Persistent modules ───────────────────────────────────────

    /// Returns the cached `M`, building it on first use.
    ///
    /// A registered factory wins; otherwise `M::default()` is used and a
    /// warning is logged. The new instance is populated from the document
    /// before it is cached.
    pub fn get<M: PersistentModule + Default>(&self) -> CacheResult<ModuleRef<M>> {
        self.get_or_construct(Some(M::default as fn() -> M))
    }

    /// Like [`get`](Self::get) for types that must come from a factory.
    pub fn get_registered<M: PersistentModule>(&self) -> CacheResult<ModuleRef<M>> {
        self.get_or_construct(None)
    }

    fn get_or_construct<M: PersistentModule>(&self, fallback: Option<fn() -> M>) -> CacheResult<ModuleRef<M>> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state)?;

        let type_id = TypeId::of::<M>();
        if let Some(slot) = state.persistent.get(&type_id) {
            if let Ok(existing) = Arc::clone(slot).into_any().downcast::<RwLock<M>>() {
                return Ok(existing);
            }
        }

        let mut module = self.registry.construct_persistent(&self.context(), fallback)?;
        read_module(&mut module, &state.document)?;
        let handle: ModuleRef<M> = Arc::new(RwLock::new(module));
        state
            .persistent
            .insert(type_id, Arc::clone(&handle) as Arc<dyn PersistentSlot>);
        Ok(handle)
    }

    /// Installs `module`, replacing any cached instance of its type.
    pub fn set<M: PersistentModule>(&self, module: M) -> CacheResult<ModuleRef<M>> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state)?;
        let handle: ModuleRef<M> = Arc::new(RwLock::new(module));
        state
            .persistent
            .insert(TypeId::of::<M>(), Arc::clone(&handle) as Arc<dyn PersistentSlot>);
        Ok(handle)
    }

    // ── Transient modules ────────────────────────────────────────

    /// Returns the cached transient `M`, building it on first use.
    pub fn get_transient<M: TransientModule + Default>(&self) -> CacheResult<ModuleRef<M>> {
        self.get_or_construct_transient(Some(M::default as fn() -> M))
    }

    pub fn get_transient_registered<M: TransientModule>(&self) -> CacheResult<ModuleRef<M>> {
        self.get_or_construct_transient(None)
    }

    fn get_or_construct_transient<M: TransientModule>(
        &self,
        fallback: Option<fn() -> M>,
    ) -> CacheResult<ModuleRef<M>> {
        let mut state = self.lock();
        let type_id = TypeId::of::<M>();
        if let Some(entry) = state.transient.get(&type_id) {
            if let Ok(existing) = Arc::clone(entry).downcast::<RwLock<M>>() {
                return Ok(existing);
            }
        }

        let module = self.registry.construct_transient(&self.context(), fallback)?;
        let handle: ModuleRef<M> = Arc::new(RwLock::new(module));
        state
            .transient
            .insert(type_id, Arc::clone(&handle) as Arc<dyn Any + Send + Sync>);
        Ok(handle)
    }

    /// Installs a transient module, replacing any cached instance of its type.
    pub fn set_transient<M: TransientModule>(&self, module: M) -> ModuleRef<M> {
        let handle: ModuleRef<M> = Arc::new(RwLock::new(module));
        self.lock()
            .transient
            .insert(TypeId::of::<M>(), Arc::clone(&handle) as Arc<dyn Any + Send + Sync>);
        handle
    }

    // ── Document access ──────────────────────────────────────────

    /// Copy of the document with every cached module flushed in, without
    /// persisting anything.
    pub fn live_document(&self) -> CacheResult<Document> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state)?;
        let mut document = state.document.clone();
        for slot in state.persistent.values() {
            slot.flush(&mut document)?;
        }
        Ok(document)
    }

    /// Reads the current document (cached modules not flushed).
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> CacheResult<R> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state)?;
        Ok(f(&state.document))
    }

    /// Edits the document directly, for features that write raw paths.
    ///
    /// Cached modules overwrite their own bound paths on the next save.
    /// The record stays out of eviction until the edit is saved or a load
    /// replaces it.
    pub fn update_document<R>(&self, f: impl FnOnce(&mut Document) -> R) -> CacheResult<R> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state)?;
        state.dirty = true;
        Ok(f(&mut state.document))
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Number of cached persistent modules.
    pub fn module_count(&self) -> usize {
        self.lock().persistent.len()
    }

    /// Number of cached transient modules.
    pub fn transient_count(&self) -> usize {
        self.lock().transient.len()
    }

    /// Whether raw document edits are waiting to be saved.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// True when no module of either kind is cached and no raw edit is
    /// unsaved. A record that is busy on another thread is never idle.
    pub fn is_idle(&self) -> bool {
        let idle = |state: &RecordState| {
            !state.dirty && state.persistent.is_empty() && state.transient.is_empty()
        };
        match self.state.try_lock() {
            Ok(state) => idle(&state),
            Err(TryLockError::Poisoned(poisoned)) => idle(&poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => false,
        }
    }
}

impl std::fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRecord").field("key", &self.key).finish_non_exhaustive()
    }
}
