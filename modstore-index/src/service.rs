//! Reconciliation scan and index queries.

use crate::{
    EntitySummary, IdentitySource, IndexError, IndexResult, NoPresence, Presence, ReconciliationIndex,
    SummaryExtractor, INDEX_SCHEMA_VERSION,
};
use modstore_cache::EntityService;
use modstore_storage::{DocumentKey, StorageError};
use modstore_types::EntityKey;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Index service configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Entities processed between idle-record cleanups during a scan.
    pub cleanup_interval: usize,
    /// Version stamped on built indexes; persisted indexes with any other
    /// version are rebuilt.
    pub schema_version: u32,
    /// Aggregate document the index persists to.
    pub index_name: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: 10,
            schema_version: INDEX_SCHEMA_VERSION,
            index_name: "entity-index".to_string(),
        }
    }
}

/// What a scan request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Another scan holds the guard; nothing was done.
    NotStarted,
    Completed { indexed: usize, skipped: usize },
}

/// Clears the running bit when a scan ends, however it ends.
struct ScanGuard {
    running: Arc<AtomicBool>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Builds and serves the reconciliation index.
///
/// At most one scan runs at a time. The exposed index is replaced as a
/// whole when a scan completes; readers never see a partially built one.
pub struct IndexService {
    config: IndexConfig,
    entities: Arc<EntityService>,
    identities: Arc<dyn IdentitySource>,
    extractor: Arc<dyn SummaryExtractor>,
    presence: Arc<dyn Presence>,
    current: RwLock<Arc<ReconciliationIndex>>,
    stale: AtomicBool,
    running: Arc<AtomicBool>,
}

impl IndexService {
    /// Opens the service, loading the persisted index if it is usable.
    ///
    /// A missing, empty, malformed or differently versioned index marks the
    /// service stale and is not exposed.
    pub fn open(
        config: IndexConfig,
        entities: Arc<EntityService>,
        identities: Arc<dyn IdentitySource>,
        extractor: Arc<dyn SummaryExtractor>,
    ) -> IndexResult<Self> {
        let (index, stale) = load_persisted(&entities, &config)?;
        Ok(Self {
            config,
            entities,
            identities,
            extractor,
            presence: Arc::new(NoPresence),
            current: RwLock::new(Arc::new(index)),
            stale: AtomicBool::new(stale),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn with_presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = presence;
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True until a scan completes when the persisted index was unusable.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// The currently exposed index.
    pub fn snapshot(&self) -> Arc<ReconciliationIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    // ── Scanning ─────────────────────────────────────────────────

    fn try_begin(&self) -> Option<ScanGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ScanGuard {
                running: Arc::clone(&self.running),
            })
    }

    /// Runs a scan on the calling thread, or returns `NotStarted` at once
    /// when one is already running.
    pub fn run_scan(&self) -> IndexResult<ScanOutcome> {
        match self.try_begin() {
            Some(guard) => self.scan(&guard),
            None => {
                debug!("Scan already running, not starting another");
                Ok(ScanOutcome::NotStarted)
            }
        }
    }

    /// Starts a scan on a background thread. `None` when one is already
    /// running.
    pub fn spawn_scan(self: &Arc<Self>) -> Option<JoinHandle<IndexResult<ScanOutcome>>> {
        let guard = self.try_begin()?;
        let service = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("modstore-index-scan".to_string())
            .spawn(move || {
                let result = service.scan(&guard);
                if let Err(e) = &result {
                    warn!(error = %e, "Background scan failed");
                }
                result
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to spawn scan thread");
                None
            }
        }
    }

    /// Starts a background scan; false when one is already running.
    pub fn trigger(self: &Arc<Self>) -> bool {
        self.spawn_scan().is_some()
    }

    /// Startup hook: triggers a background scan iff the index is stale.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.is_stale() {
            info!(index = %self.config.index_name, "Index is stale, rebuilding");
            self.trigger()
        } else {
            false
        }
    }

    fn scan(&self, _guard: &ScanGuard) -> IndexResult<ScanOutcome> {
        let started = Instant::now();
        let ids = self.identities.list_known_entity_ids()?;
        let online = self.presence.online_entities();
        let interval = self.config.cleanup_interval.max(1);
        debug!(entities = ids.len(), "Scan started");

        let mut staging: BTreeMap<EntityKey, EntitySummary> = BTreeMap::new();
        let mut skipped = 0;
        for (processed, key) in ids.into_iter().enumerate() {
            if processed > 0 && processed % interval == 0 {
                self.entities.evict_idle(&online);
            }
            if !self.has_local_state(key)? {
                skipped += 1;
                continue;
            }
            let document = self.entities.record(key).live_document()?;
            match self.extractor.summarize(key, &document) {
                Some(summary) => {
                    staging.insert(key, summary);
                }
                None => skipped += 1,
            }
        }
        self.entities.evict_idle(&online);

        let indexed = staging.len();
        let index = Arc::new(ReconciliationIndex::built(self.config.schema_version, staging));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);
        self.stale.store(false, Ordering::SeqCst);
        self.persist(&index)?;

        info!(
            indexed,
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan completed"
        );
        Ok(ScanOutcome::Completed { indexed, skipped })
    }

    fn has_local_state(&self, key: EntityKey) -> IndexResult<bool> {
        if self.entities.store().contains(&DocumentKey::Entity(key))? {
            return Ok(true);
        }
        Ok(self
            .entities
            .cached(&key)
            .is_some_and(|record| record.module_count() > 0 || record.is_dirty()))
    }

    fn persist(&self, index: &ReconciliationIndex) -> IndexResult<()> {
        let key = DocumentKey::aggregate(&self.config.index_name);
        let document = index.to_document()?;
        self.entities.store().save_document(&key, &document).map_err(|e| {
            warn!(index = %key, error = %e, "Index built but not persisted");
            IndexError::from(e)
        })
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Entities whose summary satisfies `predicate`.
    pub fn query(
        self: &Arc<Self>,
        predicate: impl Fn(&EntityKey, &EntitySummary) -> bool,
    ) -> IndexResult<Vec<EntityKey>> {
        Ok(self.current()?.keys_where(predicate))
    }

    /// Entities with the named flag set.
    pub fn flagged(self: &Arc<Self>, flag: &str) -> IndexResult<Vec<EntityKey>> {
        self.query(|_, summary| summary.flag(flag))
    }

    pub fn summary(self: &Arc<Self>, key: &EntityKey) -> IndexResult<Option<EntitySummary>> {
        Ok(self.current()?.get(key).cloned())
    }

    /// The index queries are answered from, patched with online entities'
    /// live state. A stale index triggers a background rebuild and the
    /// currently exposed index is served meanwhile. Never waits on a scan.
    pub fn current(self: &Arc<Self>) -> IndexResult<Arc<ReconciliationIndex>> {
        if self.is_stale() && self.trigger() {
            debug!(index = %self.config.index_name, "Stale index queried, rebuilding in the background");
        }
        self.refresh_online()?;
        Ok(self.snapshot())
    }

    fn refresh_online(&self) -> IndexResult<()> {
        let mut updates = Vec::new();
        for key in self.presence.online_entities() {
            if let Some(record) = self.entities.cached(&key) {
                let document = record.live_document()?;
                updates.push((key, self.extractor.summarize(key, &document)));
            }
        }
        if updates.is_empty() {
            return Ok(());
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let index = Arc::make_mut(&mut *current);
        for (key, summary) in updates {
            match summary {
                Some(summary) => {
                    index.entries.insert(key, summary);
                }
                None => {
                    index.entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Loads the persisted index, returning it with `stale = false` only when
/// it is present, well-formed and built for `config.schema_version`.
fn load_persisted(entities: &EntityService, config: &IndexConfig) -> IndexResult<(ReconciliationIndex, bool)> {
    let empty = ReconciliationIndex::empty(config.schema_version);
    let key = DocumentKey::aggregate(&config.index_name);
    let document = match entities.store().load_document(&key) {
        Ok(document) => document,
        Err(StorageError::Malformed { reason, .. }) => {
            warn!(index = %key, reason = %reason, "Persisted index unreadable");
            return Ok((empty, true));
        }
        Err(e) => return Err(e.into()),
    };

    if document.is_virtual() || document.is_empty() {
        info!(index = %key, "No persisted index");
        return Ok((empty, true));
    }
    match ReconciliationIndex::from_document(&document) {
        Ok(index) if index.schema_version == config.schema_version => {
            debug!(index = %key, entries = index.len(), "Loaded persisted index");
            Ok((index, false))
        }
        Ok(index) => {
            warn!(
                index = %key,
                found = index.schema_version,
                expected = config.schema_version,
                "Persisted index has another schema version"
            );
            Ok((empty, true))
        }
        Err(e) => {
            warn!(index = %key, error = %e, "Persisted index malformed");
            Ok((empty, true))
        }
    }
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("config", &self.config)
            .field("stale", &self.is_stale())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
