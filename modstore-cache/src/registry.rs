//! Type-keyed module factories.
//!
//! Factories are consulted first; when none is registered and the caller
//! offers a default constructor, the module is built from it and a warning
//! is logged so unregistered module types stay visible.

use crate::{CacheError, CacheResult, EntityRecord};
use modstore_model::{PersistentModule, TransientModule};
use modstore_types::EntityKey;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

type Factory<M> = Box<dyn Fn(&ModuleContext) -> anyhow::Result<M> + Send + Sync>;

/// What a factory knows about the module it is building.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    key: EntityKey,
    record: Weak<EntityRecord>,
}

impl ModuleContext {
    pub(crate) fn new(key: EntityKey, record: Weak<EntityRecord>) -> Self {
        Self { key, record }
    }

    /// The entity the module belongs to.
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Back-reference to the owning record.
    ///
    /// Factories run while the record is locked: store the handle, do not
    /// call into the record during construction.
    pub fn record(&self) -> Weak<EntityRecord> {
        self.record.clone()
    }
}

/// Factory table for module types.
///
/// Built at startup, then shared read-only as `Arc<ModuleRegistry>`.
#[derive(Default)]
pub struct ModuleRegistry {
    persistent: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    transient: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    fallbacks: AtomicU64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for a persistent module type, replacing any
    /// previous one.
    pub fn register<M, F>(&mut self, factory: F) -> &mut Self
    where
        M: PersistentModule,
        F: Fn(&ModuleContext) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        let boxed: Factory<M> = Box::new(factory);
        self.persistent.insert(TypeId::of::<M>(), Box::new(boxed));
        self
    }

    /// Registers the constructor for a transient module type.
    pub fn register_transient<M, F>(&mut self, factory: F) -> &mut Self
    where
        M: TransientModule,
        F: Fn(&ModuleContext) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        let boxed: Factory<M> = Box::new(factory);
        self.transient.insert(TypeId::of::<M>(), Box::new(boxed));
        self
    }

    pub fn is_registered<M: PersistentModule>(&self) -> bool {
        self.persistent.contains_key(&TypeId::of::<M>())
    }

    pub fn is_transient_registered<M: TransientModule>(&self) -> bool {
        self.transient.contains_key(&TypeId::of::<M>())
    }

    /// How many modules were built through the default-constructor fallback.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub(crate) fn construct_persistent<M: PersistentModule>(
        &self,
        context: &ModuleContext,
        fallback: Option<fn() -> M>,
    ) -> CacheResult<M> {
        self.construct(&self.persistent, context, fallback)
    }

    pub(crate) fn construct_transient<M: TransientModule>(
        &self,
        context: &ModuleContext,
        fallback: Option<fn() -> M>,
    ) -> CacheResult<M> {
        self.construct(&self.transient, context, fallback)
    }

    fn construct<M: 'static>(
        &self,
        table: &HashMap<TypeId, Box<dyn Any + Send + Sync>>,
        context: &ModuleContext,
        fallback: Option<fn() -> M>,
    ) -> CacheResult<M> {
        let module = type_name::<M>();
        let factory = table
            .get(&TypeId::of::<M>())
            .and_then(|boxed| boxed.downcast_ref::<Factory<M>>());

        if let Some(factory) = factory {
            return factory(context).map_err(|source| CacheError::Construction { module, source });
        }

        match fallback {
            Some(make) => {
                warn!(
                    module,
                    entity = %context.key,
                    "No factory registered, falling back to default construction"
                );
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                Ok(make())
            }
            None => Err(CacheError::NoFactory { module }),
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("persistent", &self.persistent.len())
            .field("transient", &self.transient.len())
            .field("fallbacks", &self.fallback_count())
            .finish()
    }
}
