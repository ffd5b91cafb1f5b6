//! Per-entity module cache for modstore.
//!
//! Feature code asks for typed modules scoped to an entity; the cache hands
//! back a shared instance, constructing and populating it from the entity's
//! document on first use.
//!
//! # Components
//!
//! - **ModuleRegistry**: type-keyed factory table, built once at startup and
//!   shared as `Arc<ModuleRegistry>`
//! - **EntityRecord**: owns one entity's document and module maps behind a
//!   single lock; load/save live here
//! - **EntityService**: the feature-facing API, one record per entity
//!
//! # Load / save asymmetry
//!
//! A successful `load()` drops every cached persistent module, because they
//! captured fields from the old document. A `save()` flushes modules into the
//! document and keeps them, so callers holding a module keep the live
//! instance. Transient modules survive both.

mod error;
mod record;
mod registry;
mod service;

pub use error::{CacheError, CacheResult};
pub use record::{EntityRecord, SaveOutcome};
pub use registry::{ModuleContext, ModuleRegistry};
pub use service::{EntityService, SaveAllReport};

pub use modstore_model::ModuleRef;
