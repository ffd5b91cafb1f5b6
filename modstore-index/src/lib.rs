//! Reconciliation scan and versioned index for modstore.
//!
//! The index holds one [`EntitySummary`] per known entity (a handful of
//! flags and timestamps) so cross-entity questions such as "who is muted"
//! can be answered without loading every document.
//!
//! # Lifecycle
//!
//! 1. [`IndexService::open`] loads the persisted aggregate document. Anything
//!    unusable (missing, empty, malformed, other schema version) is dropped
//!    and the service is marked stale.
//! 2. A scan enumerates entities from an [`IdentitySource`], summarizes each
//!    live document through a [`SummaryExtractor`], and swaps the result in
//!    as a whole before persisting it.
//! 3. Queries never block on a scan. A stale index triggers a background
//!    rebuild and the exposed index is served meanwhile, with online
//!    entities (see [`Presence`]) refreshed from their cached records.

mod error;
mod extractor;
mod index;
mod service;
mod source;

pub use error::{IndexError, IndexResult};
pub use extractor::{PathExtractor, SummaryExtractor};
pub use index::{EntitySummary, ReconciliationIndex, INDEX_SCHEMA_VERSION};
pub use service::{IndexConfig, IndexService, ScanOutcome};
pub use source::{IdentitySource, NoPresence, Presence, StaticPresence, StoreIdentitySource};
