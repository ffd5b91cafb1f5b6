use crate::IndexResult;
use chrono::Utc;
use modstore_model::Document;
use modstore_types::EntityKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version this build writes. Bump whenever summary contents change
/// so older on-disk indexes are rebuilt instead of served.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Cached facts about one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timestamps: BTreeMap<String, i64>,
}

impl EntitySummary {
    /// Whether the named flag is set. Absent flags read as false.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn timestamp(&self, name: &str) -> Option<i64> {
        self.timestamps.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.timestamps.is_empty()
    }
}

/// The aggregate document: one summary per known entity, stamped with the
/// schema version it was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationIndex {
    pub schema_version: u32,
    /// Build completion time, unix milliseconds.
    pub built_at: i64,
    #[serde(default)]
    pub entries: BTreeMap<EntityKey, EntitySummary>,
}

impl ReconciliationIndex {
    /// An index with no entries that has never been built.
    pub fn empty(schema_version: u32) -> Self {
        Self {
            schema_version,
            built_at: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Stamps a freshly built set of entries.
    pub fn built(schema_version: u32, entries: BTreeMap<EntityKey, EntitySummary>) -> Self {
        Self {
            schema_version,
            built_at: Utc::now().timestamp_millis(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntitySummary> {
        self.entries.get(key)
    }

    /// Keys whose summary satisfies `predicate`, in key order.
    pub fn keys_where(&self, predicate: impl Fn(&EntityKey, &EntitySummary) -> bool) -> Vec<EntityKey> {
        self.entries
            .iter()
            .filter(|(key, summary)| predicate(key, summary))
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn to_document(&self) -> IndexResult<Document> {
        Ok(Document::from_value(serde_json::to_value(self)?)?)
    }

    pub fn from_document(document: &Document) -> IndexResult<Self> {
        Ok(serde_json::from_value(document.as_value().clone())?)
    }
}
