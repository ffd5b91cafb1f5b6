use crate::EntitySummary;
use modstore_model::Document;
use modstore_types::EntityKey;
use std::collections::BTreeMap;

/// Derives an entity's summary from its live document.
///
/// Returning `None` leaves the entity out of the index.
pub trait SummaryExtractor: Send + Sync {
    fn summarize(&self, key: EntityKey, document: &Document) -> Option<EntitySummary>;
}

impl<F> SummaryExtractor for F
where
    F: Fn(EntityKey, &Document) -> Option<EntitySummary> + Send + Sync,
{
    fn summarize(&self, key: EntityKey, document: &Document) -> Option<EntitySummary> {
        self(key, document)
    }
}

/// Reads named flags and timestamps from fixed JSON pointers.
///
/// Missing or mistyped values are left out of the summary. Virtual
/// documents produce no summary at all.
#[derive(Debug, Clone, Default)]
pub struct PathExtractor {
    flags: BTreeMap<String, String>,
    timestamps: BTreeMap<String, String>,
}

impl PathExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn flag(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.flags.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn timestamp(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.timestamps.insert(name.into(), path.into());
        self
    }
}

impl SummaryExtractor for PathExtractor {
    fn summarize(&self, _key: EntityKey, document: &Document) -> Option<EntitySummary> {
        if document.is_virtual() {
            return None;
        }
        let flags = self
            .flags
            .iter()
            .filter_map(|(name, path)| document.get_bool(path).map(|v| (name.clone(), v)))
            .collect();
        let timestamps = self
            .timestamps
            .iter()
            .filter_map(|(name, path)| document.get_i64(path).map(|v| (name.clone(), v)))
            .collect();
        Some(EntitySummary { flags, timestamps })
    }
}
