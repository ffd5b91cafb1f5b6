//! Shared state and HTTP API for the modstore admin tool.
//!
//! The API is read-only: it serves the reconciliation index and single
//! entity documents out of a file store. Store access is blocking, so every
//! handler hops onto the blocking pool.

pub mod config;
mod error;

pub use config::AdminConfig;
pub use error::{AdminError, AdminResult};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use modstore_cache::{EntityService, ModuleRegistry};
use modstore_index::{EntitySummary, IndexService, StoreIdentitySource};
use modstore_storage::{BackingStore, FileStore};
use modstore_types::EntityKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Services behind the admin commands and the HTTP API.
#[derive(Clone, Debug)]
pub struct AppState {
    pub entities: Arc<EntityService>,
    pub index: Arc<IndexService>,
}

impl AppState {
    /// Opens the file store under `config.data_dir` and the index over it.
    pub fn open(config: &AdminConfig) -> AdminResult<Self> {
        let store: Arc<dyn BackingStore> = Arc::new(FileStore::open(config.data_dir.clone())?);
        let entities = Arc::new(EntityService::new(
            Arc::clone(&store),
            Arc::new(ModuleRegistry::new()),
        ));
        let index = IndexService::open(
            config.index_config(),
            Arc::clone(&entities),
            Arc::new(StoreIdentitySource::new(store)),
            Arc::new(config.extractor()),
        )?;
        Ok(Self {
            entities,
            index: Arc::new(index),
        })
    }

    /// Live document for `key`, or `NotFound` when nothing is stored.
    pub fn entity(&self, key: EntityKey) -> AdminResult<EntityResponse> {
        let document = self.entities.record(key).live_document()?;
        if document.is_virtual() {
            return Err(AdminError::NotFound(key.to_string()));
        }
        Ok(EntityResponse {
            key,
            document: document.into_value(),
            summary: self.index.summary(&key)?,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IndexResponse {
    pub schema_version: u32,
    pub built_at: i64,
    pub entries: BTreeMap<EntityKey, EntitySummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FlaggedResponse {
    pub flag: String,
    pub entities: Vec<EntityKey>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntityResponse {
    pub key: EntityKey,
    pub document: serde_json::Value,
    pub summary: Option<EntitySummary>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Runs blocking store work off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> AdminResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AdminError::Task(e.to_string()).status())?
        .map(Json)
        .map_err(|e| e.status())
}

async fn index_handler(State(state): State<AppState>) -> ApiResult<IndexResponse> {
    blocking(move || {
        let index = state.index.current()?;
        Ok(IndexResponse {
            schema_version: index.schema_version,
            built_at: index.built_at,
            entries: index.entries.clone(),
        })
    })
    .await
}

async fn flagged_handler(
    State(state): State<AppState>,
    Path(flag): Path<String>,
) -> ApiResult<FlaggedResponse> {
    blocking(move || {
        let entities = state.index.flagged(&flag)?;
        Ok(FlaggedResponse { flag, entities })
    })
    .await
}

async fn entity_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<EntityResponse> {
    let key = EntityKey::parse(&key).map_err(|e| AdminError::from(e).status())?;
    blocking(move || state.entity(key)).await
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/index", get(index_handler))
        .route("/api/v1/index/flagged/{flag}", get(flagged_handler))
        .route("/api/v1/entities/{key}", get(entity_handler))
        .with_state(state)
}
