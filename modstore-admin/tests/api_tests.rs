use modstore_admin::{build_router, AdminConfig, AppState, EntityResponse, FlaggedResponse, IndexResponse};
use modstore_index::INDEX_SCHEMA_VERSION;
use modstore_types::EntityKey;
use serde_json::json;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> AdminConfig {
    let mut config = AdminConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.index.flags.insert("muted".into(), "/flags/muted".into());
    config
}

/// Writes one entity document through the cache, as a running server would.
fn seed(state: &AppState, key: EntityKey, muted: bool) {
    state
        .entities
        .record(key)
        .update_document(|doc| doc.set("/flags/muted", json!(muted)))
        .unwrap()
        .unwrap();
    state.entities.save(key).unwrap();
}

/// Waits out a background index rebuild.
async fn wait_for_scan(state: &AppState) {
    while state.index.is_running() {
        tokio::task::yield_now().await;
    }
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_test_server(state: AppState) -> String {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn index_endpoint_rebuilds_stale_index_in_background() {
    let dir = TempDir::new().unwrap();
    let state = AppState::open(&test_config(&dir)).unwrap();
    let muted = EntityKey::new_user();
    let quiet = EntityKey::new_user();
    seed(&state, muted, true);
    seed(&state, quiet, false);
    assert!(state.index.is_stale());

    let base = spawn_test_server(state.clone()).await;
    let resp = reqwest::get(format!("{}/api/v1/index", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    wait_for_scan(&state).await;

    let body: IndexResponse = reqwest::get(format!("{}/api/v1/index", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.schema_version, INDEX_SCHEMA_VERSION);
    assert_eq!(body.entries.len(), 2);
    assert!(body.entries[&muted].flag("muted"));
    assert!(!state.index.is_stale());
}

#[tokio::test]
async fn flagged_endpoint_lists_entities() {
    let dir = TempDir::new().unwrap();
    let state = AppState::open(&test_config(&dir)).unwrap();
    let muted = EntityKey::new_world();
    seed(&state, muted, true);
    seed(&state, EntityKey::new_user(), false);
    state.index.run_scan().unwrap();

    let base = spawn_test_server(state).await;
    let body: FlaggedResponse = reqwest::get(format!("{}/api/v1/index/flagged/muted", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.flag, "muted");
    assert_eq!(body.entities, vec![muted]);
}

#[tokio::test]
async fn entity_endpoint_returns_document() {
    let dir = TempDir::new().unwrap();
    let state = AppState::open(&test_config(&dir)).unwrap();
    let key = EntityKey::new_user();
    seed(&state, key, true);
    state.index.run_scan().unwrap();

    let base = spawn_test_server(state).await;
    let resp = reqwest::get(format!("{}/api/v1/entities/{}", base, key))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("application/json"));

    let body: EntityResponse = resp.json().await.unwrap();
    assert_eq!(body.key, key);
    assert_eq!(body.document, json!({"flags": {"muted": true}}));
    assert!(body.summary.unwrap().flag("muted"));
}

#[tokio::test]
async fn unknown_entity_returns_404() {
    let dir = TempDir::new().unwrap();
    let state = AppState::open(&test_config(&dir)).unwrap();
    let base = spawn_test_server(state).await;

    let resp = reqwest::get(format!("{}/api/v1/entities/{}", base, EntityKey::new_user()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn malformed_key_returns_400() {
    let dir = TempDir::new().unwrap();
    let state = AppState::open(&test_config(&dir)).unwrap();
    let base = spawn_test_server(state).await;

    let resp = reqwest::get(format!("{}/api/v1/entities/player:nope", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let dir = TempDir::new().unwrap();
    let base = spawn_test_server(AppState::open(&test_config(&dir)).unwrap()).await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
