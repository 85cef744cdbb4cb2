//! Integration tests for session store backends and degraded-mode behavior.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt; // for `oneshot`

use fleetgate::db;
use fleetgate::session::{
    MemorySessionStore, SessionRecord, SessionStore, SqliteSessionStore, StoreError,
};
use fleetgate::test_utils::test_helpers::{
    post_request, response_json, session_header, test_config,
};
use fleetgate::tools;
use fleetgate::AppState;

async fn sqlite_store() -> (SqliteSessionStore, tempfile::NamedTempFile) {
    let temp_file = tempfile::NamedTempFile::new().expect("temp file");
    let database_url = format!(
        "sqlite://{}",
        temp_file.path().to_str().expect("utf-8 temp path")
    );
    let pool = db::try_create_pool(&database_url).await.expect("pool");
    (SqliteSessionStore::new(pool), temp_file)
}

#[tokio::test]
async fn sqlite_store_roundtrips_a_session() {
    let (store, _guard) = sqlite_store().await;

    let record = SessionRecord::new(600, "2025-03-26", Some(json!({"name": "it"})));
    store.create(&record).await.unwrap();

    let found = store.get(&record.id).await.unwrap().expect("present");
    assert_eq!(found.id, record.id);
    assert_eq!(found.protocol_version, "2025-03-26");
    assert_eq!(found.client_info, Some(json!({"name": "it"})));
    assert_eq!(found.created_at.timestamp(), record.created_at.timestamp());

    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_store_expires_and_sweeps() {
    let (store, _guard) = sqlite_store().await;

    let created_at = Utc::now();
    let expired = SessionRecord {
        id: "expired-session".to_string(),
        created_at,
        expires_at: created_at - chrono::Duration::seconds(5),
        protocol_version: "2025-03-26".to_string(),
        client_info: None,
    };
    let live = SessionRecord::new(600, "2025-03-26", None);

    store.create(&expired).await.unwrap();
    store.create(&live).await.unwrap();

    assert!(store.get(&expired.id).await.unwrap().is_none());
    assert!(store.get(&live.id).await.unwrap().is_some());

    assert_eq!(store.remove_expired().await.unwrap(), 1);
    assert!(store.get(&live.id).await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_create_is_idempotent_per_id() {
    let (store, _guard) = sqlite_store().await;

    let mut record = SessionRecord::new(600, "2025-03-26", None);
    store.create(&record).await.unwrap();
    record.protocol_version = "2024-11-05".to_string();
    store.create(&record).await.unwrap();

    let found = store.get(&record.id).await.unwrap().expect("present");
    assert_eq!(found.protocol_version, "2024-11-05");
}

/// A store whose backend is down: every operation fails.
struct UnavailableStore;

#[async_trait::async_trait]
impl SessionStore for UnavailableStore {
    async fn create(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("sessions backend down".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError::Unavailable("sessions backend down".to_string()))
    }

    async fn remove_expired(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("sessions backend down".to_string()))
    }
}

#[tokio::test]
async fn initialize_still_succeeds_when_the_store_is_down() {
    let state = AppState::with_registry(
        test_config(3600),
        Arc::new(UnavailableStore),
        tools::build_registry(),
    );
    let app = fleetgate::gateway::router(state);

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let response = app
        .clone()
        .oneshot(post_request(&body, None, None))
        .await
        .unwrap();

    // Degraded mode: the client still gets an id.
    assert_eq!(response.status(), StatusCode::OK);
    let sid = session_header(&response).expect("session header");
    let body = response_json(response).await;
    assert_eq!(body["result"]["sessionId"], sid.as_str());

    // But the id was never persisted, so the next lookup fails and forces
    // a re-initialize.
    let body = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let response = app
        .clone()
        .oneshot(post_request(&body, Some(&sid), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
}

#[tokio::test]
async fn memory_and_sqlite_stores_agree_on_the_contract() {
    let (sqlite, _guard) = sqlite_store().await;
    let memory = MemorySessionStore::new();

    for store in [&sqlite as &dyn SessionStore, &memory as &dyn SessionStore] {
        let record = SessionRecord::new(600, "2025-03-26", None);
        store.create(&record).await.unwrap();
        assert!(store.get(&record.id).await.unwrap().is_some());
        assert!(store.get("absent").await.unwrap().is_none());
    }
}
