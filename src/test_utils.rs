pub mod test_helpers {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request},
        response::Response,
        Router,
    };
    use serde_json::Value;

    use crate::config::GatewayConfig;
    use crate::protocol::SESSION_ID_HEADER;
    use crate::registry::ToolRegistry;
    use crate::session::{MemorySessionStore, SessionStore};
    use crate::{gateway, AppState};

    /// Gateway config with a caller-chosen TTL and no database.
    pub fn test_config(session_ttl_secs: u64) -> GatewayConfig {
        GatewayConfig {
            session_ttl_secs,
            ..GatewayConfig::default()
        }
    }

    /// App state backed by an in-memory session store.
    pub fn memory_state(session_ttl_secs: u64) -> AppState {
        AppState::new(
            test_config(session_ttl_secs),
            Arc::new(MemorySessionStore::new()),
        )
    }

    /// App state with an injected registry and/or store.
    pub fn custom_state(
        session_ttl_secs: u64,
        sessions: Arc<dyn SessionStore>,
        registry: ToolRegistry,
    ) -> AppState {
        AppState::with_registry(test_config(session_ttl_secs), sessions, registry)
    }

    pub fn test_app(state: &AppState) -> Router {
        gateway::router(state.clone())
    }

    /// Build a POST /gateway request.
    pub fn post_request(body: &Value, session_id: Option<&str>, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/gateway")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sid) = session_id {
            builder = builder.header(SESSION_ID_HEADER, sid);
        }
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    /// Build a GET request, optionally with a session header.
    pub fn get_request(uri: &str, session_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(sid) = session_id {
            builder = builder.header(SESSION_ID_HEADER, sid);
        }
        builder.body(Body::empty()).expect("valid request")
    }

    /// Read a response body fully and parse it as JSON.
    pub async fn response_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        serde_json::from_slice(&bytes).expect("JSON body")
    }

    /// Read a response body fully as text (NDJSON bodies).
    pub async fn response_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    /// The session id header of a response, if present.
    pub fn session_header(response: &Response) -> Option<String> {
        response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}
