//! HTTP surface for the gateway: one endpoint, three transports.
//!
//! Every request walks the same pipeline: parse, resolve the session,
//! negotiate the transport, dispatch one or many envelopes, send. The
//! session store is the only shared mutable state; everything else here is
//! request-scoped.
//!
//! # Endpoints
//!
//! - `POST /gateway` - one JSON-RPC envelope or a batch array; the response
//!   is buffered JSON or an NDJSON stream depending on the Accept header
//! - `GET /gateway` - opens an SSE push channel for an existing session
//! - `OPTIONS /gateway` - CORS preflight
//! - `GET /status` - process health and supported transports

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{DispatchError, INTERNAL_ERROR};
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, OutboundMessage, JSONRPC_VERSION, PROTOCOL_VERSION,
    SESSION_ID_HEADER,
};
use crate::registry::ProgressSink;
use crate::session::SessionRecord;
use crate::transport::{
    choose_transport,
    encoder::{body_from_messages, sse_push_body, StreamFraming},
    TransportKind,
};
use crate::AppState;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Bounded per-response channel; a slow consumer stalls dispatch for its
/// own request instead of growing memory.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Build the gateway router with CORS and request tracing applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(SESSION_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route(
            "/gateway",
            post(gateway_post).get(gateway_get).options(gateway_options),
        )
        .route("/status", get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An envelope after the pre-dispatch pass: either ready to run or already
/// rejected with its response.
enum Planned {
    Dispatch(JsonRpcRequest),
    Reject(JsonRpcResponse),
}

/// POST /gateway - single envelope or batch.
pub async fn gateway_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            // Unparsable body: one protocol error with a null id is all we
            // can correlate.
            let resp = JsonRpcResponse::error(
                Value::Null,
                INTERNAL_ERROR,
                format!("Invalid request: {e}"),
            );
            return json_response(StatusCode::BAD_REQUEST, None, envelope_json(&resp));
        }
    };

    let presented = session_id_from_headers(&headers);
    let mut session_id: Option<String> = None;
    if let Some(id) = &presented {
        match state.sessions.get(id).await {
            Ok(Some(record)) => session_id = Some(record.id),
            Ok(None) => {
                tracing::debug!(session_id = %id, "presented session not found or expired")
            }
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed; treating session as absent")
            }
        }
    }

    let transport = choose_transport(&Method::POST, &headers, session_id.is_some());

    let (items, batched) = match payload {
        Value::Array(items) => (items, true),
        single => (vec![single], false),
    };
    tracing::debug!(
        transport = transport.as_str(),
        batched,
        items = items.len(),
        "transport negotiated"
    );

    // Pre-dispatch pass: parse every envelope and settle the session before
    // any handler runs, so each failure stays confined to its own item.
    let mut minted: Option<String> = None;
    let mut plan = Vec::with_capacity(items.len());
    for item in items {
        let salvaged_id = item.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(item) {
            Ok(r) => r,
            Err(e) => {
                plan.push(Planned::Reject(JsonRpcResponse::error(
                    salvaged_id,
                    INTERNAL_ERROR,
                    format!("Invalid request: {e}"),
                )));
                continue;
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            plan.push(Planned::Reject(JsonRpcResponse::error(
                salvaged_id,
                INTERNAL_ERROR,
                format!("Invalid request: unsupported version {:?}", request.jsonrpc),
            )));
            continue;
        }

        if request.method == "initialize" {
            if session_id.is_none() && minted.is_none() {
                minted = Some(mint_session(&state, &request).await);
            }
            plan.push(Planned::Dispatch(request));
        } else if session_id.is_some() || minted.is_some() {
            plan.push(Planned::Dispatch(request));
        } else {
            let err = DispatchError::SessionRequired;
            plan.push(Planned::Reject(JsonRpcResponse::error(
                salvaged_id,
                err.code(),
                err.to_string(),
            )));
        }
    }

    let effective_session = minted.or(session_id);

    match transport {
        TransportKind::NdjsonStream => {
            respond_ndjson(&state, plan, effective_session.as_deref()).await
        }
        _ => respond_buffered(&state, plan, batched, effective_session.as_deref()).await,
    }
}

/// Mint a session for an `initialize` request. Persistence is best-effort:
/// if the store is down the client still gets an id, it just will not
/// survive the next lookup, forcing a re-initialize.
async fn mint_session(state: &AppState, request: &JsonRpcRequest) -> String {
    let client_info = request
        .params
        .as_ref()
        .and_then(|p| p.get("clientInfo"))
        .cloned();
    let record = SessionRecord::new(state.config.session_ttl_secs, PROTOCOL_VERSION, client_info);
    let id = record.id.clone();

    match state.sessions.create(&record).await {
        Ok(()) => tracing::info!(session_id = %id, "session created"),
        Err(e) => {
            tracing::warn!(error = %e, session_id = %id, "failed to persist session; continuing stateless")
        }
    }

    id
}

async fn respond_buffered(
    state: &AppState,
    plan: Vec<Planned>,
    batched: bool,
    session_id: Option<&str>,
) -> Response {
    let mut responses = Vec::with_capacity(plan.len());
    for planned in plan {
        match planned {
            Planned::Reject(resp) => responses.push(resp),
            Planned::Dispatch(request) => {
                let sink = buffered_progress_sink(state, session_id, &request).await;
                let mut resp = state.dispatcher.dispatch(&request, &sink).await;
                annotate_initialize(&mut resp, &request, session_id);
                responses.push(resp);
            }
        }
    }

    let body = if batched {
        Value::Array(responses.iter().map(envelope_json).collect())
    } else {
        // A non-array payload always planned exactly one item.
        responses
            .first()
            .map(envelope_json)
            .unwrap_or(Value::Null)
    };

    json_response(StatusCode::OK, session_id, body)
}

async fn respond_ndjson(
    state: &AppState,
    plan: Vec<Planned>,
    session_id: Option<&str>,
) -> Response {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let dispatcher = state.dispatcher.clone();
    let session_for_task = session_id.map(str::to_string);

    tokio::spawn(async move {
        for planned in plan {
            let message = match planned {
                Planned::Reject(resp) => OutboundMessage::Response(resp),
                Planned::Dispatch(request) => {
                    let sink = ProgressSink::stream(request.correlation_id(), tx.clone());
                    let mut resp = dispatcher.dispatch(&request, &sink).await;
                    annotate_initialize(&mut resp, &request, session_for_task.as_deref());
                    OutboundMessage::Response(resp)
                }
            };
            if tx.send(message).await.is_err() {
                // Client went away; in-flight work is done, the rest is
                // discarded.
                tracing::debug!("client disconnected mid-stream; discarding remaining responses");
                break;
            }
        }
    });

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-ndjson"),
    );

    let response = (
        StatusCode::OK,
        headers,
        body_from_messages(StreamFraming::Ndjson, rx),
    )
        .into_response();
    with_session_header(response, session_id)
}

/// GET /gateway - open the SSE push channel for a session.
pub async fn gateway_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_from_headers(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("{SESSION_ID_HEADER} header required")})),
        )
            .into_response();
    };

    let session_present = matches!(state.sessions.get(&session_id).await, Ok(Some(_)));

    match choose_transport(&Method::GET, &headers, session_present) {
        TransportKind::SsePush => {
            let rx = state.push.subscribe(&session_id).await;
            tracing::info!(session_id = %session_id, "SSE push channel opened");

            let mut sse_headers = HeaderMap::new();
            sse_headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            );
            sse_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

            let response = (
                StatusCode::OK,
                sse_headers,
                sse_push_body(rx, SSE_KEEP_ALIVE),
            )
                .into_response();
            with_session_header(response, Some(&session_id))
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Session not found"})),
        )
            .into_response(),
    }
}

/// OPTIONS /gateway - CORS preflight, answered before any parsing.
pub async fn gateway_options() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, Accept, Mcp-Session-Id"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("3600"),
    );

    (StatusCode::NO_CONTENT, headers).into_response()
}

/// GET /status - read-only health report.
async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "transports": TransportKind::supported(),
    }))
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// For buffered responses, progress can only travel over an already-open
/// SSE push channel; without one it is dropped.
async fn buffered_progress_sink(
    state: &AppState,
    session_id: Option<&str>,
    request: &JsonRpcRequest,
) -> ProgressSink {
    if let Some(sid) = session_id {
        if let Some(tx) = state.push.sender(sid).await {
            return ProgressSink::push(request.correlation_id(), tx);
        }
    }
    ProgressSink::disabled()
}

/// `initialize` returns the session id in the body as well as the header.
fn annotate_initialize(
    response: &mut JsonRpcResponse,
    request: &JsonRpcRequest,
    session_id: Option<&str>,
) {
    if request.method != "initialize" {
        return;
    }
    if let (Some(sid), Some(result)) = (
        session_id,
        response.result.as_mut().and_then(Value::as_object_mut),
    ) {
        result.insert("sessionId".to_string(), json!(sid));
    }
}

fn envelope_json(response: &JsonRpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or_else(|_| {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": null,
            "error": {"code": INTERNAL_ERROR, "message": "Failed to encode response"}
        })
    })
}

fn json_response(status: StatusCode, session_id: Option<&str>, body: Value) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    let response = (status, headers, body.to_string()).into_response();
    with_session_header(response, session_id)
}

fn with_session_header(mut response: Response, session_id: Option<&str>) -> Response {
    if let Some(sid) = session_id {
        if let Ok(value) = HeaderValue::from_str(sid) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_ID_HEADER), value);
        }
    }
    response
}
