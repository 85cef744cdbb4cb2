//! Integration tests for transport negotiation and streamed delivery.

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use fleetgate::test_utils::test_helpers::{
    get_request, memory_state, post_request, response_json, response_text, session_header,
    test_app,
};

async fn initialize(app: &axum::Router) -> String {
    let body = json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}});
    let response = app
        .clone()
        .oneshot(post_request(&body, None, None))
        .await
        .expect("request");
    session_header(&response).expect("session header on initialize")
}

#[tokio::test]
async fn post_defaults_to_buffered_json() {
    let app = test_app(&memory_state(3600));
    let sid = initialize(&app).await;

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

    // No Accept header.
    let response = app
        .clone()
        .oneshot(post_request(&body, Some(&sid), None))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );

    // Plain JSON Accept header.
    let response = app
        .clone()
        .oneshot(post_request(&body, Some(&sid), Some("application/json")))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn accepting_ndjson_switches_to_a_streamed_response() {
    let app = test_app(&memory_state(3600));
    let sid = initialize(&app).await;

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let response = app
        .clone()
        .oneshot(post_request(
            &body,
            Some(&sid),
            Some("application/x-ndjson"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );

    let text = response_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["id"], 1);
    assert!(value["result"]["tools"].is_array());
}

#[tokio::test]
async fn ndjson_batches_stream_in_order_with_progress_first() {
    let app = test_app(&memory_state(3600));
    let sid = initialize(&app).await;

    let body = json!([
        {
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "seed_demo_data", "arguments": {"count": 10}}
        },
        {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
    ]);
    let response = app
        .clone()
        .oneshot(post_request(
            &body,
            Some(&sid),
            Some("application/x-ndjson"),
        ))
        .await
        .unwrap();

    let text = response_text(response).await;
    let frames: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON value per line"))
        .collect();

    let responses: Vec<&Value> = frames.iter().filter(|f| f.get("id").is_some()).collect();
    let progress: Vec<&Value> = frames
        .iter()
        .filter(|f| f["method"] == "notifications/progress")
        .collect();

    // Exactly N responses for N requests, in request order.
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["seeded"], 10);
    assert_eq!(responses[1]["id"], 2);

    // All progress frames correlate with item 1 and precede its response.
    assert!(!progress.is_empty());
    assert!(progress.iter().all(|p| p["params"]["requestId"] == 1));
    let first_response_index = frames.iter().position(|f| f.get("id").is_some()).unwrap();
    let last_progress_index = frames
        .iter()
        .rposition(|f| f["method"] == "notifications/progress")
        .unwrap();
    assert!(last_progress_index < first_response_index);
}

#[tokio::test]
async fn ndjson_isolates_per_item_failures() {
    let app = test_app(&memory_state(3600));
    let sid = initialize(&app).await;

    let body = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "bogus"},
        {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
    ]);
    let response = app
        .clone()
        .oneshot(post_request(
            &body,
            Some(&sid),
            Some("application/x-ndjson"),
        ))
        .await
        .unwrap();

    let text = response_text(response).await;
    let frames: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["error"]["code"], -32601);
    assert!(frames[1]["result"]["tools"].is_array());
}

#[tokio::test]
async fn get_without_a_session_header_is_rejected() {
    let app = test_app(&memory_state(3600));

    let response = app
        .clone()
        .oneshot(get_request("/gateway", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_with_an_unknown_session_is_rejected() {
    let app = test_app(&memory_state(3600));

    let response = app
        .clone()
        .oneshot(get_request("/gateway", Some("no-such-session")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_with_a_valid_session_opens_an_sse_stream() {
    let app = test_app(&memory_state(3600));
    let sid = initialize(&app).await;

    let response = app
        .clone()
        .oneshot(get_request("/gateway", Some(&sid)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(session_header(&response).as_deref(), Some(sid.as_str()));
}

#[tokio::test]
async fn progress_from_buffered_calls_reaches_the_sse_channel() {
    let state = memory_state(3600);
    let app = test_app(&state);
    let sid = initialize(&app).await;

    // Open the push channel first; its body stream holds the subscription.
    let sse_response = app
        .clone()
        .oneshot(get_request("/gateway", Some(&sid)))
        .await
        .unwrap();
    let mut sse_stream = sse_response.into_body().into_data_stream();

    // A buffered call whose handler reports progress.
    let body = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "seed_demo_data", "arguments": {"count": 5}}
    });
    let response = app
        .clone()
        .oneshot(post_request(&body, Some(&sid), None))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["result"]["seeded"], 5);

    // The progress notification shows up as an SSE data frame.
    let mut saw_progress = false;
    for _ in 0..5 {
        let frame = tokio::time::timeout(Duration::from_secs(2), sse_stream.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("frame ok");
        let text = String::from_utf8(frame.to_vec()).unwrap();
        if text.starts_with("data: ") && text.contains("notifications/progress") {
            saw_progress = true;
            break;
        }
    }
    assert!(saw_progress, "progress never reached the SSE channel");
}
