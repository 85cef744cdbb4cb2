//! JSON-RPC 2.0 envelope types for the gateway protocol.
//!
//! One logical protocol travels over three wire encodings (buffered JSON,
//! NDJSON streaming, SSE push); the types here are encoding-agnostic. A
//! response always echoes the id of the request that produced it, including
//! a null id, so batch clients can correlate by position or by id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed JSON-RPC version tag.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Header carrying the session id in both directions once issued.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// JSON-RPC 2.0 request envelope. Immutable after parse.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// The correlation id this request's response must carry.
    pub fn correlation_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

/// JSON-RPC 2.0 response envelope: exactly one of result/error is set.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// Progress notification emitted by tool handlers on streaming transports.
///
/// Ephemeral; never persisted. Only emitted where a streaming channel is
/// available, always strictly before the final response of the request it
/// correlates with.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: ProgressParams,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub request_id: Value,
    pub message: String,
    pub progress: f64,
}

impl ProgressNotification {
    pub fn new(request_id: Value, message: impl Into<String>, progress: f64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "notifications/progress".to_string(),
            params: ProgressParams {
                request_id,
                message: message.into(),
                progress,
            },
        }
    }
}

/// A message bound for the wire: the unit the streaming encoder frames.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Response(JsonRpcResponse),
    Progress(ProgressNotification),
}
