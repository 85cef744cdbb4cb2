//! Error taxonomy for the gateway.
//!
//! Every failure surfaces to clients as a structured JSON-RPC error object;
//! nothing escapes unstructured. The code families never overlap:
//! method/tool resolution failures map to -32601, malformed requests and
//! handler failures to -32603, session failures to -32000.

use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Method or tool name does not resolve.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Malformed request, invalid params, or a failure inside a handler.
pub const INTERNAL_ERROR: i32 = -32603;
/// Missing, expired, or unresolvable session.
pub const SESSION_ERROR: i32 = -32000;

/// Failures raised while turning a request envelope into a response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Tool call failed: {0}")]
    ToolFailed(String),

    #[error("Session not found or expired; call initialize to obtain a session id")]
    SessionRequired,
}

impl DispatchError {
    pub fn code(&self) -> i32 {
        match self {
            DispatchError::MethodNotFound(_) | DispatchError::UnknownTool(_) => METHOD_NOT_FOUND,
            DispatchError::InvalidRequest(_)
            | DispatchError::InvalidParams(_)
            | DispatchError::ToolFailed(_) => INTERNAL_ERROR,
            DispatchError::SessionRequired => SESSION_ERROR,
        }
    }
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
