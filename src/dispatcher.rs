//! Request dispatch: method routing and outcome normalization.
//!
//! The dispatcher maps one request envelope to exactly one response
//! envelope. It is stateless and safe to invoke concurrently; session
//! resolution has already happened by the time a request reaches it. Any
//! failure inside a tool handler is caught here and folded into a
//! structured error response, so a handler bug can never take the process
//! down or leak an unstructured error to the wire.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::DispatchError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::registry::{ProgressSink, ToolRegistry};

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle a single request envelope, producing its response envelope.
    pub async fn dispatch(
        &self,
        request: &JsonRpcRequest,
        progress: &ProgressSink,
    ) -> JsonRpcResponse {
        let id = request.correlation_id();
        tracing::debug!(method = %request.method, "dispatching request");

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "tools/list" => Ok(self.list_tools_result()),
            "tools/call" => self.call_tool(request.params.as_ref(), progress).await,
            other => Err(DispatchError::MethodNotFound(other.to_string())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                tracing::debug!(method = %request.method, error = %err, "request failed");
                JsonRpcResponse::error(id, err.code(), err.to_string())
            }
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn list_tools_result(&self) -> Value {
        let tools: Vec<_> = self.registry.descriptors().collect();
        json!({ "tools": tools })
    }

    async fn call_tool(
        &self,
        params: Option<&Value>,
        progress: &ProgressSink,
    ) -> Result<Value, DispatchError> {
        let params = params.ok_or_else(|| {
            DispatchError::InvalidParams("missing params for tools/call".to_string())
        })?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::InvalidParams("missing tool name".to_string()))?;

        let arguments: Map<String, Value> = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let handler = self
            .registry
            .resolve(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        tracing::info!(tool = %name, "invoking tool");

        handler
            .invoke(arguments, progress)
            .await
            .map_err(|e| DispatchError::ToolFailed(e.to_string()))
    }
}
