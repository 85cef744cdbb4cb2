//! Static tool registry.
//!
//! The catalog of invocable tools is compiled in and built exactly once at
//! process start, then shared immutably behind an `Arc`. Declaration order
//! is preserved for `tools/list`; lookup by name is O(1). Because nothing
//! mutates after boot, concurrent reads need no synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{OutboundMessage, ProgressNotification};

/// Describes one invocable tool: a unique name, a human-readable
/// description, and a JSON Schema for its arguments.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A bound tool implementation.
///
/// Handlers receive the raw argument object and a progress sink. Failures
/// are returned as `anyhow::Error` and normalized by the dispatcher into a
/// structured protocol error; handlers never need to know about envelopes.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(
        &self,
        args: Map<String, Value>,
        progress: &ProgressSink,
    ) -> anyhow::Result<Value>;
}

/// Where a handler's progress notifications go, if anywhere.
///
/// On an NDJSON response the sink feeds the response stream directly; for a
/// buffered response with an open SSE push channel it feeds that channel;
/// otherwise reports are dropped. Send failures are ignored: a consumer
/// that has gone away simply stops receiving progress.
#[derive(Clone)]
pub struct ProgressSink {
    request_id: Value,
    target: ProgressTarget,
}

#[derive(Clone)]
enum ProgressTarget {
    Disabled,
    Stream(mpsc::Sender<OutboundMessage>),
    Push(broadcast::Sender<String>),
}

impl ProgressSink {
    pub fn disabled() -> Self {
        Self {
            request_id: Value::Null,
            target: ProgressTarget::Disabled,
        }
    }

    /// Sink that interleaves progress into a streamed response body.
    pub fn stream(request_id: Value, tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            request_id,
            target: ProgressTarget::Stream(tx),
        }
    }

    /// Sink that forwards progress to a session's SSE push channel.
    pub fn push(request_id: Value, tx: broadcast::Sender<String>) -> Self {
        Self {
            request_id,
            target: ProgressTarget::Push(tx),
        }
    }

    /// Report progress. `progress` is a fraction in `0.0..=1.0`.
    pub async fn report(&self, message: impl Into<String>, progress: f64) {
        let notification =
            ProgressNotification::new(self.request_id.clone(), message, progress.clamp(0.0, 1.0));
        match &self.target {
            ProgressTarget::Disabled => {}
            ProgressTarget::Stream(tx) => {
                let _ = tx.send(OutboundMessage::Progress(notification)).await;
            }
            ProgressTarget::Push(tx) => {
                if let Ok(json) = serde_json::to_string(&notification) {
                    let _ = tx.send(json);
                }
            }
        }
    }
}

/// Immutable catalog of tools, built once at startup.
pub struct ToolRegistry {
    entries: Vec<(ToolDescriptor, Arc<dyn ToolHandler>)>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Boot-time only; names must be unique.
    pub fn register(&mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) {
        debug_assert!(
            !self.index.contains_key(&descriptor.name),
            "duplicate tool name: {}",
            descriptor.name
        );
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push((descriptor, handler));
    }

    /// All descriptors in stable declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|(descriptor, _)| descriptor)
    }

    /// Resolve a tool name to its handler.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i].1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
