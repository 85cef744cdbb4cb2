//! Incremental wire framing for streamed responses.
//!
//! Each outbound message becomes one self-contained frame — an NDJSON line
//! or an SSE event — written as soon as it is available. The whole
//! sequence is never buffered: the driver pulls messages off a channel and
//! the HTTP body streams them out, so a slow consumer exerts backpressure
//! through the channel rather than growing memory.
//!
//! Frames already flushed are never retracted. If a message fails to
//! encode, one final error frame is emitted and the stream ends; dropping
//! the body (client disconnect included) tears down the channel, which is
//! the only cleanup the connection needs.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use futures::stream::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, IntervalStream, ReceiverStream};

use crate::error::INTERNAL_ERROR;
use crate::protocol::{JsonRpcResponse, OutboundMessage};

/// The two streaming framings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    Ndjson,
    Sse,
}

impl StreamFraming {
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamFraming::Ndjson => "application/x-ndjson",
            StreamFraming::Sse => "text/event-stream",
        }
    }

    /// Serialize one message into one frame.
    pub fn encode(&self, message: &OutboundMessage) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(message)?;
        Ok(self.frame(&json))
    }

    /// Wrap an already-serialized JSON payload into a frame.
    pub fn frame(&self, json: &str) -> Bytes {
        match self {
            StreamFraming::Ndjson => Bytes::from(format!("{json}\n")),
            StreamFraming::Sse => Bytes::from(format!("data: {json}\n\n")),
        }
    }

    /// Comment frame that keeps an idle SSE connection alive.
    pub fn keep_alive_frame(&self) -> Option<Bytes> {
        match self {
            StreamFraming::Ndjson => None,
            StreamFraming::Sse => Some(Bytes::from_static(b": keep-alive\n\n")),
        }
    }

    /// The frame emitted when a message cannot be encoded, so clients can
    /// tell an aborted stream from a clean end.
    fn error_frame(&self) -> Bytes {
        let response =
            JsonRpcResponse::error(Value::Null, INTERNAL_ERROR, "Failed to encode response");
        match serde_json::to_string(&response) {
            Ok(json) => self.frame(&json),
            Err(_) => self.frame(
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Failed to encode response"}}"#,
            ),
        }
    }
}

/// Logs stream teardown on every exit path, success or abort.
struct CloseGuard {
    transport: &'static str,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        tracing::debug!(transport = self.transport, "response stream closed");
    }
}

/// Turn a channel of outbound messages into a streaming HTTP body.
///
/// Frames are emitted in channel order. After an encode failure the final
/// error frame is written and the stream terminates; earlier frames stand.
pub fn body_from_messages(framing: StreamFraming, rx: mpsc::Receiver<OutboundMessage>) -> Body {
    let guard = CloseGuard {
        transport: framing.content_type(),
    };

    let frames = ReceiverStream::new(rx).scan(false, move |failed, message| {
        let _held = &guard;
        if *failed {
            return futures::future::ready(None);
        }
        let frame = match framing.encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outbound frame");
                *failed = true;
                framing.error_frame()
            }
        };
        futures::future::ready(Some(Ok::<_, Infallible>(frame)))
    });

    Body::from_stream(frames)
}

/// Long-lived SSE body fed by a session's push channel.
///
/// The channel carries pre-serialized JSON payloads; each becomes one
/// `data:` event. Keep-alive comments are interleaved so idle connections
/// survive intermediaries. A lagged consumer skips dropped payloads and
/// keeps the connection.
pub fn sse_push_body(rx: broadcast::Receiver<String>, keep_alive: Duration) -> Body {
    let framing = StreamFraming::Sse;
    let guard = CloseGuard {
        transport: framing.content_type(),
    };

    let events = BroadcastStream::new(rx).filter_map(move |result| {
        futures::future::ready(match result {
            Ok(json) => Some(framing.frame(&json)),
            Err(e) => {
                tracing::debug!(error = %e, "push consumer lagged; skipping");
                None
            }
        })
    });

    let keep_alive_frame = framing
        .keep_alive_frame()
        .unwrap_or_else(|| Bytes::from_static(b""));
    let ticks = IntervalStream::new(tokio::time::interval(keep_alive))
        .map(move |_| keep_alive_frame.clone());

    let frames = futures::stream::select(events, ticks).map(move |frame| {
        let _held = &guard;
        Ok::<_, Infallible>(frame)
    });

    Body::from_stream(frames)
}
