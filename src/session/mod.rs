//! Session lifecycle for the gateway.
//!
//! A session is minted only by `initialize` and is read-only afterwards;
//! TTL expiry in the store is its sole destructor. Reads never extend the
//! TTL (fixed window, not sliding). Alongside the stored metadata, each
//! session may own a broadcast push channel feeding SSE consumers; the
//! channel lives only in this process and is not part of the stored record.

pub mod store;

pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore, StoreError};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Capacity of each session's push channel; slow SSE consumers that lag
/// beyond this lose intermediate notifications, never the connection.
const PUSH_CHANNEL_CAPACITY: usize = 100;

/// Stored session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub protocol_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Value>,
}

impl SessionRecord {
    /// Mint a new session with a random id and a fixed TTL window.
    pub fn new(ttl_secs: u64, protocol_version: &str, client_info: Option<Value>) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at,
            expires_at: created_at + chrono::Duration::seconds(ttl_secs as i64),
            protocol_version: protocol_version.to_string(),
            client_info,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Per-session broadcast channels feeding SSE push consumers.
///
/// Every GET subscriber of a session shares that session's channel and
/// receives every pushed frame. Channels are process-local.
#[derive(Clone, Default)]
pub struct PushChannels {
    inner: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
}

impl PushChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a session's push channel, creating it on first use.
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<String> {
        let mut channels = self.inner.write().await;
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(PUSH_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// The sender for a session's channel, if any consumer ever opened one.
    pub async fn sender(&self, session_id: &str) -> Option<broadcast::Sender<String>> {
        let channels = self.inner.read().await;
        channels.get(session_id).cloned()
    }

    /// Drop channels no consumer is listening to anymore.
    pub async fn prune_idle(&self) -> usize {
        let mut channels = self.inner.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }
}

/// Periodically evict expired sessions and idle push channels.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    push: PushChannels,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.remove_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "evicted expired sessions"),
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
            let pruned = push.prune_idle().await;
            if pruned > 0 {
                tracing::debug!(count = pruned, "pruned idle push channels");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_get_unique_ids_and_a_ttl_window() {
        let a = SessionRecord::new(60, "2025-03-26", None);
        let b = SessionRecord::new(60, "2025-03-26", None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.expires_at - a.created_at, chrono::Duration::seconds(60));
        assert!(!a.is_expired_at(a.created_at));
        assert!(a.is_expired_at(a.expires_at));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let record = SessionRecord::new(0, "2025-03-26", None);
        assert!(record.is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn push_channels_share_one_sender_per_session() {
        let channels = PushChannels::new();
        let mut rx1 = channels.subscribe("s1").await;
        let mut rx2 = channels.subscribe("s1").await;

        let tx = channels.sender("s1").await.expect("channel exists");
        tx.send("hello".to_string()).unwrap();

        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
        assert!(channels.sender("s2").await.is_none());
    }

    #[tokio::test]
    async fn prune_removes_only_idle_channels() {
        let channels = PushChannels::new();
        let rx = channels.subscribe("live").await;
        {
            let _dropped = channels.subscribe("idle").await;
        }
        assert_eq!(channels.prune_idle().await, 1);
        assert!(channels.sender("live").await.is_some());
        drop(rx);
    }
}
