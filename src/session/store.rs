//! Session store backends.
//!
//! The gateway only ever needs two operations — create and get — plus a
//! sweep hook for the background eviction task, so the trait stays minimal
//! and the backing implementation is swappable at the composition root.
//! Creates under an existing id are last-write-wins: ids are server-minted
//! random tokens, so a collision only ever comes from a retried create.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::RwLock;

use super::SessionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt session record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a session record. Idempotent per id, last-write-wins.
    async fn create(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Look up an unexpired session. Never extends the TTL.
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Evict expired sessions, returning how many were removed.
    async fn remove_expired(&self) -> Result<u64, StoreError>;
}

/// In-memory store; the default when no database is configured.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|record| !record.is_expired_at(Utc::now()))
            .cloned())
    }

    async fn remove_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// SQLite-backed store, selected when `DATABASE_URL` is configured.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let client_info = record
            .client_info
            .as_ref()
            .map(|v| v.to_string());

        sqlx::query(
            "INSERT OR REPLACE INTO sessions (id, created_at, expires_at, protocol_version, client_info)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .bind(&record.protocol_version)
        .bind(client_info)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, created_at, expires_at, protocol_version, client_info
             FROM sessions WHERE id = ?1 AND expires_at > ?2",
        )
        .bind(id)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: i64 = row.try_get("created_at")?;
        let expires_at: i64 = row.try_get("expires_at")?;
        let client_info: Option<String> = row.try_get("client_info")?;
        let client_info = client_info
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Some(SessionRecord {
            id: row.try_get("id")?,
            created_at: chrono::DateTime::from_timestamp(created_at, 0)
                .ok_or_else(|| StoreError::Corrupt(format!("created_at {created_at}")))?,
            expires_at: chrono::DateTime::from_timestamp(expires_at, 0)
                .ok_or_else(|| StoreError::Corrupt(format!("expires_at {expires_at}")))?,
            protocol_version: row.try_get("protocol_version")?,
            client_info,
        }))
    }

    async fn remove_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
