//! Gateway runtime configuration.
//!
//! Everything is read from the environment once at startup. None of these
//! knobs are protocol-visible: the wire contract is fixed, configuration
//! only moves the bind address, the session TTL window, and the optional
//! session database.

use std::env;

use tracing::warn;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Fixed-window session lifetime; reads never extend it.
    pub session_ttl_secs: u64,
    /// SQLite connection string for the session store. Unset means the
    /// in-memory store.
    pub database_url: Option<String>,
    pub sweep_interval_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: parse_or_default("PORT", DEFAULT_PORT),
            session_ttl_secs: parse_or_default("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            sweep_interval_secs: parse_or_default(
                "SESSION_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            ),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            database_url: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn parse_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("invalid {key}={raw:?}; using default {default}");
            default
        }),
        Err(_) => default,
    }
}
