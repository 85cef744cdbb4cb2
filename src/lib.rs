pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tools;
pub mod transport;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;
use std::time::Instant;

use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::registry::ToolRegistry;
use crate::session::{PushChannels, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<dyn SessionStore>,
    pub push: PushChannels,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

impl AppState {
    /// State with the compiled-in fleet tool registry.
    pub fn new(config: GatewayConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self::with_registry(config, sessions, tools::build_registry())
    }

    /// State with a caller-supplied registry, so tests can observe handler
    /// invocations.
    pub fn with_registry(
        config: GatewayConfig,
        sessions: Arc<dyn SessionStore>,
        registry: ToolRegistry,
    ) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
            sessions,
            push: PushChannels::new(),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
