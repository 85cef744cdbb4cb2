//! Built-in fleet tools.
//!
//! The business collaborators behind the gateway: a small, statically
//! compiled catalog of rental-fleet operations. The gateway core treats
//! them as opaque handlers; nothing in here touches sessions, transports,
//! or envelopes.

mod fleet;
mod pricing;

use crate::registry::ToolRegistry;

/// Build the compiled-in registry. Called once at startup.
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    fleet::register(&mut registry);
    pricing::register(&mut registry);
    registry
}
