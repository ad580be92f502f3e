use std::sync::Arc;

use crate::config::{Config, HeartbeatConfig};
use crate::ws::LocationRelay;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and world state
    pub relay: Arc<LocationRelay>,
    /// Outbound queue capacity for each new connection
    pub outbound_queue: usize,
    /// Ping/pong keepalive settings
    pub heartbeat: HeartbeatConfig,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            relay: Arc::new(LocationRelay::new()),
            outbound_queue: config.outbound_queue,
            heartbeat: config.heartbeat,
        }
    }
}
