pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::lifecycle::PresenceTracker;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<PresenceTracker>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let presence = Arc::new(PresenceTracker::new(config.outbox_capacity));
        Self {
            config: Arc::new(config),
            presence,
        }
    }
}
