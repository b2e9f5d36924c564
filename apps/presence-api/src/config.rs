use std::str::FromStr;
use std::time::Duration;

use crate::gateway::fanout::DEFAULT_OUTBOX_CAPACITY;

/// Presence API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Origins allowed by CORS. `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Capacity of each connection's outbound update queue.
    pub outbox_capacity: usize,
    /// How often the server pings an open gateway connection.
    pub heartbeat_interval: Duration,
    /// A connection silent for this long is closed and cleaned up.
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5001,
            cors_allowed_origins: None,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            heartbeat_interval: Duration::from_millis(25_000),
            idle_timeout: Duration::from_millis(60_000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; missing or unparseable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").and_then(|v| origin_list(&v)),
            outbox_capacity: parsed(&lookup, "OUTBOX_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.outbox_capacity),
            heartbeat_interval: parsed(&lookup, "HEARTBEAT_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.heartbeat_interval),
            idle_timeout: parsed(&lookup, "IDLE_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_timeout),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn origin_list(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!origins.is_empty()).then_some(origins)
}
