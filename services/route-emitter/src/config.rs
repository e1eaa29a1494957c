//! Route-emitter configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Route-emitter configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the desired/actual state store (example: http://127.0.0.1:8889).
    pub state_url: String,

    /// Optional bearer token sent to the state store.
    pub state_token: Option<String>,

    /// Interval between full resyncs.
    pub sync_interval: Duration,

    /// Poll interval when no new events are available.
    pub event_poll_interval: Duration,

    /// Max events to fetch per poll.
    pub event_fetch_limit: i64,

    /// Optional cursor file to persist the last applied event_id. Without
    /// one, the event feed is followed from its current head.
    pub cursor_file: Option<PathBuf>,

    /// Interval between full re-emissions of the table, if enabled.
    pub emit_interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_url: "http://127.0.0.1:8889".to_string(),
            state_token: None,
            sync_interval: Duration::from_secs(60),
            event_poll_interval: Duration::from_millis(1000),
            event_fetch_limit: 200,
            cursor_file: None,
            emit_interval: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let state_url = lookup("ROUTE_EMITTER_STATE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.state_url);

        let state_token = lookup("ROUTE_EMITTER_STATE_TOKEN").filter(|v| !v.trim().is_empty());

        let sync_interval_secs = lookup("ROUTE_EMITTER_SYNC_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("ROUTE_EMITTER_SYNC_INTERVAL_SECS must be an integer (seconds).")?
            .unwrap_or(60);
        let sync_interval = Duration::from_secs(sync_interval_secs.max(1));

        let poll_interval_ms = lookup("ROUTE_EMITTER_EVENT_POLL_INTERVAL_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("ROUTE_EMITTER_EVENT_POLL_INTERVAL_MS must be an integer (milliseconds).")?
            .unwrap_or(1000);
        let event_poll_interval = Duration::from_millis(poll_interval_ms.max(50));

        let event_fetch_limit = lookup("ROUTE_EMITTER_EVENT_FETCH_LIMIT")
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("ROUTE_EMITTER_EVENT_FETCH_LIMIT must be an integer.")?
            .unwrap_or(200)
            .clamp(1, 200);

        let cursor_file = lookup("ROUTE_EMITTER_CURSOR_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let emit_interval = lookup("ROUTE_EMITTER_EMIT_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("ROUTE_EMITTER_EMIT_INTERVAL_SECS must be an integer (seconds).")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let log_level = lookup("ROUTE_EMITTER_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            state_url,
            state_token,
            sync_interval,
            event_poll_interval,
            event_fetch_limit,
            cursor_file,
            emit_interval,
            log_level,
        })
    }
}
