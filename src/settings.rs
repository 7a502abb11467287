//! Environment-driven configuration for the notification feed binaries

use std::env;
use std::time::Duration;

/// Settings for the notification feed, sourced from environment variables
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket endpoint of the push gateway
    pub ws_url: String,
    /// Base URL of the notification HTTP API, used for fallback refreshes
    pub api_url: String,
    /// Subject (user) identifier whose notification feed to follow
    pub subject_id: String,
    /// Liveness probe cadence
    pub heartbeat_interval: Duration,
    /// Pull-refresh cadence while push delivery is down
    pub fallback_polling_interval: Duration,
}

impl FeedSettings {
    /// Read settings from the environment
    ///
    /// `NOTIFY_WS_URL`, `NOTIFY_API_URL` and `NOTIFY_SUBJECT_ID` are
    /// required; `NOTIFY_HEARTBEAT_MS` and `NOTIFY_FALLBACK_MS` fall back
    /// to the library defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            ws_url: require("NOTIFY_WS_URL")?,
            api_url: require("NOTIFY_API_URL")?,
            subject_id: require("NOTIFY_SUBJECT_ID")?,
            heartbeat_interval: millis_or("NOTIFY_HEARTBEAT_MS", 30_000)?,
            fallback_polling_interval: millis_or("NOTIFY_FALLBACK_MS", 12_000)?,
        })
    }
}

fn require(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("missing required environment variable {key}"))
}

fn millis_or(key: &str, default_ms: u64) -> anyhow::Result<Duration> {
    match env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw.parse().map_err(|_| {
                anyhow::anyhow!("{key} must be an integer millisecond value, got '{raw}'")
            })?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}
