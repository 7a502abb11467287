use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{ExponentialBackoff, ReconnectPolicy};

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager)
///
/// Immutable for the lifetime of the manager instance. Cheap to clone;
/// the backoff policy is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Consecutive establishment failures tolerated before the manager
    /// gives up automatic retries and enters the failed state
    pub max_reconnect_attempts: u32,

    /// Delay schedule for automatic reconnection attempts
    pub backoff: Arc<dyn ReconnectPolicy>,

    /// Cadence of the pull-based refresh while push delivery is down
    pub fallback_polling_interval: Duration,

    /// Cadence of the channel liveness probe while connected
    pub heartbeat_interval: Duration,

    /// Bound on how long channel establishment may stay pending before it
    /// is treated as a failure
    pub join_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            backoff: Arc::new(ExponentialBackoff::new(Duration::from_secs(2), None)),
            fallback_polling_interval: Duration::from_secs(12),
            heartbeat_interval: Duration::from_secs(30),
            join_timeout: Duration::from_secs(10),
        }
    }
}
