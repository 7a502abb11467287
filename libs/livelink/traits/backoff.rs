use std::fmt;
use std::time::Duration;

/// Trait for deciding how long to wait before a reconnection attempt
///
/// Implement this trait to control the delay schedule the manager
/// follows after a connection failure. How many attempts are made is
/// the manager's decision; the policy only supplies the spacing.
pub trait ReconnectPolicy: fmt::Debug + Send + Sync + 'static {
    /// Get the delay before reconnection attempt `attempt`
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt number (1-indexed)
    fn delay_for(&self, attempt: u32) -> Duration;
}

/// Exponential backoff reconnect policy
///
/// Delays between reconnection attempts grow exponentially:
/// `base * 2^(attempt - 1)`, optionally capped at `cap`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Option<Duration>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff policy
    ///
    /// # Arguments
    /// * `base` - The delay before the first reconnection attempt
    /// * `cap` - Optional upper bound on the delay (None = uncapped)
    pub fn new(base: Duration, cap: Option<Duration>) -> Self {
        Self { base, cap }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let millis = (self.base.as_millis() as u64).saturating_mul(1u64 << exp);
        let millis = match self.cap {
            Some(cap) => millis.min(cap.as_millis() as u64),
            None => millis,
        };
        Duration::from_millis(millis)
    }
}

/// Fixed delay reconnect policy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Create a new fixed delay policy
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
