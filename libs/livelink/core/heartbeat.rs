//! Channel liveness probing
//!
//! Silent transport death produces no error event. The probe loop checks the
//! channel's reported health on a fixed cadence and reports death so the
//! manager can feed it into the same failure path as an explicit drop.
//!
//! The loop skips the interval's immediate first tick, and skips missed
//! ticks rather than bursting to catch up.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Verdict returned by the probe closure on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Channel still joined; keep probing
    Healthy,
    /// Channel no longer alive; report death
    Dead,
    /// The watched connection is gone; exit without reporting
    Stop,
}

/// How the probe loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEnd {
    Dead,
    Stopped,
}

/// Run `probe()` every `interval` until it reports death or asks to stop
pub async fn run_probe_loop<F>(interval: Duration, mut probe: F) -> ProbeEnd
where
    F: FnMut() -> ProbeOutcome,
{
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!("liveness probe started with interval {:?}", interval);

    loop {
        ticker.tick().await;
        match probe() {
            ProbeOutcome::Healthy => {}
            ProbeOutcome::Dead => {
                debug!("liveness probe found the channel dead");
                return ProbeEnd::Dead;
            }
            ProbeOutcome::Stop => {
                debug!("liveness probe stopping");
                return ProbeEnd::Stopped;
            }
        }
    }
}
