//! # LiveLink Manager
//!
//! The connection state machine: owns the single live subscription, the
//! reconnect schedule, the heartbeat monitor and the fallback poller.

pub mod manager;

pub use manager::{ArmedTimers, ConnectionManager, FallbackFn};
pub use crate::core::*;
pub use crate::traits::*;
