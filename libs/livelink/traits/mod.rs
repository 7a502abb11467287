//! # LiveLink Traits
//!
//! Core traits and types for the LiveLink connection manager.
//!
//! - **PushTransport / ChannelHandle**: the push-provider boundary — open a
//!   filtered channel, probe its health, close it
//! - **ReconnectPolicy**: control the delay schedule between reconnection
//!   attempts
//! - **LinkError**: the crate-wide error taxonomy

pub mod backoff;
pub mod channel;
pub mod error;

// Re-export commonly used types
pub use backoff::{ExponentialBackoff, FixedDelay, ReconnectPolicy};
pub use channel::{AtomicChannelState, ChannelEvent, ChannelHandle, ChannelState, PushTransport};
pub use error::{LinkError, Result};
