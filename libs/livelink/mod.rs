//! # LiveLink
//!
//! A resilient real-time connection manager for server-pushed notification
//! feeds.
//!
//! ## Features
//!
//! - **Connection state machine**: one authoritative lifecycle
//!   (`Disconnected → Connecting → Connected → Reconnecting → Failed`) with
//!   status snapshots broadcast on every transition
//! - **Bounded exponential backoff**: pluggable reconnect policies, one
//!   pending retry at a time
//! - **Heartbeat monitoring**: periodic liveness probing catches silent
//!   transport death that never surfaces as an error event
//! - **Fallback polling**: once retries are exhausted, a caller-supplied
//!   refresh keeps data flowing until push delivery recovers
//! - **Pluggable transports**: any provider that can open a filtered channel
//!   and report its health plugs in behind the [`PushTransport`] trait
//!
//! ## Example
//!
//! ```rust,ignore
//! use livelink::{ConnectionManager, ManagerConfig, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = WebSocketTransport::new("wss://push.example.com/socket");
//!     let manager = ConnectionManager::new(transport, ManagerConfig::default());
//!
//!     let _status = manager.on_status_change(|status| {
//!         println!("connection is now {}", status.state);
//!     });
//!     let _messages = manager.on_message(|payload| {
//!         println!("notification: {}", payload);
//!     });
//!     manager.set_fallback_callback(|| async { /* re-fetch over HTTP */ Ok(()) });
//!
//!     manager.connect("student-42").await;
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;
pub mod transport;

// Re-export all traits
pub use crate::traits::*;

// Re-export core functionality
pub use crate::core::{
    config, heartbeat, observers, poller, status,
    config::ManagerConfig,
    observers::Subscription,
    status::{ConnectionState, ConnectionStatus},
};

// Re-export the manager
pub use crate::manager::{ArmedTimers, ConnectionManager, FallbackFn};

// Re-export the bundled transport
pub use crate::transport::websocket::WebSocketTransport;

/// Type alias for Result with LinkError
pub type Result<T> = std::result::Result<T, traits::LinkError>;
