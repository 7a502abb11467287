//! Core building blocks of the connection manager: the status model,
//! configuration, observer plumbing, the liveness probe loop and the
//! fallback poll loop.

pub mod config;
pub mod heartbeat;
pub mod observers;
pub mod poller;
pub mod status;

// Re-export main types
pub use config::ManagerConfig;
pub use observers::{ObserverList, StatusHub, Subscription};
pub use status::{ConnectionState, ConnectionStatus};
