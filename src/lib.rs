//! Rollcall application shell
//!
//! Re-exports the workspace libraries and hosts the environment-driven
//! settings used by the binaries.

pub mod settings;

pub use livelink;
pub use settings::FeedSettings;
