use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Connection lifecycle state
///
/// Exactly one state is active at any time; it is the sole source of truth
/// for whether the heartbeat or the fallback poller may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No subscription, no timers
    Disconnected,
    /// First establishment attempt in flight
    Connecting,
    /// Channel joined, heartbeat armed
    Connected,
    /// Establishment failed or the channel dropped; a retry is pending
    Reconnecting,
    /// Retries exhausted; fallback polling keeps data fresh
    Failed,
}

impl ConnectionState {
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// States from which `connect()` may start a fresh establishment
    #[inline]
    pub fn accepts_connect(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Immutable status snapshot, emitted to subscribers on every transition
///
/// `fallback_active` implies `state == Failed`; `reconnect_attempts` is
/// zeroed whenever the connection (re-)enters `Connected`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
    pub fallback_active: bool,
}

impl ConnectionStatus {
    pub(crate) fn initial() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_connected_at: None,
            last_error: None,
            reconnect_attempts: 0,
            fallback_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_accepted_only_when_idle_or_failed() {
        assert!(ConnectionState::Disconnected.accepts_connect());
        assert!(ConnectionState::Failed.accepts_connect());
        assert!(!ConnectionState::Connecting.accepts_connect());
        assert!(!ConnectionState::Connected.accepts_connect());
        assert!(!ConnectionState::Reconnecting.accepts_connect());
    }

    #[test]
    fn initial_snapshot_is_clean() {
        let status = ConnectionStatus::initial();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(status.last_connected_at.is_none());
        assert!(status.last_error.is_none());
        assert!(!status.fallback_active);
    }

    #[test]
    fn status_serializes_with_snake_case_state() {
        let status = ConnectionStatus {
            state: ConnectionState::Reconnecting,
            last_connected_at: None,
            last_error: Some("connection refused".to_string()),
            reconnect_attempts: 2,
            fallback_active: false,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "reconnecting");
        assert_eq!(json["reconnect_attempts"], 2);
        assert_eq!(json["last_error"], "connection refused");
        assert_eq!(json["fallback_active"], false);
    }
}
