use thiserror::Error;

/// Main error type for livelink
#[derive(Error, Debug)]
pub enum LinkError {
    /// Push channel could not be opened or reported a transport-level error
    #[error("transport error: {0}")]
    Transport(String),

    /// Channel closed unexpectedly
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// Operation did not complete within its bound
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Fallback refresh failed
    #[error("refresh failed: {0}")]
    Refresh(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for livelink operations
pub type Result<T> = std::result::Result<T, LinkError>;
