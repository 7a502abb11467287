use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;

/// Lifecycle of one logical push channel, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Join request sent, acknowledgement pending
    Joining = 0,
    /// Channel is live and delivering events
    Joined = 1,
    /// Channel hit a transport-level error
    Errored = 2,
    /// Channel was closed
    Closed = 3,
}

impl ChannelState {
    /// Whether the channel can still deliver events
    ///
    /// This is the health probe the heartbeat monitor relies on.
    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self, ChannelState::Joined)
    }

    fn from_u8(value: u8) -> ChannelState {
        match value {
            0 => ChannelState::Joining,
            1 => ChannelState::Joined,
            2 => ChannelState::Errored,
            _ => ChannelState::Closed,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Joining => "joining",
            ChannelState::Joined => "joined",
            ChannelState::Errored => "errored",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lock-free channel state cell for transport implementations
///
/// Readable from any task without locking, so the liveness probe never
/// contends with the transport's reader.
pub struct AtomicChannelState(AtomicU8);

impl AtomicChannelState {
    pub fn new(state: ChannelState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ChannelState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Event delivered by the transport for an open channel
#[derive(Debug)]
pub enum ChannelEvent<P> {
    /// A pushed payload
    Message(P),
    /// The channel errored mid-life
    Error(String),
    /// The channel closed without being asked to
    Closed,
}

/// Handle to one open push channel
///
/// At most one live handle exists per manager; the manager releases it via
/// [`ChannelHandle::close`] before opening another.
#[async_trait]
pub trait ChannelHandle: Send + Sync + 'static {
    /// Current health of the channel (liveness probe)
    fn state(&self) -> ChannelState;

    /// Close the channel and release transport resources
    async fn close(&self);
}

/// The push-transport provider boundary
///
/// Implementations open a logical channel filtered to one subject and feed
/// its events into the returned receiver. Everything else — retries,
/// liveness, fallback — is the connection manager's job.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Payload type delivered on the channel
    type Payload: Send + fmt::Debug + 'static;

    /// Handle type representing an open channel
    type Handle: ChannelHandle;

    /// Open a channel filtered to `filter_key`
    ///
    /// Resolves once the channel is joined, returning the handle together
    /// with the event feed. The caller bounds the whole call with its join
    /// timeout.
    async fn open_channel(
        &self,
        filter_key: &str,
    ) -> Result<(Self::Handle, UnboundedReceiver<ChannelEvent<Self::Payload>>)>;
}
