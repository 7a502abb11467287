//! Common test utilities for LiveLink integration tests
//!
//! Provides a scriptable in-memory transport so connection behavior can be
//! driven without a network, plus small helpers for recording status
//! transitions.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use livelink::channel::{
    AtomicChannelState, ChannelEvent, ChannelHandle, ChannelState, PushTransport,
};
use livelink::{
    ConnectionManager, ConnectionState, ConnectionStatus, ExponentialBackoff, LinkError,
    ManagerConfig,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Scripted outcome for one `open_channel` call
pub enum OpenOutcome {
    /// Produce a joined channel
    Succeed,
    /// Fail establishment with the given error message
    Fail(String),
    /// Never resolve (exercises the join timeout)
    Hang,
}

struct MockTransportInner {
    script: Mutex<VecDeque<OpenOutcome>>,
    channels: Mutex<Vec<MockChannel>>,
    opens: AtomicUsize,
    subjects: Mutex<Vec<String>>,
}

/// Scriptable in-memory transport
///
/// Each `open_channel` call consumes the next scripted outcome; once the
/// script runs dry every call succeeds.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockTransportInner {
                script: Mutex::new(VecDeque::new()),
                channels: Mutex::new(Vec::new()),
                opens: AtomicUsize::new(0),
                subjects: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue outcomes for upcoming open_channel calls
    pub fn script(&self, outcomes: impl IntoIterator<Item = OpenOutcome>) {
        self.inner.script.lock().extend(outcomes);
    }

    /// Queue `n` establishment failures
    pub fn fail_next(&self, n: usize) {
        self.script(
            std::iter::repeat_with(|| OpenOutcome::Fail("connection refused".to_string()))
                .take(n),
        );
    }

    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Filter keys seen by open_channel, in call order
    pub fn subjects(&self) -> Vec<String> {
        self.inner.subjects.lock().clone()
    }

    /// Most recently opened channel
    pub fn last_channel(&self) -> MockChannel {
        self.inner
            .channels
            .lock()
            .last()
            .expect("no channel opened yet")
            .clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct MockChannelInner {
    state: AtomicChannelState,
    events: Mutex<Option<UnboundedSender<ChannelEvent<Value>>>>,
    closed: AtomicBool,
}

/// Test handle for a mock channel; clones share the same channel
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<MockChannelInner>,
}

impl MockChannel {
    /// Push a payload through the channel
    pub fn emit(&self, payload: Value) {
        if let Some(tx) = self.inner.events.lock().as_ref() {
            let _ = tx.send(ChannelEvent::Message(payload));
        }
    }

    /// Report a mid-life failure: flips the health probe and pushes an
    /// explicit error event
    pub fn fail(&self, reason: &str) {
        self.inner.state.set(ChannelState::Errored);
        if let Some(tx) = self.inner.events.lock().as_ref() {
            let _ = tx.send(ChannelEvent::Error(reason.to_string()));
        }
    }

    /// Kill the channel silently: only the health probe can notice
    pub fn die_silently(&self) {
        self.inner.state.set(ChannelState::Errored);
    }

    pub fn was_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelHandle for MockChannel {
    fn state(&self) -> ChannelState {
        self.inner.state.get()
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.state.set(ChannelState::Closed);
        *self.inner.events.lock() = None;
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    type Payload = Value;
    type Handle = MockChannel;

    async fn open_channel(
        &self,
        filter_key: &str,
    ) -> livelink::Result<(MockChannel, UnboundedReceiver<ChannelEvent<Value>>)> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.subjects.lock().push(filter_key.to_string());
        let outcome = self
            .inner
            .script
            .lock()
            .pop_front()
            .unwrap_or(OpenOutcome::Succeed);
        match outcome {
            OpenOutcome::Fail(reason) => Err(LinkError::Transport(reason)),
            OpenOutcome::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            OpenOutcome::Succeed => {
                let (tx, rx) = mpsc::unbounded_channel();
                let channel = MockChannel {
                    inner: Arc::new(MockChannelInner {
                        state: AtomicChannelState::new(ChannelState::Joined),
                        events: Mutex::new(Some(tx)),
                        closed: AtomicBool::new(false),
                    }),
                };
                self.inner.channels.lock().push(channel.clone());
                Ok((channel, rx))
            }
        }
    }
}

/// Manager over a fresh mock transport
pub fn mock_manager(config: ManagerConfig) -> (ConnectionManager<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    (ConnectionManager::new(transport.clone(), config), transport)
}

/// Config with short, test-friendly timings
pub fn test_config(max_attempts: u32, base_delay_ms: u64) -> ManagerConfig {
    ManagerConfig {
        max_reconnect_attempts: max_attempts,
        backoff: Arc::new(ExponentialBackoff::new(
            Duration::from_millis(base_delay_ms),
            None,
        )),
        fallback_polling_interval: Duration::from_millis(200),
        heartbeat_interval: Duration::from_millis(50),
        join_timeout: Duration::from_secs(5),
    }
}

/// Records every status snapshot delivered to a subscriber
#[derive(Clone)]
pub struct StatusRecorder {
    snapshots: Arc<Mutex<Vec<ConnectionStatus>>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl Fn(&ConnectionStatus) + Send + Sync + 'static {
        let snapshots = Arc::clone(&self.snapshots);
        move |status| snapshots.lock().push(status.clone())
    }

    /// The state sequence observed so far
    pub fn states(&self) -> Vec<ConnectionState> {
        self.snapshots.lock().iter().map(|s| s.state).collect()
    }

    pub fn snapshots(&self) -> Vec<ConnectionStatus> {
        self.snapshots.lock().clone()
    }

    pub fn last(&self) -> Option<ConnectionStatus> {
        self.snapshots.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }
}

impl Default for StatusRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Let spawned manager tasks run to their next await point
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
