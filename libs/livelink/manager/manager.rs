use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, ChannelHandle, PushTransport};
use crate::config::ManagerConfig;
use crate::core::heartbeat::{run_probe_loop, ProbeEnd, ProbeOutcome};
use crate::core::observers::{Callback, ObserverList, StatusHub, Subscription};
use crate::core::poller::run_poll_loop;
use crate::error::{LinkError, Result};
use crate::status::{ConnectionState, ConnectionStatus};

/// Caller-supplied refresh invoked by the fallback poller
pub type FallbackFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Which timer roles currently hold a live task
///
/// The roles are mutually exclusive by state: the reconnect timer only while
/// reconnecting, the heartbeat only while connected, the fallback interval
/// only while failed. Exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimers {
    pub reconnect: bool,
    pub heartbeat: bool,
    pub fallback: bool,
}

impl ArmedTimers {
    pub fn any(&self) -> bool {
        self.reconnect || self.heartbeat || self.fallback
    }
}

/// Task handles for the timer roles, plus the channel event pump
struct Timers {
    reconnect: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    fallback: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl Timers {
    fn new() -> Self {
        Self {
            reconnect: None,
            heartbeat: None,
            fallback: None,
            pump: None,
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
    }

    fn cancel_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    fn cancel_fallback(&mut self) {
        if let Some(handle) = self.fallback.take() {
            handle.abort();
        }
    }

    fn cancel_pump(&mut self) {
        if let Some(handle) = self.pump.take() {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_reconnect();
        self.cancel_heartbeat();
        self.cancel_fallback();
        self.cancel_pump();
    }

    fn armed(&self) -> ArmedTimers {
        ArmedTimers {
            reconnect: Self::live(&self.reconnect),
            heartbeat: Self::live(&self.heartbeat),
            fallback: Self::live(&self.fallback),
        }
    }

    fn live(handle: &Option<JoinHandle<()>>) -> bool {
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Mutable manager state, guarded by one mutex that is never held across
/// an await point
struct ManagerState<T: PushTransport> {
    state: ConnectionState,
    last_connected_at: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    reconnect_attempts: u32,
    fallback_active: bool,
    subject_id: Option<String>,
    /// Generation counter; bumped by connect()/disconnect() so outstanding
    /// timers and in-flight establishment results become no-ops
    epoch: u64,
    handle: Option<Arc<T::Handle>>,
    timers: Timers,
}

impl<T: PushTransport> ManagerState<T> {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_connected_at: None,
            last_error: None,
            reconnect_attempts: 0,
            fallback_active: false,
            subject_id: None,
            epoch: 0,
            handle: None,
            timers: Timers::new(),
        }
    }

    fn snapshot(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            last_connected_at: self.last_connected_at,
            last_error: self.last_error.clone(),
            reconnect_attempts: self.reconnect_attempts,
            fallback_active: self.fallback_active,
        }
    }
}

struct Inner<T: PushTransport> {
    transport: T,
    config: ManagerConfig,
    state: Mutex<ManagerState<T>>,
    status_hub: StatusHub,
    messages: ObserverList<T::Payload>,
    fallback: Mutex<Option<FallbackFn>>,
}

impl<T: PushTransport> Drop for Inner<T> {
    fn drop(&mut self) {
        self.state.get_mut().timers.cancel_all();
    }
}

/// Resilient connection manager for one server-pushed feed
///
/// Owns a single logical subscription at a time and keeps it alive through
/// exponential-backoff reconnection, heartbeat liveness probing, and
/// pull-based fallback polling once retries are exhausted.
///
/// Cheap to clone; all clones drive the same subscription. Teardown is
/// explicit via [`disconnect`](ConnectionManager::disconnect).
///
/// # Example
/// ```ignore
/// let manager = ConnectionManager::new(transport, ManagerConfig::default());
/// let _sub = manager.on_status_change(|status| println!("{}", status.state));
/// manager.connect("student-42").await;
/// ```
pub struct ConnectionManager<T: PushTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: PushTransport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PushTransport> ConnectionManager<T> {
    /// Create a new manager over `transport`
    pub fn new(transport: T, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(ManagerState::new()),
                status_hub: StatusHub::new(),
                messages: ObserverList::new(),
                fallback: Mutex::new(None),
            }),
        }
    }

    /// Open the subscription for `subject_id`
    ///
    /// Legal from the disconnected and failed states; a no-op anywhere else.
    /// Awaits the first establishment attempt only — later retries run on
    /// the reconnect timer. Never returns an error: outcomes are observed
    /// through status snapshots.
    pub async fn connect(&self, subject_id: impl Into<String>) {
        Inner::connect(&self.inner, subject_id.into()).await;
    }

    /// Tear the connection down from any state
    ///
    /// Idempotent. Cancels every timer, releases the subscription handle
    /// and leaves the manager disconnected; no timer fires afterwards.
    pub async fn disconnect(&self) {
        Inner::disconnect(&self.inner).await;
    }

    /// Explicit caller-driven retry: disconnect, then connect
    ///
    /// `None` reuses the most recently connected subject, so recovering
    /// after a long outage needs no fresh caller input.
    pub async fn reconnect(&self, subject_id: Option<String>) {
        Inner::reconnect(&self.inner, subject_id).await;
    }

    /// Synchronous status snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().snapshot()
    }

    /// Which timer roles currently hold a live task (diagnostics)
    pub fn armed_timers(&self) -> ArmedTimers {
        self.inner.state.lock().timers.armed()
    }

    /// Register a status subscriber
    ///
    /// The current snapshot is delivered synchronously before this returns;
    /// after that, one snapshot per transition, in transition order.
    pub fn on_status_change(
        &self,
        callback: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        let callback: Callback<ConnectionStatus> = Arc::new(callback);
        let id = self
            .inner
            .status_hub
            .observers()
            .subscribe_arc(Arc::clone(&callback));

        let snapshot = self.status();
        if catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
            warn!("status subscriber panicked during initial snapshot delivery");
        }

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.status_hub.observers().unsubscribe(id);
            }
        })
    }

    /// Register a payload subscriber
    ///
    /// Payloads arrive in the order the transport delivered them; no
    /// deduplication or reordering is performed here.
    pub fn on_message(
        &self,
        callback: impl Fn(&T::Payload) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.messages.subscribe(callback);
        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.messages.unsubscribe(id);
            }
        })
    }

    /// Set the refresh invoked by the fallback poller, replacing any
    /// previous one
    ///
    /// Replacement alone never starts or stops polling; only state
    /// transitions do.
    pub fn set_fallback_callback<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let wrapped: FallbackFn = Arc::new(move || callback().boxed());
        *self.inner.fallback.lock() = Some(wrapped);
    }
}

impl<T: PushTransport> Inner<T> {
    async fn connect(this: &Arc<Self>, subject_id: String) {
        let (epoch, snapshot) = {
            let mut st = this.state.lock();
            if !st.state.accepts_connect() {
                debug!("connect ignored while {}", st.state);
                return;
            }
            st.epoch += 1;
            st.timers.cancel_all();
            st.subject_id = Some(subject_id);
            st.reconnect_attempts = 0;
            st.fallback_active = false;
            st.last_error = None;
            st.state = ConnectionState::Connecting;
            (st.epoch, st.snapshot())
        };
        this.status_hub.publish(snapshot);
        Self::establish(this, epoch).await;
    }

    async fn disconnect(this: &Arc<Self>) {
        let (handle, snapshot) = {
            let mut st = this.state.lock();
            st.epoch += 1;
            st.timers.cancel_all();
            let handle = st.handle.take();
            if st.state == ConnectionState::Disconnected {
                (handle, None)
            } else {
                st.state = ConnectionState::Disconnected;
                st.fallback_active = false;
                (handle, Some(st.snapshot()))
            }
        };
        if let Some(snapshot) = snapshot {
            this.status_hub.publish(snapshot);
        }
        if let Some(handle) = handle {
            debug!("releasing subscription handle");
            handle.close().await;
        }
    }

    async fn reconnect(this: &Arc<Self>, subject_id: Option<String>) {
        let remembered = subject_id.or_else(|| this.state.lock().subject_id.clone());
        let subject = match remembered {
            Some(subject) => subject,
            None => {
                warn!("reconnect requested before any connect; nothing to resume");
                let snapshot = {
                    let mut st = this.state.lock();
                    st.last_error =
                        Some("reconnect requested with no known subject".to_string());
                    st.snapshot()
                };
                this.status_hub.publish(snapshot);
                return;
            }
        };
        info!("explicit reconnect for subject '{}'", subject);
        Self::disconnect(this).await;
        Self::connect(this, subject).await;
    }

    /// One establishment attempt against the remembered subject
    ///
    /// The caller's epoch is re-validated around the await so a concurrent
    /// disconnect() makes the result a no-op and the stale handle is
    /// released rather than adopted.
    async fn establish(this: &Arc<Self>, epoch: u64) {
        let subject = {
            let st = this.state.lock();
            if st.epoch != epoch
                || !matches!(
                    st.state,
                    ConnectionState::Connecting | ConnectionState::Reconnecting
                )
            {
                return;
            }
            match st.subject_id.clone() {
                Some(subject) => subject,
                // connect() always records the subject before establishing
                None => return,
            }
        };

        debug!("opening channel for subject '{}'", subject);
        let result = tokio::time::timeout(
            this.config.join_timeout,
            this.transport.open_channel(&subject),
        )
        .await;

        match result {
            Ok(Ok((handle, events))) => Self::on_established(this, epoch, handle, events),
            Ok(Err(e)) => Self::handle_failure(this, epoch, e.to_string()),
            Err(_) => Self::handle_failure(
                this,
                epoch,
                format!(
                    "channel join timed out after {:?}",
                    this.config.join_timeout
                ),
            ),
        }
    }

    fn on_established(
        this: &Arc<Self>,
        epoch: u64,
        handle: T::Handle,
        events: UnboundedReceiver<ChannelEvent<T::Payload>>,
    ) {
        let handle = Arc::new(handle);
        let snapshot = {
            let mut st = this.state.lock();
            if st.epoch != epoch
                || !matches!(
                    st.state,
                    ConnectionState::Connecting | ConnectionState::Reconnecting
                )
            {
                // lost the race with disconnect(); release the fresh handle
                drop(st);
                let stale = Arc::clone(&handle);
                tokio::spawn(async move { stale.close().await });
                return;
            }
            st.state = ConnectionState::Connected;
            st.reconnect_attempts = 0;
            st.last_connected_at = Some(Utc::now());
            st.last_error = None;
            st.fallback_active = false;
            st.timers.cancel_all();
            st.handle = Some(Arc::clone(&handle));
            st.timers.pump = Some(Self::spawn_pump(this, epoch, events));
            st.timers.heartbeat = Some(Self::spawn_heartbeat(this, epoch, handle));
            st.snapshot()
        };
        info!("channel joined; connection established");
        this.status_hub.publish(snapshot);
    }

    /// Unified failure path: establishment failures, mid-life drops and
    /// heartbeat deaths all land here
    fn handle_failure(this: &Arc<Self>, epoch: u64, error: String) {
        let snapshot = {
            let mut st = this.state.lock();
            if st.epoch != epoch {
                debug!("stale failure ignored: {}", error);
                return;
            }
            if !matches!(
                st.state,
                ConnectionState::Connecting
                    | ConnectionState::Connected
                    | ConnectionState::Reconnecting
            ) {
                return;
            }
            warn!("connection failure: {}", error);
            if let Some(stale) = st.handle.take() {
                tokio::spawn(async move { stale.close().await });
            }
            st.timers.cancel_heartbeat();
            st.timers.cancel_pump();
            st.timers.cancel_reconnect();
            st.reconnect_attempts += 1;
            st.last_error = Some(error);
            if st.reconnect_attempts < this.config.max_reconnect_attempts {
                let delay = this.config.backoff.delay_for(st.reconnect_attempts);
                debug!(
                    "scheduling reconnect attempt {} in {:?}",
                    st.reconnect_attempts, delay
                );
                st.state = ConnectionState::Reconnecting;
                st.timers.reconnect = Some(Self::spawn_reconnect_timer(this, epoch, delay));
            } else {
                info!("reconnect attempts exhausted; falling back to polling");
                st.state = ConnectionState::Failed;
                st.fallback_active = true;
                st.timers.fallback = Some(Self::spawn_fallback(this, epoch));
            }
            st.snapshot()
        };
        this.status_hub.publish(snapshot);
    }

    fn spawn_reconnect_timer(this: &Arc<Self>, epoch: u64, delay: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(this);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            Self::retry(&inner, epoch).await;
        })
    }

    /// Reconnect timer fired: announce the attempt and try again
    async fn retry(this: &Arc<Self>, epoch: u64) {
        let snapshot = {
            let mut st = this.state.lock();
            if st.epoch != epoch || st.state != ConnectionState::Reconnecting {
                return;
            }
            st.timers.reconnect = None;
            st.snapshot()
        };
        this.status_hub.publish(snapshot);
        Self::establish(this, epoch).await;
    }

    fn spawn_pump(
        this: &Arc<Self>,
        epoch: u64,
        mut events: UnboundedReceiver<ChannelEvent<T::Payload>>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(this);
        tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(inner) = weak.upgrade() else { return };
                {
                    let st = inner.state.lock();
                    if st.epoch != epoch {
                        return;
                    }
                }
                match event {
                    Some(ChannelEvent::Message(payload)) => inner.messages.notify(&payload),
                    Some(ChannelEvent::Error(e)) => {
                        Self::handle_failure(&inner, epoch, e);
                        return;
                    }
                    Some(ChannelEvent::Closed) | None => {
                        Self::handle_failure(
                            &inner,
                            epoch,
                            "channel closed unexpectedly".to_string(),
                        );
                        return;
                    }
                }
            }
        })
    }

    fn spawn_heartbeat(this: &Arc<Self>, epoch: u64, handle: Arc<T::Handle>) -> JoinHandle<()> {
        let interval = this.config.heartbeat_interval;
        let weak = Arc::downgrade(this);
        let probe_weak = weak.clone();
        tokio::spawn(async move {
            let end = run_probe_loop(interval, move || {
                let Some(inner) = probe_weak.upgrade() else {
                    return ProbeOutcome::Stop;
                };
                {
                    let st = inner.state.lock();
                    if st.epoch != epoch || st.state != ConnectionState::Connected {
                        return ProbeOutcome::Stop;
                    }
                }
                if handle.state().is_alive() {
                    ProbeOutcome::Healthy
                } else {
                    ProbeOutcome::Dead
                }
            })
            .await;

            if end == ProbeEnd::Dead {
                if let Some(inner) = weak.upgrade() {
                    Self::handle_failure(
                        &inner,
                        epoch,
                        "heartbeat: channel no longer joined".to_string(),
                    );
                }
            }
        })
    }

    fn spawn_fallback(this: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let interval = this.config.fallback_polling_interval;
        let weak = Arc::downgrade(this);
        tokio::spawn(async move {
            run_poll_loop(interval, move || {
                let inner = weak.upgrade()?;
                {
                    let st = inner.state.lock();
                    if st.epoch != epoch || !st.fallback_active {
                        return None;
                    }
                }
                let callback = inner.fallback.lock().clone();
                match callback {
                    Some(callback) => Some(callback()),
                    None => {
                        debug!("fallback poll tick with no refresh callback registered");
                        Some(futures::future::ready(Ok::<(), LinkError>(())).boxed())
                    }
                }
            })
            .await;
        })
    }
}
