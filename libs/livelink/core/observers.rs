//! Observer plumbing: ordered callback lists with unsubscribe tokens, and
//! the reentrancy-safe status fan-out queue.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::status::ConnectionStatus;

/// Shared subscriber callback
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of subscriber callbacks with token-based removal
///
/// Callbacks run in registration order. A panicking callback is isolated
/// and logged so the remaining subscribers still run.
pub struct ObserverList<T> {
    entries: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> ObserverList<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback and return its removal token
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> u64 {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already-shared callback and return its removal token
    pub fn subscribe_arc(&self, callback: Callback<T>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        id
    }

    /// Remove the callback registered under `id`
    pub fn unsubscribe(&self, id: u64) {
        self.entries.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every subscriber with `value`, in registration order
    ///
    /// The entry list is snapshotted first, so a callback may subscribe or
    /// unsubscribe without deadlocking the delivery.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                warn!("subscriber callback panicked; continuing with remaining subscribers");
            }
        }
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe token returned by observer registration
///
/// Calling [`Subscription::unsubscribe`] removes the callback. Dropping the
/// token without calling it leaves the subscription in place.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop delivery to the associated callback
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Status fan-out with ordered, reentrancy-safe delivery
///
/// Snapshots are queued and drained FIFO by whichever publisher currently
/// holds the draining flag. A subscriber that triggers another transition
/// from inside its callback enqueues the new snapshot behind the one in
/// flight instead of recursing into the observer list.
pub struct StatusHub {
    observers: ObserverList<ConnectionStatus>,
    queue: Mutex<VecDeque<ConnectionStatus>>,
    draining: AtomicBool,
}

impl StatusHub {
    pub fn new() -> Self {
        Self {
            observers: ObserverList::new(),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    pub fn observers(&self) -> &ObserverList<ConnectionStatus> {
        &self.observers
    }

    /// Queue a snapshot and deliver it, plus anything queued behind it,
    /// unless another drain is already in progress
    pub fn publish(&self, status: ConnectionStatus) {
        self.queue.lock().push_back(status);
        if self.draining.swap(true, Ordering::AcqRel) {
            // another publisher is draining and will pick this up
            return;
        }
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(status) => self.observers.notify(&status),
                None => {
                    self.draining.store(false, Ordering::Release);
                    // a publisher may have enqueued while we were resetting
                    // the flag and seen it still set; re-acquire if so
                    if self.queue.lock().is_empty()
                        || self.draining.swap(true, Ordering::AcqRel)
                    {
                        return;
                    }
                }
            }
        }
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
    }
}
