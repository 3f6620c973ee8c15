//! Write-once settlement handles
//!
//! A [`Deferred`] represents a value assigned remotely that is not yet known
//! at creation time, e.g. the server-side identifier of a launch whose create
//! request is still in flight. It settles exactly once, with a value or an
//! error, and every reader observes the same cached outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_common::{Error, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Clonable future that completes when an asynchronous unit of work has
/// settled, success or failure. Failures are swallowed so that waiting on a
/// set of signals never short-circuits on a failed sibling.
pub type Signal = Shared<BoxFuture<'static, ()>>;

/// Remote-assigned identifier promise, the common case of [`Deferred`]
pub type DeferredId = Deferred<String>;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

type SettleCallback<T> = Box<dyn FnOnce(&Result<T>) + Send>;

enum State<T> {
    Pending(Vec<SettleCallback<T>>),
    Settled(Result<T>),
}

struct Inner<T> {
    /// Process-unique key; coordinator maps are keyed by handle identity,
    /// never by the resolved value, which may not exist yet.
    key: u64,
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Write-once, multi-reader handle for a value that is still being produced
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("key", &self.inner.key).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// Create an unresolved handle
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(State::Pending(Vec::new())),
                notify: Notify::new(),
            }),
        }
    }

    /// Stable identity key for this handle instance
    pub fn key(&self) -> u64 {
        self.inner.key
    }

    /// Settle the handle with a value. A second settlement is ignored.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle the handle with a terminal failure. A second settlement is ignored.
    pub fn fail(&self, error: Error) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<T>) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Settled(_) => {
                    debug!(key = self.inner.key, "handle already settled, ignoring");
                    return;
                }
                State::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = State::Settled(outcome.clone());
                    callbacks
                }
            }
        };
        for callback in callbacks {
            callback(&outcome);
        }
        self.inner.notify.notify_waiters();
    }

    /// Register a callback fired exactly once when the handle settles, from
    /// whatever task performs the settling. Registering after settlement
    /// fires the callback immediately.
    pub fn on_settle(&self, callback: impl FnOnce(&Result<T>) + Send + 'static) {
        let outcome = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        callback(&outcome);
    }

    /// The settled outcome, if any
    pub fn try_get(&self) -> Option<Result<T>> {
        match &*self.inner.state.lock() {
            State::Pending(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Wait until the handle settles and return the cached outcome
    pub async fn settled(&self) -> Result<T> {
        loop {
            // Register for wake-up before checking to avoid a missed notify
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Completion signal for this handle: resolves once settled, swallowing
    /// any failure
    pub fn signal(&self) -> Signal {
        let this = self.clone();
        async move {
            let _ = this.settled().await;
        }
        .boxed()
        .shared()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}
