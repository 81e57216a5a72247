//! Synchronization primitives for the live client.
//!
//! `AsyncLock` is the single-permit mutex that serializes every operation
//! touching the connection handle: individual sends, instant sends, and the
//! whole reconnection sequence. `CancelScope` is the watch-channel
//! cancellation scope used per connection and for the client lifetime.

use tokio::sync::watch;
use tokio::sync::{Mutex, MutexGuard};

/// Single-permit asynchronous lock.
///
/// Exposes both a suspend-compatible acquisition (`lock`) for concurrent
/// workers and a blocking acquisition (`blocking_lock`) for non-suspending
/// callers. Both return a scoped guard that releases the permit exactly once
/// on every exit path.
#[derive(Debug, Default)]
pub struct AsyncLock {
    inner: Mutex<()>,
}

/// Scoped release handle returned by [`AsyncLock`].
///
/// The permit is released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    _permit: MutexGuard<'a, ()>,
}

impl AsyncLock {
    /// Creates a new unlocked `AsyncLock`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, suspending until the permit is available.
    pub async fn lock(&self) -> LockGuard<'_> {
        LockGuard {
            _permit: self.inner.lock().await,
        }
    }

    /// Acquires the lock by blocking the current thread.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// use [`AsyncLock::lock`] there instead.
    #[must_use]
    pub fn blocking_lock(&self) -> LockGuard<'_> {
        LockGuard {
            _permit: self.inner.blocking_lock(),
        }
    }
}

/// Cancellation scope backed by a watch channel.
///
/// Cancellation is one-way and observable by any number of tasks. Dropping
/// the scope (e.g. when a fresh per-connection scope replaces it) also
/// releases all waiters.
#[derive(Debug)]
pub(crate) struct CancelScope {
    tx: watch::Sender<bool>,
}

impl CancelScope {
    /// Creates a new, not-yet-canceled scope.
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Cancels the scope, waking every waiter.
    pub(crate) fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns whether the scope has been canceled.
    pub(crate) fn is_canceled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a receiver observing this scope.
    pub(crate) fn handle(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Waits until the observed scope is canceled or dropped.
pub(crate) async fn await_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
