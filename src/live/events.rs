//! Event types and the multicast event bus.
//!
//! The bus carries three independent, replay-free channels: message
//! received, reconnected, and disconnected. Delivery to all current
//! subscribers happens synchronously, in subscription order, before the
//! triggering operation proceeds — which is what makes the veto flags on
//! [`DisconnectionInfo`] observable immediately after a broadcast.
//!
//! Two subscription forms exist: synchronous callbacks (the only form that
//! can veto in time) and unbounded stream receivers. Backpressure on the
//! stream form is unbounded by design; slow consumers accumulate.
//!
//! Subscribers are invoked while internal locks may be held and must not
//! call back into client operations that acquire the send/reconnect lock.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::FeedError;
use crate::live::message::Message;
use crate::live::transport::CloseInfo;

/// Why the connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectionCause {
    /// The client was disposed while running.
    Exit,
    /// The connection was lost unexpectedly.
    Lost,
    /// The watchdog saw no traffic within the configured threshold.
    NoTraffic,
    /// A connection attempt failed.
    Error,
    /// The user requested the stop.
    ByUser,
    /// The server initiated the close.
    ByServer,
}

/// Why a (re)connection was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconnectionCause {
    /// First connection after start.
    Initial,
    /// Reconnected after the connection was lost.
    Lost,
    /// Reconnected after a watchdog timeout.
    NoTraffic,
    /// Reconnected after a failed connection attempt.
    Error,
    /// Reconnected on user request.
    ByUser,
    /// Reconnected after a server-initiated close.
    ByServer,
}

impl From<ReconnectionCause> for DisconnectionCause {
    fn from(cause: ReconnectionCause) -> Self {
        match cause {
            ReconnectionCause::Initial => Self::Exit,
            ReconnectionCause::Lost => Self::Lost,
            ReconnectionCause::NoTraffic => Self::NoTraffic,
            ReconnectionCause::Error => Self::Error,
            ReconnectionCause::ByUser => Self::ByUser,
            ReconnectionCause::ByServer => Self::ByServer,
        }
    }
}

/// Event broadcast after every successful (re)connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectionInfo {
    /// What triggered the connection.
    pub cause: ReconnectionCause,
}

impl ReconnectionInfo {
    /// Creates a reconnection event for the given cause.
    #[must_use]
    pub fn new(cause: ReconnectionCause) -> Self {
        Self { cause }
    }
}

/// Event broadcast on every disconnection.
///
/// Carries two subscriber-writable flags read back synchronously after the
/// broadcast: `cancel_reconnect` suppresses the automatic reconnection that
/// would otherwise follow, and `cancel_close` vetoes the default handling of
/// a server-initiated close.
#[derive(Debug)]
pub struct DisconnectionInfo {
    cause: DisconnectionCause,
    close_code: Option<u16>,
    close_reason: Option<String>,
    sub_protocol: Option<String>,
    error: Option<FeedError>,
    cancel_reconnect: AtomicBool,
    cancel_close: AtomicBool,
}

impl DisconnectionInfo {
    /// Creates a disconnection event.
    #[must_use]
    pub fn new(cause: DisconnectionCause, close: CloseInfo, error: Option<FeedError>) -> Self {
        Self {
            cause,
            close_code: close.code,
            close_reason: close.reason,
            sub_protocol: close.sub_protocol,
            error,
            cancel_reconnect: AtomicBool::new(false),
            cancel_close: AtomicBool::new(false),
        }
    }

    /// What caused the disconnection.
    #[must_use]
    pub fn cause(&self) -> DisconnectionCause {
        self.cause
    }

    /// Protocol close code, when the peer sent one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Protocol close reason, when the peer sent one.
    #[must_use]
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    /// Negotiated sub-protocol of the connection, if any.
    #[must_use]
    pub fn sub_protocol(&self) -> Option<&str> {
        self.sub_protocol.as_deref()
    }

    /// The error that caused the disconnection, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FeedError> {
        self.error.as_ref()
    }

    /// Requests that the automatic reconnection be skipped.
    pub fn cancel_reconnect(&self) {
        self.cancel_reconnect.store(true, Ordering::SeqCst);
    }

    /// Returns whether a subscriber vetoed the reconnection.
    #[must_use]
    pub fn reconnect_canceled(&self) -> bool {
        self.cancel_reconnect.load(Ordering::SeqCst)
    }

    /// Vetoes the default handling of a server-initiated close.
    pub fn cancel_close(&self) {
        self.cancel_close.store(true, Ordering::SeqCst);
    }

    /// Returns whether a subscriber vetoed the close handling.
    #[must_use]
    pub fn close_canceled(&self) -> bool {
        self.cancel_close.load(Ordering::SeqCst)
    }
}

enum Sink<T> {
    Callback(Box<dyn Fn(&T) + Send + Sync>),
    Stream(mpsc::UnboundedSender<T>),
}

/// One multicast, replay-free channel of the bus.
pub(crate) struct EventChannel<T> {
    sinks: RwLock<Vec<Arc<Sink<T>>>>,
    completed: AtomicBool,
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            completed: AtomicBool::new(false),
        }
    }

    /// Delivers `value` to every current subscriber, in subscription order,
    /// before returning. No-op once the channel is completed.
    pub(crate) fn publish(&self, value: &T) {
        if self.completed.load(Ordering::SeqCst) {
            return;
        }
        let snapshot: Vec<Arc<Sink<T>>> = self.sinks.read().iter().cloned().collect();
        let mut dead: Vec<usize> = Vec::new();
        for (index, sink) in snapshot.iter().enumerate() {
            match sink.as_ref() {
                Sink::Callback(callback) => callback(value),
                Sink::Stream(tx) => {
                    if tx.send(value.clone()).is_err() {
                        dead.push(index);
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut sinks = self.sinks.write();
            sinks.retain(|sink| !dead.iter().any(|&i| Arc::ptr_eq(sink, &snapshot[i])));
        }
    }

    /// Registers a synchronous callback subscriber.
    pub(crate) fn callback(&self, f: impl Fn(&T) + Send + Sync + 'static) {
        if self.completed.load(Ordering::SeqCst) {
            return;
        }
        self.sinks.write().push(Arc::new(Sink::Callback(Box::new(f))));
    }

    /// Registers a stream subscriber and returns its receiver.
    ///
    /// After completion the returned receiver is already closed.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.completed.load(Ordering::SeqCst) {
            self.sinks.write().push(Arc::new(Sink::Stream(tx)));
        }
        rx
    }

    /// Completes the channel: publishes become no-ops, stream receivers end,
    /// and new subscriptions observe the closed channel. Terminal.
    pub(crate) fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
        self.sinks.write().clear();
    }
}

/// The three broadcast channels of a live client.
pub(crate) struct EventBus {
    pub(crate) messages: EventChannel<Message>,
    pub(crate) reconnections: EventChannel<ReconnectionInfo>,
    pub(crate) disconnections: EventChannel<Arc<DisconnectionInfo>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            messages: EventChannel::new(),
            reconnections: EventChannel::new(),
            disconnections: EventChannel::new(),
        }
    }
}
