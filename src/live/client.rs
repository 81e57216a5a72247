//! Live feed client with automatic reconnection.
//!
//! [`LiveClient`] is the sole public surface of the live core. It maintains
//! a single logical session over an unreliable transport, detects and
//! recovers from loss, serializes outbound traffic through two queues, and
//! reassembles multi-frame inbound messages.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::FeedError;
use crate::live::config::ClientConfig;
use crate::live::events::{
    DisconnectionCause, DisconnectionInfo, EventBus, ReconnectionCause, ReconnectionInfo,
};
use crate::live::lock::{AsyncLock, CancelScope};
use crate::live::message::Message;
use crate::live::receive;
use crate::live::send::SendQueue;
use crate::live::state::ClientState;
use crate::live::transport::{CloseInfo, ConnectionFactory, Transport, WsConnector};
use crate::live::watchdog::Watchdog;

/// Resilient client for a live sports-data feed.
///
/// # Example
///
/// ```ignore
/// use sportfeed::live::{ClientConfig, LiveClient};
///
/// let config = ClientConfig::builder()
///     .url("wss://live.example.com/feed")
///     .name("scores")
///     .build();
///
/// let client = LiveClient::new(config)?;
/// let mut messages = client.messages();
/// client.start().await?;
/// while let Some(message) = messages.recv().await {
///     println!("{message}");
/// }
/// ```
pub struct LiveClient {
    inner: Arc<ClientInner>,
}

/// Shared state behind a [`LiveClient`], also held by its worker tasks.
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    factory: Arc<dyn ConnectionFactory>,
    lock: AsyncLock,
    state: RwLock<ClientState>,
    connection: RwLock<Option<Arc<dyn Transport>>>,
    generation: AtomicU64,
    last_received: RwLock<Instant>,
    connection_scope: RwLock<CancelScope>,
    lifetime_scope: CancelScope,
    pub(crate) bus: EventBus,
    pub(crate) queue: SendQueue,
    watchdog: Watchdog,
}

impl LiveClient {
    /// Creates a client using the default WebSocket connector.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` when the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let factory = Arc::new(WsConnector::new(&config));
        Ok(Self::assemble(config, factory))
    }

    /// Creates a client with a custom connection factory.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` when the configuration is invalid.
    pub fn with_factory(
        config: ClientConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self, FeedError> {
        config.validate()?;
        Ok(Self::assemble(config, factory))
    }

    fn assemble(config: ClientConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                factory,
                lock: AsyncLock::new(),
                state: RwLock::new(ClientState::Idle),
                connection: RwLock::new(None),
                generation: AtomicU64::new(0),
                last_received: RwLock::new(Instant::now()),
                connection_scope: RwLock::new(CancelScope::new()),
                lifetime_scope: CancelScope::new(),
                bus: EventBus::new(),
                queue: SendQueue::new(),
                watchdog: Watchdog::new(),
            }),
        }
    }

    /// Returns the diagnostic name of this client.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Returns the feed endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.inner.state.read()
    }

    /// Returns true if the client has been started and not yet stopped.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.is_started()
    }

    /// Returns true if a connection is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Starts the client; a connect failure is swallowed and retried
    /// according to the configured backoff.
    ///
    /// Idempotent once running.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyDisposed` after dispose.
    pub async fn start(&self) -> Result<(), FeedError> {
        self.inner.start_internal(false).await
    }

    /// Starts the client, propagating a connect failure to the caller with
    /// no retry scheduled.
    ///
    /// # Errors
    ///
    /// Returns the connect failure, or `FeedError::AlreadyDisposed` after
    /// dispose.
    pub async fn start_or_fail(&self) -> Result<(), FeedError> {
        self.inner.start_internal(true).await
    }

    /// Stops the client with a protocol close handshake and broadcasts a
    /// `ByUser` disconnection.
    ///
    /// Returns whether the close handshake succeeded.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyDisposed` after dispose.
    pub async fn stop(&self, code: u16, reason: &str) -> Result<bool, FeedError> {
        let result = self.inner.stop_internal(code, reason, false, false).await?;
        self.inner.publish_by_user_disconnection();
        Ok(result)
    }

    /// Stops the client, propagating a close-handshake failure.
    ///
    /// # Errors
    ///
    /// Returns the handshake failure, or `FeedError::AlreadyDisposed` after
    /// dispose.
    pub async fn stop_or_fail(&self, code: u16, reason: &str) -> Result<bool, FeedError> {
        let result = self.inner.stop_internal(code, reason, true, false).await?;
        self.inner.publish_by_user_disconnection();
        Ok(result)
    }

    /// Forces a teardown and rebuild of the connection; failures are
    /// swallowed and retried according to the configured backoff.
    ///
    /// Ignored when the client is not started.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyDisposed` after dispose.
    pub async fn reconnect(&self) -> Result<(), FeedError> {
        self.inner.reconnect_requested(false).await
    }

    /// Forces a teardown and rebuild, propagating a connect failure.
    ///
    /// # Errors
    ///
    /// Returns the connect failure, or `FeedError::AlreadyDisposed` after
    /// dispose.
    pub async fn reconnect_or_fail(&self) -> Result<(), FeedError> {
        self.inner.reconnect_requested(true).await
    }

    /// Enqueues a text message for sending and returns immediately.
    ///
    /// The message is dropped (with a log entry) if the connection is not
    /// open when the send executes.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` for an empty message and
    /// `FeedError::AlreadyDisposed` after dispose.
    pub fn send(&self, text: impl Into<String>) -> Result<(), FeedError> {
        let text = text.into();
        validate_message_text(&text)?;
        self.inner.ensure_not_disposed()?;
        if !self.inner.queue.enqueue_text(text) {
            return Err(FeedError::AlreadyDisposed);
        }
        Ok(())
    }

    /// Enqueues a binary message for sending and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyDisposed` after dispose.
    pub fn send_bytes(&self, data: impl Into<Vec<u8>>) -> Result<(), FeedError> {
        self.inner.ensure_not_disposed()?;
        if !self.inner.queue.enqueue_binary(data.into()) {
            return Err(FeedError::AlreadyDisposed);
        }
        Ok(())
    }

    /// Sends a text message immediately, bypassing the queue.
    ///
    /// The send runs under the same lock as the queue workers. A message
    /// hitting a closed connection is dropped with a log entry, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` for an empty message, a
    /// transport-family error when the send fails, and
    /// `FeedError::AlreadyDisposed` after dispose.
    pub async fn send_instant(&self, text: &str) -> Result<(), FeedError> {
        validate_message_text(text)?;
        self.inner.ensure_not_disposed()?;
        self.inner.send_text_synchronized(text).await
    }

    /// Sends a binary message immediately, bypassing the queue.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the send fails and
    /// `FeedError::AlreadyDisposed` after dispose.
    pub async fn send_instant_bytes(&self, data: &[u8]) -> Result<(), FeedError> {
        self.inner.ensure_not_disposed()?;
        self.inner.send_binary_synchronized(data).await
    }

    /// Injects a synthetic message into the message-received channel, as if
    /// the server had sent it.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyDisposed` after dispose.
    pub fn inject_synthetic_message(&self, message: Message) -> Result<(), FeedError> {
        self.inner.ensure_not_disposed()?;
        self.inner.bus.messages.publish(&message);
        Ok(())
    }

    /// Registers a synchronous callback for received messages.
    pub fn on_message(&self, f: impl Fn(&Message) + Send + Sync + 'static) {
        self.inner.bus.messages.callback(f);
    }

    /// Registers a synchronous callback for reconnection events.
    pub fn on_reconnection(&self, f: impl Fn(&ReconnectionInfo) + Send + Sync + 'static) {
        self.inner.bus.reconnections.callback(f);
    }

    /// Registers a synchronous callback for disconnection events.
    ///
    /// Only callback subscribers observe an event early enough to veto via
    /// [`DisconnectionInfo::cancel_reconnect`] or
    /// [`DisconnectionInfo::cancel_close`].
    pub fn on_disconnection(&self, f: impl Fn(&Arc<DisconnectionInfo>) + Send + Sync + 'static) {
        self.inner.bus.disconnections.callback(f);
    }

    /// Returns a stream of received messages.
    #[must_use]
    pub fn messages(&self) -> UnboundedReceiver<Message> {
        self.inner.bus.messages.subscribe()
    }

    /// Returns a stream of reconnection events.
    #[must_use]
    pub fn reconnections(&self) -> UnboundedReceiver<ReconnectionInfo> {
        self.inner.bus.reconnections.subscribe()
    }

    /// Returns a stream of disconnection events.
    #[must_use]
    pub fn disconnections(&self) -> UnboundedReceiver<Arc<DisconnectionInfo>> {
        self.inner.bus.disconnections.subscribe()
    }

    /// Disposes the client: closes the send queues, cancels all scopes,
    /// aborts the connection, and completes all event channels.
    ///
    /// If the client was running, one final `Exit` disconnection is emitted
    /// before the disconnection channel completes. Idempotent; no events are
    /// ever delivered afterward.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl ClientInner {
    pub(crate) fn is_started(&self) -> bool {
        self.state.read().is_started()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.read().is_disposed()
    }

    pub(crate) fn is_stopping(&self) -> bool {
        matches!(*self.state.read(), ClientState::Stopping)
    }

    fn is_running(&self) -> bool {
        self.state.read().is_running()
    }

    fn ensure_not_disposed(&self) -> Result<(), FeedError> {
        if self.is_disposed() {
            return Err(FeedError::AlreadyDisposed);
        }
        Ok(())
    }

    fn set_state(&self, next: ClientState) {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            warn!(
                client = %self.config.name,
                from = %*state,
                to = %next,
                "invalid state transition, ignoring"
            );
            return;
        }
        *state = next;
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True when an internally triggered reconnection should be dropped:
    /// a teardown is already underway, or the triggering handle has been
    /// superseded.
    pub(crate) fn should_ignore_reconnection(&self, observed_generation: u64) -> bool {
        self.state.read().suppresses_reconnect()
            || observed_generation != self.current_generation()
    }

    pub(crate) fn touch_last_received(&self) {
        *self.last_received.write() = Instant::now();
    }

    /// Elapsed time since the last received message.
    pub(crate) fn silence(&self) -> tokio::time::Duration {
        self.last_received.read().elapsed()
    }

    fn current_close_info(&self) -> CloseInfo {
        self.connection
            .read()
            .as_ref()
            .map(|t| t.close_info())
            .unwrap_or_default()
    }

    fn replace_connection_scope(&self) {
        *self.connection_scope.write() = CancelScope::new();
    }

    fn publish_by_user_disconnection(&self) {
        let info = Arc::new(DisconnectionInfo::new(
            DisconnectionCause::ByUser,
            self.current_close_info(),
            None,
        ));
        self.bus.disconnections.publish(&info);
    }

    async fn start_internal(self: &Arc<Self>, fail_fast: bool) -> Result<(), FeedError> {
        if self.is_disposed() {
            debug!(client = %self.config.name, "client is already disposed, starting not possible");
            return Err(FeedError::AlreadyDisposed);
        }
        if self.is_started() {
            debug!(client = %self.config.name, "client already started, ignoring");
            return Ok(());
        }

        debug!(client = %self.config.name, "starting");
        self.set_state(ClientState::Starting);

        let result = {
            let _guard = self.lock.lock().await;
            self.replace_connection_scope();
            self.start_client_locked(ReconnectionCause::Initial, fail_fast)
                .await
        };
        if let Err(e) = result {
            self.set_state(ClientState::Idle);
            return Err(e);
        }

        self.queue.start_workers(self);
        Ok(())
    }

    /// Performs the protocol close handshake. `by_server` marks the reply
    /// to a server-initiated close, which keeps the client started so the
    /// receive loop can follow up with a reconnection.
    pub(crate) async fn stop_internal(
        &self,
        code: u16,
        reason: &str,
        fail_fast: bool,
        by_server: bool,
    ) -> Result<bool, FeedError> {
        if self.is_disposed() {
            debug!(client = %self.config.name, "client is already disposed, stopping not possible");
            return Err(FeedError::AlreadyDisposed);
        }

        self.watchdog.disarm();

        let Some(transport) = self.connection.read().clone() else {
            self.set_state(ClientState::Idle);
            return Ok(false);
        };

        if !self.is_running() {
            info!(client = %self.config.name, "client is already stopped");
            self.set_state(ClientState::Idle);
            return Ok(false);
        }

        self.set_state(ClientState::Stopping);
        let close_result = transport.close(code, reason).await;

        let next = if !by_server || !self.config.reconnect_enabled {
            ClientState::Idle
        } else {
            ClientState::Reconnecting
        };
        self.set_state(next);

        match close_result {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(client = %self.config.name, error = %e, "error while stopping client");
                if fail_fast {
                    Err(e)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn reconnect_requested(self: &Arc<Self>, fail_fast: bool) -> Result<(), FeedError> {
        self.ensure_not_disposed()?;
        if !self.is_started() {
            debug!(client = %self.config.name, "client not started, ignoring reconnection");
            return Ok(());
        }
        let generation = self.current_generation();
        self.reconnect_synchronized(ReconnectionCause::ByUser, fail_fast, None, generation)
            .await
    }

    /// Runs one reconnection sequence under the shared lock.
    pub(crate) async fn reconnect_synchronized(
        self: &Arc<Self>,
        cause: ReconnectionCause,
        fail_fast: bool,
        error: Option<FeedError>,
        observed_generation: u64,
    ) -> Result<(), FeedError> {
        let _guard = self.lock.lock().await;
        self.reconnect_locked(cause, fail_fast, error, observed_generation)
            .await
    }

    async fn reconnect_locked(
        self: &Arc<Self>,
        cause: ReconnectionCause,
        fail_fast: bool,
        error: Option<FeedError>,
        observed_generation: u64,
    ) -> Result<(), FeedError> {
        if observed_generation != self.current_generation() {
            debug!(
                client = %self.config.name,
                "connection already replaced, collapsing duplicate reconnect"
            );
            return Ok(());
        }
        {
            let state = *self.state.read();
            if state.is_disposed() || !state.is_started() {
                return Ok(());
            }
        }
        self.set_state(ClientState::Reconnecting);

        let info = Arc::new(DisconnectionInfo::new(
            DisconnectionCause::from(cause),
            self.current_close_info(),
            error,
        ));
        // An Error trigger was already broadcast at the failure site; do not
        // duplicate it here.
        if cause != ReconnectionCause::Error {
            self.bus.disconnections.publish(&info);
            if info.reconnect_canceled() {
                info!(client = %self.config.name, "reconnection canceled by subscriber, exiting");
            }
        }

        self.connection_scope.read().cancel();
        if let Some(old) = self.connection.write().take() {
            old.abort();
        }

        if !self.config.reconnect_enabled || info.reconnect_canceled() {
            self.set_state(ClientState::Idle);
            return Ok(());
        }

        debug!(client = %self.config.name, "reconnecting");
        self.replace_connection_scope();
        self.start_client_locked(cause, fail_fast).await
    }

    /// One connection attempt. Must be called with the lock held.
    async fn start_client_locked(
        self: &Arc<Self>,
        cause: ReconnectionCause,
        fail_fast: bool,
    ) -> Result<(), FeedError> {
        self.watchdog.disarm();

        let scope = self.connection_scope.read().handle();
        match self.factory.connect(scope).await {
            Ok(transport) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *self.connection.write() = Some(Arc::clone(&transport));

                let loop_scope = self.connection_scope.read().handle();
                spawn_receive(Arc::clone(self), transport, generation, loop_scope);

                self.set_state(ClientState::Running);
                self.bus
                    .reconnections
                    .publish(&ReconnectionInfo::new(cause));
                self.touch_last_received();
                self.watchdog.arm(self);

                info!(
                    client = %self.config.name,
                    url = %self.config.url,
                    cause = ?cause,
                    "connected"
                );
                Ok(())
            }
            Err(e) => self.handle_connect_failure(fail_fast, e).await,
        }
    }

    async fn handle_connect_failure(
        self: &Arc<Self>,
        fail_fast: bool,
        error: FeedError,
    ) -> Result<(), FeedError> {
        let info = Arc::new(DisconnectionInfo::new(
            DisconnectionCause::Error,
            CloseInfo::default(),
            Some(error.clone()),
        ));
        self.bus.disconnections.publish(&info);

        if info.reconnect_canceled() {
            error!(
                client = %self.config.name,
                error = %error,
                "exception while connecting, reconnecting canceled by subscriber, exiting"
            );
            return Ok(());
        }

        if fail_fast {
            return Err(error);
        }

        let Some(delay) = self.config.error_retry_delay() else {
            error!(
                client = %self.config.name,
                error = %error,
                "exception while connecting, retry disabled, exiting"
            );
            return Ok(());
        };

        error!(
            client = %self.config.name,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "exception while connecting, waiting before next reconnection try"
        );
        self.set_state(ClientState::Reconnecting);

        let inner = Arc::clone(self);
        let generation = self.current_generation();
        let lifetime = self.lifetime_scope.handle();
        spawn_retry_reconnect(inner, delay, error, generation, lifetime);
        Ok(())
    }

    pub(crate) async fn send_text_synchronized(&self, text: &str) -> Result<(), FeedError> {
        let _guard = self.lock.lock().await;
        let Some(transport) = self.connection.read().clone() else {
            debug!(client = %self.config.name, "client is not connected, cannot send text message");
            return Ok(());
        };
        if !transport.is_open() {
            debug!(client = %self.config.name, "client is not connected, cannot send text message");
            return Ok(());
        }
        transport.send_text(text).await
    }

    pub(crate) async fn send_binary_synchronized(&self, data: &[u8]) -> Result<(), FeedError> {
        let _guard = self.lock.lock().await;
        let Some(transport) = self.connection.read().clone() else {
            debug!(client = %self.config.name, "client is not connected, cannot send binary message");
            return Ok(());
        };
        if !transport.is_open() {
            debug!(client = %self.config.name, "client is not connected, cannot send binary message");
            return Ok(());
        }
        transport.send_binary(data).await
    }

    fn dispose(&self) {
        let was_running = {
            let mut state = self.state.write();
            if state.is_disposed() {
                return;
            }
            let was_running = state.is_running();
            *state = ClientState::Disposed;
            was_running
        };

        debug!(client = %self.config.name, "disposing");

        let close_info = self.current_close_info();

        self.queue.close();
        self.watchdog.disarm();
        self.connection_scope.read().cancel();
        self.lifetime_scope.cancel();
        if let Some(transport) = self.connection.write().take() {
            transport.abort();
        }

        self.bus.messages.complete();
        self.bus.reconnections.complete();
        if was_running {
            let info = Arc::new(DisconnectionInfo::new(
                DisconnectionCause::Exit,
                close_info,
                None,
            ));
            self.bus.disconnections.publish(&info);
        }
        self.bus.disconnections.complete();
    }
}

/// Spawns the per-connection receive loop.
///
/// Kept as a free, non-`async` function so the `tokio::spawn` lives outside
/// the mutually recursive `async fn` cycle (receive loop → reconnect →
/// start → receive loop); inside that cycle the opaque future types are not
/// yet finalized, so their `Send`-ness cannot be proven at the spawn site.
fn spawn_receive(
    inner: Arc<ClientInner>,
    transport: Arc<dyn Transport>,
    generation: u64,
    scope: tokio::sync::watch::Receiver<bool>,
) {
    tokio::spawn(receive::run(inner, transport, generation, scope));
}

/// Spawns the delayed error-retry reconnection.
///
/// Kept as a free, non-`async` function for the same reason as
/// [`spawn_receive`]: the `tokio::spawn` must live outside the recursive
/// `async fn` cycle so the spawned future's `Send`-ness can be proven.
fn spawn_retry_reconnect(
    inner: Arc<ClientInner>,
    delay: tokio::time::Duration,
    error: FeedError,
    generation: u64,
    mut lifetime: tokio::sync::watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = crate::live::lock::await_cancel(&mut lifetime) => return,
        }
        let _ = inner
            .reconnect_synchronized(ReconnectionCause::Error, false, Some(error), generation)
            .await;
    });
}

fn validate_message_text(text: &str) -> Result<(), FeedError> {
    if text.trim().is_empty() {
        return Err(FeedError::bad_input("message", "is null or empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::message::TextEncoding;
    use crate::live::transport::{Frame, FrameKind, Transport};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use tokio::sync::{watch, Mutex};

    enum Script {
        Frame(FrameKind, Vec<u8>, bool),
        Close(u16, &'static str),
    }

    impl Script {
        fn text(payload: &str, end_of_message: bool) -> Self {
            Self::Frame(FrameKind::Text, payload.as_bytes().to_vec(), end_of_message)
        }

        fn binary(payload: Vec<u8>, end_of_message: bool) -> Self {
            Self::Frame(FrameKind::Binary, payload, end_of_message)
        }
    }

    struct FakeTransport {
        frames: Mutex<VecDeque<Script>>,
        sent_text: SyncMutex<Vec<String>>,
        sent_binary: SyncMutex<Vec<Vec<u8>>>,
        closed_with: SyncMutex<Option<(u16, String)>>,
        open: AtomicBool,
    }

    impl FakeTransport {
        fn new(frames: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames.into()),
                sent_text: SyncMutex::new(Vec::new()),
                sent_binary: SyncMutex::new(Vec::new()),
                closed_with: SyncMutex::new(None),
                open: AtomicBool::new(true),
            })
        }

        fn idle() -> Arc<Self> {
            Self::new(Vec::new())
        }

        fn offline() -> Arc<Self> {
            let transport = Self::new(Vec::new());
            transport.open.store(false, Ordering::SeqCst);
            transport
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn receive(&self, buf: &mut [u8]) -> Result<Frame, FeedError> {
            let next = self.frames.lock().await.pop_front();
            match next {
                Some(Script::Frame(kind, payload, end_of_message)) => {
                    buf[..payload.len()].copy_from_slice(&payload);
                    Ok(Frame::Data {
                        kind,
                        len: payload.len(),
                        end_of_message,
                    })
                }
                Some(Script::Close(code, reason)) => Ok(Frame::Close {
                    code: Some(code),
                    reason: Some(reason.to_string()),
                }),
                // Script exhausted: stay quiet until canceled.
                None => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn send_text(&self, text: &str) -> Result<(), FeedError> {
            self.sent_text.lock().push(text.to_string());
            Ok(())
        }

        async fn send_binary(&self, data: &[u8]) -> Result<(), FeedError> {
            self.sent_binary.lock().push(data.to_vec());
            Ok(())
        }

        async fn close(&self, code: u16, reason: &str) -> Result<(), FeedError> {
            *self.closed_with.lock() = Some((code, reason.to_string()));
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn abort(&self) {
            self.open.store(false, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn close_info(&self) -> CloseInfo {
            let closed = self.closed_with.lock().clone();
            CloseInfo {
                code: closed.as_ref().map(|(code, _)| *code),
                reason: closed.map(|(_, reason)| reason),
                sub_protocol: None,
            }
        }
    }

    struct FakeFactory {
        transports: SyncMutex<VecDeque<Arc<FakeTransport>>>,
        connects: AtomicUsize,
        fail_times: AtomicUsize,
    }

    impl FakeFactory {
        fn with_transports(transports: Vec<Arc<FakeTransport>>) -> Arc<Self> {
            Arc::new(Self {
                transports: SyncMutex::new(transports.into()),
                connects: AtomicUsize::new(0),
                fail_times: AtomicUsize::new(0),
            })
        }

        fn failing(times: usize) -> Arc<Self> {
            let factory = Self::with_transports(Vec::new());
            factory.fail_times.store(times, Ordering::SeqCst);
            factory
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConnectionFactory for FakeFactory {
        async fn connect(
            &self,
            _cancel: watch::Receiver<bool>,
        ) -> Result<Arc<dyn Transport>, FeedError> {
            tokio::task::yield_now().await;
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(FeedError::transport("connection refused"));
            }
            let transport = self
                .transports
                .lock()
                .pop_front()
                .unwrap_or_else(FakeTransport::idle);
            Ok(transport)
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .name("test")
            .build()
    }

    fn client_with(config: ClientConfig, factory: Arc<FakeFactory>) -> LiveClient {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        LiveClient::with_factory(config, factory).unwrap()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel completed")
    }

    #[tokio::test]
    async fn test_multi_frame_text_reassembles_to_single_message() {
        let transport = FakeTransport::new(vec![Script::text("A", false), Script::text("B", true)]);
        let factory = FakeFactory::with_transports(vec![transport]);
        let client = client_with(config(), factory);
        let mut messages = client.messages();

        client.start().await.unwrap();

        assert_eq!(next(&mut messages).await, Message::text("AB"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_single_frame_binary_message() {
        let transport = FakeTransport::new(vec![Script::binary(vec![1, 2, 3], true)]);
        let factory = FakeFactory::with_transports(vec![transport]);
        let client = client_with(config(), factory);
        let mut messages = client.messages();

        client.start().await.unwrap();

        assert_eq!(next(&mut messages).await, Message::binary(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_text_decode_disabled_delivers_binary() {
        let transport = FakeTransport::new(vec![Script::text("abc", true)]);
        let factory = FakeFactory::with_transports(vec![transport]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .text_decode_enabled(false)
            .build();
        let client = client_with(cfg, factory);
        let mut messages = client.messages();

        client.start().await.unwrap();

        assert_eq!(next(&mut messages).await, Message::binary(b"abc".to_vec()));
    }

    #[tokio::test]
    async fn test_strict_decode_drops_invalid_message() {
        let transport = FakeTransport::new(vec![
            Script::Frame(FrameKind::Text, vec![0xff, 0xfe], true),
            Script::text("ok", true),
        ]);
        let factory = FakeFactory::with_transports(vec![transport]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .encoding(TextEncoding::Utf8)
            .build();
        let client = client_with(cfg, factory);
        let mut messages = client.messages();

        client.start().await.unwrap();

        // The undecodable message is dropped; the next one still arrives.
        assert_eq!(next(&mut messages).await, Message::text("ok"));
    }

    #[tokio::test]
    async fn test_queued_sends_preserve_order() {
        let transport = FakeTransport::idle();
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let client = client_with(config(), factory);

        client.start().await.unwrap();
        client.send("one").unwrap();
        client.send("two").unwrap();
        client.send("three").unwrap();

        wait_until(|| transport.sent_text.lock().len() == 3).await;
        assert_eq!(*transport.sent_text.lock(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_send_instant_bypasses_queue() {
        let transport = FakeTransport::idle();
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let client = client_with(config(), factory);

        client.start().await.unwrap();
        client.send_instant("now").await.unwrap();
        assert_eq!(*transport.sent_text.lock(), vec!["now"]);

        client.send_instant_bytes(&[9, 9]).await.unwrap();
        assert_eq!(*transport.sent_binary.lock(), vec![vec![9, 9]]);
    }

    #[tokio::test]
    async fn test_sending_while_disconnected_drops_silently() {
        let transport = FakeTransport::offline();
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let client = client_with(config(), factory);

        client.start().await.unwrap();
        client.send("queued").unwrap();
        client.send_instant("instant").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.sent_text.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_validation() {
        let client = client_with(config(), FakeFactory::with_transports(Vec::new()));
        assert!(matches!(client.send(""), Err(FeedError::BadInput { .. })));
        assert!(matches!(
            client.send_instant("   ").await,
            Err(FeedError::BadInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let factory = FakeFactory::with_transports(vec![FakeTransport::idle()]);
        let client = client_with(config(), Arc::clone(&factory));

        client.start().await.unwrap();
        client.start().await.unwrap();
        assert_eq!(factory.connects(), 1);
        assert!(client.is_running());
    }

    #[tokio::test]
    async fn test_start_or_fail_propagates_without_retry() {
        let factory = FakeFactory::failing(usize::MAX);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .error_retry_delay(Duration::from_millis(10))
            .build();
        let client = client_with(cfg, Arc::clone(&factory));
        let mut disconnections = client.disconnections();

        let result = client.start_or_fail().await;
        assert!(matches!(result, Err(FeedError::Transport { .. })));
        assert_eq!(factory.connects(), 1);

        // The failure site broadcast one Error disconnection.
        let info = next(&mut disconnections).await;
        assert_eq!(info.cause(), DisconnectionCause::Error);

        // No retry is scheduled for the fail-fast variant.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(factory.connects(), 1);
        assert!(!client.is_started());
    }

    #[tokio::test]
    async fn test_plain_start_schedules_retry_after_backoff() {
        let factory = FakeFactory::failing(usize::MAX);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .error_retry_delay(Duration::from_millis(20))
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();
        assert_eq!(factory.connects(), 1);

        wait_until(|| factory.connects() >= 3).await;
        client.dispose();
    }

    #[tokio::test]
    async fn test_plain_start_gives_up_without_backoff() {
        let factory = FakeFactory::failing(usize::MAX);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .error_retry_delay(None)
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(factory.connects(), 1);
    }

    #[tokio::test]
    async fn test_restart_after_fail_fast_failure() {
        let factory = FakeFactory::failing(1);
        let client = client_with(config(), Arc::clone(&factory));

        assert!(client.start_or_fail().await.is_err());
        client.start_or_fail().await.unwrap();
        assert_eq!(factory.connects(), 2);
        assert!(client.is_running());
    }

    #[tokio::test]
    async fn test_server_close_reconnects_with_new_handle() {
        let first = FakeTransport::new(vec![Script::Close(1001, "going away")]);
        let second = FakeTransport::idle();
        let factory =
            FakeFactory::with_transports(vec![Arc::clone(&first), Arc::clone(&second)]);
        let client = client_with(config(), Arc::clone(&factory));
        let mut disconnections = client.disconnections();
        let mut reconnections = client.reconnections();

        client.start().await.unwrap();
        assert_eq!(
            next(&mut reconnections).await.cause,
            ReconnectionCause::Initial
        );

        let info = next(&mut disconnections).await;
        assert_eq!(info.cause(), DisconnectionCause::ByServer);
        assert_eq!(info.close_code(), Some(1001));
        assert_eq!(info.close_reason(), Some("going away"));

        // The close handshake was performed on the old handle, then a Lost
        // reconnection produced a new one from the factory.
        assert_eq!(next(&mut reconnections).await.cause, ReconnectionCause::Lost);
        assert_eq!(first.closed_with.lock().as_ref().unwrap().0, 1000);
        assert_eq!(factory.connects(), 2);
        wait_until(|| client.is_running()).await;
    }

    #[tokio::test]
    async fn test_server_close_veto_without_reconnection_keeps_listening() {
        let transport = FakeTransport::new(vec![
            Script::Close(1000, "bye"),
            Script::text("after", true),
        ]);
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .reconnect_enabled(false)
            .build();
        let client = client_with(cfg, Arc::clone(&factory));
        client.on_disconnection(|info| info.cancel_close());
        let mut messages = client.messages();

        client.start().await.unwrap();

        // The veto suppressed the close handshake; the loop keeps reading.
        assert_eq!(next(&mut messages).await, Message::text("after"));
        assert!(transport.closed_with.lock().is_none());
        assert_eq!(factory.connects(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_veto_stops_client() {
        let transport = FakeTransport::new(vec![Script::Close(1000, "bye")]);
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let client = client_with(config(), Arc::clone(&factory));
        client.on_disconnection(|info| {
            if info.cause() == DisconnectionCause::Lost {
                info.cancel_reconnect();
            }
        });

        client.start().await.unwrap();
        wait_until(|| !client.is_started()).await;
        assert_eq!(factory.connects(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reconnect_triggers_collapse() {
        let factory = FakeFactory::with_transports(vec![
            FakeTransport::idle(),
            FakeTransport::idle(),
            FakeTransport::idle(),
        ]);
        let client = client_with(config(), Arc::clone(&factory));

        client.start().await.unwrap();
        let mut reconnections = client.reconnections();

        let (first, second) = tokio::join!(client.reconnect(), client.reconnect());
        first.unwrap();
        second.unwrap();

        // Exactly one completed reconnection; the duplicate collapsed.
        assert_eq!(factory.connects(), 2);
        assert_eq!(
            next(&mut reconnections).await.cause,
            ReconnectionCause::ByUser
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(reconnections.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_closes_and_broadcasts_by_user() {
        let transport = FakeTransport::idle();
        let factory = FakeFactory::with_transports(vec![Arc::clone(&transport)]);
        let client = client_with(config(), factory);
        let mut disconnections = client.disconnections();

        client.start().await.unwrap();
        let stopped = client.stop(1000, "done").await.unwrap();

        assert!(stopped);
        assert_eq!(
            transport.closed_with.lock().clone(),
            Some((1000, "done".to_string()))
        );
        assert_eq!(next(&mut disconnections).await.cause(), DisconnectionCause::ByUser);
        assert!(!client.is_started());
        assert!(!client.is_running());

        // Stopping again reports failure but still broadcasts ByUser.
        let again = client.stop(1000, "done").await.unwrap();
        assert!(!again);
        assert_eq!(next(&mut disconnections).await.cause(), DisconnectionCause::ByUser);
    }

    #[tokio::test]
    async fn test_dispose_emits_single_exit_and_completes_channels() {
        let factory = FakeFactory::with_transports(vec![FakeTransport::idle()]);
        let client = client_with(config(), factory);
        let mut messages = client.messages();
        let mut reconnections = client.reconnections();
        let mut disconnections = client.disconnections();

        client.start().await.unwrap();
        assert_eq!(
            next(&mut reconnections).await.cause,
            ReconnectionCause::Initial
        );

        client.dispose();
        client.dispose();

        assert_eq!(next(&mut disconnections).await.cause(), DisconnectionCause::Exit);
        assert!(disconnections.recv().await.is_none());
        assert!(messages.recv().await.is_none());
        assert!(reconnections.recv().await.is_none());

        // New subscribers observe completed channels, and no operation works.
        let mut late = client.messages();
        assert!(late.recv().await.is_none());
        assert!(matches!(
            client.inject_synthetic_message(Message::text("x")),
            Err(FeedError::AlreadyDisposed)
        ));
    }

    #[tokio::test]
    async fn test_dispose_when_idle_emits_no_exit() {
        let client = client_with(config(), FakeFactory::with_transports(Vec::new()));
        let mut disconnections = client.disconnections();

        client.dispose();
        assert!(disconnections.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_operations_fail_after_dispose() {
        let client = client_with(config(), FakeFactory::with_transports(Vec::new()));
        client.dispose();

        assert!(matches!(
            client.start().await,
            Err(FeedError::AlreadyDisposed)
        ));
        assert!(matches!(client.send("hi"), Err(FeedError::AlreadyDisposed)));
        assert!(matches!(
            client.send_instant("hi").await,
            Err(FeedError::AlreadyDisposed)
        ));
        assert!(matches!(
            client.reconnect().await,
            Err(FeedError::AlreadyDisposed)
        ));
        assert!(matches!(
            client.stop(1000, "x").await,
            Err(FeedError::AlreadyDisposed)
        ));
    }

    #[tokio::test]
    async fn test_inject_synthetic_message() {
        let client = client_with(config(), FakeFactory::with_transports(Vec::new()));
        let mut messages = client.messages();

        client
            .inject_synthetic_message(Message::text("synthetic"))
            .unwrap();
        assert_eq!(next(&mut messages).await, Message::text("synthetic"));
    }

    #[tokio::test]
    async fn test_reconnect_ignored_when_not_started() {
        let factory = FakeFactory::with_transports(Vec::new());
        let client = client_with(config(), Arc::clone(&factory));

        client.reconnect().await.unwrap();
        assert_eq!(factory.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fires_only_past_threshold_60s() {
        let factory = FakeFactory::with_transports(vec![
            FakeTransport::idle(),
            FakeTransport::idle(),
        ]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .no_traffic_timeout(Duration::from_secs(60))
            .error_retry_delay(None)
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();
        let mut reconnections = client.reconnections();

        advance_secs(60).await;
        assert_eq!(factory.connects(), 1);
        assert!(reconnections.try_recv().is_err());

        advance_secs(2).await;
        assert_eq!(factory.connects(), 2);
        assert_eq!(
            reconnections.try_recv().unwrap().cause,
            ReconnectionCause::NoTraffic
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fires_only_past_threshold_1s() {
        let factory = FakeFactory::with_transports(vec![
            FakeTransport::idle(),
            FakeTransport::idle(),
        ]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .no_traffic_timeout(Duration::from_secs(1))
            .error_retry_delay(None)
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();

        advance_secs(1).await;
        assert_eq!(factory.connects(), 1);

        advance_secs(2).await;
        assert_eq!(factory.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_disabled_without_threshold() {
        let factory = FakeFactory::with_transports(vec![FakeTransport::idle()]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .no_traffic_timeout(None)
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();
        advance_secs(300).await;
        assert_eq!(factory.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_disabled_when_reconnection_off() {
        let factory = FakeFactory::with_transports(vec![FakeTransport::idle()]);
        let cfg = ClientConfig::builder()
            .url("ws://localhost:9000/feed")
            .reconnect_enabled(false)
            .no_traffic_timeout(Duration::from_secs(1))
            .build();
        let client = client_with(cfg, Arc::clone(&factory));

        client.start().await.unwrap();
        advance_secs(10).await;
        assert_eq!(factory.connects(), 1);
    }

    async fn advance_secs(seconds: u64) {
        for _ in 0..seconds {
            tokio::time::advance(Duration::from_secs(1)).await;
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
        }
    }
}
