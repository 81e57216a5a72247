//! Transport abstraction and the default WebSocket connector.
//!
//! The live client never talks to a socket directly; it drives a
//! [`Transport`] produced by a pluggable [`ConnectionFactory`]. The default
//! implementation wraps tokio-tungstenite. Tests plug in scripted
//! transports through the same seam.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{trace, warn};

use crate::error::FeedError;
use crate::live::config::ClientConfig;
use crate::live::lock::await_cancel;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, TungsteniteMessage>;
type WsSource = SplitStream<WsStream>;

/// Kind of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Text payload.
    Text,
    /// Binary payload.
    Binary,
}

/// One wire-level transmission unit read from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A chunk of message data written into the caller's buffer.
    Data {
        /// Payload kind.
        kind: FrameKind,
        /// Number of bytes written into the buffer.
        len: usize,
        /// Whether this frame completes the message.
        end_of_message: bool,
    },
    /// A protocol close frame.
    Close {
        /// Close code sent by the peer, if any.
        code: Option<u16>,
        /// Close reason sent by the peer, if any.
        reason: Option<String>,
    },
}

/// Close-related details of a connection, for diagnostics and events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code received from the peer, if any.
    pub code: Option<u16>,
    /// Close reason received from the peer, if any.
    pub reason: Option<String>,
    /// Negotiated sub-protocol, if any.
    pub sub_protocol: Option<String>,
}

/// An established transport session.
///
/// A `receive` call writes at most `buf.len()` bytes and reports the frame
/// metadata; oversized messages arrive as multiple non-final frames.
/// Implementations must be safe to drive from the receive loop while sends
/// happen concurrently on other tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads one frame into `buf`.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the connection fails.
    async fn receive(&self, buf: &mut [u8]) -> Result<Frame, FeedError>;

    /// Sends one complete text message.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the send fails.
    async fn send_text(&self, text: &str) -> Result<(), FeedError>;

    /// Sends one complete binary message.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the send fails.
    async fn send_binary(&self, data: &[u8]) -> Result<(), FeedError>;

    /// Performs the protocol close handshake.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the close could not be sent.
    async fn close(&self, code: u16, reason: &str) -> Result<(), FeedError>;

    /// Abandons the connection without a handshake.
    fn abort(&self);

    /// Returns whether the connection is open for sending.
    fn is_open(&self) -> bool;

    /// Returns close details recorded for this connection.
    fn close_info(&self) -> CloseInfo;
}

/// Factory producing transport sessions; pluggable for testing.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Establishes a new transport session.
    ///
    /// The `cancel` scope fires when the attempt should be abandoned.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the connection cannot be
    /// established, or `FeedError::Canceled` when the scope fired.
    async fn connect(&self, cancel: watch::Receiver<bool>)
        -> Result<Arc<dyn Transport>, FeedError>;
}

struct PendingMessage {
    kind: FrameKind,
    data: Vec<u8>,
    offset: usize,
}

struct SourceHalf {
    stream: WsSource,
    pending: Option<PendingMessage>,
}

/// Default transport over tokio-tungstenite.
pub struct WsTransport {
    sink: Mutex<WsSink>,
    source: Mutex<SourceHalf>,
    open: AtomicBool,
    close_info: SyncMutex<CloseInfo>,
}

impl WsTransport {
    fn new(sink: WsSink, source: WsSource, sub_protocol: Option<String>) -> Self {
        Self {
            sink: Mutex::new(sink),
            source: Mutex::new(SourceHalf {
                stream: source,
                pending: None,
            }),
            open: AtomicBool::new(true),
            close_info: SyncMutex::new(CloseInfo {
                sub_protocol,
                ..CloseInfo::default()
            }),
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, message: TungsteniteMessage) -> Result<(), FeedError> {
        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(|e| {
            self.mark_closed();
            FeedError::transport(format!("send failed: {e}"))
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn receive(&self, buf: &mut [u8]) -> Result<Frame, FeedError> {
        let mut source = self.source.lock().await;
        loop {
            // Drain a pending oversized message chunk by chunk.
            if let Some(pending) = source.pending.as_mut() {
                let remaining = pending.data.len() - pending.offset;
                let take = remaining.min(buf.len());
                buf[..take].copy_from_slice(&pending.data[pending.offset..pending.offset + take]);
                pending.offset += take;
                let kind = pending.kind;
                let end_of_message = pending.offset >= pending.data.len();
                if end_of_message {
                    source.pending = None;
                }
                return Ok(Frame::Data {
                    kind,
                    len: take,
                    end_of_message,
                });
            }

            match source.stream.next().await {
                None => {
                    self.mark_closed();
                    return Err(FeedError::transport("connection closed by peer"));
                }
                Some(Err(e)) => {
                    self.mark_closed();
                    return Err(FeedError::transport(format!("receive failed: {e}")));
                }
                Some(Ok(message)) => match message {
                    TungsteniteMessage::Text(text) => {
                        source.pending = Some(PendingMessage {
                            kind: FrameKind::Text,
                            data: text.into_bytes(),
                            offset: 0,
                        });
                    }
                    TungsteniteMessage::Binary(data) => {
                        source.pending = Some(PendingMessage {
                            kind: FrameKind::Binary,
                            data,
                            offset: 0,
                        });
                    }
                    TungsteniteMessage::Ping(payload) => {
                        trace!("ping received");
                        if let Err(e) = self.send_message(TungsteniteMessage::Pong(payload)).await {
                            warn!(error = %e, "failed to send pong");
                        }
                    }
                    TungsteniteMessage::Pong(_) => {
                        trace!("pong received");
                    }
                    TungsteniteMessage::Close(frame) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), Some(f.reason.to_string())),
                            None => (None, None),
                        };
                        {
                            let mut info = self.close_info.lock();
                            info.code = code;
                            info.reason.clone_from(&reason);
                        }
                        self.mark_closed();
                        return Ok(Frame::Close { code, reason });
                    }
                    TungsteniteMessage::Frame(_) => {}
                },
            }
        }
    }

    async fn send_text(&self, text: &str) -> Result<(), FeedError> {
        self.send_message(TungsteniteMessage::Text(text.to_string()))
            .await
    }

    async fn send_binary(&self, data: &[u8]) -> Result<(), FeedError> {
        self.send_message(TungsteniteMessage::Binary(data.to_vec()))
            .await
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), FeedError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let result = self.send_message(TungsteniteMessage::Close(Some(frame))).await;
        self.mark_closed();
        result
    }

    fn abort(&self) {
        self.mark_closed();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close_info(&self) -> CloseInfo {
        self.close_info.lock().clone()
    }
}

/// Default connection factory dialing the configured URL.
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    /// Creates a connector from the client configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.url.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

#[async_trait]
impl ConnectionFactory for WsConnector {
    async fn connect(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Arc<dyn Transport>, FeedError> {
        let attempt = timeout(self.connect_timeout, connect_async(self.url.as_str()));
        let result = tokio::select! {
            () = await_cancel(&mut cancel) => return Err(FeedError::Canceled),
            r = attempt => r,
        };

        let (stream, response) = result
            .map_err(|_| FeedError::Timeout {
                timeout_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| FeedError::transport(format!("failed to connect: {e}")))?;

        let sub_protocol = response
            .headers()
            .get("sec-websocket-protocol")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (sink, source) = stream.split();
        Ok(Arc::new(WsTransport::new(sink, source, sub_protocol)))
    }
}
