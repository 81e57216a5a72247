//! Live feed client infrastructure.
//!
//! This module provides a resilient WebSocket client with:
//! - Automatic reconnection with veto hooks and configurable backoff
//! - A no-traffic watchdog forcing reconnection after silence
//! - Serialized outbound sending through two FIFO queues
//! - Multi-frame message reassembly with one-shot text decoding
//! - Three broadcast event channels (message, reconnected, disconnected)
//!
//! # Example
//!
//! ```ignore
//! use sportfeed::live::{ClientConfig, LiveClient};
//!
//! let config = ClientConfig::builder()
//!     .url("wss://live.example.com/feed")
//!     .name("scores")
//!     .reconnect_enabled(true)
//!     .build();
//!
//! let client = LiveClient::new(config)?;
//! client.start().await?;
//! ```

mod client;
mod config;
mod events;
mod lock;
mod message;
mod receive;
mod send;
mod state;
mod transport;
mod watchdog;

pub use client::LiveClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use events::{
    DisconnectionCause, DisconnectionInfo, ReconnectionCause, ReconnectionInfo,
};
pub use lock::{AsyncLock, LockGuard};
pub use message::{Message, TextEncoding};
pub use state::ClientState;
pub use transport::{CloseInfo, ConnectionFactory, Frame, FrameKind, Transport, WsConnector};
