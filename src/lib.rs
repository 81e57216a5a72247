//! # Sportfeed
//!
//! Live sports-data client: a resilient WebSocket feed core plus thin REST
//! lookup helpers.
//!
//! This crate provides:
//! - A persistent-connection feed client with automatic reconnection,
//!   no-traffic watchdog, serialized sending, and multi-frame reassembly
//! - REST lookup services for football reference data and covered sports
//!
//! # Architecture
//!
//! The crate is organized into:
//! - `live` - WebSocket feed client infrastructure
//! - `rest` - REST client infrastructure
//!
//! # Example
//!
//! ```ignore
//! use sportfeed::live::{ClientConfig, LiveClient};
//!
//! let config = ClientConfig::builder()
//!     .url("wss://live.example.com/feed")
//!     .name("scores")
//!     .build();
//!
//! let client = LiveClient::new(config)?;
//! let mut messages = client.messages();
//! client.start().await?;
//! ```

#![warn(missing_docs)]

mod error;

/// Live feed client infrastructure
pub mod live;

/// REST client infrastructure
pub mod rest;

pub use error::FeedError;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::FeedError;
    pub use crate::live::{
        ClientConfig, ClientConfigBuilder, ConnectionFactory, DisconnectionCause,
        DisconnectionInfo, LiveClient, Message, ReconnectionCause, ReconnectionInfo, Transport,
    };
    pub use crate::rest::{
        ApiEnvelope, Fetched, FootballApi, RestClient, RestConfig, RestConfigBuilder, ScoresApi,
    };
}
