//! Live client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FeedError;
use crate::live::message::TextEncoding;

/// Configuration for the live feed client.
///
/// Contains the endpoint identity, reconnection and watchdog parameters,
/// and text decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Feed endpoint URL (`ws://` or `wss://`).
    pub url: String,

    /// Diagnostic name used in log output.
    #[serde(default = "default_name")]
    pub name: String,

    /// Whether automatic reconnection is enabled.
    #[serde(default = "default_reconnect_enabled")]
    pub reconnect_enabled: bool,

    /// Watchdog threshold in milliseconds; `None` disables the watchdog.
    #[serde(default = "default_no_traffic_timeout_ms")]
    pub no_traffic_timeout_ms: Option<u64>,

    /// Delay in milliseconds before retrying a failed connection attempt;
    /// `None` disables retries after a connect failure.
    #[serde(default = "default_error_retry_delay_ms")]
    pub error_retry_delay_ms: Option<u64>,

    /// Whether inbound text payloads are decoded to strings.
    #[serde(default = "default_text_decode_enabled")]
    pub text_decode_enabled: bool,

    /// Text decoding mode.
    #[serde(default)]
    pub encoding: TextEncoding,

    /// Receive buffer size in bytes (one frame chunk).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Connection timeout in milliseconds, used by the default connector.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_name() -> String {
    "client".to_string()
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_no_traffic_timeout_ms() -> Option<u64> {
    Some(60_000)
}

fn default_error_retry_delay_ms() -> Option<u64> {
    Some(60_000)
}

fn default_text_decode_enabled() -> bool {
    true
}

fn default_chunk_size() -> usize {
    4096
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            name: default_name(),
            reconnect_enabled: default_reconnect_enabled(),
            no_traffic_timeout_ms: default_no_traffic_timeout_ms(),
            error_retry_delay_ms: default_error_retry_delay_ms(),
            text_decode_enabled: default_text_decode_enabled(),
            encoding: TextEncoding::default(),
            chunk_size: default_chunk_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Creates a new builder for `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the watchdog threshold as a Duration, if enabled.
    #[must_use]
    pub fn no_traffic_timeout(&self) -> Option<Duration> {
        self.no_traffic_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the post-failure retry delay as a Duration, if enabled.
    #[must_use]
    pub fn error_retry_delay(&self) -> Option<Duration> {
        self.error_retry_delay_ms.map(Duration::from_millis)
    }

    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` when the URL is empty or does not use a
    /// WebSocket scheme, or when the chunk size is zero.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.url.trim().is_empty() {
            return Err(FeedError::bad_input("url", "is null or empty"));
        }
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(FeedError::bad_input(
                "url",
                "must use the ws:// or wss:// scheme",
            ));
        }
        if self.chunk_size == 0 {
            return Err(FeedError::bad_input("chunk_size", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    url: Option<String>,
    name: Option<String>,
    reconnect_enabled: Option<bool>,
    no_traffic_timeout: Option<Option<Duration>>,
    error_retry_delay: Option<Option<Duration>>,
    text_decode_enabled: Option<bool>,
    encoding: Option<TextEncoding>,
    chunk_size: Option<usize>,
    connect_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Sets the feed endpoint URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the diagnostic name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether automatic reconnection is enabled.
    #[must_use]
    pub fn reconnect_enabled(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = Some(enabled);
        self
    }

    /// Sets the watchdog threshold; pass `None` to disable the watchdog.
    #[must_use]
    pub fn no_traffic_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.no_traffic_timeout = Some(timeout.into());
        self
    }

    /// Sets the post-failure retry delay; pass `None` to disable retries
    /// after a connect failure.
    #[must_use]
    pub fn error_retry_delay(mut self, delay: impl Into<Option<Duration>>) -> Self {
        self.error_retry_delay = Some(delay.into());
        self
    }

    /// Sets whether inbound text payloads are decoded to strings.
    #[must_use]
    pub fn text_decode_enabled(mut self, enabled: bool) -> Self {
        self.text_decode_enabled = Some(enabled);
        self
    }

    /// Sets the text decoding mode.
    #[must_use]
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Sets the receive buffer size.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the `ClientConfig`.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            url: self.url.unwrap_or_default(),
            name: self.name.unwrap_or_else(default_name),
            reconnect_enabled: self
                .reconnect_enabled
                .unwrap_or_else(default_reconnect_enabled),
            no_traffic_timeout_ms: self
                .no_traffic_timeout
                .map_or_else(default_no_traffic_timeout_ms, |t| {
                    t.map(|d| d.as_millis() as u64)
                }),
            error_retry_delay_ms: self
                .error_retry_delay
                .map_or_else(default_error_retry_delay_ms, |t| {
                    t.map(|d| d.as_millis() as u64)
                }),
            text_decode_enabled: self
                .text_decode_enabled
                .unwrap_or_else(default_text_decode_enabled),
            encoding: self.encoding.unwrap_or_default(),
            chunk_size: self.chunk_size.unwrap_or_else(default_chunk_size),
            connect_timeout_ms: self
                .connect_timeout
                .map_or_else(default_connect_timeout_ms, |d| d.as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .url("wss://live.example.com/feed")
            .name("scores")
            .reconnect_enabled(true)
            .no_traffic_timeout(Duration::from_secs(30))
            .error_retry_delay(None)
            .chunk_size(8192)
            .build();

        assert_eq!(config.url, "wss://live.example.com/feed");
        assert_eq!(config.name, "scores");
        assert!(config.reconnect_enabled);
        assert_eq!(config.no_traffic_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.error_retry_delay(), None);
        assert_eq!(config.chunk_size, 8192);
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();

        assert!(config.url.is_empty());
        assert_eq!(config.name, "client");
        assert!(config.reconnect_enabled);
        assert_eq!(config.no_traffic_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.error_retry_delay(), Some(Duration::from_secs(60)));
        assert!(config.text_decode_enabled);
        assert_eq!(config.encoding, TextEncoding::Utf8Lossy);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config = ClientConfig::default();
        assert!(matches!(
            config.validate(),
            Err(FeedError::BadInput { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_websocket_scheme() {
        let config = ClientConfig::builder().url("https://example.com").build();
        assert!(matches!(
            config.validate(),
            Err(FeedError::BadInput { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_websocket_url() {
        let config = ClientConfig::builder().url("ws://localhost:9000").build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ClientConfig::builder()
            .url("wss://live.example.com")
            .name("feed")
            .no_traffic_timeout(None)
            .build();

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.url, parsed.url);
        assert_eq!(config.name, parsed.name);
        assert_eq!(parsed.no_traffic_timeout_ms, None);
    }
}
