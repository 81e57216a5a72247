//! REST client for the sports-data HTTP endpoints.
//!
//! A thin wrapper over a single GET operation: no retry, no batching, no
//! state beyond the configured connection pool.

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::FeedError;

/// Configuration for the REST client.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the API.
    pub base_url: String,
    /// API key sent in the `x-apisports-key` header, if required.
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_user_agent() -> String {
    format!("sportfeed/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl RestConfig {
    /// Creates a new builder for `RestConfig`.
    #[must_use]
    pub fn builder() -> RestConfigBuilder {
        RestConfigBuilder::default()
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builder for [`RestConfig`].
#[derive(Debug, Default)]
pub struct RestConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl RestConfigBuilder {
    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Builds the `RestConfig`.
    #[must_use]
    pub fn build(self) -> RestConfig {
        RestConfig {
            base_url: self.base_url.unwrap_or_default(),
            api_key: self.api_key,
            timeout_ms: self
                .timeout
                .map_or_else(default_timeout_ms, |d| d.as_millis() as u64),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        }
    }
}

/// A completed GET request: the HTTP status and the parsed body.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// HTTP status code of the response.
    pub status: u16,
    /// Deserialized response body.
    pub body: T,
}

/// REST client issuing single GET calls against the sports-data API.
pub struct RestClient {
    config: RestConfig,
    http: Client,
}

impl RestClient {
    /// Creates a new REST client.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` when the configuration is invalid or the HTTP
    /// client cannot be created.
    pub fn new(config: RestConfig) -> Result<Self, FeedError> {
        if config.base_url.trim().is_empty() {
            return Err(FeedError::bad_input("base_url", "is null or empty"));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| FeedError::bad_input("user_agent", "is not a valid header value"))?,
        );
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "x-apisports-key",
                api_key
                    .parse()
                    .map_err(|_| FeedError::bad_input("api_key", "is not a valid header value"))?,
            );
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| FeedError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Builds the full URL for a path.
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issues one GET request and deserializes the response body.
    ///
    /// # Errors
    ///
    /// Returns a transport-family error when the request fails and
    /// `FeedError::Decode` when the body cannot be deserialized.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Fetched<T>, FeedError> {
        let url = self.build_url(path);
        debug!(url = %url, "sending GET request");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    }
                } else if e.is_connect() {
                    FeedError::transport(e.to_string())
                } else {
                    FeedError::Http {
                        status: e.status().map_or(0, |s| s.as_u16()),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.json::<T>().await.map_err(|e| FeedError::Decode {
            reason: format!("failed to deserialize response: {e}"),
        })?;

        Ok(Fetched { status, body })
    }
}
