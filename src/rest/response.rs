//! Typed response envelope of the sports-data API.

use serde::Deserialize;

/// Envelope wrapping every API response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Echo of the requested endpoint.
    #[serde(default)]
    pub get: Option<String>,
    /// Number of items in `response`.
    #[serde(default)]
    pub results: u32,
    /// Paging information for list endpoints.
    #[serde(default)]
    pub paging: Option<Paging>,
    /// The payload.
    pub response: T,
}

/// Paging block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Paging {
    /// Current page, 1-based.
    pub current: u32,
    /// Total number of pages.
    pub total: u32,
}
