//! Live-score lookup endpoints.

use serde::Deserialize;

use crate::error::FeedError;
use crate::rest::client::{Fetched, RestClient};
use crate::rest::response::ApiEnvelope;

/// A sport covered by the live-score API.
#[derive(Debug, Clone, Deserialize)]
pub struct Sport {
    /// Sport id.
    pub id: u32,
    /// Sport name.
    pub name: String,
    /// URL slug of the sport.
    #[serde(default)]
    pub slug: Option<String>,
}

/// Live-score lookup service.
pub struct ScoresApi {
    client: RestClient,
}

impl ScoresApi {
    /// Creates the service over an existing REST client.
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Fetches all covered sports.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn sports(&self) -> Result<Fetched<ApiEnvelope<Vec<Sport>>>, FeedError> {
        self.client.get("sports", &[]).await
    }
}
