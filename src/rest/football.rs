//! Football lookup endpoints: countries, leagues, teams, venues.
//!
//! Query parameters are built through explicit typed structs producing a
//! key/value list; only the fields actually set reach the wire.

use serde::Deserialize;

use crate::error::FeedError;
use crate::rest::client::{Fetched, RestClient};
use crate::rest::response::ApiEnvelope;

/// League competition format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeagueKind {
    /// Regular league.
    League,
    /// Knockout cup.
    Cup,
}

impl LeagueKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Cup => "cup",
        }
    }
}

/// Query parameters for the leagues endpoint.
#[derive(Debug, Clone, Default)]
pub struct LeagueQuery {
    /// League id.
    pub id: Option<u32>,
    /// League name.
    pub name: Option<String>,
    /// Competition format.
    pub kind: Option<LeagueKind>,
    /// Country name.
    pub country: Option<String>,
    /// Country code.
    pub code: Option<String>,
    /// Season year.
    pub season: Option<u16>,
    /// Restrict to the current season.
    pub current: Option<bool>,
    /// Restrict to leagues a team plays in.
    pub team: Option<u32>,
}

impl LeagueQuery {
    /// Produces the key/value pairs for the set fields.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "id", self.id);
        push(&mut pairs, "name", self.name.clone());
        push(&mut pairs, "type", self.kind.map(LeagueKind::as_str));
        push(&mut pairs, "country", self.country.clone());
        push(&mut pairs, "code", self.code.clone());
        push(&mut pairs, "season", self.season);
        push(&mut pairs, "current", self.current);
        push(&mut pairs, "team", self.team);
        pairs
    }
}

/// Query parameters for the teams endpoint.
#[derive(Debug, Clone, Default)]
pub struct TeamQuery {
    /// Team id.
    pub id: Option<u32>,
    /// Team name.
    pub name: Option<String>,
    /// Team code.
    pub code: Option<String>,
    /// Country name.
    pub country: Option<String>,
    /// League id.
    pub league: Option<u32>,
    /// Season year.
    pub season: Option<u16>,
    /// Venue id.
    pub venue: Option<u32>,
}

impl TeamQuery {
    /// Produces the key/value pairs for the set fields.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "id", self.id);
        push(&mut pairs, "name", self.name.clone());
        push(&mut pairs, "code", self.code.clone());
        push(&mut pairs, "country", self.country.clone());
        push(&mut pairs, "league", self.league);
        push(&mut pairs, "season", self.season);
        push(&mut pairs, "venue", self.venue);
        pairs
    }
}

/// Query parameters for the venues endpoint.
#[derive(Debug, Clone, Default)]
pub struct VenueQuery {
    /// Venue id.
    pub id: Option<u32>,
    /// Venue name.
    pub name: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

impl VenueQuery {
    /// Produces the key/value pairs for the set fields.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "id", self.id);
        push(&mut pairs, "name", self.name.clone());
        push(&mut pairs, "city", self.city.clone());
        push(&mut pairs, "country", self.country.clone());
        pairs
    }
}

fn push<T: ToString>(pairs: &mut Vec<(String, String)>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        pairs.push((key.to_string(), value.to_string()));
    }
}

/// A country of the football API.
#[derive(Debug, Clone, Deserialize)]
pub struct Country {
    /// Country name.
    pub name: String,
    /// Two-letter country code.
    #[serde(default)]
    pub code: Option<String>,
    /// Flag image URL.
    #[serde(default)]
    pub flag: Option<String>,
}

/// A league of the football API.
#[derive(Debug, Clone, Deserialize)]
pub struct League {
    /// League id.
    pub id: u32,
    /// League name.
    pub name: String,
    /// Competition format.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Logo image URL.
    #[serde(default)]
    pub logo: Option<String>,
}

/// Coverage flags of one season.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Coverage {
    /// Per-fixture coverage flags.
    #[serde(default)]
    pub fixtures: Option<FixtureCoverage>,
    /// Standings available.
    #[serde(default)]
    pub standings: bool,
    /// Player data available.
    #[serde(default)]
    pub players: bool,
    /// Top scorers available.
    #[serde(default)]
    pub top_scorers: bool,
    /// Top assists available.
    #[serde(default)]
    pub top_assists: bool,
    /// Top cards available.
    #[serde(default)]
    pub top_cards: bool,
    /// Injuries available.
    #[serde(default)]
    pub injuries: bool,
    /// Predictions available.
    #[serde(default)]
    pub predictions: bool,
    /// Odds available.
    #[serde(default)]
    pub odds: bool,
}

/// Fixture-level coverage flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureCoverage {
    /// Event timeline available.
    #[serde(default)]
    pub events: bool,
    /// Lineups available.
    #[serde(default)]
    pub lineups: bool,
    /// Fixture statistics available.
    #[serde(default)]
    pub statistics_fixtures: bool,
    /// Player statistics available.
    #[serde(default)]
    pub statistics_players: bool,
}

/// A season entry of a league.
#[derive(Debug, Clone, Deserialize)]
pub struct Season {
    /// Season year.
    pub year: u16,
    /// First day of the season.
    #[serde(default)]
    pub start: Option<String>,
    /// Last day of the season.
    #[serde(default)]
    pub end: Option<String>,
    /// Whether this is the current season.
    #[serde(default)]
    pub current: bool,
    /// Data coverage of the season.
    #[serde(default)]
    pub coverage: Option<Coverage>,
}

/// One item of a leagues response.
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueItem {
    /// The league.
    pub league: League,
    /// Its country.
    #[serde(default)]
    pub country: Option<Country>,
    /// Its seasons.
    #[serde(default)]
    pub seasons: Vec<Season>,
}

/// A team of the football API.
#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    /// Team id.
    pub id: u32,
    /// Team name.
    pub name: String,
    /// Team code.
    #[serde(default)]
    pub code: Option<String>,
    /// Country name.
    #[serde(default)]
    pub country: Option<String>,
    /// Founding year.
    #[serde(default)]
    pub founded: Option<u16>,
    /// Whether this is a national team.
    #[serde(default)]
    pub national: bool,
    /// Logo image URL.
    #[serde(default)]
    pub logo: Option<String>,
}

/// A venue of the football API.
#[derive(Debug, Clone, Deserialize)]
pub struct Venue {
    /// Venue id.
    #[serde(default)]
    pub id: Option<u32>,
    /// Venue name.
    #[serde(default)]
    pub name: Option<String>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// City name.
    #[serde(default)]
    pub city: Option<String>,
    /// Seating capacity.
    #[serde(default)]
    pub capacity: Option<u64>,
    /// Playing surface.
    #[serde(default)]
    pub surface: Option<String>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// One item of a teams response.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamItem {
    /// The team.
    pub team: Team,
    /// Its home venue.
    #[serde(default)]
    pub venue: Option<Venue>,
}

/// Football lookup service.
pub struct FootballApi {
    client: RestClient,
}

impl FootballApi {
    /// Creates the service over an existing REST client.
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Fetches all countries.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn countries(&self) -> Result<Fetched<ApiEnvelope<Vec<Country>>>, FeedError> {
        self.client.get("countries", &[]).await
    }

    /// Fetches the country with the given code.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::BadInput` for an empty code, or a
    /// transport-family or decode error on failure.
    pub async fn country_by_code(
        &self,
        code: &str,
    ) -> Result<Fetched<ApiEnvelope<Vec<Country>>>, FeedError> {
        if code.trim().is_empty() {
            return Err(FeedError::bad_input("code", "is null or empty"));
        }
        let query = vec![("code".to_string(), code.to_string())];
        self.client.get("countries", &query).await
    }

    /// Fetches all leagues.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn leagues(&self) -> Result<Fetched<ApiEnvelope<Vec<LeagueItem>>>, FeedError> {
        self.client.get("leagues", &[]).await
    }

    /// Fetches leagues matching the query.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn leagues_matching(
        &self,
        query: &LeagueQuery,
    ) -> Result<Fetched<ApiEnvelope<Vec<LeagueItem>>>, FeedError> {
        self.client.get("leagues", &query.to_pairs()).await
    }

    /// Fetches teams matching the query.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn teams(
        &self,
        query: &TeamQuery,
    ) -> Result<Fetched<ApiEnvelope<Vec<TeamItem>>>, FeedError> {
        self.client.get("teams", &query.to_pairs()).await
    }

    /// Fetches venues matching the query.
    ///
    /// # Errors
    ///
    /// Returns a transport-family or decode error on failure.
    pub async fn venues(
        &self,
        query: &VenueQuery,
    ) -> Result<Fetched<ApiEnvelope<Vec<Venue>>>, FeedError> {
        self.client.get("venues", &query.to_pairs()).await
    }
}
