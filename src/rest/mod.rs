//! REST helpers for the sports-data HTTP endpoints.
//!
//! Two thin lookup services over a shared single-operation GET client:
//! - `FootballApi` — countries, leagues, teams, venues
//! - `ScoresApi` — covered sports
//!
//! These are deliberately stateless I/O wrappers: one HTTP GET per call, a
//! typed envelope, and no retry semantics.

mod client;
mod football;
mod response;
mod scores;

pub use client::{Fetched, RestClient, RestConfig, RestConfigBuilder};
pub use football::{
    Country, Coverage, FixtureCoverage, FootballApi, League, LeagueItem, LeagueKind, LeagueQuery,
    Season, Team, TeamItem, TeamQuery, Venue, VenueQuery,
};
pub use response::{ApiEnvelope, Paging};
pub use scores::{ScoresApi, Sport};
