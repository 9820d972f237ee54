//! Wire types for the external odds provider (consumed, not defined, by this system).
//!
//! Field shape follows spec §6 ("Required fields per event") and is modeled directly
//! on the teacher's `pinnacle::types` structs — plain `serde`-derived structs, `Option`
//! for anything that might be absent rather than a custom deserializer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalOutcome {
    pub name: String,
    pub price: f64,
    pub point: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalMarket {
    pub key: String,
    pub last_update: String,
    pub outcomes: Vec<ExternalOutcome>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalBookmaker {
    pub key: String,
    pub title: String,
    pub last_update: String,
    pub markets: Vec<ExternalMarket>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalEvent {
    pub id: String,
    pub sport_key: String,
    pub commence_time: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<ExternalBookmaker>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoricalOddsResponse {
    pub timestamp: String,
    pub previous_timestamp: Option<String>,
    pub next_timestamp: Option<String>,
    pub data: Vec<ExternalEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreEvent {
    pub id: String,
    pub sport_key: String,
    pub commence_time: String,
    pub completed: bool,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub scores: Option<Vec<ScoreEntry>>,
}

/// One point on a line-movement series: a historical or current snapshot tagged with
/// when it was taken.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineMovementSample {
    pub sampled_at: chrono::DateTime<chrono::Utc>,
    pub event: ExternalEvent,
}

/// Bookmaker/market matrix without prices, used for market-availability checks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketAvailability {
    pub bookmaker_key: String,
    pub market_keys: Vec<String>,
}
