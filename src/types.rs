use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// `Starter < Core < Sharp`. Governs market + book access and history depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubscriptionTier {
    Starter,
    Core,
    Sharp,
}

impl SubscriptionTier {
    pub fn historical_days(self) -> u32 {
        match self {
            SubscriptionTier::Starter => 1,
            SubscriptionTier::Core => 7,
            SubscriptionTier::Sharp => 30,
        }
    }
}

/// How a book is believed to lead or lag informed price discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookTier {
    Retail,
    Market,
    Sharp,
}

impl BookTier {
    /// Higher value wins first-mover tie-breaks.
    fn rank(self) -> u8 {
        match self {
            BookTier::Retail => 0,
            BookTier::Market => 1,
            BookTier::Sharp => 2,
        }
    }
}

impl PartialOrd for BookTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BookTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Period structure a sport is divided into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodStructure {
    Full,
    Halves,
    Quarters,
    Periods,
    Innings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sport {
    pub key: String,
    pub display_name: String,
    pub category: String,
    pub period_structure: PeriodStructure,
    pub is_active: bool,
    pub keywords: Vec<String>,
}

/// Shape of a market's outcomes, which drives both normalization and grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeType {
    TeamBased,
    OverUnder,
    YesNo,
    Named,
}

/// Sub-kind used where `TeamBased`/`Named` grading branches further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketShape {
    Spread,
    Moneyline,
    DrawNoBet,
    OverUnder,
    BothTeamsToScore,
    ThreeWay,
    TeamTotal,
    OddEven,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDefinition {
    pub key: String,
    pub display_name: String,
    pub category: String,
    pub outcome_type: OutcomeType,
    pub shape: MarketShape,
    pub required_tier: SubscriptionTier,
    pub is_player_prop: bool,
    pub is_alternate: bool,
    pub period: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    pub display_name: String,
    pub tier: BookTier,
    pub required_tier: SubscriptionTier,
    pub region: String,
    pub keywords: Vec<String>,
}

/// Per-book-per-market snapshot at one instant.
///
/// `timestamp` must be monotonic per `(event_id, market_key, bookmaker_key)`; `line`
/// semantics are market-shape-dependent (points for spreads/totals, signed American
/// price for moneylines) — the normalizer is authoritative on that mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bookmaker_key: String,
    pub bookmaker_tier: BookTier,
    pub timestamp: DateTime<Utc>,
    pub line: f64,
    pub primary_odds: i32,
    pub secondary_odds: i32,
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Extended,
    Reverted,
    Stable,
}

/// A recorded fingerprint+score pair that was surfaced as an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub id: Option<i64>,
    pub event_id: String,
    pub market_key: String,
    pub signal_time: DateTime<Utc>,
    pub game_time: DateTime<Utc>,
    pub line_at_signal: f64,
    pub confidence_level_at_signal: ConfidenceLevel,
    pub confidence_score_at_signal: u8,
    pub first_mover_book: Option<String>,
    pub first_mover_tier: Option<BookTier>,
    pub closing_line: Option<f64>,
    pub outcome: Option<Outcome>,
}

/// Closing-line record, written when a game is near kickoff and deleted after grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingLineRecord {
    pub event_id: String,
    pub market_key: String,
    pub line: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A game in progress or completed, as far as the pipeline needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub event_id: String,
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub completed: bool,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub home_period_scores: Option<Vec<i32>>,
    pub away_period_scores: Option<Vec<i32>>,
}
