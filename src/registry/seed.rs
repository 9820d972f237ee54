//! Hand-curated embedded seed data.
//!
//! A live deployment sources sports/markets/bookmakers from the out-of-scope
//! reference-data loader; this crate embeds a small representative slice so the
//! pipeline is runnable standalone, the same way the teacher's `PinnacleDbService`
//! preloads `known_leagues` once at startup rather than re-querying per event.

use crate::types::{
    BookTier, Bookmaker, MarketDefinition, MarketShape, OutcomeType, PeriodStructure, Sport,
    SubscriptionTier,
};

pub fn seed_sports() -> Vec<Sport> {
    vec![
        Sport {
            key: "americanfootball_nfl".to_string(),
            display_name: "NFL".to_string(),
            category: "American Football".to_string(),
            period_structure: PeriodStructure::Quarters,
            is_active: true,
            keywords: vec!["nfl".to_string(), "football".to_string()],
        },
        Sport {
            key: "basketball_nba".to_string(),
            display_name: "NBA".to_string(),
            category: "Basketball".to_string(),
            period_structure: PeriodStructure::Quarters,
            is_active: true,
            keywords: vec!["nba".to_string(), "basketball".to_string()],
        },
        Sport {
            key: "baseball_mlb".to_string(),
            display_name: "MLB".to_string(),
            category: "Baseball".to_string(),
            period_structure: PeriodStructure::Innings,
            is_active: true,
            keywords: vec!["mlb".to_string(), "baseball".to_string()],
        },
        Sport {
            key: "icehockey_nhl".to_string(),
            display_name: "NHL".to_string(),
            category: "Ice Hockey".to_string(),
            period_structure: PeriodStructure::Periods,
            is_active: true,
            keywords: vec!["nhl".to_string(), "hockey".to_string()],
        },
        Sport {
            key: "soccer_epl".to_string(),
            display_name: "Premier League".to_string(),
            category: "Soccer".to_string(),
            period_structure: PeriodStructure::Halves,
            is_active: true,
            keywords: vec!["epl".to_string(), "premier league".to_string(), "soccer".to_string()],
        },
    ]
}

fn mkt(
    key: &str,
    display_name: &str,
    category: &str,
    outcome_type: OutcomeType,
    shape: MarketShape,
    required_tier: SubscriptionTier,
    is_player_prop: bool,
    is_alternate: bool,
    period: Option<&str>,
    keywords: &[&str],
) -> MarketDefinition {
    MarketDefinition {
        key: key.to_string(),
        display_name: display_name.to_string(),
        category: category.to_string(),
        outcome_type,
        shape,
        required_tier,
        is_player_prop,
        is_alternate,
        period: period.map(str::to_string),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn seed_markets() -> Vec<MarketDefinition> {
    vec![
        mkt(
            "h2h",
            "Moneyline",
            "Game Lines",
            OutcomeType::TeamBased,
            MarketShape::Moneyline,
            SubscriptionTier::Starter,
            false,
            false,
            None,
            &["moneyline", "ml", "h2h"],
        ),
        mkt(
            "spreads",
            "Point Spread",
            "Game Lines",
            OutcomeType::TeamBased,
            MarketShape::Spread,
            SubscriptionTier::Starter,
            false,
            false,
            None,
            &["spread", "spreads", "handicap", "ats"],
        ),
        mkt(
            "totals",
            "Total Points",
            "Game Lines",
            OutcomeType::OverUnder,
            MarketShape::OverUnder,
            SubscriptionTier::Starter,
            false,
            false,
            None,
            &["total", "totals", "over/under", "o/u"],
        ),
        mkt(
            "draw_no_bet",
            "Draw No Bet",
            "Game Lines",
            OutcomeType::TeamBased,
            MarketShape::DrawNoBet,
            SubscriptionTier::Core,
            false,
            false,
            None,
            &["dnb", "draw no bet"],
        ),
        mkt(
            "btts",
            "Both Teams to Score",
            "Game Lines",
            OutcomeType::YesNo,
            MarketShape::BothTeamsToScore,
            SubscriptionTier::Core,
            false,
            false,
            None,
            &["btts", "both teams to score"],
        ),
        mkt(
            "h2h_3_way",
            "3-Way Moneyline",
            "Game Lines",
            OutcomeType::Named,
            MarketShape::ThreeWay,
            SubscriptionTier::Core,
            false,
            false,
            None,
            &["3 way", "three way", "1x2"],
        ),
        mkt(
            "spreads_1h",
            "1st Half Spread",
            "Period Lines",
            OutcomeType::TeamBased,
            MarketShape::Spread,
            SubscriptionTier::Core,
            false,
            false,
            Some("1H"),
            &["first half spread", "1h spread"],
        ),
        mkt(
            "totals_1h",
            "1st Half Total",
            "Period Lines",
            OutcomeType::OverUnder,
            MarketShape::OverUnder,
            SubscriptionTier::Core,
            false,
            false,
            Some("1H"),
            &["first half total", "1h total"],
        ),
        mkt(
            "spreads_alternate",
            "Alternate Spread",
            "Alternates",
            OutcomeType::TeamBased,
            MarketShape::Spread,
            SubscriptionTier::Sharp,
            false,
            true,
            None,
            &["alt spread", "alternate spread"],
        ),
        mkt(
            "player_points_over_under",
            "Player Points O/U",
            "Player Props",
            OutcomeType::OverUnder,
            MarketShape::OverUnder,
            SubscriptionTier::Sharp,
            true,
            false,
            None,
            &["player points", "points prop"],
        ),
        mkt(
            "player_pass_yds_over_under",
            "Player Passing Yards O/U",
            "Player Props",
            OutcomeType::OverUnder,
            MarketShape::OverUnder,
            SubscriptionTier::Sharp,
            true,
            false,
            None,
            &["passing yards", "pass yds prop"],
        ),
    ]
}

fn bk(
    key: &str,
    display_name: &str,
    tier: BookTier,
    required_tier: SubscriptionTier,
    region: &str,
    keywords: &[&str],
) -> Bookmaker {
    Bookmaker {
        key: key.to_string(),
        display_name: display_name.to_string(),
        tier,
        required_tier,
        region: region.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn seed_bookmakers() -> Vec<Bookmaker> {
    vec![
        bk(
            "pinnacle",
            "Pinnacle",
            BookTier::Sharp,
            SubscriptionTier::Sharp,
            "eu",
            &["pinnacle"],
        ),
        bk(
            "circa",
            "Circa Sports",
            BookTier::Sharp,
            SubscriptionTier::Sharp,
            "us",
            &["circa"],
        ),
        bk(
            "betcris",
            "BetCRIS",
            BookTier::Sharp,
            SubscriptionTier::Sharp,
            "us",
            &["betcris"],
        ),
        bk(
            "draftkings",
            "DraftKings",
            BookTier::Market,
            SubscriptionTier::Core,
            "us",
            &["draftkings", "dk"],
        ),
        bk(
            "fanduel",
            "FanDuel",
            BookTier::Market,
            SubscriptionTier::Core,
            "us",
            &["fanduel", "fd"],
        ),
        bk(
            "betmgm",
            "BetMGM",
            BookTier::Market,
            SubscriptionTier::Core,
            "us",
            &["betmgm", "mgm"],
        ),
        bk(
            "caesars",
            "Caesars",
            BookTier::Retail,
            SubscriptionTier::Starter,
            "us",
            &["caesars"],
        ),
        bk(
            "bet365",
            "Bet365",
            BookTier::Retail,
            SubscriptionTier::Starter,
            "uk",
            &["bet365"],
        ),
        bk(
            "pointsbet",
            "PointsBet",
            BookTier::Retail,
            SubscriptionTier::Starter,
            "us",
            &["pointsbet"],
        ),
    ]
}
