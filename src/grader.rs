//! Outcome grader (C10): resolves recorded signals against the closing line and
//! final score once a game completes.
//!
//! The tick shape mirrors the teacher's `PinnacleService::run` periodic loop:
//! `tokio::time::interval` driving a tick body that iterates sports and swallows
//! per-sport errors so one bad sport can't starve the others.

use crate::cache::Cache;
use crate::closing_line::ClosingLineService;
use crate::config::Config;
use crate::provider::OddsProvider;
use crate::registry::Registry;
use crate::store::HistoricalStore;
use crate::types::{GameEvent, MarketDefinition, MarketShape, Outcome, PeriodStructure};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn parse_commence_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn to_game_event(event: &crate::provider::types::ScoreEvent) -> Option<GameEvent> {
    if !event.completed {
        return None;
    }
    let scores = event.scores.as_ref()?;
    let home_score = scores
        .iter()
        .find(|s| s.name == event.home_team)
        .and_then(|s| s.score.parse::<i32>().ok());
    let away_score = scores
        .iter()
        .find(|s| s.name == event.away_team)
        .and_then(|s| s.score.parse::<i32>().ok());

    Some(GameEvent {
        event_id: event.id.clone(),
        sport_key: event.sport_key.clone(),
        commence_time: parse_commence_time(&event.commence_time),
        home_team: event.home_team.clone(),
        away_team: event.away_team.clone(),
        completed: event.completed,
        home_score,
        away_score,
        home_period_scores: None,
        away_period_scores: None,
    })
}

fn grade_over_under(total: f64, line: f64) -> Outcome {
    if total > line {
        Outcome::Extended
    } else if total < line {
        Outcome::Reverted
    } else {
        Outcome::Stable
    }
}

fn grade_spread(home_margin: f64, line_for_home: f64) -> Outcome {
    let adjusted = home_margin + line_for_home;
    if adjusted > 0.0 {
        Outcome::Extended
    } else if adjusted < 0.0 {
        Outcome::Reverted
    } else {
        Outcome::Stable
    }
}

/// `margin == 0` is a tie, which only `Stable`s out; otherwise the favorite (implied
/// by `line < 0`) winning is `Stable`, anything else is `Reverted`. Per spec, a
/// moneyline grade never yields `Extended`.
fn grade_moneyline(home_margin: i32, line: f64) -> Outcome {
    if home_margin == 0 {
        return Outcome::Stable;
    }
    let home_won = home_margin > 0;
    let favorite_is_home = line < 0.0;
    if home_won == favorite_is_home {
        Outcome::Stable
    } else {
        Outcome::Reverted
    }
}

fn grade_draw_no_bet(home_margin: i32, line: f64) -> Outcome {
    if home_margin == 0 {
        Outcome::Stable
    } else {
        grade_moneyline(home_margin, line)
    }
}

fn grade_three_way(home_margin: i32, line: f64) -> Outcome {
    if home_margin == 0 {
        Outcome::Reverted
    } else {
        grade_moneyline(home_margin, line)
    }
}

/// The "yes" side is whichever direction `line > 0` implies; if the observed
/// condition matches that lean, the fingerprint's read on the market held
/// (`Extended`), otherwise it didn't (`Reverted`).
fn grade_yes_no(line: f64, condition_observed: bool) -> Outcome {
    let yes_bet = line > 0.0;
    if yes_bet == condition_observed {
        Outcome::Extended
    } else {
        Outcome::Reverted
    }
}

fn grade_unsupported_shape(shape: MarketShape, market_key: &str) -> Outcome {
    warn!(
        "grader: market shape {:?} ({}) has no defined grading rule, recording Stable",
        shape, market_key
    );
    Outcome::Stable
}

/// Looks up the half/quarter scores this market's `period` label names. Returns
/// `None` (and the caller skips grading) when the sport doesn't expose per-period
/// scores or the label isn't one of the recognized ones.
fn period_totals(game: &GameEvent, period_structure: PeriodStructure, period: &str) -> Option<(i32, i32)> {
    let home = game.home_period_scores.as_ref()?;
    let away = game.away_period_scores.as_ref()?;

    let indices: Vec<usize> = match (period_structure, period) {
        (PeriodStructure::Halves, "1H") => vec![0],
        (PeriodStructure::Halves, "2H") => vec![1],
        (PeriodStructure::Quarters, "1Q") => vec![0],
        (PeriodStructure::Quarters, "2Q") => vec![1],
        (PeriodStructure::Quarters, "3Q") => vec![2],
        (PeriodStructure::Quarters, "4Q") => vec![3],
        (PeriodStructure::Quarters, "1H") => vec![0, 1],
        (PeriodStructure::Quarters, "2H") => vec![2, 3],
        _ => return None,
    };

    let home_total: i32 = indices.iter().filter_map(|&i| home.get(i)).sum();
    let away_total: i32 = indices.iter().filter_map(|&i| away.get(i)).sum();
    Some((home_total, away_total))
}

fn grade_market(
    market_def: &MarketDefinition,
    game: &GameEvent,
    registry: &Registry,
    closing_line: f64,
) -> Option<Outcome> {
    let (home_score, away_score) = match &market_def.period {
        Some(period) => {
            if !registry.period_scores_available(&game.sport_key) {
                debug!(
                    "grader: sport {} has no per-period scores, skipping {}",
                    game.sport_key, market_def.key
                );
                return None;
            }
            let sport = registry.sports().into_iter().find(|s| s.key == game.sport_key)?;
            period_totals(game, sport.period_structure, period)?
        }
        None => (game.home_score?, game.away_score?),
    };

    let home_margin = home_score - away_score;
    let total = (home_score + away_score) as f64;

    Some(match market_def.shape {
        MarketShape::OverUnder => grade_over_under(total, closing_line),
        MarketShape::Spread => grade_spread(home_margin as f64, closing_line),
        MarketShape::Moneyline => grade_moneyline(home_margin, closing_line),
        MarketShape::DrawNoBet => grade_draw_no_bet(home_margin, closing_line),
        MarketShape::ThreeWay => grade_three_way(home_margin, closing_line),
        MarketShape::BothTeamsToScore => grade_yes_no(closing_line, home_score > 0 && away_score > 0),
        MarketShape::TeamTotal | MarketShape::OddEven => {
            grade_unsupported_shape(market_def.shape, &market_def.key)
        }
    })
}

pub struct Grader {
    provider: Arc<dyn OddsProvider>,
    store: Arc<dyn HistoricalStore>,
    cache: Arc<Cache>,
    registry: Arc<Registry>,
    config: Arc<Config>,
}

impl Grader {
    pub fn new(
        provider: Arc<dyn OddsProvider>,
        store: Arc<dyn HistoricalStore>,
        cache: Arc<Cache>,
        registry: Arc<Registry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            registry,
            config,
        }
    }

    pub async fn run_forever(self: Arc<Self>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.grader_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let deadline = self.config.grader_interval();
                    match tokio::time::timeout(deadline, self.run_tick(&cancellation)).await {
                        Ok(()) => {}
                        Err(_) => warn!("grader: tick exceeded its deadline, treating as past due"),
                    }
                }
                _ = cancellation.cancelled() => {
                    info!("grader: shutting down");
                    return;
                }
            }
        }
    }

    pub async fn run_tick(&self, cancellation: &CancellationToken) {
        for sport in self.registry.active_sports() {
            if cancellation.is_cancelled() {
                return;
            }
            if let Err(e) = self.grade_sport(&sport.key).await {
                error!("grader: sport {} failed: {}", sport.key, e);
            }
        }
    }

    async fn grade_sport(&self, sport_key: &str) -> Result<(), crate::error::BoxError> {
        let completed = self.provider.list_scores(sport_key, 3).await?;

        for score_event in completed {
            let Some(game) = to_game_event(&score_event) else {
                continue;
            };

            for market_def in self.registry.markets_for_sport(sport_key) {
                if market_def.is_player_prop || market_def.is_alternate {
                    continue;
                }

                let Some(closing) = ClosingLineService::get(&game.event_id, &market_def.key, &self.cache) else {
                    continue;
                };

                let Some(outcome) = grade_market(&market_def, &game, &self.registry, closing.line) else {
                    continue;
                };

                let signals = self
                    .store
                    .signals_for_event(&game.event_id, &market_def.key)
                    .await?;

                for signal in signals.into_iter().filter(|s| s.outcome.is_none()) {
                    if let Some(id) = signal.id {
                        self.store.update_signal(id, closing.line, outcome).await?;
                    }
                }

                ClosingLineService::delete(&game.event_id, &market_def.key, &self.cache);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(home: i32, away: i32) -> GameEvent {
        GameEvent {
            event_id: "e1".into(),
            sport_key: "americanfootball_nfl".into(),
            commence_time: Utc::now(),
            home_team: "Home".into(),
            away_team: "Away".into(),
            completed: true,
            home_score: Some(home),
            away_score: Some(away),
            home_period_scores: None,
            away_period_scores: None,
        }
    }

    #[test]
    fn total_grading_matches_scenario() {
        assert_eq!(grade_over_under(52.0, 47.5), Outcome::Extended);
        assert_eq!(grade_over_under(44.0, 47.5), Outcome::Reverted);
        assert_eq!(grade_over_under(47.0, 47.0), Outcome::Stable);
    }

    #[test]
    fn spread_grading_matches_scenario() {
        // Home −3.5, wins by 7: adjusted margin = 7 + (−3.5) = 3.5 > 0 → Extended.
        assert_eq!(grade_spread(7.0, -3.5), Outcome::Extended);
        // Wins by 3: adjusted = 3 + (−3.5) = −0.5 < 0 → Reverted.
        assert_eq!(grade_spread(3.0, -3.5), Outcome::Reverted);
        // Integer line allows a push.
        assert_eq!(grade_spread(3.0, -3.0), Outcome::Stable);
    }

    #[test]
    fn moneyline_never_extends() {
        assert_eq!(grade_moneyline(0, -150.0), Outcome::Stable);
        assert_eq!(grade_moneyline(10, -150.0), Outcome::Stable);
        assert_eq!(grade_moneyline(-10, -150.0), Outcome::Reverted);
    }

    #[test]
    fn draw_no_bet_treats_draw_as_stable() {
        assert_eq!(grade_draw_no_bet(0, -120.0), Outcome::Stable);
        assert_eq!(grade_draw_no_bet(-5, -120.0), Outcome::Reverted);
    }

    #[test]
    fn three_way_treats_draw_as_reverted() {
        assert_eq!(grade_three_way(0, -120.0), Outcome::Reverted);
        assert_eq!(grade_three_way(5, -120.0), Outcome::Stable);
    }

    #[test]
    fn unsupported_shapes_fall_back_to_stable() {
        assert_eq!(grade_unsupported_shape(MarketShape::TeamTotal, "team_totals"), Outcome::Stable);
        assert_eq!(grade_unsupported_shape(MarketShape::OddEven, "odd_even"), Outcome::Stable);
    }

    #[test]
    fn missing_score_skips_grading() {
        let mut g = game(24, 28);
        g.home_score = None;
        let market = MarketDefinition {
            key: "totals".into(),
            display_name: "Total".into(),
            category: "game".into(),
            outcome_type: crate::types::OutcomeType::OverUnder,
            shape: MarketShape::OverUnder,
            required_tier: crate::types::SubscriptionTier::Starter,
            is_player_prop: false,
            is_alternate: false,
            period: None,
            keywords: vec![],
        };
        let registry = Registry::seeded(Arc::new(Cache::new()));
        assert!(grade_market(&market, &g, &registry, 47.5).is_none());
    }
}
