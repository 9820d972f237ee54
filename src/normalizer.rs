//! External event → uniform per-book snapshots per market (C4).
//!
//! Mirrors the field-mapping style of the teacher's `odds-processor::db::row_to_odds_update`
//! (conditionally pull fields out of a loosely-typed external shape into a typed
//! internal one, skip silently on anything missing) generalized from the teacher's
//! fixed football-odds columns to the market-shape dispatch spec §4.4 requires.

use crate::provider::types::ExternalEvent;
use crate::registry::Registry;
use crate::types::{BookSnapshot, MarketDefinition, MarketShape, OutcomeType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

fn parse_last_update(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Normalizes one (event, market) pair into one `BookSnapshot` per book offering it.
/// Unknown books classify as `Retail` (via `Registry::bookmaker_tier`'s own default);
/// a book missing its primary outcome is skipped silently, per spec §4.4.
pub fn normalize(
    event: &ExternalEvent,
    market_def: &MarketDefinition,
    registry: &Registry,
) -> Vec<BookSnapshot> {
    if market_def.is_player_prop {
        return normalize_player_props(event, market_def, registry)
            .into_values()
            .flatten()
            .collect();
    }

    let mut snapshots = Vec::new();

    for bookmaker in &event.bookmakers {
        let Some(market) = bookmaker.markets.iter().find(|m| m.key == market_def.key) else {
            continue;
        };

        let Some(snapshot) = normalize_one_book(
            bookmaker.key.as_str(),
            market_def,
            market,
            registry,
            &event.home_team,
        ) else {
            debug!(
                "normalizer: skipping book {} for market {} (missing primary outcome)",
                bookmaker.key, market_def.key
            );
            continue;
        };

        snapshots.push(snapshot);
    }

    snapshots
}

fn normalize_one_book(
    bookmaker_key: &str,
    market_def: &MarketDefinition,
    market: &crate::provider::types::ExternalMarket,
    registry: &Registry,
    home_team: &str,
) -> Option<BookSnapshot> {
    let timestamp = parse_last_update(&market.last_update);
    let tier = registry.bookmaker_tier(bookmaker_key);

    let (line, primary_odds, secondary_odds) = match market_def.outcome_type {
        OutcomeType::OverUnder => {
            let over = market.outcomes.iter().find(|o| o.name == "Over")?;
            let under = market.outcomes.iter().find(|o| o.name == "Under");
            (
                over.point.unwrap_or(0.0),
                over.price.round() as i32,
                under.map(|u| u.price.round() as i32).unwrap_or(0),
            )
        }
        OutcomeType::TeamBased => match market_def.shape {
            MarketShape::Spread => {
                // Primary = home, secondary = away; line = home's point, per spec §4.4.
                let home = market
                    .outcomes
                    .iter()
                    .find(|o| o.name == home_team)
                    .or_else(|| market.outcomes.first())?;
                let away = market.outcomes.iter().find(|o| o.name != home.name);
                (
                    home.point.unwrap_or(0.0),
                    home.price.round() as i32,
                    away.map(|a| a.price.round() as i32).unwrap_or(0),
                )
            }
            MarketShape::Moneyline | MarketShape::DrawNoBet => {
                if market.outcomes.len() < 2 {
                    return None;
                }
                let home = market
                    .outcomes
                    .iter()
                    .find(|o| o.name == home_team)
                    .unwrap_or(&market.outcomes[0]);
                let away = market.outcomes.iter().find(|o| o.name != home.name)?;
                // `line` carries the signed American price for moneylines (spec §3);
                // the grader's favorite check (`line < 0.0`) and consensus/delta
                // tracking both depend on this being the real price, not a constant.
                let home_price = home.price.round() as i32;
                (home_price as f64, home_price, away.price.round() as i32)
            }
            _ => {
                if market.outcomes.is_empty() {
                    return None;
                }
                let home = market
                    .outcomes
                    .iter()
                    .find(|o| o.name == home_team)
                    .unwrap_or(&market.outcomes[0]);
                let away = market.outcomes.iter().find(|o| o.name != home.name);
                (
                    home.point.unwrap_or(0.0),
                    home.price.round() as i32,
                    away.map(|a| a.price.round() as i32).unwrap_or(0),
                )
            }
        },
        OutcomeType::YesNo => {
            let yes = market.outcomes.iter().find(|o| o.name == "Yes")?;
            let no = market.outcomes.iter().find(|o| o.name == "No");
            (
                yes.price,
                yes.price.round() as i32,
                no.map(|n| n.price.round() as i32).unwrap_or(0),
            )
        }
        OutcomeType::Named => {
            if market.outcomes.is_empty() {
                return None;
            }
            let home = market
                .outcomes
                .iter()
                .find(|o| o.name == home_team)
                .unwrap_or(&market.outcomes[0]);
            let away = market.outcomes.iter().find(|o| o.name != home.name && o.name != "Draw");
            (
                home.point.unwrap_or(0.0),
                home.price.round() as i32,
                away.map(|a| a.price.round() as i32).unwrap_or(0),
            )
        }
    };

    Some(BookSnapshot {
        bookmaker_key: bookmaker_key.to_string(),
        bookmaker_tier: tier,
        timestamp,
        line,
        primary_odds,
        secondary_odds,
        player_name: None,
    })
}

/// Groups player-prop outcomes by the `description` field (the player's name), then
/// matches Over/Under descriptions per book, per spec §4.4.
fn normalize_player_props(
    event: &ExternalEvent,
    market_def: &MarketDefinition,
    registry: &Registry,
) -> HashMap<String, Vec<BookSnapshot>> {
    let mut by_player: HashMap<String, Vec<BookSnapshot>> = HashMap::new();

    for bookmaker in &event.bookmakers {
        let Some(market) = bookmaker.markets.iter().find(|m| m.key == market_def.key) else {
            continue;
        };
        let timestamp = parse_last_update(&market.last_update);
        let tier = registry.bookmaker_tier(&bookmaker.key);

        let mut players: HashMap<String, (Option<&crate::provider::types::ExternalOutcome>, Option<&crate::provider::types::ExternalOutcome>)> =
            HashMap::new();

        for outcome in &market.outcomes {
            let Some(player) = outcome.description.clone() else {
                continue;
            };
            let entry = players.entry(player).or_insert((None, None));
            if outcome.name == "Over" {
                entry.0 = Some(outcome);
            } else if outcome.name == "Under" {
                entry.1 = Some(outcome);
            }
        }

        for (player, (over, under)) in players {
            let Some(over) = over else {
                debug!(
                    "normalizer: skipping player {} for {} (missing Over outcome)",
                    player, market_def.key
                );
                continue;
            };

            let snapshot = BookSnapshot {
                bookmaker_key: bookmaker.key.clone(),
                bookmaker_tier: tier,
                timestamp,
                line: over.point.unwrap_or(0.0),
                primary_odds: over.price.round() as i32,
                secondary_odds: under.map(|u| u.price.round() as i32).unwrap_or(0),
                player_name: Some(player.clone()),
            };

            by_player.entry(player).or_default().push(snapshot);
        }
    }

    by_player
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::provider::types::{ExternalBookmaker, ExternalMarket, ExternalOutcome};
    use std::sync::Arc;

    fn registry() -> Registry {
        Registry::seeded(Arc::new(Cache::new()))
    }

    fn sample_event(market_key: &str, outcomes: Vec<ExternalOutcome>) -> ExternalEvent {
        ExternalEvent {
            id: "e1".to_string(),
            sport_key: "americanfootball_nfl".to_string(),
            commence_time: "2026-01-01T18:00:00Z".to_string(),
            home_team: "Home".to_string(),
            away_team: "Away".to_string(),
            bookmakers: vec![ExternalBookmaker {
                key: "draftkings".to_string(),
                title: "DraftKings".to_string(),
                last_update: "2026-01-01T17:00:00Z".to_string(),
                markets: vec![ExternalMarket {
                    key: market_key.to_string(),
                    last_update: "2026-01-01T17:00:00Z".to_string(),
                    outcomes,
                }],
            }],
        }
    }

    #[test]
    fn over_under_maps_point_and_both_prices() {
        let reg = registry();
        let event = sample_event(
            "totals",
            vec![
                ExternalOutcome { name: "Over".into(), price: -110.0, point: Some(47.5), description: None },
                ExternalOutcome { name: "Under".into(), price: -110.0, point: Some(47.5), description: None },
            ],
        );
        let market_def = reg.market_by_key("totals").unwrap();
        let snaps = normalize(&event, &market_def, &reg);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].line, 47.5);
        assert_eq!(snaps[0].primary_odds, -110);
        assert_eq!(snaps[0].secondary_odds, -110);
    }

    #[test]
    fn missing_primary_outcome_skips_book_silently() {
        let reg = registry();
        let event = sample_event("totals", vec![]);
        let market_def = reg.market_by_key("totals").unwrap();
        let snaps = normalize(&event, &market_def, &reg);
        assert!(snaps.is_empty());
    }

    #[test]
    fn unknown_book_defaults_to_retail_tier() {
        let reg = registry();
        let mut event = sample_event(
            "totals",
            vec![
                ExternalOutcome { name: "Over".into(), price: -105.0, point: Some(2.5), description: None },
            ],
        );
        event.bookmakers[0].key = "brand_new_book".to_string();
        let market_def = reg.market_by_key("totals").unwrap();
        let snaps = normalize(&event, &market_def, &reg);
        assert_eq!(snaps[0].bookmaker_tier, crate::types::BookTier::Retail);
    }

    #[test]
    fn moneyline_line_carries_signed_home_price_not_zero() {
        let reg = registry();
        let event = sample_event(
            "h2h",
            vec![
                ExternalOutcome { name: "Home".into(), price: -150.0, point: None, description: None },
                ExternalOutcome { name: "Away".into(), price: 130.0, point: None, description: None },
            ],
        );
        let market_def = reg.market_by_key("h2h").unwrap();
        let snaps = normalize(&event, &market_def, &reg);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].line, -150.0);
        assert_eq!(snaps[0].primary_odds, -150);
        assert_eq!(snaps[0].secondary_odds, 130);
    }

    #[test]
    fn player_props_group_by_description() {
        let reg = registry();
        let event = sample_event(
            "player_points_over_under",
            vec![
                ExternalOutcome { name: "Over".into(), price: -115.0, point: Some(24.5), description: Some("Player A".into()) },
                ExternalOutcome { name: "Under".into(), price: -105.0, point: Some(24.5), description: Some("Player A".into()) },
            ],
        );
        let market_def = reg.market_by_key("player_points_over_under").unwrap();
        let snaps = normalize(&event, &market_def, &reg);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].player_name.as_deref(), Some("Player A"));
        assert_eq!(snaps[0].line, 24.5);
    }
}
