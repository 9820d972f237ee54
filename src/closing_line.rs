//! Closing-line capture and lookup (§4.9 step 4, §4.10 step 2).
//!
//! First-write-wins: once a closing-line record exists for `(event, market)`, later
//! ticks inside the same capture window are no-ops, so poller restarts or overlapping
//! ticks can't clobber the recorded line.

use crate::cache::Cache;
use crate::config::Config;
use crate::types::{ClosingLineRecord, GameEvent};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

pub struct ClosingLineService;

impl ClosingLineService {
    /// Writes a closing-line record iff `event.commence_time` is within
    /// `(now, now + closingWindow]` and no record exists yet for this market.
    pub fn maybe_capture(
        event: &GameEvent,
        market_key: &str,
        consensus_line: f64,
        cache: &Cache,
        config: &Config,
        now: DateTime<Utc>,
    ) {
        let until_commence = event.commence_time - now;
        let window = ChronoDuration::minutes(config.closing_line_window_minutes);
        if until_commence <= ChronoDuration::zero() || until_commence > window {
            return;
        }

        let key = Cache::closing_line_key(&event.event_id, market_key);
        if cache.contains(&key) {
            return;
        }

        let record = ClosingLineRecord {
            event_id: event.event_id.clone(),
            market_key: market_key.to_string(),
            line: consensus_line,
            recorded_at: now,
        };
        cache.set(
            &key,
            &record,
            Duration::from_secs((config.closing_line_ttl_hours.max(0) as u64) * 3600),
        );
    }

    pub fn get(event_id: &str, market_key: &str, cache: &Cache) -> Option<ClosingLineRecord> {
        cache.get(&Cache::closing_line_key(event_id, market_key))
    }

    pub fn delete(event_id: &str, market_key: &str, cache: &Cache) {
        cache.remove(&Cache::closing_line_key(event_id, market_key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            provider_base_url: String::new(),
            provider_api_key: String::new(),
            provider_request_timeout_secs: 10,
            provider_historical_sample_delay_ms: 100,
            server_port: 8080,
            poller_base_interval_secs: 60,
            poller_player_prop_every_nth_tick: 5,
            grader_interval_secs: 900,
            closing_line_window_minutes: 5,
            closing_line_ttl_hours: 8,
            alert_default_cooldown_minutes: 15,
            alert_high_priority_cooldown_minutes: 5,
            alert_urgent_cooldown_minutes: 2,
            alert_dedupe_window_minutes: 60,
            alert_min_delta_for_sharp: 0.5,
            alert_min_delta_for_movement: 1.0,
            alert_min_books_for_consensus: 5,
            alert_reversal_window_minutes: 5,
            confidence_sharp_mover_score: 25,
            confidence_market_mover_score: 15,
            confidence_retail_mover_score: 5,
            confidence_high_velocity_threshold: 2.0,
            confidence_medium_velocity_threshold: 0.5,
            confidence_high_confirmation_threshold: 5,
            confidence_medium_confirmation_threshold: 3,
            confidence_high_stability_minutes: 60,
            confidence_medium_stability_minutes: 15,
            cache_default_ttl_secs: 300,
            cache_fingerprint_ttl_secs: 3600,
            cache_confidence_ttl_secs: 300,
            cache_ai_explanation_ttl_secs: 86400,
            cache_subscription_ttl_secs: 3600,
        }
    }

    fn event(commence_in_minutes: i64) -> GameEvent {
        let now = Utc::now();
        GameEvent {
            event_id: "e1".into(),
            sport_key: "americanfootball_nfl".into(),
            commence_time: now + ChronoDuration::minutes(commence_in_minutes),
            home_team: "Home".into(),
            away_team: "Away".into(),
            completed: false,
            home_score: None,
            away_score: None,
            home_period_scores: None,
            away_period_scores: None,
        }
    }

    #[test]
    fn captures_within_window_once() {
        let cache = Cache::new();
        let cfg = config();
        let ev = event(3);
        let now = Utc::now();
        ClosingLineService::maybe_capture(&ev, "spreads", 3.5, &cache, &cfg, now);
        let record = ClosingLineService::get("e1", "spreads", &cache).unwrap();
        assert_eq!(record.line, 3.5);

        // Second capture attempt with a different line must not overwrite.
        ClosingLineService::maybe_capture(&ev, "spreads", 9.0, &cache, &cfg, now);
        let record = ClosingLineService::get("e1", "spreads", &cache).unwrap();
        assert_eq!(record.line, 3.5);
    }

    #[test]
    fn outside_window_does_not_capture() {
        let cache = Cache::new();
        let cfg = config();
        let ev = event(60);
        ClosingLineService::maybe_capture(&ev, "spreads", 3.5, &cache, &cfg, Utc::now());
        assert!(ClosingLineService::get("e1", "spreads", &cache).is_none());
    }

    #[test]
    fn delete_removes_record() {
        let cache = Cache::new();
        let cfg = config();
        let ev = event(2);
        let now = Utc::now();
        ClosingLineService::maybe_capture(&ev, "totals", 47.5, &cache, &cfg, now);
        assert!(ClosingLineService::get("e1", "totals", &cache).is_some());
        ClosingLineService::delete("e1", "totals", &cache);
        assert!(ClosingLineService::get("e1", "totals", &cache).is_none());
    }
}
