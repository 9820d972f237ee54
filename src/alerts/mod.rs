//! Alert classification, dedupe, and cooldown state machine (C7).

pub mod sink;

use crate::cache::Cache;
use crate::config::Config;
use crate::confidence::ConfidenceScore;
use crate::fingerprint::MarketFingerprint;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub use sink::{AlertPayload, AlertSink, BroadcastAlertSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    SharpActivity,
    ConfidenceEscalation,
    ConsensusFormed,
    NewMovement,
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertPriority {
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertChannel {
    Sharp,
    Core,
}

/// Game identifiers + display context the outbound sink needs per spec §6, kept
/// separate from `MarketFingerprint` (which only knows `eventId`) so the alert
/// payload is self-contained without requiring the sink to re-look-up the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertGameContext {
    pub home_team: String,
    pub away_team: String,
    pub market_display_name: String,
    pub game_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAlert {
    pub alert_id: Uuid,
    pub fingerprint: MarketFingerprint,
    pub confidence: ConfidenceScore,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub target_channels: Vec<AlertChannel>,
    pub send_direct: bool,
    pub created_at: DateTime<Utc>,
    pub dedupe_key: String,
    pub home_team: String,
    pub away_team: String,
    pub market_display_name: String,
    pub game_time: DateTime<Utc>,
}

impl MarketAlert {
    /// Time remaining until kickoff at alert creation, per spec §6's
    /// "time-to-kickoff" payload field.
    pub fn time_to_kickoff(&self) -> ChronoDuration {
        self.game_time - self.created_at
    }
}

pub struct AlertEngine;

impl AlertEngine {
    /// Classifies `(fingerprint, confidence)` against the five ordered rules and
    /// returns the first match, or `None` after persisting the observed confidence
    /// level for the next tick's escalation check.
    pub fn evaluate(
        fingerprint: &MarketFingerprint,
        confidence: &ConfidenceScore,
        game_context: &AlertGameContext,
        cache: &Cache,
        config: &Config,
    ) -> Option<MarketAlert> {
        let scope_key = fingerprint.key_suffix();
        let prev_level = cache.get::<crate::types::ConfidenceLevel>(&Cache::alert_prevconfidence_key(&scope_key));

        let alert_type = Self::classify(fingerprint, confidence, prev_level, config)?;

        let priority = Self::priority_for(alert_type, confidence.level);
        let is_high = confidence.level == crate::types::ConfidenceLevel::High;
        let mut target_channels = Vec::new();
        if matches!(alert_type, AlertType::SharpActivity) || is_high {
            target_channels.push(AlertChannel::Sharp);
        }
        if is_high || confidence.level == crate::types::ConfidenceLevel::Medium {
            target_channels.push(AlertChannel::Core);
        }
        let send_direct = matches!(alert_type, AlertType::SharpActivity) || is_high;

        let dedupe_key = format!(
            "{}:{}:{:?}:{:?}",
            fingerprint.event_id, scope_key, alert_type, confidence.level
        );

        Some(MarketAlert {
            alert_id: Uuid::new_v4(),
            fingerprint: fingerprint.clone(),
            confidence: confidence.clone(),
            alert_type,
            priority,
            target_channels,
            send_direct,
            created_at: fingerprint.timestamp,
            dedupe_key,
            home_team: game_context.home_team.clone(),
            away_team: game_context.away_team.clone(),
            market_display_name: game_context.market_display_name.clone(),
            game_time: game_context.game_time,
        })
    }

    fn classify(
        fingerprint: &MarketFingerprint,
        confidence: &ConfidenceScore,
        prev_level: Option<crate::types::ConfidenceLevel>,
        config: &Config,
    ) -> Option<AlertType> {
        use crate::types::ConfidenceLevel::*;

        if fingerprint.first_mover_tier == Some(crate::types::BookTier::Sharp)
            && fingerprint.delta_magnitude >= config.alert_min_delta_for_sharp
        {
            return Some(AlertType::SharpActivity);
        }

        if confidence.level == High && prev_level != Some(High) {
            return Some(AlertType::ConfidenceEscalation);
        }

        if fingerprint.confirming_books >= config.alert_min_books_for_consensus
            && matches!(confidence.level, Medium | High)
        {
            return Some(AlertType::ConsensusFormed);
        }

        if fingerprint.delta_magnitude >= config.alert_min_delta_for_movement {
            return Some(AlertType::NewMovement);
        }

        // Only a genuine sign-flip this tick moves `last_reversal_time` off
        // `fingerprint_start`; a brand-new fingerprint has both set to `now` and must
        // not read as a reversal just because its stability window is young.
        let reversed_this_tick = fingerprint.last_reversal_time != fingerprint.fingerprint_start;
        let reversal_window = ChronoDuration::minutes(config.alert_reversal_window_minutes);
        if reversed_this_tick && fingerprint.stability_window(fingerprint.timestamp) <= reversal_window {
            return Some(AlertType::Reversal);
        }

        None
    }

    fn priority_for(alert_type: AlertType, level: crate::types::ConfidenceLevel) -> AlertPriority {
        use crate::types::ConfidenceLevel::High;
        match (alert_type, level) {
            (AlertType::SharpActivity, High) => AlertPriority::Urgent,
            (AlertType::SharpActivity, _) => AlertPriority::High,
            (AlertType::ConfidenceEscalation, _) => AlertPriority::High,
            (AlertType::ConsensusFormed, High) => AlertPriority::High,
            (AlertType::Reversal, _) => AlertPriority::High,
            _ => AlertPriority::Normal,
        }
    }

    /// True iff no dedupe entry exists for `alert.dedupe_key` and the priority's
    /// cooldown has elapsed since the last send for that key.
    pub fn should_send(alert: &MarketAlert, cache: &Cache, config: &Config, now: DateTime<Utc>) -> bool {
        if cache.contains(&Cache::alert_dedupe_key(&alert.dedupe_key)) {
            return false;
        }

        let cooldown = ChronoDuration::minutes(match alert.priority {
            AlertPriority::Urgent => config.alert_urgent_cooldown_minutes,
            AlertPriority::High => config.alert_high_priority_cooldown_minutes,
            AlertPriority::Normal => config.alert_default_cooldown_minutes,
        });

        match cache.get::<DateTime<Utc>>(&Cache::alert_lasttime_key(&alert.dedupe_key)) {
            Some(last_sent) => now - last_sent >= cooldown,
            None => true,
        }
    }

    /// Writes the dedupe entry, last-sent timestamp, and updates the stored
    /// confidence level used by the next tick's escalation check.
    pub fn mark_sent(alert: &MarketAlert, cache: &Cache, config: &Config, now: DateTime<Utc>) {
        cache.set(
            &Cache::alert_dedupe_key(&alert.dedupe_key),
            &true,
            Duration::from_secs((config.alert_dedupe_window_minutes.max(0) as u64) * 60),
        );
        cache.set(&Cache::alert_lasttime_key(&alert.dedupe_key), &now, Duration::from_secs(86_400));
        cache.set(
            &Cache::alert_prevconfidence_key(&alert.fingerprint.key_suffix()),
            &alert.confidence.level,
            Duration::from_secs(86_400),
        );
    }

    /// Persists the observed level when no alert rule fired, so the next tick's
    /// `ConfidenceEscalation` check has a baseline to compare against.
    pub fn record_observed_level(fingerprint: &MarketFingerprint, level: crate::types::ConfidenceLevel, cache: &Cache) {
        cache.set(
            &Cache::alert_prevconfidence_key(&fingerprint.key_suffix()),
            &level,
            Duration::from_secs(86_400),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceScore;
    use crate::fingerprint::BookLine;
    use crate::types::{BookTier, ConfidenceLevel};

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

    fn fp(delta: f64, first_mover_tier: Option<BookTier>, confirming: usize, reversed_now: bool) -> MarketFingerprint {
        let now = Utc::now();
        MarketFingerprint {
            event_id: "e1".into(),
            market_key: "spreads".into(),
            player_slug: None,
            timestamp: now,
            consensus_line: 3.0,
            previous_consensus_line: 3.0 - delta,
            delta_magnitude: delta,
            velocity: 1.0,
            first_mover_book: first_mover_tier.map(|_| "sharpA".to_string()),
            first_mover_tier,
            first_move_time: Some(now),
            confirming_books: confirming,
            last_reversal_time: if reversed_now { now } else { now - chrono::Duration::hours(2) },
            fingerprint_start: now - chrono::Duration::hours(3),
            retail_lag_seconds: None,
            content_hash: "abc1234567890123".into(),
            book_lines: Vec::<BookLine>::new(),
        }
    }

    fn game_ctx() -> AlertGameContext {
        AlertGameContext {
            home_team: "Home".into(),
            away_team: "Away".into(),
            market_display_name: "Spread".into(),
            game_time: Utc::now() + chrono::Duration::hours(3),
        }
    }

    fn score(level: ConfidenceLevel) -> ConfidenceScore {
        let total = match level {
            ConfidenceLevel::Low => 10,
            ConfidenceLevel::Medium => 60,
            ConfidenceLevel::High => 90,
        };
        ConfidenceScore {
            total,
            level,
            first_mover_component: 0,
            velocity_component: 0,
            confirmation_component: 0,
            stability_component: 0,
            explanation: "test".into(),
        }
    }

    #[test]
    fn sharp_first_mover_wins_over_other_rules() {
        let f = fp(1.5, Some(BookTier::Sharp), 6, false);
        let c = score(ConfidenceLevel::High);
        let cache = Cache::new();
        let alert = AlertEngine::evaluate(&f, &c, &game_ctx(), &cache, &config()).unwrap();
        assert_eq!(alert.alert_type, AlertType::SharpActivity);
        assert_eq!(alert.priority, AlertPriority::Urgent);
        assert!(alert.send_direct);
    }

    #[test]
    fn dedupe_blocks_repeat_send_within_window() {
        let f = fp(1.5, Some(BookTier::Sharp), 1, false);
        let c = score(ConfidenceLevel::Low);
        let cache = Cache::new();
        let cfg = config();
        let alert = AlertEngine::evaluate(&f, &c, &game_ctx(), &cache, &cfg).unwrap();
        let now = alert.created_at;
        assert!(AlertEngine::should_send(&alert, &cache, &cfg, now));
        AlertEngine::mark_sent(&alert, &cache, &cfg, now);
        assert!(!AlertEngine::should_send(&alert, &cache, &cfg, now));
    }

    #[test]
    fn confidence_escalation_fires_once_then_no_repeat_until_drop() {
        let cache = Cache::new();
        let cfg = config();
        let f = fp(0.0, None, 0, false);
        let low = score(ConfidenceLevel::Low);
        AlertEngine::record_observed_level(&f, low.level, &cache);

        let high = score(ConfidenceLevel::High);
        let alert = AlertEngine::evaluate(&f, &high, &game_ctx(), &cache, &cfg).unwrap();
        assert_eq!(alert.alert_type, AlertType::ConfidenceEscalation);
        AlertEngine::mark_sent(&alert, &cache, &cfg, alert.created_at);

        // Second evaluation at High again should not re-fire ConfidenceEscalation,
        // since the stored level is now High.
        let second = AlertEngine::evaluate(&f, &high, &game_ctx(), &cache, &cfg);
        assert!(second.map(|a| a.alert_type) != Some(AlertType::ConfidenceEscalation));
    }

    #[test]
    fn reversal_detected_when_reversal_time_is_now() {
        let f = fp(0.0, None, 0, true);
        let c = score(ConfidenceLevel::Low);
        let cache = Cache::new();
        let alert = AlertEngine::evaluate(&f, &c, &game_ctx(), &cache, &config()).unwrap();
        assert_eq!(alert.alert_type, AlertType::Reversal);
    }

    #[test]
    fn no_rule_matches_returns_none() {
        let f = fp(0.0, None, 0, false);
        let c = score(ConfidenceLevel::Low);
        let cache = Cache::new();
        assert!(AlertEngine::evaluate(&f, &c, &game_ctx(), &cache, &config()).is_none());
    }

    #[test]
    fn brand_new_fingerprint_does_not_spuriously_reverse() {
        use crate::fingerprint::FingerprintService;

        let t0 = Utc::now();
        let snaps = vec![crate::types::BookSnapshot {
            bookmaker_key: "retail".into(),
            bookmaker_tier: BookTier::Retail,
            timestamp: t0,
            line: 3.0,
            primary_odds: -110,
            secondary_odds: -110,
            player_name: None,
        }];
        // No `prev`: `last_reversal_time == fingerprint_start == t0` by construction.
        let f = FingerprintService::create("e1", "spreads", None, &snaps, None, t0).unwrap();
        let c = score(ConfidenceLevel::Low);
        let cache = Cache::new();
        assert!(AlertEngine::evaluate(&f, &c, &game_ctx(), &cache, &config()).is_none());
    }
}
