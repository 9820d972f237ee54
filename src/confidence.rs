//! Confidence scoring (C6): deterministic pure function of a fingerprint.
//!
//! Kept free of cache/I-O dependencies so the teacher's "memoize by content hash"
//! pattern (see `odds-processor::calculations::fair_odds`, a pure function over a
//! typed input with no side effects) applies directly — callers decide whether to
//! cache on `fingerprint.content_hash`.

use crate::config::Config;
use crate::fingerprint::MarketFingerprint;
use crate::types::{BookTier, ConfidenceLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub total: u8,
    pub level: ConfidenceLevel,
    pub first_mover_component: u8,
    pub velocity_component: u8,
    pub confirmation_component: u8,
    pub stability_component: u8,
    pub explanation: String,
}

/// Interpolates a raw value into a 0-25 band: 0 below/at zero, 0->12 up to
/// `medium`, 12->25 from `medium` to `high`, capped at 25 beyond `high`.
fn banded_score(value: f64, medium: f64, high: f64) -> u8 {
    if value <= 0.0 {
        return 0;
    }
    if value >= high {
        return 25;
    }
    if value >= medium {
        let frac = (value - medium) / (high - medium);
        (12.0 + frac * 13.0).round() as u8
    } else {
        let frac = value / medium;
        (frac * 12.0).round() as u8
    }
}

/// Like `banded_score`, but the low band runs from `floor` (not 0) to `medium`,
/// for components whose low band spec text anchors at a nonzero count (confirming
/// books starts counting at 1, not 0).
fn banded_score_from_floor(value: f64, floor: f64, medium: f64, high: f64) -> u8 {
    if value <= floor {
        return 0;
    }
    if value >= high {
        return 25;
    }
    if value >= medium {
        let frac = (value - medium) / (high - medium);
        (12.0 + frac * 13.0).round() as u8
    } else {
        let frac = (value - floor) / (medium - floor);
        (frac * 12.0).round() as u8
    }
}

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn score(fingerprint: &MarketFingerprint, config: &Config) -> ConfidenceScore {
        let first_mover_component = match fingerprint.first_mover_tier {
            Some(BookTier::Sharp) => config.confidence_sharp_mover_score,
            Some(BookTier::Market) => config.confidence_market_mover_score,
            Some(BookTier::Retail) => config.confidence_retail_mover_score,
            None => 0,
        };

        let velocity_component = banded_score(
            fingerprint.velocity,
            config.confidence_medium_velocity_threshold,
            config.confidence_high_velocity_threshold,
        );

        let confirmation_component = banded_score_from_floor(
            fingerprint.confirming_books as f64,
            1.0,
            config.confidence_medium_confirmation_threshold as f64,
            config.confidence_high_confirmation_threshold as f64,
        );

        let stability_minutes =
            fingerprint.stability_window(fingerprint.timestamp).num_seconds() as f64 / 60.0;
        let stability_component = banded_score(
            stability_minutes,
            config.confidence_medium_stability_minutes as f64,
            config.confidence_high_stability_minutes as f64,
        );

        let total = first_mover_component
            .saturating_add(velocity_component)
            .saturating_add(confirmation_component)
            .saturating_add(stability_component);

        let level = if total >= 80 {
            ConfidenceLevel::High
        } else if total >= 50 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        let explanation = Self::explain(
            fingerprint,
            first_mover_component,
            velocity_component,
            confirmation_component,
            stability_component,
        );

        ConfidenceScore {
            total,
            level,
            first_mover_component,
            velocity_component,
            confirmation_component,
            stability_component,
            explanation,
        }
    }

    fn explain(
        fingerprint: &MarketFingerprint,
        first_mover: u8,
        velocity: u8,
        confirmation: u8,
        stability: u8,
    ) -> String {
        let mut parts = Vec::new();
        if first_mover > 0 {
            let book = fingerprint.first_mover_book.as_deref().unwrap_or("unknown");
            parts.push(format!("first mover {} (+{})", book, first_mover));
        }
        if velocity > 0 {
            parts.push(format!("velocity {:.2} pts/h (+{})", fingerprint.velocity, velocity));
        }
        if confirmation > 0 {
            parts.push(format!(
                "{} confirming books (+{})",
                fingerprint.confirming_books, confirmation
            ));
        }
        if stability > 0 {
            parts.push(format!("stable line (+{})", stability));
        }
        if parts.is_empty() {
            "no contributing signals".to_string()
        } else {
            parts.join(", ")
        }
    }
}
