//! Market fingerprinting (C5): consensus line, first-mover, velocity, confirmation,
//! stability, content hash.
//!
//! Pure-ish deterministic computation given the current snapshots and the previous
//! fingerprint — no I/O. Grounded in the teacher's `odds-processor::cache` module,
//! which keeps a per-bookmaker ring buffer (`history`, newest-first, capped) purely to
//! diff against the previous reading; here that same "keep the previous reading around
//! to diff against" idea is folded directly into `MarketFingerprint::book_lines`
//! instead of a separate history buffer, since only one prior reading is ever needed.

use crate::error::PipelineError;
use crate::types::{BookSnapshot, BookTier};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookLine {
    pub bookmaker_key: String,
    pub line: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFingerprint {
    pub event_id: String,
    pub market_key: String,
    pub player_slug: Option<String>,
    pub timestamp: DateTime<Utc>,

    pub consensus_line: f64,
    pub previous_consensus_line: f64,
    pub delta_magnitude: f64,
    pub velocity: f64,

    pub first_mover_book: Option<String>,
    pub first_mover_tier: Option<BookTier>,
    pub first_move_time: Option<DateTime<Utc>>,

    pub confirming_books: usize,

    pub last_reversal_time: DateTime<Utc>,
    pub fingerprint_start: DateTime<Utc>,

    pub retail_lag_seconds: Option<i64>,

    pub content_hash: String,

    /// Per-book lines at this reading, retained so the *next* reading can diff
    /// against it for first-mover detection and so `content_hash` is reproducible.
    pub book_lines: Vec<BookLine>,
}

impl MarketFingerprint {
    pub fn stability_window(&self, now: DateTime<Utc>) -> ChronoDuration {
        now - self.last_reversal_time
    }

    /// Cache key scope: player props use `marketKey:playerSlug`, never the bare
    /// game-level key, per spec §9 ("reuse of the game-level path... is a latent bug").
    pub fn key_suffix(&self) -> String {
        match &self.player_slug {
            Some(slug) => format!("{}:{}", self.market_key, slug),
            None => self.market_key.clone(),
        }
    }
}

const MOVE_THRESHOLD: f64 = 0.5;
const CONFIRM_THRESHOLD: f64 = 0.5;

fn lower_median(mut lines: Vec<f64>) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    lines.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    lines[(lines.len() - 1) / 2]
}

fn canonical_hash_input(
    consensus_line: f64,
    first_mover_book: &Option<String>,
    confirming_books: usize,
    book_lines: &[BookLine],
) -> String {
    let mut sorted: Vec<&BookLine> = book_lines.iter().collect();
    sorted.sort_by(|a, b| a.bookmaker_key.cmp(&b.bookmaker_key));
    let entries: Vec<serde_json::Value> = sorted
        .iter()
        .map(|b| serde_json::json!({ "name": b.bookmaker_key, "line": b.line }))
        .collect();
    serde_json::json!({
        "consensusLine": consensus_line,
        "firstMoverBook": first_mover_book,
        "confirmingBooks": confirming_books,
        "bookLines": entries,
    })
    .to_string()
}

fn content_hash(
    consensus_line: f64,
    first_mover_book: &Option<String>,
    confirming_books: usize,
    book_lines: &[BookLine],
) -> String {
    let canonical = canonical_hash_input(consensus_line, first_mover_book, confirming_books, book_lines);
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

pub struct FingerprintService;

impl FingerprintService {
    /// `snapshots` is the current set of per-book readings for this market (already
    /// normalized and tier-annotated). `prev` is the fingerprint computed on the prior
    /// tick for this same `(event, market[, player])`, if one was warm in cache.
    pub fn create(
        event_id: &str,
        market_key: &str,
        player_slug: Option<&str>,
        snapshots: &[BookSnapshot],
        prev: Option<&MarketFingerprint>,
        now: DateTime<Utc>,
    ) -> Result<MarketFingerprint, PipelineError> {
        let consensus_line = lower_median(snapshots.iter().map(|s| s.line).collect());
        let previous_consensus_line = prev.map(|p| p.consensus_line).unwrap_or(consensus_line);
        let delta_magnitude = match prev {
            Some(p) => (consensus_line - p.consensus_line).abs(),
            None => 0.0,
        };

        let confirming_books = snapshots
            .iter()
            .filter(|s| (s.line - consensus_line).abs() <= CONFIRM_THRESHOLD)
            .count();

        let (first_mover_book, first_mover_tier, first_move_time) =
            Self::detect_first_mover(snapshots, prev, delta_magnitude);

        let velocity = match prev {
            Some(p) => {
                let hours = (now - p.timestamp).num_milliseconds() as f64 / 3_600_000.0;
                if hours > 0.0 {
                    delta_magnitude / hours
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        let retail_lag_seconds = if first_mover_tier == Some(BookTier::Sharp) {
            first_move_time.and_then(|fmt| {
                snapshots
                    .iter()
                    .filter(|s| {
                        s.bookmaker_tier == BookTier::Retail
                            && (s.line - consensus_line).abs() <= CONFIRM_THRESHOLD
                            && s.timestamp >= fmt
                    })
                    .min_by_key(|s| s.timestamp)
                    .map(|s| (s.timestamp - fmt).num_seconds())
            })
        } else {
            None
        };

        let (last_reversal_time, fingerprint_start) = match prev {
            None => (now, now),
            Some(p) => {
                let current_delta = consensus_line - p.consensus_line;
                let prior_delta = p.consensus_line - p.previous_consensus_line;
                let reversed = current_delta != 0.0
                    && prior_delta != 0.0
                    && current_delta.signum() != prior_delta.signum();
                let reversal_time = if reversed { now } else { p.last_reversal_time };
                (reversal_time, p.fingerprint_start)
            }
        };

        let book_lines: Vec<BookLine> = snapshots
            .iter()
            .map(|s| BookLine {
                bookmaker_key: s.bookmaker_key.clone(),
                line: s.line,
                timestamp: s.timestamp,
            })
            .collect();

        let hash = content_hash(consensus_line, &first_mover_book, confirming_books, &book_lines);

        let fingerprint = MarketFingerprint {
            event_id: event_id.to_string(),
            market_key: market_key.to_string(),
            player_slug: player_slug.map(str::to_string),
            timestamp: now,
            consensus_line,
            previous_consensus_line,
            delta_magnitude,
            velocity,
            first_mover_book,
            first_mover_tier,
            first_move_time,
            confirming_books,
            last_reversal_time,
            fingerprint_start,
            retail_lag_seconds,
            content_hash: hash,
            book_lines,
        };

        Self::check_invariants(&fingerprint, snapshots.len())?;
        Ok(fingerprint)
    }

    fn detect_first_mover(
        snapshots: &[BookSnapshot],
        prev: Option<&MarketFingerprint>,
        delta_magnitude: f64,
    ) -> (Option<String>, Option<BookTier>, Option<DateTime<Utc>>) {
        if delta_magnitude < MOVE_THRESHOLD {
            return (None, None, None);
        }
        let Some(prev) = prev else {
            return (None, None, None);
        };

        let mut movers: Vec<&BookSnapshot> = snapshots
            .iter()
            .filter(|s| {
                prev.book_lines
                    .iter()
                    .find(|b| b.bookmaker_key == s.bookmaker_key)
                    .map(|b| (s.line - b.line).abs() >= MOVE_THRESHOLD)
                    .unwrap_or(false)
            })
            .collect();

        if movers.is_empty() {
            return (None, None, None);
        }

        // Earliest timestamp wins; tie-break by higher book tier, then bookmaker_key
        // lexical order.
        movers.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| b.bookmaker_tier.cmp(&a.bookmaker_tier))
                .then_with(|| a.bookmaker_key.cmp(&b.bookmaker_key))
        });

        let winner = movers[0];
        (
            Some(winner.bookmaker_key.clone()),
            Some(winner.bookmaker_tier),
            Some(winner.timestamp),
        )
    }

    fn check_invariants(fp: &MarketFingerprint, num_books: usize) -> Result<(), PipelineError> {
        if fp.delta_magnitude < 0.0 {
            return Err(PipelineError::InvariantViolation(format!(
                "deltaMagnitude must be >= 0, got {}",
                fp.delta_magnitude
            )));
        }
        if fp.confirming_books > num_books {
            return Err(PipelineError::InvariantViolation(format!(
                "confirmingBooks {} exceeds numBooks {}",
                fp.confirming_books, num_books
            )));
        }
        Ok(())
    }
}

/// True when `prev` is absent or the material-change criteria hold: delta >= 0.5,
/// first mover differs, or content hash differs.
pub fn has_material_change(current: &MarketFingerprint, prev: Option<&MarketFingerprint>) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    current.delta_magnitude >= MOVE_THRESHOLD
        || current.first_mover_book != prev.first_mover_book
        || current.content_hash != prev.content_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookTier;

    fn snap(book: &str, tier: BookTier, line: f64, t: DateTime<Utc>) -> BookSnapshot {
        BookSnapshot {
            bookmaker_key: book.to_string(),
            bookmaker_tier: tier,
            timestamp: t,
            line,
            primary_odds: -110,
            secondary_odds: -110,
            player_name: None,
        }
    }

    #[test]
    fn median_invariant_is_permutation_independent() {
        let t = Utc::now();
        let snaps_a = vec![
            snap("a", BookTier::Retail, 3.0, t),
            snap("b", BookTier::Retail, 4.0, t),
            snap("c", BookTier::Retail, 2.0, t),
            snap("d", BookTier::Retail, 5.0, t),
        ];
        let mut snaps_b = snaps_a.clone();
        snaps_b.reverse();

        let fp_a = FingerprintService::create("e1", "spreads", None, &snaps_a, None, t).unwrap();
        let fp_b = FingerprintService::create("e1", "spreads", None, &snaps_b, None, t).unwrap();
        assert_eq!(fp_a.consensus_line, fp_b.consensus_line);
        // Lower median of [2,3,4,5] is 3.
        assert_eq!(fp_a.consensus_line, 3.0);
    }

    #[test]
    fn sharp_first_mover_scenario() {
        let t0 = Utc::now();
        let prev_snaps = vec![
            snap("sharpA", BookTier::Sharp, 3.0, t0),
            snap("sharpB", BookTier::Sharp, 3.0, t0),
            snap("market", BookTier::Market, 3.0, t0),
            snap("retail", BookTier::Retail, 3.0, t0),
        ];
        let prev = FingerprintService::create("e1", "spreads", None, &prev_snaps, None, t0).unwrap();

        let t1 = t0 + ChronoDuration::seconds(60);
        let new_snaps = vec![
            snap("sharpA", BookTier::Sharp, 4.5, t0),
            snap("sharpB", BookTier::Sharp, 4.5, t0 + ChronoDuration::seconds(30)),
            snap("market", BookTier::Market, 4.5, t1),
            snap("retail", BookTier::Retail, 4.5, t1),
        ];

        let fp = FingerprintService::create("e1", "spreads", None, &new_snaps, Some(&prev), t1).unwrap();
        assert_eq!(fp.consensus_line, 4.5);
        assert_eq!(fp.delta_magnitude, 1.5);
        assert_eq!(fp.first_mover_book.as_deref(), Some("sharpA"));
        assert_eq!(fp.first_mover_tier, Some(BookTier::Sharp));
        assert_eq!(fp.first_move_time, Some(t0));
    }

    #[test]
    fn material_change_monotonicity() {
        let t0 = Utc::now();
        let snaps = vec![
            snap("a", BookTier::Retail, 3.0, t0),
            snap("b", BookTier::Retail, 3.0, t0),
        ];
        let prev = FingerprintService::create("e1", "totals", None, &snaps, None, t0).unwrap();
        let t1 = t0 + ChronoDuration::seconds(60);
        let current = FingerprintService::create("e1", "totals", None, &snaps, Some(&prev), t1).unwrap();

        assert_eq!(current.content_hash, prev.content_hash);
        assert!(current.delta_magnitude < 0.5);
        assert_eq!(current.first_mover_book, prev.first_mover_book);
        assert!(!has_material_change(&current, Some(&prev)));
    }

    #[test]
    fn reversal_resets_stability() {
        let t0 = Utc::now();
        let s1 = vec![snap("a", BookTier::Retail, 3.0, t0)];
        let fp1 = FingerprintService::create("e1", "totals", None, &s1, None, t0).unwrap();

        let t1 = t0 + ChronoDuration::minutes(5);
        let s2 = vec![snap("a", BookTier::Retail, 4.0, t1)];
        let fp2 = FingerprintService::create("e1", "totals", None, &s2, Some(&fp1), t1).unwrap();

        let t2 = t1 + ChronoDuration::minutes(5);
        let s3 = vec![snap("a", BookTier::Retail, 3.5, t2)];
        let fp3 = FingerprintService::create("e1", "totals", None, &s3, Some(&fp2), t2).unwrap();

        assert_eq!(fp3.last_reversal_time, t2);
        assert_eq!(fp3.stability_window(t2), ChronoDuration::zero());
    }

    #[test]
    fn no_prior_means_material_change() {
        assert!(has_material_change(
            &FingerprintService::create("e1", "totals", None, &[], None, Utc::now()).unwrap(),
            None
        ));
    }
}
