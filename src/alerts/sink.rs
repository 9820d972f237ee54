//! Alert dispatch (C7 sink seam).
//!
//! `BroadcastAlertSink` fans alerts out over a `tokio::sync::broadcast::Sender`,
//! directly generalizing the teacher's `AppState.tx: broadcast::Sender<Value>`
//! websocket fan-out in `main.rs` — a send with no active receivers is not an error
//! there, and it isn't here either.

use super::MarketAlert;
use crate::error::BoxError;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

pub type AlertPayload = MarketAlert;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &MarketAlert) -> Result<(), BoxError>;
}

#[derive(Clone)]
pub struct BroadcastAlertSink {
    tx: broadcast::Sender<AlertPayload>,
}

impl BroadcastAlertSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertPayload> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl AlertSink for BroadcastAlertSink {
    async fn deliver(&self, alert: &MarketAlert) -> Result<(), BoxError> {
        if self.tx.send(alert.clone()).is_err() {
            warn!(
                "alerts: no active subscribers for {} ({:?})",
                alert.dedupe_key, alert.alert_type
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceScore;
    use crate::fingerprint::{BookLine, MarketFingerprint};
    use crate::types::ConfidenceLevel;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_alert() -> MarketAlert {
        let now = Utc::now();
        MarketAlert {
            alert_id: Uuid::new_v4(),
            fingerprint: MarketFingerprint {
                event_id: "e1".into(),
                market_key: "spreads".into(),
                player_slug: None,
                timestamp: now,
                consensus_line: 3.0,
                previous_consensus_line: 1.5,
                delta_magnitude: 1.5,
                velocity: 1.0,
                first_mover_book: Some("sharpA".into()),
                first_mover_tier: Some(crate::types::BookTier::Sharp),
                first_move_time: Some(now),
                confirming_books: 4,
                last_reversal_time: now,
                fingerprint_start: now,
                retail_lag_seconds: None,
                content_hash: "abc1234567890123".into(),
                book_lines: Vec::<BookLine>::new(),
            },
            confidence: ConfidenceScore {
                total: 90,
                level: ConfidenceLevel::High,
                first_mover_component: 25,
                velocity_component: 25,
                confirmation_component: 25,
                stability_component: 15,
                explanation: "test".into(),
            },
            alert_type: super::super::AlertType::SharpActivity,
            priority: super::super::AlertPriority::Urgent,
            target_channels: vec![super::super::AlertChannel::Sharp],
            send_direct: true,
            created_at: now,
            dedupe_key: "e1:spreads:SharpActivity:High".into(),
            home_team: "Home".into(),
            away_team: "Away".into(),
            market_display_name: "Point Spread".into(),
            game_time: now + chrono::Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn delivering_with_no_subscribers_is_not_an_error() {
        let sink = BroadcastAlertSink::new(16);
        let alert = sample_alert();
        assert!(sink.deliver(&alert).await.is_ok());
    }

    #[tokio::test]
    async fn subscriber_receives_delivered_alert() {
        let sink = BroadcastAlertSink::new(16);
        let mut rx = sink.subscribe();
        let alert = sample_alert();
        sink.deliver(&alert).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.dedupe_key, alert.dedupe_key);
    }
}
