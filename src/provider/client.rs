use super::types::{ExternalEvent, HistoricalOddsResponse, LineMovementSample, MarketAvailability, ScoreEvent};
use crate::error::BoxError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Thin I/O adapter over the external odds provider. Kept as a narrow trait so the
/// poller/grader can be exercised in tests without a live HTTP dependency, the same
/// separation the teacher gets for free by keeping `PinnacleApiClient` a small struct
/// with no logic beyond "make the request, parse the response".
#[async_trait]
pub trait OddsProvider: Send + Sync {
    async fn list_events(&self, sport_key: &str) -> Result<Vec<ExternalEvent>, BoxError>;

    async fn list_odds(
        &self,
        sport_key: &str,
        markets: &[String],
        bookmakers: &[String],
    ) -> Result<Vec<ExternalEvent>, BoxError>;

    async fn list_event_odds(
        &self,
        sport_key: &str,
        event_id: &str,
        markets: &[String],
    ) -> Result<Option<ExternalEvent>, BoxError>;

    async fn list_scores(&self, sport_key: &str, days_from: u32) -> Result<Vec<ScoreEvent>, BoxError>;

    /// Bookmaker/market matrix without prices, per spec §6's market-availability
    /// endpoint — used to check what a book offers without paying for a full quote.
    async fn market_availability(&self, sport_key: &str) -> Result<Vec<MarketAvailability>, BoxError>;

    /// Returns `Ok(None)` rather than erroring when the provider reports the
    /// historical slice isn't available (a 4xx response) — see spec §4.3.
    async fn historical_odds_for_sport(
        &self,
        sport_key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<HistoricalOddsResponse>, BoxError>;

    async fn historical_odds_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<HistoricalOddsResponse>, BoxError>;
}

/// Rate-limits historical sampling with the same "sleep until spacing elapsed" idiom
/// the teacher uses in `PinnacleApiClient::fetch_odds` for its own provider's
/// request-per-second cap, generalized to the ≥100ms spacing spec §4.3 requires
/// between historical samples.
pub struct HttpOddsProvider {
    client: Client,
    base_url: String,
    api_key: String,
    min_historical_spacing: Duration,
    last_historical_request: Mutex<Option<Instant>>,
}

impl HttpOddsProvider {
    pub fn new(base_url: String, api_key: String, request_timeout: Duration, min_historical_spacing: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            api_key,
            min_historical_spacing,
            last_historical_request: Mutex::new(None),
        }
    }

    async fn respect_historical_rate_limit(&self) {
        let mut last = self.last_historical_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_historical_spacing {
                tokio::time::sleep(self.min_historical_spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, BoxError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).query(query);
        if !self.api_key.is_empty() {
            req = req.query(&[("apiKey", self.api_key.as_str())]);
        }

        let response = req.send().await?;
        let status = response.status();

        if status.is_client_error() {
            // Not-available (e.g. historical slice out of range), not fatal.
            warn!("provider: {} returned {} (treated as not-available)", path, status);
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("provider: {} returned {} - {}", path, status, body);
            return Err(format!("provider error {}: {}", status, body).into());
        }

        let text = response.text().await?;
        match serde_json::from_str::<T>(&text) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                error!("provider: failed to parse response from {}: {}", path, e);
                Err(Box::new(e))
            }
        }
    }

    /// Builds a line-movement series by sampling historical odds at regular intervals
    /// over `days_back * intervals_per_day`, then appending the current snapshot, per
    /// spec §4.3. A short delay is enforced between historical requests by
    /// `respect_historical_rate_limit`.
    pub async fn line_movement_series(
        &self,
        sport_key: &str,
        event_id: &str,
        days_back: u32,
        intervals_per_day: u32,
    ) -> Result<Vec<LineMovementSample>, BoxError> {
        let mut samples = Vec::new();
        if days_back == 0 || intervals_per_day == 0 {
            return Ok(samples);
        }

        let total_points = days_back as i64 * intervals_per_day as i64;
        let step = ChronoDuration::minutes(24 * 60 / intervals_per_day as i64);
        let now = Utc::now();
        let start = now - ChronoDuration::days(days_back as i64);

        for i in 0..total_points {
            let at = start + step * i as i32;
            self.respect_historical_rate_limit().await;
            match self.historical_odds_for_event(sport_key, event_id, at).await {
                Ok(Some(resp)) => {
                    for event in resp.data {
                        samples.push(LineMovementSample {
                            sampled_at: at,
                            event,
                        });
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("line_movement_series: historical sample at {} failed: {}", at, e);
                    continue;
                }
            }
        }

        if let Ok(Some(current)) = self.list_event_odds(sport_key, event_id, &[]).await {
            samples.push(LineMovementSample {
                sampled_at: now,
                event: current,
            });
        }

        Ok(samples)
    }
}

#[async_trait]
impl OddsProvider for HttpOddsProvider {
    async fn list_events(&self, sport_key: &str) -> Result<Vec<ExternalEvent>, BoxError> {
        let path = format!("/v4/sports/{}/events", sport_key);
        Ok(self.get_json::<Vec<ExternalEvent>>(&path, &[]).await?.unwrap_or_default())
    }

    async fn list_odds(
        &self,
        sport_key: &str,
        markets: &[String],
        bookmakers: &[String],
    ) -> Result<Vec<ExternalEvent>, BoxError> {
        let path = format!("/v4/sports/{}/odds", sport_key);
        let mut query: Vec<(&str, String)> = vec![("markets", markets.join(","))];
        if !bookmakers.is_empty() {
            query.push(("bookmakers", bookmakers.join(",")));
        }
        Ok(self
            .get_json::<Vec<ExternalEvent>>(&path, &query)
            .await?
            .unwrap_or_default())
    }

    async fn list_event_odds(
        &self,
        sport_key: &str,
        event_id: &str,
        markets: &[String],
    ) -> Result<Option<ExternalEvent>, BoxError> {
        let path = format!("/v4/sports/{}/events/{}/odds", sport_key, event_id);
        let query = if markets.is_empty() {
            vec![]
        } else {
            vec![("markets", markets.join(","))]
        };
        self.get_json::<ExternalEvent>(&path, &query).await
    }

    async fn list_scores(&self, sport_key: &str, days_from: u32) -> Result<Vec<ScoreEvent>, BoxError> {
        let path = format!("/v4/sports/{}/scores", sport_key);
        let query = vec![("daysFrom", days_from.to_string())];
        Ok(self.get_json::<Vec<ScoreEvent>>(&path, &query).await?.unwrap_or_default())
    }

    async fn market_availability(&self, sport_key: &str) -> Result<Vec<MarketAvailability>, BoxError> {
        let path = format!("/v4/sports/{}/markets", sport_key);
        Ok(self
            .get_json::<Vec<MarketAvailability>>(&path, &[])
            .await?
            .unwrap_or_default())
    }

    async fn historical_odds_for_sport(
        &self,
        sport_key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<HistoricalOddsResponse>, BoxError> {
        let path = format!("/v4/historical/sports/{}/odds", sport_key);
        let query = vec![("date", at.to_rfc3339())];
        self.get_json::<HistoricalOddsResponse>(&path, &query).await
    }

    async fn historical_odds_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<HistoricalOddsResponse>, BoxError> {
        let path = format!("/v4/historical/sports/{}/events/{}/odds", sport_key, event_id);
        let query = vec![("date", at.to_rfc3339())];
        self.get_json::<HistoricalOddsResponse>(&path, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_reasonable_defaults() {
        let provider = HttpOddsProvider::new(
            "https://example.test".to_string(),
            "key".to_string(),
            Duration::from_secs(10),
            Duration::from_millis(100),
        );
        assert_eq!(provider.base_url, "https://example.test");
    }
}
