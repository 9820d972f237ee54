//! Poller / scheduler (C9): the main tick loop tying every other component together.
//!
//! Tick shape grounded in the teacher's `PinnacleService::run`/market-refresh task:
//! `tokio::time::interval` owns the timer, per-sport work runs concurrently via
//! `futures::future::join_all` (generalizing the teacher's sequential per-event loop
//! in `PinnacleService::process_cycle`), and a per-sport failure is logged and does
//! not abort the tick.

use crate::alerts::{AlertEngine, AlertGameContext, AlertSink};
use crate::cache::Cache;
use crate::closing_line::ClosingLineService;
use crate::config::Config;
use crate::confidence::ConfidenceScorer;
use crate::error::BoxError;
use crate::fingerprint::{FingerprintService, MarketFingerprint};
use crate::normalizer;
use crate::provider::OddsProvider;
use crate::registry::Registry;
use crate::store::HistoricalStore;
use crate::types::{GameEvent, MarketDefinition, SignalSnapshot};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn parse_commence_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn build_game_event(sport_key: &str, external_event: &crate::provider::types::ExternalEvent) -> GameEvent {
    GameEvent {
        event_id: external_event.id.clone(),
        sport_key: sport_key.to_string(),
        commence_time: parse_commence_time(&external_event.commence_time),
        home_team: external_event.home_team.clone(),
        away_team: external_event.away_team.clone(),
        completed: false,
        home_score: None,
        away_score: None,
        home_period_scores: None,
        away_period_scores: None,
    }
}

pub struct Poller {
    provider: Arc<dyn OddsProvider>,
    store: Arc<dyn HistoricalStore>,
    cache: Arc<Cache>,
    registry: Arc<Registry>,
    sink: Arc<dyn AlertSink>,
    config: Arc<Config>,
    tick_count: std::sync::atomic::AtomicU64,
}

impl Poller {
    pub fn new(
        provider: Arc<dyn OddsProvider>,
        store: Arc<dyn HistoricalStore>,
        cache: Arc<Cache>,
        registry: Arc<Registry>,
        sink: Arc<dyn AlertSink>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            registry,
            sink,
            config,
            tick_count: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub async fn run_forever(self: Arc<Self>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poller_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let deadline = self.config.poller_interval();
                    if tokio::time::timeout(deadline, self.run_tick(&cancellation)).await.is_err() {
                        warn!("poller: tick exceeded its deadline, treating as past due");
                    }
                }
                _ = cancellation.cancelled() => {
                    info!("poller: shutting down");
                    return;
                }
            }
        }
    }

    pub async fn run_tick(&self, cancellation: &CancellationToken) {
        let tick_number = self
            .tick_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let include_player_props = self.config.poller_player_prop_every_nth_tick > 0
            && tick_number % self.config.poller_player_prop_every_nth_tick as u64 == 0;

        let sports = self.registry.active_sports();
        let work = sports.into_iter().map(|sport| {
            let cancellation = cancellation.clone();
            async move {
                if cancellation.is_cancelled() {
                    return;
                }
                if let Err(e) = self.process_sport(&sport.key, include_player_props).await {
                    error!("poller: sport {} failed: {}", sport.key, e);
                }
            }
        });

        join_all(work).await;
    }

    /// Game-level markets are fetched in one bulk `list_odds` call per sport; player
    /// props are fetched per-event (only for events inside the next 24h) since the
    /// provider doesn't expose a bulk player-prop endpoint, per spec §4.9 step 5.
    async fn process_sport(&self, sport_key: &str, include_player_props: bool) -> Result<(), BoxError> {
        let all_market_defs = self.registry.markets_for_sport(sport_key);
        let game_level_defs: Vec<MarketDefinition> = all_market_defs
            .iter()
            .filter(|m| !m.is_player_prop && !m.is_alternate)
            .cloned()
            .collect();
        let prop_defs: Vec<MarketDefinition> = all_market_defs
            .iter()
            .filter(|m| m.is_player_prop)
            .cloned()
            .collect();

        if !game_level_defs.is_empty() {
            let market_keys: Vec<String> = game_level_defs.iter().map(|m| m.key.clone()).collect();
            let events = self.provider.list_odds(sport_key, &market_keys, &[]).await?;
            for external_event in &events {
                let game = build_game_event(sport_key, external_event);
                for market_def in &game_level_defs {
                    if let Err(e) = self.process_market(&game, market_def, external_event).await {
                        warn!("poller: {}:{} failed: {}", game.event_id, market_def.key, e);
                    }
                }
            }
        }

        if include_player_props && !prop_defs.is_empty() {
            let now = Utc::now();
            let upcoming = self.provider.list_events(sport_key).await?;
            let prop_keys: Vec<String> = prop_defs.iter().map(|m| m.key.clone()).collect();

            for stub in upcoming {
                let commence_time = parse_commence_time(&stub.commence_time);
                if commence_time <= now || commence_time - now > chrono::Duration::hours(24) {
                    continue;
                }

                let game = build_game_event(sport_key, &stub);
                match self
                    .provider
                    .list_event_odds(sport_key, &stub.id, &prop_keys)
                    .await
                {
                    Ok(Some(full_event)) => {
                        for market_def in &prop_defs {
                            if let Err(e) = self.process_market(&game, market_def, &full_event).await {
                                warn!("poller: {}:{} failed: {}", game.event_id, market_def.key, e);
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("poller: player-prop fetch for {} failed: {}", stub.id, e),
                }
            }
        }

        Ok(())
    }

    async fn process_market(
        &self,
        game: &GameEvent,
        market_def: &MarketDefinition,
        external_event: &crate::provider::types::ExternalEvent,
    ) -> Result<(), BoxError> {
        let snapshots = normalizer::normalize(external_event, market_def, &self.registry);
        if snapshots.is_empty() {
            return Ok(());
        }

        if market_def.is_player_prop {
            let mut by_player: std::collections::HashMap<String, Vec<crate::types::BookSnapshot>> =
                std::collections::HashMap::new();
            for snap in snapshots {
                if let Some(player) = snap.player_name.clone() {
                    by_player.entry(player).or_default().push(snap);
                }
            }
            for (player, player_snapshots) in by_player {
                let slug = slugify(&player);
                self.process_fingerprint(game, market_def, Some(&slug), &player_snapshots)
                    .await?;
            }
        } else {
            let fingerprint = self.process_fingerprint(game, market_def, None, &snapshots).await?;
            ClosingLineService::maybe_capture(
                game,
                &market_def.key,
                fingerprint.consensus_line,
                &self.cache,
                &self.config,
                Utc::now(),
            );
        }

        Ok(())
    }

    async fn process_fingerprint(
        &self,
        game: &GameEvent,
        market_def: &MarketDefinition,
        player_slug: Option<&str>,
        snapshots: &[crate::types::BookSnapshot],
    ) -> Result<MarketFingerprint, BoxError> {
        let cache_key = match player_slug {
            Some(slug) => Cache::fingerprint_key_player(&game.event_id, &market_def.key, slug),
            None => Cache::fingerprint_key(&game.event_id, &market_def.key),
        };

        let prev: Option<MarketFingerprint> = self.cache.get(&cache_key);
        let now = Utc::now();

        let fingerprint = FingerprintService::create(
            &game.event_id,
            &market_def.key,
            player_slug,
            snapshots,
            prev.as_ref(),
            now,
        )?;

        self.cache
            .set(&cache_key, &fingerprint, std::time::Duration::from_secs(self.config.cache_fingerprint_ttl_secs.max(0) as u64));

        if !crate::fingerprint::has_material_change(&fingerprint, prev.as_ref()) {
            return Ok(fingerprint);
        }

        let confidence = ConfidenceScorer::score(&fingerprint, &self.config);
        self.cache.set(
            &Cache::confidence_key(&fingerprint.key_suffix()),
            &confidence,
            std::time::Duration::from_secs(self.config.cache_confidence_ttl_secs.max(0) as u64),
        );

        let snapshot = SignalSnapshot {
            id: None,
            event_id: game.event_id.clone(),
            market_key: market_def.key.clone(),
            signal_time: now,
            game_time: game.commence_time,
            line_at_signal: fingerprint.consensus_line,
            confidence_level_at_signal: confidence.level,
            confidence_score_at_signal: confidence.total,
            first_mover_book: fingerprint.first_mover_book.clone(),
            first_mover_tier: fingerprint.first_mover_tier,
            closing_line: None,
            outcome: None,
        };
        if let Err(e) = self.store.save_signal(snapshot).await {
            warn!("poller: failed to persist signal for {}: {}", cache_key, e);
        }

        let game_context = AlertGameContext {
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            market_display_name: market_def.display_name.clone(),
            game_time: game.commence_time,
        };

        match AlertEngine::evaluate(&fingerprint, &confidence, &game_context, &self.cache, &self.config) {
            Some(alert) => {
                if AlertEngine::should_send(&alert, &self.cache, &self.config, now) {
                    // Dedupe write is the commit point; dispatch is a retried
                    // after-effect, per the source's dispatch/mark race fixed here.
                    AlertEngine::mark_sent(&alert, &self.cache, &self.config, now);
                    if let Err(e) = self.sink.deliver(&alert).await {
                        warn!("poller: alert dispatch failed for {}: {}", alert.dedupe_key, e);
                    }
                }
            }
            None => {
                AlertEngine::record_observed_level(&fingerprint, confidence.level, &self.cache);
            }
        }

        debug!(
            "poller: processed {}:{} consensus={} delta={}",
            game.event_id, market_def.key, fingerprint.consensus_line, fingerprint.delta_magnitude
        );

        Ok(fingerprint)
    }
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
