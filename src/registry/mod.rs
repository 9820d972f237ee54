//! Read-mostly snapshot of sports, markets, bookmakers (C1).
//!
//! Sports/markets/bookmakers are seeded once at startup, analogous to the teacher's
//! `PinnacleDbService::load_known_leagues` preload, and held read-only thereafter
//! aside from `is_active` toggles on a `Sport`. Lookups are cached through the shared
//! `Cache` (sports 30 min, markets/bookmakers 1 h per spec §4.1); any mutation fans out
//! a targeted invalidation instead of a blanket flush.

mod seed;

use crate::cache::Cache;
use crate::types::{BookTier, Bookmaker, MarketDefinition, PeriodStructure, Sport, SubscriptionTier};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const SPORTS_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const MARKETS_BOOKMAKERS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    PlayerProp,
    PeriodSpecific,
    Alternate,
    Plain,
}

impl MatchKind {
    fn rank(self) -> u8 {
        match self {
            MatchKind::PlayerProp => 3,
            MatchKind::PeriodSpecific => 2,
            MatchKind::Alternate => 1,
            MatchKind::Plain => 0,
        }
    }
}

pub struct Registry {
    cache: Arc<Cache>,
    sports: HashMap<String, Sport>,
    markets: HashMap<String, MarketDefinition>,
    markets_by_sport: HashMap<String, Vec<String>>,
    bookmakers: HashMap<String, Bookmaker>,
}

impl Registry {
    /// Seeds from the embedded reference data. A real deployment would instead hydrate
    /// this from the out-of-scope reference-data loader at the same call site.
    pub fn seeded(cache: Arc<Cache>) -> Self {
        let sports: HashMap<String, Sport> = seed::seed_sports()
            .into_iter()
            .map(|s| (s.key.clone(), s))
            .collect();

        let markets: HashMap<String, MarketDefinition> = seed::seed_markets()
            .into_iter()
            .map(|m| (m.key.clone(), m))
            .collect();

        // Every seeded market is currently treated as available to every sport; a
        // fuller reference-data loader would key this per sport. We still build the
        // index by key so `markets_for_sport` has a single place to generalize later.
        let all_market_keys: Vec<String> = markets.keys().cloned().collect();
        let markets_by_sport = sports
            .keys()
            .map(|sport_key| (sport_key.clone(), all_market_keys.clone()))
            .collect();

        let bookmakers: HashMap<String, Bookmaker> = seed::seed_bookmakers()
            .into_iter()
            .map(|b| (b.key.clone(), b))
            .collect();

        Self {
            cache,
            sports,
            markets,
            markets_by_sport,
            bookmakers,
        }
    }

    pub fn sports(&self) -> Vec<Sport> {
        if let Some(cached) = self.cache.get::<Vec<Sport>>("mktdata:sports:all") {
            return cached;
        }
        let mut all: Vec<Sport> = self.sports.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        self.cache
            .set("mktdata:sports:all", &all, SPORTS_CACHE_TTL);
        all
    }

    pub fn active_sports(&self) -> Vec<Sport> {
        if let Some(cached) = self.cache.get::<Vec<Sport>>("mktdata:sports:active") {
            return cached;
        }
        let mut active: Vec<Sport> = self
            .sports
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.key.cmp(&b.key));
        self.cache
            .set("mktdata:sports:active", &active, SPORTS_CACHE_TTL);
        active
    }

    pub fn set_sport_active(&mut self, sport_key: &str, is_active: bool) {
        if let Some(sport) = self.sports.get_mut(sport_key) {
            sport.is_active = is_active;
        }
        self.cache.remove("mktdata:sports:all");
        self.cache.remove("mktdata:sports:active");
    }

    pub fn markets_for_sport(&self, sport_key: &str) -> Vec<MarketDefinition> {
        let cache_key = format!("mktdata:markets:sport:{}", sport_key);
        if let Some(cached) = self.cache.get::<Vec<MarketDefinition>>(&cache_key) {
            return cached;
        }
        let keys = self
            .markets_by_sport
            .get(sport_key)
            .cloned()
            .unwrap_or_default();
        let mut defs: Vec<MarketDefinition> = keys
            .into_iter()
            .filter_map(|k| self.markets.get(&k).cloned())
            .collect();
        defs.sort_by(|a, b| a.key.cmp(&b.key));
        self.cache
            .set(&cache_key, &defs, MARKETS_BOOKMAKERS_CACHE_TTL);
        defs
    }

    pub fn market_by_key(&self, market_key: &str) -> Option<MarketDefinition> {
        self.markets.get(market_key).cloned()
    }

    pub fn bookmaker_tier(&self, bookmaker_key: &str) -> BookTier {
        self.bookmakers
            .get(bookmaker_key)
            .map(|b| b.tier)
            .unwrap_or(BookTier::Retail)
    }

    pub fn accessible_bookmakers(&self, tier: SubscriptionTier) -> Vec<Bookmaker> {
        let cache_key = format!("mktdata:bookmakers:accessible:{:?}", tier);
        if let Some(cached) = self.cache.get::<Vec<Bookmaker>>(&cache_key) {
            return cached;
        }
        let mut accessible: Vec<Bookmaker> = self
            .bookmakers
            .values()
            .filter(|b| b.required_tier <= tier)
            .cloned()
            .collect();
        accessible.sort_by(|a, b| a.key.cmp(&b.key));
        self.cache
            .set(&cache_key, &accessible, MARKETS_BOOKMAKERS_CACHE_TTL);
        accessible
    }

    pub fn can_access_market(&self, tier: SubscriptionTier, market_key: &str) -> bool {
        match self.markets.get(market_key) {
            Some(m) => m.required_tier <= tier,
            None => false,
        }
    }

    /// Whether the grader can attempt period-specific outcomes for this sport. Exposed
    /// as a capability rather than always attempting a per-period lookup, per spec §9.
    pub fn period_scores_available(&self, sport_key: &str) -> bool {
        matches!(
            self.sports.get(sport_key).map(|s| s.period_structure),
            Some(PeriodStructure::Quarters)
                | Some(PeriodStructure::Halves)
                | Some(PeriodStructure::Periods)
        )
    }

    pub fn resolve_sport_by_keyword(&self, input: &str) -> Option<Sport> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.sports
            .values()
            .filter(|s| {
                s.key.to_lowercase() == needle
                    || s.keywords.iter().any(|kw| kw.to_lowercase() == needle)
            })
            .max_by_key(|s| {
                s.keywords
                    .iter()
                    .filter(|kw| kw.to_lowercase() == needle)
                    .map(|kw| kw.len())
                    .max()
                    .unwrap_or(s.key.len())
            })
            .cloned()
    }

    /// Ranks matches by specificity: player-prop > period-specific > alternate >
    /// longest-keyword-length, as spec §4.1 requires.
    pub fn resolve_market_by_keyword(
        &self,
        input: &str,
        sport_key: &str,
    ) -> Option<MarketDefinition> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let candidates = self.markets_for_sport(sport_key);
        let mut best: Option<(MatchKind, usize, MarketDefinition)> = None;

        for market in candidates {
            let matched_len = market
                .keywords
                .iter()
                .filter(|kw| needle.contains(&kw.to_lowercase()) || kw.to_lowercase() == needle)
                .map(|kw| kw.len())
                .max();

            let matched_len = match matched_len {
                Some(len) => len,
                None if market.key.to_lowercase() == needle => market.key.len(),
                None => continue,
            };

            let kind = if market.is_player_prop {
                MatchKind::PlayerProp
            } else if market.period.is_some() {
                MatchKind::PeriodSpecific
            } else if market.is_alternate {
                MatchKind::Alternate
            } else {
                MatchKind::Plain
            };

            let better = match &best {
                None => true,
                Some((best_kind, best_len, _)) => {
                    (kind.rank(), matched_len) > (best_kind.rank(), *best_len)
                }
            };

            if better {
                best = Some((kind, matched_len, market));
            }
        }

        best.map(|(_, _, market)| market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::seeded(Arc::new(Cache::new()))
    }

    #[test]
    fn unknown_bookmaker_classifies_as_retail() {
        let reg = registry();
        assert_eq!(reg.bookmaker_tier("some_unknown_book"), BookTier::Retail);
    }

    #[test]
    fn tier_gating_is_monotone() {
        let reg = registry();
        for key in ["h2h", "spreads", "btts", "player_points_over_under"] {
            let starter = reg.can_access_market(SubscriptionTier::Starter, key);
            let core = reg.can_access_market(SubscriptionTier::Core, key);
            let sharp = reg.can_access_market(SubscriptionTier::Sharp, key);
            if starter {
                assert!(core && sharp, "starter access must imply higher tiers for {key}");
            }
            if core {
                assert!(sharp, "core access must imply sharp access for {key}");
            }
        }
    }

    #[test]
    fn keyword_resolution_prefers_player_prop_over_plain() {
        let reg = registry();
        let resolved = reg
            .resolve_market_by_keyword("player points", "basketball_nba")
            .expect("should resolve");
        assert_eq!(resolved.key, "player_points_over_under");
    }

    #[test]
    fn keyword_resolution_prefers_period_specific_over_plain_for_explicit_period_query() {
        let reg = registry();
        let resolved = reg
            .resolve_market_by_keyword("first half spread", "americanfootball_nfl")
            .expect("should resolve");
        assert_eq!(resolved.key, "spreads_1h");
    }

    #[test]
    fn resolve_sport_by_keyword_is_case_insensitive() {
        let reg = registry();
        let resolved = reg.resolve_sport_by_keyword("NFL").expect("should resolve");
        assert_eq!(resolved.key, "americanfootball_nfl");
    }

    #[test]
    fn set_sport_active_invalidates_cached_lists() {
        let mut reg = registry();
        let _ = reg.active_sports();
        reg.set_sport_active("americanfootball_nfl", false);
        let active = reg.active_sports();
        assert!(active.iter().all(|s| s.key != "americanfootball_nfl"));
    }
}
