//! Typed KV cache with TTL, byte blobs, and invalidation groups.
//!
//! Backed by `dashmap::DashMap` for lock-free concurrent access, the same choice the
//! teacher repo makes for its own in-process maps (`market_mapping`, `event_to_fixture`
//! in `odds-engine`'s `AppState`). On read/write errors this layer logs and returns a
//! miss/no-op — callers must never treat cache failure as pipeline failure.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct Cache {
    entries: DashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("cache: failed to deserialize key '{}': {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("cache: failed to serialize key '{}': {}", key, e);
                return;
            }
        };
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: encoded,
                expires_at,
            },
        );
    }

    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.get::<Vec<u8>>(key)
    }

    pub fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.set(key, &value, ttl);
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => !entry.is_expired(Utc::now()),
            None => false,
        }
    }

    // --- Typed helpers (stable key naming, see spec §6) ---

    pub fn fingerprint_key(event_id: &str, market_key: &str) -> String {
        format!("fingerprint:{}:{}", event_id, market_key)
    }

    pub fn fingerprint_key_player(event_id: &str, market_key: &str, player_slug: &str) -> String {
        format!("fingerprint:{}:{}:{}", event_id, market_key, player_slug)
    }

    pub fn confidence_key(market_key: &str) -> String {
        format!("confidence:{}", market_key)
    }

    pub fn closing_line_key(event_id: &str, market_key: &str) -> String {
        format!("closingline:{}:{}", event_id, market_key)
    }

    pub fn alert_dedupe_key(dedupe_key: &str) -> String {
        format!("alert:dedupe:{}", dedupe_key)
    }

    pub fn alert_lasttime_key(dedupe_key: &str) -> String {
        format!("alert:lasttime:{}", dedupe_key)
    }

    pub fn alert_prevconfidence_key(market_key: &str) -> String {
        format!("alert:prevconfidence:{}", market_key)
    }

    // --- Invalidation groups ---

    /// Removes `fingerprint|confidence|odds:raw` triples for one market of one event.
    pub fn invalidate_market(&self, event_id: &str, market_key: &str) {
        self.remove(&Self::fingerprint_key(event_id, market_key));
        self.remove(&Self::confidence_key(market_key));
        self.remove(&format!("odds:raw:{}:{}", event_id, market_key));
    }

    /// Fans `invalidate_market` out across every market of an event.
    pub fn invalidate_event(&self, event_id: &str, market_keys: &[String]) {
        for market_key in market_keys {
            self.invalidate_market(event_id, market_key);
        }
    }

    /// Drops expired entries eagerly; advisory housekeeping only, never required for
    /// correctness (reads already treat expired entries as absent).
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let cache = Cache::new();
        cache.set("k", &42i32, Duration::from_secs(60));
        assert_eq!(cache.get::<i32>("k"), Some(42));
    }

    #[test]
    fn expired_entry_reads_as_miss() {
        let cache = Cache::new();
        cache.set("k", &42i32, Duration::from_secs(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.get::<i32>("k"), None);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn missing_key_reads_as_none_not_panic() {
        let cache = Cache::new();
        assert_eq!(cache.get::<String>("nope"), None);
    }

    #[test]
    fn invalidate_market_clears_fingerprint_and_confidence() {
        let cache = Cache::new();
        cache.set(
            &Cache::fingerprint_key("e1", "spreads"),
            &1i32,
            Duration::from_secs(60),
        );
        cache.set(
            &Cache::confidence_key("spreads"),
            &2i32,
            Duration::from_secs(60),
        );
        cache.invalidate_market("e1", "spreads");
        assert!(!cache.contains(&Cache::fingerprint_key("e1", "spreads")));
        assert!(!cache.contains(&Cache::confidence_key("spreads")));
    }

    #[test]
    fn invalidate_event_fans_out_across_markets() {
        let cache = Cache::new();
        cache.set(
            &Cache::fingerprint_key("e1", "spreads"),
            &1i32,
            Duration::from_secs(60),
        );
        cache.set(
            &Cache::fingerprint_key("e1", "totals"),
            &1i32,
            Duration::from_secs(60),
        );
        cache.invalidate_event("e1", &["spreads".to_string(), "totals".to_string()]);
        assert!(!cache.contains(&Cache::fingerprint_key("e1", "spreads")));
        assert!(!cache.contains(&Cache::fingerprint_key("e1", "totals")));
    }
}
