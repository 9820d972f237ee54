use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,

    pub provider_base_url: String,
    pub provider_api_key: String,
    pub provider_request_timeout_secs: u64,
    pub provider_historical_sample_delay_ms: u64,

    pub server_port: u16,

    pub poller_base_interval_secs: u64,
    pub poller_player_prop_every_nth_tick: u32,

    pub grader_interval_secs: u64,

    pub closing_line_window_minutes: i64,
    pub closing_line_ttl_hours: i64,

    pub alert_default_cooldown_minutes: i64,
    pub alert_high_priority_cooldown_minutes: i64,
    pub alert_urgent_cooldown_minutes: i64,
    pub alert_dedupe_window_minutes: i64,
    pub alert_min_delta_for_sharp: f64,
    pub alert_min_delta_for_movement: f64,
    pub alert_min_books_for_consensus: usize,
    pub alert_reversal_window_minutes: i64,

    pub confidence_sharp_mover_score: u8,
    pub confidence_market_mover_score: u8,
    pub confidence_retail_mover_score: u8,
    pub confidence_high_velocity_threshold: f64,
    pub confidence_medium_velocity_threshold: f64,
    pub confidence_high_confirmation_threshold: usize,
    pub confidence_medium_confirmation_threshold: usize,
    pub confidence_high_stability_minutes: i64,
    pub confidence_medium_stability_minutes: i64,

    pub cache_default_ttl_secs: i64,
    pub cache_fingerprint_ttl_secs: i64,
    pub cache_confidence_ttl_secs: i64,
    pub cache_ai_explanation_ttl_secs: i64,
    pub cache_subscription_ttl_secs: i64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            eprintln!("Warning: invalid {} '{}', using default", key, v);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let server_port = port_str.parse().unwrap_or_else(|_| {
            eprintln!("Warning: Invalid PORT '{}', defaulting to 8080", port_str);
            8080
        });

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            provider_base_url: env::var("PROVIDER_BASE_URL").unwrap_or_default(),
            provider_api_key: env::var("PROVIDER_API_KEY").unwrap_or_default(),
            provider_request_timeout_secs: env_or("PROVIDER_REQUEST_TIMEOUT_SECONDS", 10),
            provider_historical_sample_delay_ms: env_or("PROVIDER_HISTORICAL_SAMPLE_DELAY_MS", 100),

            server_port,

            poller_base_interval_secs: env_or("POLLER_BASE_INTERVAL_SECONDS", 60),
            poller_player_prop_every_nth_tick: env_or("POLLER_PLAYER_PROP_EVERY_NTH_TICK", 5),

            grader_interval_secs: env_or("GRADER_INTERVAL_SECONDS", 900),

            closing_line_window_minutes: env_or("CLOSING_LINE_WINDOW_MINUTES", 5),
            closing_line_ttl_hours: env_or("CLOSING_LINE_TTL_HOURS", 8),

            alert_default_cooldown_minutes: env_or("ALERT_DEFAULT_COOLDOWN_MINUTES", 15),
            alert_high_priority_cooldown_minutes: env_or("ALERT_HIGH_PRIORITY_COOLDOWN_MINUTES", 5),
            alert_urgent_cooldown_minutes: env_or("ALERT_URGENT_COOLDOWN_MINUTES", 2),
            alert_dedupe_window_minutes: env_or("ALERT_DEDUPE_WINDOW_MINUTES", 60),
            alert_min_delta_for_sharp: env_or("ALERT_MIN_DELTA_FOR_SHARP_ALERT", 0.5),
            alert_min_delta_for_movement: env_or("ALERT_MIN_DELTA_FOR_MOVEMENT_ALERT", 1.0),
            alert_min_books_for_consensus: env_or("ALERT_MIN_BOOKS_FOR_CONSENSUS", 5),
            alert_reversal_window_minutes: env_or("ALERT_REVERSAL_WINDOW_MINUTES", 5),

            confidence_sharp_mover_score: env_or("CONFIDENCE_SHARP_MOVER_SCORE", 25),
            confidence_market_mover_score: env_or("CONFIDENCE_MARKET_MOVER_SCORE", 15),
            confidence_retail_mover_score: env_or("CONFIDENCE_RETAIL_MOVER_SCORE", 5),
            confidence_high_velocity_threshold: env_or("CONFIDENCE_HIGH_VELOCITY_THRESHOLD", 2.0),
            confidence_medium_velocity_threshold: env_or("CONFIDENCE_MEDIUM_VELOCITY_THRESHOLD", 0.5),
            confidence_high_confirmation_threshold: env_or("CONFIDENCE_HIGH_CONFIRMATION_THRESHOLD", 5),
            confidence_medium_confirmation_threshold: env_or("CONFIDENCE_MEDIUM_CONFIRMATION_THRESHOLD", 3),
            confidence_high_stability_minutes: env_or("CONFIDENCE_HIGH_STABILITY_MINUTES", 60),
            confidence_medium_stability_minutes: env_or("CONFIDENCE_MEDIUM_STABILITY_MINUTES", 15),

            cache_default_ttl_secs: env_or("CACHE_DEFAULT_TTL_SECONDS", 300),
            cache_fingerprint_ttl_secs: env_or("CACHE_FINGERPRINT_TTL_SECONDS", 3600),
            cache_confidence_ttl_secs: env_or("CACHE_CONFIDENCE_TTL_SECONDS", 300),
            cache_ai_explanation_ttl_secs: env_or("CACHE_AI_EXPLANATION_TTL_SECONDS", 86400),
            cache_subscription_ttl_secs: env_or("CACHE_SUBSCRIPTION_TTL_SECONDS", 3600),
        }
    }

    pub fn poller_interval(&self) -> Duration {
        Duration::from_secs(self.poller_base_interval_secs)
    }

    pub fn grader_interval(&self) -> Duration {
        Duration::from_secs(self.grader_interval_secs)
    }

    pub fn provider_request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_request_timeout_secs)
    }

    pub fn provider_historical_sample_delay(&self) -> Duration {
        Duration::from_millis(self.provider_historical_sample_delay_ms)
    }
}
