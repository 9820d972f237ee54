mod alerts;
mod cache;
mod closing_line;
mod confidence;
mod config;
mod error;
mod fingerprint;
mod grader;
mod normalizer;
mod poller;
mod provider;
mod registry;
mod store;
mod types;

use alerts::sink::BroadcastAlertSink;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use cache::Cache;
use config::Config;
use grader::Grader;
use poller::Poller;
use provider::HttpOddsProvider;
use registry::Registry;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use store::PgHistoricalStore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub alerts: BroadcastAlertSink,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    dotenvy::dotenv().ok();

    info!("🚀 Starting odds signal pipeline...");

    let config = Arc::new(Config::from_env());
    info!("📋 Configuration loaded");

    info!("🔌 Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;
    info!("✅ Connected to Postgres");

    let cache = Arc::new(Cache::new());
    let registry = Arc::new(Registry::seeded(cache.clone()));

    let provider = Arc::new(HttpOddsProvider::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
        config.provider_request_timeout(),
        config.provider_historical_sample_delay(),
    ));
    let store = Arc::new(PgHistoricalStore::new(pool));
    let alert_sink = BroadcastAlertSink::new(1000);

    let cancellation = CancellationToken::new();

    let poller = Arc::new(Poller::new(
        provider.clone(),
        store.clone(),
        cache.clone(),
        registry.clone(),
        Arc::new(alert_sink.clone()),
        config.clone(),
    ));
    let grader = Arc::new(Grader::new(
        provider.clone(),
        store.clone(),
        cache.clone(),
        registry.clone(),
        config.clone(),
    ));

    info!("📡 Starting poller...");
    let poller_cancel = cancellation.clone();
    tokio::spawn(async move {
        poller.run_forever(poller_cancel).await;
    });

    info!("🏁 Starting grader...");
    let grader_cancel = cancellation.clone();
    tokio::spawn(async move {
        grader.run_forever(grader_cancel).await;
    });

    let state = Arc::new(AppState {
        alerts: alert_sink,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/alerts/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("🌐 Health/alert server starting on {}", addr);
    info!("✅ Signal pipeline is ready!");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_signal = cancellation.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("⚠️ Shutdown signal received");
            shutdown_signal.cancel();
        })
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("👤 New alert stream client connecting...");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.alerts.subscribe();
    while let Ok(alert) = rx.recv().await {
        if let Ok(json) = serde_json::to_string(&alert) {
            if socket.send(Message::Text(json)).await.is_err() {
                info!("❌ Alert stream client disconnected");
                break;
            }
        }
    }
}
