mod api;
mod config;
mod db;
mod errors;
mod poller;
mod prefs;
mod server;
mod state;
mod stats;

use crate::api::client::DashboardClient;
use crate::api::source::HttpSource;
use crate::poller::Coordinator;
use crate::prefs::{KeyValueStore, MemoryStore, PreferenceCell, Preferences};
use crate::state::{AppState, DashboardSnapshot, PollCounters};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("trade_dash starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Preference storage
    let store: Arc<dyn KeyValueStore> = if cfg.persist_preferences {
        match db::init_db(&cfg.data_dir) {
            Ok(d) => Arc::new(db::SqliteStore::new(d)),
            Err(e) => {
                tracing::error!("database init error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!("preferences are not persisted");
        Arc::new(MemoryStore::default())
    };

    let defaults = Preferences {
        operations_limit: cfg.operations_limit,
        ..Default::default()
    };
    let prefs = Arc::new(PreferenceCell::load(store, defaults));

    let counters = Arc::new(PollCounters::new());
    let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot::default());

    // ── Coordinator task ──
    let client = DashboardClient::new(&cfg.api_base_url, cfg.http_timeout);
    let source = Arc::new(HttpSource::new(client, counters.clone()));
    tracing::info!(api = %cfg.api_base_url, "polling backend");

    let poll_handle = Coordinator::new(
        source,
        prefs.subscribe(),
        snapshot_tx,
        counters.clone(),
        cfg.poll_interval,
    )
    .spawn();

    // ── Axum HTTP + WS relay ──
    let app_state = AppState::new(snapshot_rx, prefs, counters);
    let app = server::router(app_state, &cfg.dashboard_dist);

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("signal handler error: {e}");
        }
        tracing::info!("shutdown requested");
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!("server error: {e}");
    }

    poll_handle.shutdown().await;
    tracing::info!("trade_dash stopped");
}
