pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::get;
use std::path::Path;
use std::sync::Arc;

/// Relay API for the rendering layer, plus its static assets as fallback.
pub fn router(state: Arc<AppState>, dashboard_dist: &Path) -> axum::Router {
    axum::Router::new()
        .route("/api/dashboard", get(routes::get_dashboard))
        .route("/api/metrics", get(routes::get_metrics))
        .route(
            "/api/preferences",
            get(routes::get_preferences).put(routes::put_preferences),
        )
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .fallback_service(
            tower_http::services::ServeDir::new(dashboard_dist)
                .fallback(tower_http::services::ServeFile::new(dashboard_dist.join("index.html"))),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
