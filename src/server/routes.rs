use crate::prefs::{Preferences, PreferencesPatch};
use crate::state::{AppState, DashboardSnapshot};
use crate::stats::TradeMetrics;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot plus the aggregates derived from it, as consumed by the renderer.
#[derive(serde::Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub snapshot: DashboardSnapshot,
    pub metrics: TradeMetrics,
    pub preferences: Preferences,
    /// Parsed cooldown countdowns, keyed by symbol.
    pub cooldown_secs: BTreeMap<String, i64>,
}

impl DashboardView {
    pub fn build(state: &AppState) -> Self {
        let snapshot = state.snapshot_rx.borrow().clone();
        let metrics = snapshot.metrics();
        let cooldown_secs = snapshot
            .cooldowns
            .iter()
            .filter_map(|c| Some((c.symbol.clone()?, c.remaining()?.num_seconds())))
            .collect();
        Self {
            snapshot,
            metrics,
            preferences: state.prefs.current(),
            cooldown_secs,
        }
    }

    /// What the renderer receives over HTTP and WS alike: the view, or the
    /// stats failure marker once loading finished without stats.
    pub fn payload(state: &AppState) -> serde_json::Value {
        let view = Self::build(state);
        if view.snapshot.stats_failed() {
            return serde_json::json!({ "error": "Failed to load stats" });
        }
        serde_json::json!(view)
    }
}

/// GET /api/dashboard -- latest snapshot with freshly computed metrics
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    Json(DashboardView::payload(&state))
}

/// GET /api/metrics -- profit factors and win rates over closed operations
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<TradeMetrics> {
    Json(state.snapshot_rx.borrow().metrics())
}

/// GET /api/preferences
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
) -> Json<Preferences> {
    Json(state.prefs.current())
}

/// PUT /api/preferences -- partial update, persisted then broadcast
pub async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<PreferencesPatch>,
) -> Response {
    match state.prefs.update(patch) {
        Ok(prefs) => Json(prefs).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "preference update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /api/counters -- poll counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "full_reloads": state.counters.full_reloads.load(Relaxed),
        "fast_polls": state.counters.fast_polls.load(Relaxed),
        "closures_detected": state.counters.closures_detected.load(Relaxed),
        "fetch_failures": state.counters.fetch_failures.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}
