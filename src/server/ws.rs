use super::routes::DashboardView;
use crate::prefs::Preferences;
use crate::state::{AppState, DashboardSnapshot};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = state.snapshot_rx.clone();
    snapshots.mark_unchanged();
    let mut prefs = state.prefs.subscribe();
    prefs.mark_unchanged();

    // Initial payload, then one message per published snapshot or preference change
    let push_state = state.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let json = DashboardView::payload(&push_state).to_string();
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            push_state.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);

            if !wait_for_update(&mut snapshots, &mut prefs).await {
                break;
            }
        }
    });

    // Read (and discard) incoming messages; detect disconnect
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {} // Ignore client messages
            }
        }
    });

    // Wait for either task to finish (client disconnected)
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

/// Resolves once the snapshot or the preferences move on; `false` when a
/// sender is gone.
async fn wait_for_update(
    snapshots: &mut watch::Receiver<DashboardSnapshot>,
    prefs: &mut watch::Receiver<Preferences>,
) -> bool {
    let changed = tokio::select! {
        r = snapshots.changed() => r,
        r = prefs.changed() => r,
    };
    snapshots.mark_unchanged();
    prefs.mark_unchanged();
    changed.is_ok()
}
