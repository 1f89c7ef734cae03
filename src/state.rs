use crate::api::types::{Cooldown, MomentumPair, OpenTrade, OperationsLimit, StatsResponse, TradeRecord};
use crate::prefs::PreferenceCell;
use crate::stats::TradeMetrics;
use chrono::{DateTime, Utc};
use portable_atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::watch;

// ── Dashboard snapshot (sent via watch channel) ──

/// Latest reconciled view of every data source. Absent values mean the
/// source failed on its last fetch.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardSnapshot {
    pub loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub operations_limit: OperationsLimit,
    pub stats: Option<StatsResponse>,
    pub closed_operations: Option<Vec<TradeRecord>>,
    pub open_trades: Vec<OpenTrade>,
    pub momentum_pairs: Vec<MomentumPair>,
    pub remote_config: Option<serde_json::Value>,
    pub total_capital: Option<f64>,
    pub cooldowns: Vec<Cooldown>,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            loading: true,
            last_updated: None,
            operations_limit: OperationsLimit::All,
            stats: None,
            closed_operations: None,
            open_trades: Vec::new(),
            momentum_pairs: Vec::new(),
            remote_config: None,
            total_capital: None,
            cooldowns: Vec::new(),
        }
    }
}

impl DashboardSnapshot {
    /// Recomputed on every call; an absent history counts as empty.
    pub fn metrics(&self) -> TradeMetrics {
        TradeMetrics::compute(self.closed_operations.as_deref().unwrap_or_default())
    }

    /// Loading finished but the statistics source gave nothing.
    #[inline]
    pub fn stats_failed(&self) -> bool {
        !self.loading && self.stats.is_none()
    }
}

// ── Poll counters (lock-free) ──

pub struct PollCounters {
    pub full_reloads: AtomicU64,
    pub fast_polls: AtomicU64,
    pub closures_detected: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PollCounters {
    pub fn new() -> Self {
        Self {
            full_reloads: AtomicU64::new(0),
            fast_polls: AtomicU64::new(0),
            closures_detected: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

impl Default for PollCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    // Coordinator -> relay: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_rx: watch::Receiver<DashboardSnapshot>,

    pub prefs: Arc<PreferenceCell>,

    pub counters: Arc<PollCounters>,
}

impl AppState {
    pub fn new(
        snapshot_rx: watch::Receiver<DashboardSnapshot>,
        prefs: Arc<PreferenceCell>,
        counters: Arc<PollCounters>,
    ) -> Arc<Self> {
        Arc::new(Self {
            snapshot_rx,
            prefs,
            counters,
        })
    }
}
