use super::reconcile::{identity_set, reconcile, IdentitySet, PollOutcome};
use super::schedule::{PollHandle, ShutdownSignal};
use crate::api::source::DataSource;
use crate::api::types::OperationsLimit;
use crate::prefs::Preferences;
use crate::state::{DashboardSnapshot, PollCounters};
use portable_atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Keeps the dashboard snapshot in sync with the backend.
///
/// Phases:
///   1. Full reload on start: every source fetched concurrently.
///   2. Fast poll every `poll_interval` (measured from the end of the previous
///      handling): open trades, config and capital only.
///   3. If a previously open trade disappeared, the fast poll's partial view is
///      dropped and a full reload runs instead.
///
/// The identity set is owned by this task alone; consumers only see the
/// published snapshot.
pub struct Coordinator {
    source: Arc<dyn DataSource>,
    prefs: watch::Receiver<Preferences>,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    counters: Arc<PollCounters>,
    poll_interval: Duration,
    identities: IdentitySet,
    operations_limit: OperationsLimit,
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn DataSource>,
        mut prefs: watch::Receiver<Preferences>,
        snapshot_tx: watch::Sender<DashboardSnapshot>,
        counters: Arc<PollCounters>,
        poll_interval: Duration,
    ) -> Self {
        let operations_limit = prefs.borrow_and_update().operations_limit;
        Self {
            source,
            prefs,
            snapshot_tx,
            counters,
            poll_interval,
            identities: IdentitySet::new(),
            operations_limit,
        }
    }

    /// Start polling. The returned handle owns the timer.
    pub fn spawn(self) -> PollHandle {
        PollHandle::spawn(move |shutdown| self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs_f64(),
            operations_limit = %self.operations_limit,
            "coordinator started"
        );

        self.full_reload(&shutdown).await;
        let mut prefs_open = true;

        // Only re-armed once a poll or reload has been handled.
        let next_poll = tokio::time::sleep(self.poll_interval);
        tokio::pin!(next_poll);

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                changed = self.prefs.changed(), if prefs_open => {
                    if changed.is_err() {
                        prefs_open = false;
                        continue;
                    }
                    let limit = self.prefs.borrow_and_update().operations_limit;
                    if limit != self.operations_limit {
                        tracing::info!(from = %self.operations_limit, to = %limit, "operations limit changed");
                        self.operations_limit = limit;
                        self.full_reload(&shutdown).await;
                        next_poll.as_mut().reset(Instant::now() + self.poll_interval);
                    }
                }
                () = &mut next_poll => {
                    self.fast_poll(&shutdown).await;
                    next_poll.as_mut().reset(Instant::now() + self.poll_interval);
                }
            }
        }

        tracing::info!("coordinator shutting down");
    }

    /// Fetch everything and replace the snapshot. Results arriving after
    /// shutdown are discarded.
    async fn full_reload(&mut self, shutdown: &ShutdownSignal) {
        let source = &*self.source;
        let limit = self.operations_limit;

        let (stats, operations, open_trades, momentum_pairs, remote_config, total_capital, cooldowns) = tokio::join!(
            source.stats(),
            source.operations(limit),
            source.open_trades(),
            source.momentum_pairs(),
            source.config(),
            source.capital(),
            source.cooldowns(),
        );

        if shutdown.is_triggered() {
            tracing::debug!("full reload finished after shutdown, discarding");
            return;
        }

        self.counters.full_reloads.fetch_add(1, Ordering::Relaxed);

        // Identity set only follows successful polls.
        if let Some(trades) = open_trades.as_deref() {
            self.identities = identity_set(trades);
        }

        tracing::info!(
            closed = operations.as_ref().map_or(0, Vec::len),
            open = self.identities.len(),
            stats_ok = stats.is_some(),
            "full reload complete"
        );

        let snapshot = DashboardSnapshot {
            loading: false,
            last_updated: Some(chrono::Utc::now()),
            operations_limit: limit,
            stats,
            closed_operations: operations,
            open_trades: open_trades.unwrap_or_default(),
            momentum_pairs: momentum_pairs.unwrap_or_default(),
            remote_config,
            total_capital,
            cooldowns,
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    async fn fast_poll(&mut self, shutdown: &ShutdownSignal) {
        let source = &*self.source;
        let (open_trades, remote_config, total_capital) =
            tokio::join!(source.open_trades(), source.config(), source.capital());

        if shutdown.is_triggered() {
            tracing::debug!("fast poll finished after shutdown, discarding");
            return;
        }

        self.counters.fast_polls.fetch_add(1, Ordering::Relaxed);

        match reconcile(&self.identities, open_trades) {
            PollOutcome::ClosureDetected { closed } => {
                self.counters.closures_detected.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    closed = ?closed.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "open trade closed, reloading history and stats"
                );
                self.full_reload(shutdown).await;
            }
            PollOutcome::Replace { trades, identities } => {
                self.identities = identities;
                self.snapshot_tx.send_modify(|s| {
                    s.open_trades = trades;
                    s.remote_config = remote_config;
                    s.total_capital = total_capital;
                });
            }
            PollOutcome::Unavailable => {
                tracing::debug!(open = self.identities.len(), "open trades unavailable, keeping last view");
                self.snapshot_tx.send_modify(|s| {
                    s.remote_config = remote_config;
                    s.total_capital = total_capital;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Cooldown, MomentumPair, OpenTrade, StatsResponse, TradeRecord};
    use crate::prefs::{MemoryStore, PreferenceCell, PreferencesPatch};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const INTERVAL: Duration = Duration::from_secs(10);

    /// Scripted backend. Open-trade responses are consumed in order; the last
    /// one repeats forever.
    #[derive(Default)]
    struct ScriptedSource {
        open_script: Mutex<VecDeque<Option<Vec<OpenTrade>>>>,
        stats_calls: AtomicUsize,
        capital_calls: AtomicUsize,
        capital_delay: Duration,
        config_calls: AtomicUsize,
        stats_delay: Duration,
        last_limit: Mutex<Option<OperationsLimit>>,
    }

    impl ScriptedSource {
        fn with_open(script: Vec<Option<Vec<OpenTrade>>>) -> Self {
            Self { open_script: Mutex::new(script.into()), ..Default::default() }
        }

        fn stats_calls(&self) -> usize {
            self.stats_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn stats(&self) -> Option<StatsResponse> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            if !self.stats_delay.is_zero() {
                tokio::time::sleep(self.stats_delay).await;
            }
            Some(StatsResponse::default())
        }

        async fn operations(&self, limit: OperationsLimit) -> Option<Vec<TradeRecord>> {
            *self.last_limit.lock().unwrap() = Some(limit);
            Some(vec![])
        }

        async fn open_trades(&self) -> Option<Vec<OpenTrade>> {
            let mut script = self.open_script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().flatten()
            } else {
                script.front().cloned().flatten()
            }
        }

        async fn momentum_pairs(&self) -> Option<Vec<MomentumPair>> {
            Some(vec![])
        }

        async fn capital(&self) -> Option<f64> {
            let n = self.capital_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.capital_delay.is_zero() {
                tokio::time::sleep(self.capital_delay).await;
            }
            Some(n as f64)
        }

        async fn config(&self) -> Option<serde_json::Value> {
            let n = self.config_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Some(serde_json::json!({ "calls": n }))
        }

        async fn cooldowns(&self) -> Vec<Cooldown> {
            Vec::new()
        }
    }

    fn trade(symbol: &str, side: &str) -> OpenTrade {
        OpenTrade { symbol: Some(symbol.into()), side: Some(side.into()), ..Default::default() }
    }

    struct Harness {
        source: Arc<ScriptedSource>,
        prefs: PreferenceCell,
        counters: Arc<PollCounters>,
        snapshot_rx: watch::Receiver<DashboardSnapshot>,
        handle: PollHandle,
    }

    fn start(source: ScriptedSource) -> Harness {
        let source = Arc::new(source);
        let prefs = PreferenceCell::load(Arc::new(MemoryStore::default()), Preferences::default());
        let counters = Arc::new(PollCounters::new());
        let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot::default());
        let handle = Coordinator::new(
            source.clone(),
            prefs.subscribe(),
            snapshot_tx,
            counters.clone(),
            INTERVAL,
        )
        .spawn();
        Harness { source, prefs, counters, snapshot_rx, handle }
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_populates_snapshot() {
        let h = start(ScriptedSource::with_open(vec![Some(vec![trade("BTCUSDT", "LONG")])]));
        sleep_secs(1).await;

        let snapshot = h.snapshot_rx.borrow().clone();
        assert!(!snapshot.loading);
        assert!(snapshot.last_updated.is_some());
        assert!(snapshot.stats.is_some());
        assert_eq!(snapshot.open_trades.len(), 1);
        assert_eq!(snapshot.total_capital, Some(1.0));
        assert_eq!(h.source.stats_calls(), 1);
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_trade_triggers_full_reload() {
        let h = start(ScriptedSource::with_open(vec![
            Some(vec![trade("BTCUSDT", "LONG")]),
            Some(vec![]),
        ]));

        sleep_secs(11).await;
        assert_eq!(h.source.stats_calls(), 2, "closure must refetch stats");
        assert_eq!(h.counters.closures_detected.load(Ordering::Relaxed), 1);
        assert_eq!(h.counters.full_reloads.load(Ordering::Relaxed), 2);
        assert!(h.snapshot_rx.borrow().open_trades.is_empty());

        // Empty stays empty: no further reloads.
        sleep_secs(20).await;
        assert_eq!(h.source.stats_calls(), 2);
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closure_publishes_only_reloaded_view() {
        let source = ScriptedSource {
            stats_delay: Duration::from_secs(2),
            ..ScriptedSource::with_open(vec![Some(vec![trade("BTCUSDT", "LONG")]), Some(vec![])])
        };
        let mut h = start(source);

        // Initial load commits at t=2; the fast poll at t=12 sees the closure
        // and the reload it triggers commits at t=14.
        sleep_secs(3).await;
        h.snapshot_rx.mark_unchanged();
        assert_eq!(h.snapshot_rx.borrow().total_capital, Some(1.0));

        sleep_secs(10).await;
        assert_eq!(h.source.capital_calls.load(Ordering::SeqCst), 3, "fast poll and reload both fetched");
        assert!(!h.snapshot_rx.has_changed().unwrap(), "fast poll view must not be published");
        assert_eq!(h.snapshot_rx.borrow().total_capital, Some(1.0));

        sleep_secs(2).await;
        assert!(h.snapshot_rx.has_changed().unwrap());
        let snapshot = h.snapshot_rx.borrow_and_update().clone();
        assert_eq!(snapshot.total_capital, Some(3.0));
        assert_eq!(snapshot.remote_config, Some(serde_json::json!({ "calls": 3 })));
        assert!(snapshot.open_trades.is_empty());
        assert_eq!(h.counters.full_reloads.load(Ordering::Relaxed), 2);
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_set_only_replaces() {
        let h = start(ScriptedSource::with_open(vec![Some(vec![trade("BTCUSDT", "LONG")])]));

        sleep_secs(25).await;
        assert_eq!(h.counters.fast_polls.load(Ordering::Relaxed), 2);
        assert_eq!(h.counters.full_reloads.load(Ordering::Relaxed), 1);
        assert_eq!(h.source.stats_calls(), 1);
        // Capital comes from the latest fast poll (call #3).
        assert_eq!(h.snapshot_rx.borrow().total_capital, Some(3.0));
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_identity_set() {
        let h = start(ScriptedSource::with_open(vec![
            Some(vec![trade("BTCUSDT", "LONG")]),
            None,
            Some(vec![]),
        ]));

        sleep_secs(15).await;
        assert_eq!(h.source.stats_calls(), 1, "a failed poll is not a closure");
        assert_eq!(h.snapshot_rx.borrow().open_trades.len(), 1);

        sleep_secs(10).await;
        assert_eq!(h.source.stats_calls(), 2, "closure detected against last good set");
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_in_flight_cycle() {
        let source = ScriptedSource {
            capital_delay: Duration::from_secs(5),
            ..ScriptedSource::with_open(vec![Some(vec![])])
        };
        let h = start(source);

        // Initial load commits at t=5; the fast poll starts at t=15.
        sleep_secs(17).await;
        assert_eq!(h.snapshot_rx.borrow().total_capital, Some(1.0));

        h.handle.shutdown().await;
        assert_eq!(h.source.capital_calls.load(Ordering::SeqCst), 2, "request ran to completion");
        assert_eq!(h.snapshot_rx.borrow().total_capital, Some(1.0), "result was discarded");
        assert_eq!(h.counters.fast_polls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_change_reloads_with_new_bound() {
        let h = start(ScriptedSource::with_open(vec![Some(vec![])]));
        sleep_secs(1).await;
        assert_eq!(*h.source.last_limit.lock().unwrap(), Some(OperationsLimit::All));

        h.prefs
            .update(PreferencesPatch {
                operations_limit: Some(OperationsLimit::Count(50)),
                ..Default::default()
            })
            .unwrap();
        sleep_secs(1).await;

        assert_eq!(h.source.stats_calls(), 2);
        assert_eq!(*h.source.last_limit.lock().unwrap(), Some(OperationsLimit::Count(50)));
        assert_eq!(h.snapshot_rx.borrow().operations_limit, OperationsLimit::Count(50));

        // Other preference changes do not refetch.
        h.prefs
            .update(PreferencesPatch { view_mode: Some(crate::prefs::ViewMode::Table), ..Default::default() })
            .unwrap();
        sleep_secs(1).await;
        assert_eq!(h.source.stats_calls(), 2);
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_change_keeps_poll_schedule() {
        let h = start(ScriptedSource::with_open(vec![Some(vec![trade("BTCUSDT", "LONG")])]));

        sleep_secs(9).await;
        h.prefs
            .update(PreferencesPatch { currency: Some(crate::prefs::Currency::Eur), ..Default::default() })
            .unwrap();

        sleep_secs(3).await;
        assert_eq!(h.counters.fast_polls.load(Ordering::Relaxed), 1, "poll still due at t=10");
        assert_eq!(h.source.stats_calls(), 1);
        h.handle.shutdown().await;
    }
}
