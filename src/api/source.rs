use super::client::DashboardClient;
use super::types::*;
use crate::state::PollCounters;
use async_trait::async_trait;
use portable_atomic::Ordering;
use std::sync::Arc;

/// Data the coordinator pulls from the backend.
///
/// Every method resolves to an absent value on failure instead of an error,
/// so one broken endpoint never blocks the others in the same cycle.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn stats(&self) -> Option<StatsResponse>;

    async fn operations(&self, limit: OperationsLimit) -> Option<Vec<TradeRecord>>;

    async fn open_trades(&self) -> Option<Vec<OpenTrade>>;

    async fn momentum_pairs(&self) -> Option<Vec<MomentumPair>>;

    async fn capital(&self) -> Option<f64>;

    /// Remote configuration and database metadata, passed through as-is.
    async fn config(&self) -> Option<serde_json::Value>;

    /// Failures are swallowed; an empty list is the fallback.
    async fn cooldowns(&self) -> Vec<Cooldown>;
}

/// `DataSource` backed by the HTTP API.
#[derive(Clone)]
pub struct HttpSource {
    client: DashboardClient,
    counters: Arc<PollCounters>,
}

impl HttpSource {
    pub fn new(client: DashboardClient, counters: Arc<PollCounters>) -> Self {
        Self { client, counters }
    }

    #[inline]
    fn failed(&self) {
        self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn stats(&self) -> Option<StatsResponse> {
        match self.client.get_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, "Error fetching stats:");
                None
            }
        }
    }

    async fn operations(&self, limit: OperationsLimit) -> Option<Vec<TradeRecord>> {
        match self.client.get_operations(limit).await {
            Ok(resp) => Some(resp.closed),
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, limit = %limit, "Error fetching operations:");
                None
            }
        }
    }

    async fn open_trades(&self) -> Option<Vec<OpenTrade>> {
        match self.client.get_open_trades().await {
            Ok(resp) => Some(resp.open_trades),
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, "Error fetching open trades:");
                None
            }
        }
    }

    async fn momentum_pairs(&self) -> Option<Vec<MomentumPair>> {
        match self.client.get_momentum_pairs().await {
            Ok(resp) => Some(resp.momentum_pairs),
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, "Error fetching momentum pairs:");
                None
            }
        }
    }

    async fn capital(&self) -> Option<f64> {
        match self.client.get_capital().await {
            Ok(resp) => resp.total_capital,
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, "Error fetching capital:");
                None
            }
        }
    }

    async fn config(&self) -> Option<serde_json::Value> {
        match self.client.get_config().await {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                self.failed();
                tracing::error!(error = %e, "Error fetching config:");
                None
            }
        }
    }

    async fn cooldowns(&self) -> Vec<Cooldown> {
        match self.client.get_cooldowns().await {
            Ok(resp) => resp.cooldowns,
            Err(e) => {
                tracing::debug!(error = %e, "cooldowns unavailable");
                Vec::new()
            }
        }
    }
}
