use super::types::*;
use crate::errors::{DashError, DashResult};
use reqwest::Client;
use std::time::Duration;

/// Backend REST client. All methods return Result, never panic.
#[derive(Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .pool_max_idle_per_host(8)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> DashResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DashError::Api {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>().await.map_err(|e| DashError::Parse(format!("GET {path}: {e}")))
    }

    pub async fn get_stats(&self) -> DashResult<StatsResponse> {
        self.get("/api/stats").await
    }

    pub async fn get_operations(&self, limit: OperationsLimit) -> DashResult<OperationsResponse> {
        self.get(&operations_path(limit)).await
    }

    pub async fn get_open_trades(&self) -> DashResult<OpenTradesResponse> {
        self.get("/api/open_trades").await
    }

    pub async fn get_momentum_pairs(&self) -> DashResult<MomentumPairsResponse> {
        self.get("/api/momentum_pairs").await
    }

    pub async fn get_capital(&self) -> DashResult<CapitalResponse> {
        self.get("/api/capital").await
    }

    pub async fn get_cooldowns(&self) -> DashResult<CooldownsResponse> {
        self.get("/api/cooldowns").await
    }

    pub async fn get_config(&self) -> DashResult<serde_json::Value> {
        self.get("/api/config").await
    }
}

fn operations_path(limit: OperationsLimit) -> String {
    let query = limit.query_param().map(|l| format!("?limit={l}")).unwrap_or_default();
    format!("/api/operations{query}")
}
