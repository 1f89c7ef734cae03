use crate::api::types::OperationsLimit;
use crate::errors::{DashError, DashResult};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub operations_limit: OperationsLimit,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub persist_preferences: bool,
    pub dashboard_dist: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> DashResult<Self> {
        dotenvy::dotenv().ok();

        let poll_interval_secs = env_var_or("POLL_INTERVAL_SECS", "10")
            .parse::<u64>()
            .map_err(|e| DashError::Config(format!("POLL_INTERVAL_SECS: {e}")))?;
        if poll_interval_secs == 0 {
            return Err(DashError::Config("POLL_INTERVAL_SECS must be > 0".into()));
        }

        let http_timeout_secs = env_var_or("HTTP_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| DashError::Config(format!("HTTP_TIMEOUT_SECS: {e}")))?;

        let operations_limit = env_var_or("OPERATIONS_LIMIT", "all")
            .parse::<OperationsLimit>()
            .map_err(|e| DashError::Config(format!("OPERATIONS_LIMIT: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| DashError::Config(format!("SERVER_PORT: {e}")))?;

        let persist_preferences = env_var_or("PERSIST_PREFERENCES", "true")
            .parse::<bool>()
            .map_err(|e| DashError::Config(format!("PERSIST_PREFERENCES: {e}")))?;

        Ok(Self {
            api_base_url: env_var_or("API_BASE_URL", "http://127.0.0.1:5000"),
            poll_interval: Duration::from_secs(poll_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            operations_limit,
            server_port,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            persist_preferences,
            dashboard_dist: PathBuf::from(env_var_or("DASHBOARD_DIST", "dashboard/dist")),
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
