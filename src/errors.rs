/// Domain-specific error types for the dashboard service.
/// Fetch failures never reach the coordinator: the fetch wrappers in
/// `api::source` collapse every variant into an absent value.
#[derive(Debug, thiserror::Error)]
pub enum DashError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("backend API error: {status} {body}")]
    Api { status: u16, body: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for DashError {
    fn from(e: reqwest::Error) -> Self {
        DashError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for DashError {
    fn from(e: serde_json::Error) -> Self {
        DashError::Parse(e.to_string())
    }
}

impl From<rusqlite::Error> for DashError {
    fn from(e: rusqlite::Error) -> Self {
        DashError::Database(e.to_string())
    }
}

impl From<std::io::Error> for DashError {
    fn from(e: std::io::Error) -> Self {
        DashError::Io(e.to_string())
    }
}

pub type DashResult<T> = Result<T, DashError>;
