use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DucktError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No Tokio runtime available to drive the delivery queue")]
    RuntimeUnavailable,

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl DucktError {
    /// Whether this error came from the network or the collector, as opposed
    /// to a local setup problem.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, DucktError::Http(_) | DucktError::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, DucktError>;
