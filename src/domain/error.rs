// Error taxonomy with stable numeric codes shared across providers
use thiserror::Error;

/// Errors surfaced by the monitoring core.
///
/// Each variant carries the stable numeric code used when errors are
/// forwarded opaquely through provider error events.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data error: {0}")]
    Data(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("critical error: {0}")]
    Critical(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl MonitorError {
    pub fn code(&self) -> i32 {
        match self {
            MonitorError::Connection(_) => 100,
            MonitorError::Configuration(_) => 200,
            MonitorError::Data(_) => 300,
            MonitorError::Hardware(_) => 400,
            MonitorError::Critical(_) => 500,
            MonitorError::Unknown(_) => 999,
        }
    }
}
