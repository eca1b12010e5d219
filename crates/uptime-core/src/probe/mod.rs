mod http;

pub use http::HttpProbe;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level outcome of a single failed availability check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("request failed: {0}")]
    Other(String),
}

impl ProbeError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// Performs one availability check against a URL.
///
/// Implementations make exactly one attempt, do not retry and do not log.
/// The trait is object-safe and Send + Sync so a single probe can be shared
/// by every monitor task.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<(), ProbeError>;
}
