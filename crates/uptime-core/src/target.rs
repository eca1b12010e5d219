use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_INTERVAL;

/// One monitored endpoint. Immutable once handed to a supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub name: String,
    pub interval: Duration,
}

impl Target {
    /// Target named after its URL, checked every `interval`.
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            url,
            interval,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Checks the invariants a monitor relies on: a positive interval and an
    /// absolute http(s) URL.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("interval must be greater than zero".into());
        }
        let parsed = url::Url::parse(&self.url).map_err(|e| format!("invalid URL: {}", e))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(format!("unsupported URL scheme '{}'", other)),
        }
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Self::new(url, DEFAULT_INTERVAL)
    }
}
