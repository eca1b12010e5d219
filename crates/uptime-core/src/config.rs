use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval used for a target that does not configure one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Retry and timeout policy shared by every monitor of a supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Upper bound for a single probe attempt (default: 10s).
    pub timeout: Duration,
    /// Number of probe attempts per check cycle, at least 1 (default: 3).
    pub max_retries: u32,
    /// Pause between a failed attempt and the next one (default: 5s).
    pub retry_delay: Duration,
    /// How long shutdown waits for each monitor before abandoning it.
    pub shutdown_grace: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl PolicyConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PolicyConfig::default();
        assert_eq!(c.timeout, Duration::from_secs(10));
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay, Duration::from_secs(5));
        assert_eq!(c.shutdown_grace, Duration::from_secs(2));
    }

    #[test]
    fn max_retries_is_clamped_to_one() {
        let c = PolicyConfig::default().with_max_retries(0);
        assert_eq!(c.max_retries, 1);
    }

    #[test]
    fn builders_chain() {
        let c = PolicyConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(4)
            .with_retry_delay(Duration::from_millis(250));
        assert_eq!(c.timeout, Duration::from_secs(5));
        assert_eq!(c.max_retries, 4);
        assert_eq!(c.retry_delay, Duration::from_millis(250));
    }
}
