use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancellationListener;
use crate::config::PolicyConfig;
use crate::monitor::event::MonitorEvent;
use crate::probe::{Probe, ProbeError};
use crate::sink::EventSink;
use crate::target::Target;

/// Result of one check cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// A probe succeeded; `attempts` is how many probes it took.
    Up { attempts: u32 },
    /// Every attempt failed; `reason` describes the last failure.
    Down { reason: String },
}

impl CheckOutcome {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up { .. })
    }
}

/// Bounded retry around a [`Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            timeout,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.timeout, config.max_retries, config.retry_delay)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs up to `max_retries` probe attempts, sleeping `retry_delay` between
    /// a failed attempt and the next one.
    ///
    /// Returns `None` if cancellation interrupts a retry delay; the cycle is
    /// then abandoned without an outcome.
    pub async fn check_with_retry(
        &self,
        probe: &dyn Probe,
        target: &Target,
        sink: &dyn EventSink,
        cancel: &mut CancellationListener,
    ) -> Option<CheckOutcome> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                sink.emit(MonitorEvent::check_retry(
                    target.name.as_str(),
                    attempt + 1,
                    self.max_retries,
                ));
            }

            match self.attempt(probe, &target.url).await {
                Ok(()) => {
                    if attempt > 0 {
                        debug!(url = %target.url, attempts = attempt + 1, "Connected after retrying");
                    }
                    return Some(CheckOutcome::Up {
                        attempts: attempt + 1,
                    });
                }
                Err(e) => {
                    warn!(url = %target.url, attempt = attempt + 1, error = %e, "Probe failed");
                    last_error = Some(e);
                }
            }

            let is_last = attempt + 1 == self.max_retries;
            if !is_last && !cancel.sleep(self.retry_delay).await {
                debug!(url = %target.url, "Retry delay interrupted by shutdown");
                return None;
            }
        }

        let reason = match last_error {
            Some(e) => format!("Failed after {} attempts: {}", self.max_retries, e),
            None => format!("Failed after {} attempts", self.max_retries),
        };
        Some(CheckOutcome::Down { reason })
    }

    async fn attempt(&self, probe: &dyn Probe, url: &str) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, probe.probe(url, self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}
