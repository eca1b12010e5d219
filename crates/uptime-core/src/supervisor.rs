//! Top-level coordinator: one monitor task per target plus shutdown sequencing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationSignal;
use crate::config::PolicyConfig;
use crate::monitor::event::MonitorEvent;
use crate::monitor::retry::RetryPolicy;
use crate::monitor::state::MonitorState;
use crate::monitor::Monitor;
use crate::probe::Probe;
use crate::sink::EventSink;
use crate::target::Target;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("no targets configured for monitoring")]
    NoTargets,
    #[error("invalid target '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },
}

/// How the monitors ended during shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Returned from their loop within the grace period.
    pub stopped: usize,
    /// Still running after the grace period and aborted.
    pub abandoned: usize,
    /// Task ended with a panic or was cancelled by the runtime.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Stopped,
    Abandoned,
    Failed,
}

pub struct Supervisor {
    targets: Vec<Target>,
    policy: PolicyConfig,
    probe: Arc<dyn Probe>,
    sink: Arc<dyn EventSink>,
}

impl Supervisor {
    pub fn new(
        targets: Vec<Target>,
        policy: PolicyConfig,
        probe: Arc<dyn Probe>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            targets,
            policy,
            probe,
            sink,
        }
    }

    /// Starts every monitor, waits for `shutdown` to resolve, then stops them.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<ShutdownReport, SupervisorError> {
        let running = self.start()?;
        shutdown.await;
        info!("Shutdown requested, stopping monitors");
        Ok(running.shutdown().await)
    }

    /// Validates the targets and spawns one task per target.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<RunningSupervisor, SupervisorError> {
        if let Err(e) = self.validate() {
            self.sink.emit(MonitorEvent::startup_failed(e.to_string()));
            return Err(e);
        }

        self.sink.emit(MonitorEvent::started(self.targets.len()));

        let signal = CancellationSignal::new();
        let policy = RetryPolicy::from_config(&self.policy);

        let monitors = self
            .targets
            .into_iter()
            .map(|target| {
                let name = target.name.clone();
                let monitor = Monitor::new(
                    target,
                    policy.clone(),
                    Arc::clone(&self.probe),
                    Arc::clone(&self.sink),
                );
                let handle = tokio::spawn(monitor.run(signal.listener()));
                MonitorHandle { name, handle }
            })
            .collect();

        Ok(RunningSupervisor {
            signal,
            monitors,
            grace: self.policy.shutdown_grace,
            sink: self.sink,
        })
    }

    fn validate(&self) -> Result<(), SupervisorError> {
        if self.targets.is_empty() {
            return Err(SupervisorError::NoTargets);
        }
        for target in &self.targets {
            target
                .validate()
                .map_err(|reason| SupervisorError::InvalidTarget {
                    name: target.name.clone(),
                    reason,
                })?;
        }
        Ok(())
    }
}

struct MonitorHandle {
    name: String,
    handle: JoinHandle<MonitorState>,
}

/// Monitors that are currently running.
///
/// Dropping this without calling [`RunningSupervisor::shutdown`] drops the
/// cancellation signal, which every monitor treats as a stop request.
pub struct RunningSupervisor {
    signal: CancellationSignal,
    monitors: Vec<MonitorHandle>,
    grace: Duration,
    sink: Arc<dyn EventSink>,
}

impl RunningSupervisor {
    pub fn target_count(&self) -> usize {
        self.monitors.len()
    }

    /// Sets the cancellation signal and waits for every monitor, each bounded
    /// by the grace period. Monitors still running after it are aborted.
    pub async fn shutdown(self) -> ShutdownReport {
        self.signal.cancel();

        let grace = self.grace;
        let endings = join_all(self.monitors.into_iter().map(|m| async move {
            let MonitorHandle { name, mut handle } = m;
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(state)) => {
                    debug!(
                        target_name = %name,
                        consecutive_failures = state.consecutive_failures(),
                        "Monitor stopped"
                    );
                    Ending::Stopped
                }
                Ok(Err(e)) => {
                    error!(target_name = %name, error = %e, "Monitor task ended abnormally");
                    Ending::Failed
                }
                Err(_) => {
                    warn!(
                        target_name = %name,
                        grace_ms = grace.as_millis() as u64,
                        "Monitor did not stop within grace period, abandoning"
                    );
                    handle.abort();
                    Ending::Abandoned
                }
            }
        }))
        .await;

        let count = |wanted: Ending| endings.iter().filter(|e| **e == wanted).count();
        let report = ShutdownReport {
            stopped: count(Ending::Stopped),
            abandoned: count(Ending::Abandoned),
            failed: count(Ending::Failed),
        };

        self.sink.emit(MonitorEvent::stopped());
        report
    }
}
