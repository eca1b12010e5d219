use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::cancel::CancellationListener;
use crate::monitor::error::MonitorError;
use crate::monitor::event::MonitorEvent;
use crate::monitor::retry::{CheckOutcome, RetryPolicy};
use crate::monitor::state::{MonitorPhase, MonitorState};
use crate::probe::Probe;
use crate::sink::EventSink;
use crate::target::Target;

/// Wait applied after an unexpected error in place of the regular interval.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// The scheduling loop for a single target.
pub struct Monitor {
    target: Target,
    policy: RetryPolicy,
    probe: Arc<dyn Probe>,
    sink: Arc<dyn EventSink>,
    state: MonitorState,
    phase: watch::Sender<MonitorPhase>,
}

impl Monitor {
    pub fn new(
        target: Target,
        policy: RetryPolicy,
        probe: Arc<dyn Probe>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (phase, _) = watch::channel(MonitorPhase::Idle);
        Self {
            target,
            policy,
            probe,
            sink,
            state: MonitorState::new(),
            phase,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Subscribes to phase changes. Call before [`Monitor::run`] consumes the monitor.
    pub fn phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.subscribe()
    }

    /// Runs check cycles until `cancel` fires, then returns the final state.
    ///
    /// Nothing inside the loop is allowed to end it early: probe failures are
    /// outcomes, and a panic in the check step is reported and backed off.
    pub async fn run(mut self, mut cancel: CancellationListener) -> MonitorState {
        info!(
            target_name = %self.target.name,
            url = %self.target.url,
            interval_secs = self.target.interval.as_secs_f64(),
            "Starting monitoring"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_phase(MonitorPhase::Checking);
            debug!(target_name = %self.target.name, "Checking {}", self.target.url);

            let wait = match self.check_step(&mut cancel).await {
                Ok(true) => self.target.interval,
                Ok(false) => break,
                Err(e) => {
                    self.report_error(e);
                    ERROR_BACKOFF
                }
            };

            self.set_phase(MonitorPhase::Sleeping);
            if !cancel.sleep(wait).await {
                break;
            }
        }

        self.set_phase(MonitorPhase::Stopped);
        debug!(target_name = %self.target.name, "Monitor stopped");
        self.state
    }

    /// Runs one check cycle and handles its outcome. A panic anywhere in the
    /// step is returned as [`MonitorError::Unexpected`].
    ///
    /// `Ok(false)` means cancellation interrupted the cycle.
    async fn check_step(&mut self, cancel: &mut CancellationListener) -> Result<bool, MonitorError> {
        let step = async {
            let outcome = self
                .policy
                .check_with_retry(
                    self.probe.as_ref(),
                    &self.target,
                    self.sink.as_ref(),
                    &mut *cancel,
                )
                .await;
            match outcome {
                Some(outcome) => {
                    self.apply(outcome);
                    true
                }
                None => false,
            }
        };
        AssertUnwindSafe(step)
            .catch_unwind()
            .await
            .map_err(MonitorError::from_panic)
    }

    fn report_error(&self, error: MonitorError) {
        let event = MonitorEvent::monitor_error(self.target.name.as_str(), error.to_string());
        let sink = &self.sink;
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
            error!(target_name = %self.target.name, "Event sink panicked while reporting an error");
        }
    }

    fn apply(&mut self, outcome: CheckOutcome) {
        let failures = self.state.record(&outcome);
        match outcome {
            CheckOutcome::Up { .. } => {
                self.sink.emit(MonitorEvent::up(self.target.name.as_str()));
            }
            CheckOutcome::Down { reason } => {
                self.sink.emit(MonitorEvent::downtime(
                    self.target.name.as_str(),
                    reason,
                    failures,
                ));
            }
        }
    }

    fn set_phase(&self, next: MonitorPhase) {
        self.phase.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug_assert!(
                current.can_transition_to(next),
                "invalid phase transition {} -> {}",
                current,
                next
            );
            *current = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cancel::CancellationSignal;
    use crate::monitor::event::EventKind;
    use crate::probe::ProbeError;

    /// Plays back a fixed script of results, repeating the last one.
    struct ScriptedProbe {
        script: Vec<Result<(), ProbeError>>,
        calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<(), ProbeError>>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, _url: &str, _timeout: Duration) -> Result<(), ProbeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.script[n.min(self.script.len() - 1)].clone()
        }
    }

    /// Panics on the first call, then succeeds.
    struct PanicOnceProbe {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Probe for PanicOnceProbe {
        async fn probe(&self, _url: &str, _timeout: Duration) -> Result<(), ProbeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("outcome handler bug");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<MonitorEvent>>);

    impl EventSink for Collect {
        fn emit(&self, event: MonitorEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Collect {
        fn kinds(&self) -> Vec<EventKind> {
            self.0.lock().unwrap().iter().map(|e| e.kind.clone()).collect()
        }
    }

    fn target() -> Target {
        Target::new("https://svc.example", Duration::from_secs(10)).with_name("svc")
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(1), 1, Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_failures_and_resets_on_up() {
        let probe = ScriptedProbe::new(vec![
            Err(ProbeError::Timeout),
            Err(ProbeError::Timeout),
            Ok(()),
            Err(ProbeError::HttpStatus(503)),
        ]);
        let sink = Arc::new(Collect::default());
        let signal = CancellationSignal::new();

        let monitor = Monitor::new(target(), policy(), probe.clone(), sink.clone());
        let handle = tokio::spawn(monitor.run(signal.listener()));

        // Checks run at t=0, 10, 20, 30.
        tokio::time::sleep(Duration::from_secs(35)).await;
        signal.cancel();
        let state = handle.await.unwrap();

        assert_eq!(probe.calls(), 4);
        assert_eq!(state.consecutive_failures(), 1);

        let failures: Vec<Option<u32>> = sink
            .kinds()
            .into_iter()
            .map(|k| match k {
                EventKind::Downtime {
                    consecutive_failures,
                    ..
                } => Some(consecutive_failures),
                EventKind::Up { .. } => None,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(failures, vec![Some(1), Some(2), None, Some(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_check_is_reported_and_backed_off() {
        let probe = Arc::new(PanicOnceProbe {
            calls: AtomicU32::new(0),
        });
        let sink = Arc::new(Collect::default());
        let signal = CancellationSignal::new();

        let monitor = Monitor::new(target(), policy(), probe.clone(), sink.clone());
        let handle = tokio::spawn(monitor.run(signal.listener()));

        // Back-off is 5s, shorter than the 10s interval.
        tokio::time::sleep(ERROR_BACKOFF + Duration::from_secs(1)).await;
        signal.cancel();
        handle.await.expect("monitor task must not die on a panic");

        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        let kinds = sink.kinds();
        assert_eq!(
            kinds[0],
            EventKind::MonitorError {
                target: "svc".into(),
                message: "unexpected error in check cycle: outcome handler bug".into(),
            }
        );
        assert_eq!(kinds[1], EventKind::Up { target: "svc".into() });
    }

    /// Panics on the first `up` event it receives.
    #[derive(Default)]
    struct PanicOnFirstUp {
        inner: Collect,
        panicked: AtomicU32,
    }

    impl EventSink for PanicOnFirstUp {
        fn emit(&self, event: MonitorEvent) {
            if matches!(event.kind, EventKind::Up { .. })
                && self.panicked.fetch_add(1, Ordering::SeqCst) == 0
            {
                panic!("sink rejected event");
            }
            self.inner.emit(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_outcome_handling_keeps_monitoring() {
        let probe = ScriptedProbe::new(vec![Ok(())]);
        let sink = Arc::new(PanicOnFirstUp::default());
        let signal = CancellationSignal::new();

        let monitor = Monitor::new(target(), policy(), probe.clone(), sink.clone());
        let handle = tokio::spawn(monitor.run(signal.listener()));

        // t=0 panics and backs off 5s; later checks at t=5, 15, 25.
        tokio::time::sleep(Duration::from_secs(30)).await;
        signal.cancel();
        handle.await.expect("monitor task must survive a panicking sink");

        assert_eq!(probe.calls(), 4);
        let kinds = sink.inner.kinds();
        assert_eq!(
            kinds[0],
            EventKind::MonitorError {
                target: "svc".into(),
                message: "unexpected error in check cycle: sink rejected event".into(),
            }
        );
        assert_eq!(kinds[1..].len(), 3);
        assert!(kinds[1..].iter().all(|k| matches!(k, EventKind::Up { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn phases_end_in_stopped() {
        let probe = ScriptedProbe::new(vec![Ok(())]);
        let sink = Arc::new(Collect::default());
        let signal = CancellationSignal::new();

        let monitor = Monitor::new(target(), policy(), probe, sink);
        let mut phase = monitor.phase();
        assert_eq!(*phase.borrow(), MonitorPhase::Idle);

        let handle = tokio::spawn(monitor.run(signal.listener()));
        phase
            .wait_for(|p| *p == MonitorPhase::Sleeping)
            .await
            .unwrap();

        signal.cancel();
        handle.await.unwrap();
        assert_eq!(*phase.borrow(), MonitorPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_monitor_never_probes() {
        let probe = ScriptedProbe::new(vec![Ok(())]);
        let sink = Arc::new(Collect::default());
        let signal = CancellationSignal::new();
        signal.cancel();

        let monitor = Monitor::new(target(), policy(), probe.clone(), sink.clone());
        monitor.run(signal.listener()).await;

        assert_eq!(probe.calls(), 0);
        assert!(sink.kinds().is_empty());
    }
}
