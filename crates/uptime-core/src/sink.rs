//! Event sinks.
//!
//! Monitors report through an injected [`EventSink`]. `emit` is synchronous
//! and must return promptly. Slow consumers sit behind a [`ChannelSink`] and
//! are fed by an [`EventDispatcher`] running as its own task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::monitor::event::{EventKind, MonitorEvent};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: MonitorEvent) {
        match &event.kind {
            EventKind::Started { target_count } => {
                info!(target_count, "Starting uptime monitor");
            }
            EventKind::CheckRetry {
                target,
                attempt,
                max_retries,
            } => {
                warn!(target_name = %target, attempt, max_retries, "Retry attempt {}/{}", attempt, max_retries);
            }
            EventKind::Up { target } => {
                info!(target_name = %target, "Target is UP");
            }
            EventKind::Downtime {
                target,
                reason,
                consecutive_failures,
            } => {
                error!(
                    target_name = %target,
                    consecutive_failures,
                    reason = %reason,
                    "DOWNTIME DETECTED"
                );
            }
            EventKind::MonitorError { target, message } => {
                error!(target_name = %target, error = %message, "Unexpected error in monitor");
            }
            EventKind::Stopped => {
                info!("All monitors stopped");
            }
            EventKind::StartupFailed { reason } => {
                error!(reason = %reason, "Monitor failed to start");
            }
        }
    }
}

/// Non-blocking sink that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: MonitorEvent) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

pub fn event_channel() -> (mpsc::UnboundedSender<MonitorEvent>, mpsc::UnboundedReceiver<MonitorEvent>) {
    mpsc::unbounded_channel()
}

/// Drains an event channel into downstream sinks.
///
/// Spawned as a background tokio task; returns once every sender is dropped.
pub struct EventDispatcher {
    rx: mpsc::UnboundedReceiver<MonitorEvent>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new(rx: mpsc::UnboundedReceiver<MonitorEvent>) -> Self {
        Self {
            rx,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub async fn run(mut self) {
        debug!(sink_count = self.sinks.len(), "Event dispatcher started");

        while let Some(event) = self.rx.recv().await {
            for sink in &self.sinks {
                sink.emit(event.clone());
            }
        }

        debug!("Event dispatcher shutting down");
    }
}
