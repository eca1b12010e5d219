use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Started {
        target_count: usize,
    },
    CheckRetry {
        target: String,
        attempt: u32,
        max_retries: u32,
    },
    Up {
        target: String,
    },
    Downtime {
        target: String,
        reason: String,
        consecutive_failures: u32,
    },
    MonitorError {
        target: String,
        message: String,
    },
    Stopped,
    StartupFailed {
        reason: String,
    },
}

impl EventKind {
    /// Name of the target the event concerns, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::CheckRetry { target, .. }
            | Self::Up { target }
            | Self::Downtime { target, .. }
            | Self::MonitorError { target, .. } => Some(target),
            Self::Started { .. } | Self::Stopped | Self::StartupFailed { .. } => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { .. } => write!(f, "STARTED"),
            Self::CheckRetry { .. } => write!(f, "RETRY"),
            Self::Up { .. } => write!(f, "UP"),
            Self::Downtime { .. } => write!(f, "DOWN"),
            Self::MonitorError { .. } => write!(f, "ERROR"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::StartupFailed { .. } => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl MonitorEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn started(target_count: usize) -> Self {
        Self::new(EventKind::Started { target_count })
    }

    pub fn check_retry(target: impl Into<String>, attempt: u32, max_retries: u32) -> Self {
        Self::new(EventKind::CheckRetry {
            target: target.into(),
            attempt,
            max_retries,
        })
    }

    pub fn up(target: impl Into<String>) -> Self {
        Self::new(EventKind::Up {
            target: target.into(),
        })
    }

    pub fn downtime(
        target: impl Into<String>,
        reason: impl Into<String>,
        consecutive_failures: u32,
    ) -> Self {
        Self::new(EventKind::Downtime {
            target: target.into(),
            reason: reason.into(),
            consecutive_failures,
        })
    }

    pub fn monitor_error(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventKind::MonitorError {
            target: target.into(),
            message: message.into(),
        })
    }

    pub fn stopped() -> Self {
        Self::new(EventKind::Stopped)
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::new(EventKind::StartupFailed {
            reason: reason.into(),
        })
    }
}

/// Fixed-capacity circular buffer for recent events. O(1) insert, evicts oldest when full.
#[derive(Debug, Clone)]
pub struct EventRing {
    buffer: VecDeque<MonitorEvent>,
    capacity: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, event: MonitorEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    /// Newest first.
    pub fn list(&self) -> Vec<MonitorEvent> {
        self.buffer.iter().rev().cloned().collect()
    }

    pub fn list_chronological(&self) -> Vec<MonitorEvent> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
