use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use uptime_core::{EventRing, EventSink, MonitorEvent, PolicyConfig, Target};

use crate::status::TargetStatus;

pub const EVENT_HISTORY: usize = 200;

/// Shared state behind the status API. Fed by the monitor event stream.
#[derive(Clone)]
pub struct AppState {
    pub targets: Arc<DashMap<String, TargetStatus>>,
    pub events: Arc<Mutex<EventRing>>,
    pub policy: PolicyConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(targets: &[Target]) -> Self {
        let statuses = DashMap::with_capacity(targets.len());
        for target in targets {
            statuses.insert(target.name.clone(), TargetStatus::new(target));
        }

        Self {
            targets: Arc::new(statuses),
            events: Arc::new(Mutex::new(EventRing::new(EVENT_HISTORY))),
            policy: PolicyConfig::default(),
            started_at: Utc::now(),
        }
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Statuses sorted by target name.
    pub fn statuses(&self) -> Vec<TargetStatus> {
        let mut all: Vec<_> = self.targets.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Most recent events first.
    pub fn recent_events(&self, limit: usize) -> Vec<MonitorEvent> {
        let ring = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        ring.list().into_iter().take(limit).collect()
    }
}

impl EventSink for AppState {
    fn emit(&self, event: MonitorEvent) {
        if let Some(name) = event.kind.target() {
            if let Some(mut status) = self.targets.get_mut(name) {
                status.apply(&event);
            }
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
