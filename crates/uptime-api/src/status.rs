use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use uptime_core::{EventKind, MonitorEvent, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Live status of one target, rebuilt from the event stream. Kept in memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetStatus {
    pub name: String,
    pub url: String,
    pub interval_secs: f64,
    pub status: Availability,
    pub consecutive_failures: u32,
    pub checks: u64,
    pub failures: u64,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_change: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reason: Option<String>,
}

impl TargetStatus {
    pub fn new(target: &Target) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            interval_secs: target.interval.as_secs_f64(),
            status: Availability::Unknown,
            consecutive_failures: 0,
            checks: 0,
            failures: 0,
            last_checked: None,
            last_change: None,
            last_reason: None,
        }
    }

    pub fn apply(&mut self, event: &MonitorEvent) {
        match &event.kind {
            EventKind::Up { .. } => {
                self.checks += 1;
                self.consecutive_failures = 0;
                self.transition(Availability::Up, event.timestamp);
                self.last_checked = Some(event.timestamp);
            }
            EventKind::Downtime {
                reason,
                consecutive_failures,
                ..
            } => {
                self.checks += 1;
                self.failures += 1;
                self.consecutive_failures = *consecutive_failures;
                self.last_reason = Some(reason.clone());
                self.transition(Availability::Down, event.timestamp);
                self.last_checked = Some(event.timestamp);
            }
            EventKind::MonitorError { message, .. } => {
                self.last_reason = Some(message.clone());
            }
            _ => {}
        }
    }

    fn transition(&mut self, next: Availability, at: DateTime<Utc>) {
        if self.status != next {
            self.status = next;
            self.last_change = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn status() -> TargetStatus {
        TargetStatus::new(&Target::new("https://api.example", Duration::from_secs(30)).with_name("api"))
    }

    #[test]
    fn starts_unknown() {
        let s = status();
        assert_eq!(s.status, Availability::Unknown);
        assert_eq!(s.checks, 0);
        assert!(s.last_checked.is_none());
        assert_eq!(s.interval_secs, 30.0);
    }

    #[test]
    fn tracks_transitions_and_counters() {
        let mut s = status();
        s.apply(&MonitorEvent::up("api"));
        let first_change = s.last_change;
        assert_eq!(s.status, Availability::Up);

        s.apply(&MonitorEvent::up("api"));
        assert_eq!(s.last_change, first_change);

        s.apply(&MonitorEvent::downtime("api", "HTTP status 500", 1));
        s.apply(&MonitorEvent::downtime("api", "request timed out", 2));
        assert_eq!(s.status, Availability::Down);
        assert_eq!(s.consecutive_failures, 2);
        assert_eq!(s.checks, 4);
        assert_eq!(s.failures, 2);
        assert_eq!(s.last_reason.as_deref(), Some("request timed out"));

        s.apply(&MonitorEvent::up("api"));
        assert_eq!(s.consecutive_failures, 0);
        assert_eq!(s.status, Availability::Up);
    }

    #[test]
    fn retries_do_not_count_as_checks() {
        let mut s = status();
        s.apply(&MonitorEvent::check_retry("api", 2, 3));
        assert_eq!(s.checks, 0);
        assert_eq!(s.status, Availability::Unknown);
    }
}
