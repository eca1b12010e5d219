use serde::{Deserialize, Serialize};

use super::retry::CheckOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Checking,
    Sleeping,
    Stopped,
}

impl MonitorPhase {
    pub fn can_transition_to(self, target: MonitorPhase) -> bool {
        matches!(
            (self, target),
            (MonitorPhase::Idle, MonitorPhase::Checking)
                | (MonitorPhase::Idle, MonitorPhase::Stopped)
                | (MonitorPhase::Checking, MonitorPhase::Sleeping)
                | (MonitorPhase::Checking, MonitorPhase::Stopped)
                | (MonitorPhase::Sleeping, MonitorPhase::Checking)
                | (MonitorPhase::Sleeping, MonitorPhase::Stopped)
        )
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Failure bookkeeping owned by a single monitor task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    consecutive_failures: u32,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one check outcome and returns the updated failure count.
    pub fn record(&mut self, outcome: &CheckOutcome) -> u32 {
        match outcome {
            CheckOutcome::Up { .. } => self.consecutive_failures = 0,
            CheckOutcome::Down { .. } => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1)
            }
        }
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn up() -> CheckOutcome {
        CheckOutcome::Up { attempts: 1 }
    }

    fn down() -> CheckOutcome {
        CheckOutcome::Down {
            reason: "request timed out".into(),
        }
    }

    #[test]
    fn valid_phase_transitions() {
        assert!(MonitorPhase::Idle.can_transition_to(MonitorPhase::Checking));
        assert!(MonitorPhase::Checking.can_transition_to(MonitorPhase::Sleeping));
        assert!(MonitorPhase::Sleeping.can_transition_to(MonitorPhase::Checking));
        assert!(MonitorPhase::Sleeping.can_transition_to(MonitorPhase::Stopped));
        assert!(MonitorPhase::Checking.can_transition_to(MonitorPhase::Stopped));
    }

    #[test]
    fn stopped_is_terminal() {
        for next in [
            MonitorPhase::Idle,
            MonitorPhase::Checking,
            MonitorPhase::Sleeping,
            MonitorPhase::Stopped,
        ] {
            assert!(!MonitorPhase::Stopped.can_transition_to(next));
        }
        assert!(!MonitorPhase::Sleeping.can_transition_to(MonitorPhase::Idle));
    }

    #[test]
    fn failures_count_up_and_reset() {
        let mut state = MonitorState::new();
        assert_eq!(state.record(&down()), 1);
        assert_eq!(state.record(&down()), 2);
        assert_eq!(state.record(&down()), 3);
        assert_eq!(state.record(&up()), 0);
        assert_eq!(state.record(&down()), 1);
        assert_eq!(state.consecutive_failures(), 1);
    }

    #[test]
    fn counter_matches_reference_over_mixed_sequences() {
        let patterns: [&[bool]; 4] = [
            &[true, true, true],
            &[false, false, true, false],
            &[false; 7],
            &[true, false, false, true, false, false, false, true],
        ];
        for pattern in patterns {
            let mut state = MonitorState::new();
            let mut expected = 0u32;
            for &is_up in pattern {
                let got = state.record(&if is_up { up() } else { down() });
                expected = if is_up { 0 } else { expected + 1 };
                assert_eq!(got, expected, "pattern {:?}", pattern);
            }
        }
    }

    #[test]
    fn counter_saturates() {
        let mut state = MonitorState {
            consecutive_failures: u32::MAX,
        };
        assert_eq!(state.record(&down()), u32::MAX);
    }
}
