use std::any::Any;

use thiserror::Error;

/// Failure inside a monitor's check step that no probe or retry path classified.
///
/// The monitor reports it, backs off for a fixed period and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("unexpected error in check cycle: {0}")]
    Unexpected(String),
}

impl MonitorError {
    /// Builds the error from a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Unexpected(message)
    }
}
