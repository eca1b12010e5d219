pub mod engine;
pub mod error;
pub mod event;
pub mod retry;
pub mod state;

pub use engine::{Monitor, ERROR_BACKOFF};
pub use error::MonitorError;
pub use event::{EventKind, EventRing, MonitorEvent};
pub use retry::{CheckOutcome, RetryPolicy};
pub use state::{MonitorPhase, MonitorState};
