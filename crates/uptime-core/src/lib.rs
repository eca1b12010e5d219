#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod monitor;
pub mod probe;
pub mod sink;
pub mod supervisor;
pub mod target;

pub use cancel::{CancellationListener, CancellationSignal};
pub use config::{PolicyConfig, DEFAULT_INTERVAL};
pub use monitor::{
    CheckOutcome, EventKind, EventRing, Monitor, MonitorError, MonitorEvent, MonitorPhase,
    MonitorState, RetryPolicy, ERROR_BACKOFF,
};
pub use probe::{HttpProbe, Probe, ProbeError};
pub use sink::{event_channel, ChannelSink, EventDispatcher, EventSink, TracingSink};
pub use supervisor::{RunningSupervisor, ShutdownReport, Supervisor, SupervisorError};
pub use target::Target;
