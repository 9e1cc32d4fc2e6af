//! Discovery run orchestration.

pub mod coordinator;
pub mod enrich;
pub mod events;
pub mod resources;
pub mod run;
pub mod stats;

pub use coordinator::DiscoveryService;
pub use events::{EventLog, LogEvent, LogKind, LogLevel, LogStream};
pub use resources::{NetworkResources, ResourceProvider, RunResources};
pub use run::{RunHandle, RunResult, RunSnapshot, RunState};
pub use stats::RunStats;
