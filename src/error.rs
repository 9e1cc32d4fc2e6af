//! Error types for brandscout.

use scout_search::SearchError;
use uuid::Uuid;

/// Top-level error type for discovery runs.
///
/// Per-request and per-candidate failures are never surfaced through this
/// type during a run; they are contained and counted in the run statistics.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Search or network failure.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Orchestrator-level fault.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Persistence gateway failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// No run with this id is known to the service.
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// A run-control request that the current state does not allow.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScoutError>;
