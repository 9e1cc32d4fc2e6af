//! Run lifecycle: states, transitions, snapshots and results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScoutError};
use crate::model::{CompanyRecord, ContactRecord};
use crate::pipeline::stats::RunStats;

/// Lifecycle state of a discovery run.
///
/// `Pending → Running → (Paused ↔ Running) → {Completed, Cancelled, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn can_transition(&self, to: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, to),
            (Pending, Running | Cancelled | Failed)
                | (Running, Paused | Completed | Cancelled | Failed)
                | (Paused, Running | Completed | Cancelled | Failed)
        )
    }

    /// Checked transition; returns the previous state.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::InvalidTransition`] when `to` is not reachable
    /// from the current state.
    pub fn transition(&mut self, to: RunState) -> Result<RunState> {
        if !self.can_transition(to) {
            return Err(ScoutError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        let from = *self;
        *self = to;
        Ok(from)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `run_discovery`; the id addresses every later control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: Uuid,
    /// Brands after trimming and case-insensitive dedup.
    pub brands: Vec<String>,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub brands: Vec<String>,
    pub state: RunState,
    /// Candidates aggregated per source tag. Filled when the run ends.
    pub per_strategy_counts: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Output of a finished (completed or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run: RunSnapshot,
    pub companies: Vec<CompanyRecord>,
    pub contacts: Vec<ContactRecord>,
    pub stats: RunStats,
}
