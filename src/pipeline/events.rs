//! Per-run event log: append-only history plus a broadcast live tail.
//!
//! Any number of subscribers may attach at any time. Each receives the
//! buffered history followed by live events, with no gap and no duplicate,
//! because the history copy and the broadcast subscription are taken under
//! the same lock that appends. A subscriber that falls behind the broadcast
//! buffer refills the skipped events from history. The stream ends after
//! `RunFinished`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    RunStarted,
    StateChanged,
    StrategyStarted,
    StrategyFinished,
    StrategyDegraded,
    CandidateAccepted,
    CandidateRejected,
    Warning,
    RunFinished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Monotonic per run, starting at 0.
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub kind: LogKind,
    pub strategy: Option<String>,
    pub message: String,
}

/// Stream returned by [`EventLog::subscribe`].
pub type LogStream = BoxStream<'static, LogEvent>;

#[derive(Debug, Default)]
struct History {
    events: VecDeque<LogEvent>,
    next_seq: u64,
    closed: bool,
}

#[derive(Debug)]
pub struct EventLog {
    run_id: Uuid,
    history: Arc<Mutex<History>>,
    tx: broadcast::Sender<LogEvent>,
    limit: usize,
}

impl EventLog {
    /// `limit` caps the retained history; `capacity` bounds how far a live
    /// subscriber may lag before it has to catch up from history.
    pub fn new(run_id: Uuid, limit: usize, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            run_id,
            history: Arc::new(Mutex::new(History::default())),
            tx,
            limit: limit.max(1),
        }
    }

    pub fn emit(
        &self,
        level: LogLevel,
        kind: LogKind,
        strategy: Option<&str>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.trace(level, kind, strategy, &message);

        let Ok(mut history) = self.history.lock() else {
            return;
        };
        if history.closed {
            return;
        }
        let event = LogEvent {
            seq: history.next_seq,
            at: Utc::now(),
            level,
            kind,
            strategy: strategy.map(str::to_owned),
            message,
        };
        history.next_seq += 1;
        if history.events.len() == self.limit {
            history.events.pop_front();
        }
        history.events.push_back(event.clone());
        if kind == LogKind::RunFinished {
            history.closed = true;
        }
        // No receivers is fine: history keeps the event.
        let _ = self.tx.send(event);
    }

    pub fn info(&self, kind: LogKind, strategy: Option<&str>, message: impl Into<String>) {
        self.emit(LogLevel::Info, kind, strategy, message);
    }

    pub fn warn(&self, kind: LogKind, strategy: Option<&str>, message: impl Into<String>) {
        self.emit(LogLevel::Warn, kind, strategy, message);
    }

    pub fn debug(&self, kind: LogKind, strategy: Option<&str>, message: impl Into<String>) {
        self.emit(LogLevel::Debug, kind, strategy, message);
    }

    /// Buffered events so far.
    pub fn history(&self) -> Vec<LogEvent> {
        self.history
            .lock()
            .map(|h| h.events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History followed by the live tail.
    pub fn subscribe(&self) -> LogStream {
        let (backlog, closed, mut rx) = match self.history.lock() {
            Ok(history) => (
                history.events.iter().cloned().collect::<Vec<_>>(),
                history.closed,
                self.tx.subscribe(),
            ),
            Err(_) => (Vec::new(), true, self.tx.subscribe()),
        };
        let run_id = self.run_id;
        let history = Arc::clone(&self.history);

        async_stream::stream! {
            let mut last: Option<u64> = None;
            for event in backlog {
                last = Some(event.seq);
                yield event;
            }
            if closed {
                return;
            }
            loop {
                let batch = match rx.recv().await {
                    Ok(event) => vec![event],
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(%run_id, skipped, "log subscriber lagged, replaying history");
                        events_after(&history, last)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let mut finished = false;
                for event in batch {
                    // Replayed events may come around again on the channel.
                    if last.is_some_and(|seen| event.seq <= seen) {
                        continue;
                    }
                    last = Some(event.seq);
                    finished = event.kind == LogKind::RunFinished;
                    yield event;
                    if finished {
                        break;
                    }
                }
                if finished {
                    break;
                }
            }
        }
        .boxed()
    }

    fn trace(&self, level: LogLevel, kind: LogKind, strategy: Option<&str>, message: &str) {
        let run_id = self.run_id;
        let strategy = strategy.unwrap_or("-");
        match level {
            LogLevel::Debug => tracing::debug!(%run_id, ?kind, strategy, "{message}"),
            LogLevel::Info => tracing::info!(%run_id, ?kind, strategy, "{message}"),
            LogLevel::Warn => tracing::warn!(%run_id, ?kind, strategy, "{message}"),
            LogLevel::Error => tracing::error!(%run_id, ?kind, strategy, "{message}"),
        }
    }
}

/// Retained events newer than `after`, oldest first.
fn events_after(history: &Mutex<History>, after: Option<u64>) -> Vec<LogEvent> {
    let Ok(history) = history.lock() else {
        return Vec::new();
    };
    history
        .events
        .iter()
        .filter(|e| after.is_none_or(|seen| e.seq > seen))
        .cloned()
        .collect()
}
