//! Discovery service: the run registry and the per-run driver.
//!
//! `run_discovery` validates the brand list, builds run-scoped resources
//! and spawns a driver task. The driver launches one task per
//! (strategy, term) pair, all sending into one bounded channel drained by
//! a single [`Enricher`]. Pause and cancel are cooperative: strategies
//! observe them at their next checkpoint. After a cancel, strategies get
//! `cancel_grace_ms` to wind down before their tasks are aborted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::pipeline::enrich::{Aggregation, Enricher};
use crate::pipeline::events::{EventLog, LogKind, LogLevel, LogStream};
use crate::pipeline::resources::{NetworkResources, ResourceProvider, RunResources};
use crate::pipeline::run::{RunHandle, RunResult, RunSnapshot, RunState};
use crate::pipeline::stats::RunStats;
use crate::strategies::{self, Emitter, RunContext, StrategyStats, Term};

/// Registry entry shared between the service and the run's driver task.
struct RunEntry {
    run_id: Uuid,
    brands: Vec<String>,
    started_at: DateTime<Utc>,
    state: watch::Sender<RunState>,
    pause: watch::Sender<bool>,
    cancel: CancellationToken,
    log: Arc<EventLog>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    outcome: Mutex<Option<std::result::Result<RunResult, String>>>,
}

impl RunEntry {
    fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Checked, atomic state change. Returns the previous state.
    fn transition(&self, to: RunState) -> Result<RunState> {
        let mut outcome = Ok(RunState::Pending);
        self.state.send_if_modified(|state| {
            outcome = state.transition(to);
            outcome.is_ok()
        });
        let from = outcome?;
        self.log.info(
            LogKind::StateChanged,
            None,
            format!("{from} -> {to}"),
        );
        Ok(from)
    }

    fn snapshot(&self, per_strategy_counts: BTreeMap<String, usize>) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            brands: self.brands.clone(),
            state: self.state(),
            per_strategy_counts,
            started_at: self.started_at,
            ended_at: self.ended_at.lock().ok().and_then(|t| *t),
        }
    }
}

/// Entry point for running and controlling discovery runs.
pub struct DiscoveryService {
    config: Arc<ScoutConfig>,
    provider: Arc<dyn ResourceProvider>,
    runs: RwLock<HashMap<Uuid, Arc<RunEntry>>>,
}

impl DiscoveryService {
    /// Service over the real network stack.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] if `config` is invalid.
    pub fn new(config: ScoutConfig) -> Result<Self> {
        Self::with_provider(config, Arc::new(NetworkResources))
    }

    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] if `config` is invalid.
    pub fn with_provider(config: ScoutConfig, provider: Arc<dyn ResourceProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            provider,
            runs: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    /// Start a run over `brands` and return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] for an empty brand list, or the
    /// provider's error if run resources cannot be built.
    pub async fn run_discovery(&self, brands: &[String]) -> Result<RunHandle> {
        let brands = clean_brands(brands);
        if brands.is_empty() {
            return Err(ScoutError::Config(
                "at least one non-blank brand is required".into(),
            ));
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let resources = self.provider.provide(&self.config, cancel.clone())?;
        let (state, _) = watch::channel(RunState::Pending);
        let (pause, _) = watch::channel(false);
        let entry = Arc::new(RunEntry {
            run_id,
            brands: brands.clone(),
            started_at: Utc::now(),
            state,
            pause,
            cancel,
            log: Arc::new(EventLog::new(
                run_id,
                self.config.log_history_limit,
                self.config.pipeline.log_channel_capacity,
            )),
            ended_at: Mutex::new(None),
            outcome: Mutex::new(None),
        });
        self.runs.write().await.insert(run_id, entry.clone());

        entry.transition(RunState::Running)?;
        entry.log.info(
            LogKind::RunStarted,
            None,
            format!("brands: {}", brands.join(", ")),
        );
        tracing::info!(%run_id, brands = ?brands, "discovery run started");
        tokio::spawn(drive(entry, self.config.clone(), resources));
        Ok(RunHandle { run_id, brands })
    }

    async fn entry(&self, run_id: Uuid) -> Result<Arc<RunEntry>> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(ScoutError::RunNotFound(run_id))
    }

    /// Stop starting new requests at the next safe point.
    ///
    /// # Errors
    ///
    /// Unknown run, or a run that is not running.
    pub async fn pause(&self, run_id: Uuid) -> Result<()> {
        let entry = self.entry(run_id).await?;
        if entry.cancel.is_cancelled() {
            return Err(ScoutError::InvalidTransition {
                from: "cancelling".into(),
                to: RunState::Paused.to_string(),
            });
        }
        entry.transition(RunState::Paused)?;
        entry.pause.send_replace(true);
        Ok(())
    }

    /// # Errors
    ///
    /// Unknown run, or a run that is not paused.
    pub async fn resume(&self, run_id: Uuid) -> Result<()> {
        let entry = self.entry(run_id).await?;
        entry.transition(RunState::Running)?;
        entry.pause.send_replace(false);
        Ok(())
    }

    /// Request cancellation. The run finalizes as `Cancelled` with whatever
    /// was aggregated. Repeated requests are no-ops.
    ///
    /// # Errors
    ///
    /// Unknown run, or a run that already ended.
    pub async fn cancel(&self, run_id: Uuid) -> Result<()> {
        let entry = self.entry(run_id).await?;
        let state = entry.state();
        if state.is_terminal() {
            return Err(ScoutError::InvalidTransition {
                from: state.to_string(),
                to: RunState::Cancelled.to_string(),
            });
        }
        if !entry.cancel.is_cancelled() {
            entry.log.info(LogKind::Warning, None, "cancellation requested");
            entry.cancel.cancel();
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Unknown run.
    pub async fn snapshot(&self, run_id: Uuid) -> Result<RunSnapshot> {
        let entry = self.entry(run_id).await?;
        if let Ok(Some(Ok(result))) = entry.outcome.lock().as_deref() {
            return Ok(result.run.clone());
        }
        Ok(entry.snapshot(BTreeMap::new()))
    }

    /// History then live tail of the run's log.
    ///
    /// # Errors
    ///
    /// Unknown run.
    pub async fn subscribe_log(&self, run_id: Uuid) -> Result<LogStream> {
        Ok(self.entry(run_id).await?.log.subscribe())
    }

    /// The result once the run ended, `None` while it is still going.
    ///
    /// # Errors
    ///
    /// Unknown run, or [`ScoutError::Pipeline`] for a failed run.
    pub async fn get_result(&self, run_id: Uuid) -> Result<Option<RunResult>> {
        let entry = self.entry(run_id).await?;
        let outcome = entry
            .outcome
            .lock()
            .map_err(|_| ScoutError::Pipeline("run outcome lock poisoned".into()))?
            .clone();
        match outcome {
            None => Ok(None),
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(reason)) => Err(ScoutError::Pipeline(reason)),
        }
    }

    /// Wait for the run to end and return its result.
    ///
    /// # Errors
    ///
    /// Unknown run, or [`ScoutError::Pipeline`] for a failed run.
    pub async fn wait(&self, run_id: Uuid) -> Result<RunResult> {
        let entry = self.entry(run_id).await?;
        let mut state = entry.state.subscribe();
        state
            .wait_for(RunState::is_terminal)
            .await
            .map_err(|e| ScoutError::Channel(e.to_string()))?;
        drop(state);
        self.get_result(run_id)
            .await?
            .ok_or_else(|| ScoutError::Pipeline("run ended without a result".into()))
    }

    /// Ids of all known runs.
    pub async fn runs(&self) -> Vec<Uuid> {
        self.runs.read().await.keys().copied().collect()
    }
}

/// Trim, drop blanks, dedup case-insensitively keeping the first spelling.
fn clean_brands(brands: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    brands
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty() && seen.insert(b.to_lowercase()))
        .map(str::to_owned)
        .collect()
}

/// Output of one strategy task.
struct TaskOutcome {
    tag: String,
    term: Term,
    stats: StrategyStats,
}

async fn drive(entry: Arc<RunEntry>, config: Arc<ScoutConfig>, resources: RunResources) {
    let run_id = entry.run_id;
    let outcome = execute(&entry, config, resources).await;

    let (final_state, outcome) = match outcome {
        Ok(mut result) => {
            let state = if entry.cancel.is_cancelled() {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
            result.run.state = state;
            (state, Ok(result))
        }
        Err(err) => {
            tracing::error!(%run_id, error = %err, "discovery run failed");
            entry
                .log
                .emit(LogLevel::Error, LogKind::Warning, None, err.to_string());
            (RunState::Failed, Err(err.to_string()))
        }
    };

    let ended_at = Utc::now();
    if let Ok(mut slot) = entry.ended_at.lock() {
        *slot = Some(ended_at);
    }
    let outcome = outcome.map(|mut result| {
        result.run.ended_at = Some(ended_at);
        result
    });
    let summary = match &outcome {
        Ok(result) => format!(
            "{final_state}: {} candidates, {} companies, {} contacts",
            result.stats.candidates_total,
            result.stats.companies_after_dedup,
            result.stats.contacts_total
        ),
        Err(reason) => format!("{final_state}: {reason}"),
    };
    if let Ok(mut slot) = entry.outcome.lock() {
        *slot = Some(outcome);
    }
    // The result is stored before the state turns terminal so waiters see it.
    if let Err(err) = entry.transition(final_state) {
        tracing::error!(%run_id, error = %err, "could not finalize run state");
    }
    entry.log.info(LogKind::RunFinished, None, summary);
}

async fn execute(
    entry: &Arc<RunEntry>,
    config: Arc<ScoutConfig>,
    resources: RunResources,
) -> Result<RunResult> {
    let ctx = RunContext::new(
        entry.cancel.clone(),
        entry.pause.subscribe(),
        resources.gateway.clone(),
        resources.fetcher.clone(),
        config.clone(),
    );
    let enricher = Enricher::new(ctx.clone(), entry.brands.clone(), entry.log.clone(), &resources)?;

    let enabled = strategies::enabled(&config.strategies);
    let per_strategy: BTreeMap<String, usize> = enabled
        .iter()
        .map(|s| (s.tag().to_string(), 0))
        .collect();

    let (tx, rx) = mpsc::channel(config.pipeline.channel_capacity);
    let mut tasks = JoinSet::new();
    for strategy in &enabled {
        for term in strategy.terms(&entry.brands) {
            let strategy = strategy.clone();
            let emitter = Emitter::new(tx.clone());
            let ctx = ctx.clone();
            let log = entry.log.clone();
            tasks.spawn(async move {
                let tag = strategy.tag().to_string();
                log.debug(LogKind::StrategyStarted, Some(&tag), term.to_string());
                let stats = strategy.run(&term, &emitter, &ctx).await.finish();
                TaskOutcome { tag, term, stats }
            });
        }
    }
    drop(tx);
    tracing::debug!(run_id = %entry.run_id, tasks = tasks.len(), "strategy tasks launched");

    let consumer = tokio::spawn(enricher.consume(rx, per_strategy));
    let grace = Duration::from_millis(config.pipeline.cancel_grace_ms);
    let mut stats = join_strategies(&mut tasks, &entry.cancel, grace, &entry.log).await;

    let aggregation = consumer
        .await
        .map_err(|e| ScoutError::Pipeline(format!("aggregation consumer failed: {e}")))?;
    apply_aggregation(&mut stats, &aggregation);

    let Aggregation {
        companies,
        contacts,
        per_strategy,
        ..
    } = aggregation;
    stats.contacts_total = contacts.len();
    stats.per_strategy = per_strategy.clone();

    Ok(RunResult {
        run: entry.snapshot(per_strategy),
        companies,
        contacts,
        stats,
    })
}

/// Collect strategy tasks until all are done, aborting the stragglers once
/// the grace period after cancellation runs out.
async fn join_strategies(
    tasks: &mut JoinSet<TaskOutcome>,
    cancel: &CancellationToken,
    grace: Duration,
    log: &EventLog,
) -> RunStats {
    let mut stats = RunStats::default();
    let mut deadline: Option<Instant> = None;
    let mut aborted = false;

    loop {
        let joined = tokio::select! {
            joined = tasks.join_next() => joined,
            _ = cancel.cancelled(), if deadline.is_none() && !aborted => {
                deadline = Some(Instant::now() + grace);
                continue;
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if !tasks.is_empty() {
                    log.warn(
                        LogKind::Warning,
                        None,
                        format!("grace period over, aborting {} strategy task(s)", tasks.len()),
                    );
                }
                tasks.abort_all();
                deadline = None;
                aborted = true;
                continue;
            }
        };
        let Some(joined) = joined else { break };

        match joined {
            Ok(TaskOutcome { tag, term, stats: task }) => {
                if task.degraded {
                    log.warn(
                        LogKind::StrategyDegraded,
                        Some(&tag),
                        format!("{term}: all {} network call(s) failed", task.attempts),
                    );
                } else {
                    log.debug(
                        LogKind::StrategyFinished,
                        Some(&tag),
                        format!("{term}: {} candidate(s)", task.candidates),
                    );
                }
                stats.record_strategy(&tag, &task);
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                stats.errors += 1;
                log.emit(
                    LogLevel::Error,
                    LogKind::Warning,
                    None,
                    format!("strategy task failed: {err}"),
                );
            }
        }
    }
    stats.refresh_degraded();
    stats
}

fn apply_aggregation(stats: &mut RunStats, aggregation: &Aggregation) {
    stats.candidates_total = aggregation.candidates_total;
    stats.rejected = aggregation.rejected;
    stats.unvalidated = aggregation.unvalidated;
    stats.unresolved_domains = aggregation.unresolved_domains;
    stats.companies_before_dedup = aggregation.companies_before_dedup;
    stats.companies_after_dedup = aggregation.companies_after_dedup;
}
