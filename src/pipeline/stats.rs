use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::strategies::StrategyStats;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Candidates aggregated per source tag, zero for enabled strategies
    /// that found nothing.
    pub per_strategy: BTreeMap<String, usize>,
    /// Request-level counters per source tag, summed over the strategy's
    /// tasks. Tasks aborted after cancellation are missing.
    pub strategies: BTreeMap<String, StrategyStats>,
    pub degraded_strategies: Vec<String>,
    pub candidates_total: usize,
    /// Provisional candidates whose site mentions none of the run's brands.
    pub rejected: usize,
    /// Provisional candidates drained after cancellation, never validated.
    pub unvalidated: usize,
    pub unresolved_domains: usize,
    pub companies_before_dedup: usize,
    pub companies_after_dedup: usize,
    pub contacts_total: usize,
    /// Failed network calls plus strategy tasks that panicked.
    pub errors: usize,
}

impl RunStats {
    /// Fold one finished strategy task into the per-strategy counters.
    pub fn record_strategy(&mut self, tag: &str, stats: &StrategyStats) {
        self.strategies
            .entry(tag.to_owned())
            .or_default()
            .absorb(stats);
        self.errors += stats.failures;
    }

    /// Recompute `degraded_strategies` from the per-strategy counters.
    pub fn refresh_degraded(&mut self) {
        self.degraded_strategies = self
            .strategies
            .iter()
            .filter(|(_, stats)| stats.degraded)
            .map(|(tag, _)| tag.clone())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_degrades_only_when_every_task_failed() {
        let failed = StrategyStats {
            attempts: 3,
            failures: 3,
            ..Default::default()
        }
        .finish();
        let partial = StrategyStats {
            attempts: 2,
            failures: 1,
            ..Default::default()
        }
        .finish();

        let mut stats = RunStats::default();
        stats.record_strategy("convention", &failed);
        stats.record_strategy("overlap", &failed);
        stats.record_strategy("overlap", &partial);
        stats.refresh_degraded();

        assert_eq!(stats.degraded_strategies, vec!["convention".to_string()]);
        assert_eq!(stats.errors, 7);
        assert_eq!(stats.strategies["overlap"].attempts, 5);
    }
}
