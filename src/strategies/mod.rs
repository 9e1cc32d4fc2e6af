//! Discovery strategies.
//!
//! Each strategy turns one search term (a brand, a product category, or the
//! generic convention sweep) into a stream of [`Candidate`]s sent through an
//! [`Emitter`]. Strategies share nothing but the run's [`RunContext`]; every
//! network call goes through the context so pause, cancellation and failure
//! accounting behave the same everywhere.
//!
//! A failed search or page fetch is logged and skipped. A strategy whose
//! every network call failed reports itself degraded in its
//! [`StrategyStats`] rather than returning an error.

pub mod brand_site;
pub mod convention;
pub mod extract;
pub mod marketplace;
pub mod overlap;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use scout_search::{FetchedPage, PageFetcher, SearchError};

use crate::config::{ScoutConfig, StrategyConfig};
use crate::gateway::{SearchGateway, SearchHit};
use crate::model::{Candidate, SourceTag};

pub use brand_site::BrandSiteStrategy;
pub use convention::ConventionStrategy;
pub use marketplace::MarketplaceStrategy;
pub use overlap::OverlapStrategy;

/// What a strategy task searches for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A competitor brand from the run's brand list.
    Brand(String),
    /// A product category, brand-agnostic.
    Category(String),
    /// Brand-agnostic sweep (generic convention vendor lists).
    Generic,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brand(brand) => write!(f, "brand:{brand}"),
            Self::Category(category) => write!(f, "category:{category}"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// Counters reported by one strategy task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub queries: usize,
    pub hits: usize,
    pub pages_fetched: usize,
    pub candidates: usize,
    /// Network calls that failed after retries.
    pub failures: usize,
    /// Network calls issued (cancelled calls excluded).
    pub attempts: usize,
    /// Every network call failed.
    pub degraded: bool,
}

impl StrategyStats {
    /// Fold another task's counters into this one.
    pub fn absorb(&mut self, other: &StrategyStats) {
        self.queries += other.queries;
        self.hits += other.hits;
        self.pages_fetched += other.pages_fetched;
        self.candidates += other.candidates;
        self.failures += other.failures;
        self.attempts += other.attempts;
        self.degraded = self.attempts > 0 && self.failures == self.attempts;
    }

    /// Compute the degraded flag; called once the task is done.
    pub fn finish(mut self) -> Self {
        self.degraded = self.attempts > 0 && self.failures == self.attempts;
        self
    }
}

/// Sending half of the run's aggregation channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<Candidate>,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<Candidate>) -> Self {
        Self { tx }
    }

    /// Queue a candidate for aggregation. Returns `false` once the consumer
    /// has gone away, which the caller treats as a stop signal.
    pub async fn emit(&self, candidate: Candidate, stats: &mut StrategyStats) -> bool {
        tracing::trace!(source = %candidate.source, name = %candidate.raw_name, "candidate emitted");
        if self.tx.send(candidate).await.is_ok() {
            stats.candidates += 1;
            true
        } else {
            false
        }
    }
}

/// Per-run handles shared by every strategy task.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pause: watch::Receiver<bool>,
    pub gateway: Arc<dyn SearchGateway>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub config: Arc<ScoutConfig>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("paused", &*self.pause.borrow())
            .finish_non_exhaustive()
    }
}

impl RunContext {
    pub fn new(
        cancel: CancellationToken,
        pause: watch::Receiver<bool>,
        gateway: Arc<dyn SearchGateway>,
        fetcher: Arc<dyn PageFetcher>,
        config: Arc<ScoutConfig>,
    ) -> Self {
        Self {
            cancel,
            pause,
            gateway,
            fetcher,
            config,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Safe point: waits while the run is paused. Returns `false` when the
    /// caller must stop because the run was cancelled.
    pub async fn checkpoint(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let mut pause = self.pause.clone();
        let paused = *pause.borrow_and_update();
        if !paused {
            return true;
        }
        tracing::debug!("strategy task paused");
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            resumed = pause.wait_for(|paused| !*paused) => {
                resumed.is_ok() && !self.cancel.is_cancelled()
            }
        }
    }

    /// Run one search query with failure accounting. `None` means the
    /// query failed or the run stopped.
    pub async fn search(&self, query: &str, stats: &mut StrategyStats) -> Option<Vec<SearchHit>> {
        if !self.checkpoint().await {
            return None;
        }
        stats.queries += 1;
        let max_results = self.config.strategies.max_results_per_query;
        match self.gateway.search(query, max_results).await {
            Ok(hits) => {
                stats.attempts += 1;
                stats.hits += hits.len();
                Some(hits)
            }
            Err(SearchError::Cancelled) => None,
            Err(err) => {
                stats.attempts += 1;
                stats.failures += 1;
                tracing::warn!(query, error = %err, "search failed, skipping query");
                None
            }
        }
    }

    /// Fetch one page with failure accounting.
    pub async fn fetch(&self, url: &str, stats: &mut StrategyStats) -> Option<FetchedPage> {
        if !self.checkpoint().await {
            return None;
        }
        match self.fetcher.fetch(url).await {
            Ok(page) => {
                stats.attempts += 1;
                stats.pages_fetched += 1;
                Some(page)
            }
            Err(SearchError::Cancelled) => None,
            Err(err) => {
                stats.attempts += 1;
                stats.failures += 1;
                tracing::debug!(url, error = %err, "page fetch failed, skipping");
                None
            }
        }
    }
}

/// A discovery method.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Source tag stamped on every candidate this strategy emits.
    fn tag(&self) -> SourceTag;

    /// Terms this strategy runs over for a run with `brands`. One task is
    /// spawned per term.
    fn terms(&self, brands: &[String]) -> Vec<Term> {
        brands.iter().cloned().map(Term::Brand).collect()
    }

    async fn run(&self, term: &Term, emit: &Emitter, ctx: &RunContext) -> StrategyStats;
}

/// Strategies enabled by `config`, in precedence order.
pub fn enabled(config: &StrategyConfig) -> Vec<Arc<dyn Strategy>> {
    let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();
    if config.brand_site {
        strategies.push(Arc::new(BrandSiteStrategy));
    }
    let mut marketplaces = config.marketplaces.clone();
    marketplaces.sort();
    marketplaces.dedup();
    for marketplace in marketplaces {
        strategies.push(Arc::new(MarketplaceStrategy::new(marketplace)));
    }
    if config.convention {
        strategies.push(Arc::new(ConventionStrategy::new(
            config.convention_years.clone(),
        )));
    }
    if config.overlap {
        strategies.push(Arc::new(OverlapStrategy::new(
            config.overlap_categories.clone(),
        )));
    }
    strategies
}
