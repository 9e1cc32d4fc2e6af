//! Multi-engine search: concurrent fan-out, merge, rank, cache.

use rand::Rng;
use std::time::Duration;

use crate::cache::{CacheKey, SearchCache};
use crate::config::SearchConfig;
use crate::engine::SearchEngineTrait;
use crate::engines::{BingEngine, DuckDuckGoEngine, SerperEngine};
use crate::error::SearchError;
use crate::rank::{merge_ranked, score_results};
use crate::transport::Transport;
use crate::types::{SearchEngine, SearchResult};

/// Search front-end with its own result cache.
///
/// One `Searcher` is created per run alongside the run's [`Transport`].
#[derive(Debug, Clone)]
pub struct Searcher {
    config: SearchConfig,
    cache: SearchCache,
}

impl Searcher {
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let cache = SearchCache::new(config.cache_ttl_seconds);
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Query every configured engine concurrently and merge the results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::AllEnginesFailed`] only if every engine
    /// fails, or [`SearchError::Cancelled`] when the run was cancelled.
    pub async fn search(
        &self,
        transport: &Transport,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let limit = max_results.clamp(1, self.config.max_results.max(1));
        let key = CacheKey::new(query, limit, &self.config.engines);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::trace!(query, "search cache hit");
            return Ok(cached);
        }

        let mut pending = Vec::with_capacity(self.config.engines.len());
        for &engine in &self.config.engines {
            pending.push(async move { (engine, self.query_engine(transport, engine, query, limit).await) });
        }
        let outcomes = futures::future::join_all(pending).await;

        let mut all_results = Vec::new();
        let mut errors = Vec::new();
        let mut any_ok = false;
        for (engine, outcome) in outcomes {
            match outcome {
                Ok(results) => {
                    any_ok = true;
                    tracing::debug!(%engine, count = results.len(), "engine returned results");
                    all_results.extend(score_results(results));
                }
                Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
                Err(err) => {
                    tracing::warn!(%engine, error = %err, "engine query failed");
                    errors.push(format!("{engine}: {err}"));
                }
            }
        }

        if !any_ok {
            return Err(SearchError::AllEnginesFailed(errors.join("; ")));
        }

        let ranked = merge_ranked(all_results, limit);
        self.cache.insert(key, ranked.clone()).await;
        Ok(ranked)
    }

    async fn query_engine(
        &self,
        transport: &Transport,
        engine: SearchEngine,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.polite_delay(transport).await?;
        let config = &self.config;
        match engine {
            SearchEngine::DuckDuckGo => DuckDuckGoEngine.search(transport, query, limit, config).await,
            SearchEngine::Bing => BingEngine.search(transport, query, limit, config).await,
            SearchEngine::Serper => SerperEngine.search(transport, query, limit, config).await,
        }
    }

    /// Random pause from `request_delay_ms` to spread requests over time.
    async fn polite_delay(&self, transport: &Transport) -> Result<(), SearchError> {
        let (min, max) = self.config.request_delay_ms;
        if max == 0 {
            return Ok(());
        }
        let millis = rand::thread_rng().gen_range(min..=max);
        tokio::select! {
            _ = transport.cancel_token().cancelled() => Err(SearchError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(()),
        }
    }
}
