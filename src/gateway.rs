//! Search gateway used by strategies and the domain resolver.

use async_trait::async_trait;
use scout_search::{SearchError, Searcher, Transport};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Zero-based position in the merged ranking.
    pub rank: usize,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            rank: 0,
        }
    }
}

/// Query-based web search.
///
/// Errors are [`SearchError`]s so callers can tell transient failures
/// (retried already, counted towards strategy exhaustion) from permanent ones.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// [`SearchGateway`] over the multi-engine [`Searcher`] and a run's [`Transport`].
#[derive(Debug, Clone)]
pub struct WebSearchGateway {
    searcher: Searcher,
    transport: Transport,
}

impl WebSearchGateway {
    pub fn new(searcher: Searcher, transport: Transport) -> Self {
        Self {
            searcher,
            transport,
        }
    }
}

#[async_trait]
impl SearchGateway for WebSearchGateway {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        if self.transport.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let results = self
            .searcher
            .search(&self.transport, query, max_results)
            .await?;
        tracing::debug!(query, count = results.len(), "search completed");
        Ok(results
            .into_iter()
            .enumerate()
            .map(|(rank, r)| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.snippet,
                rank,
            })
            .collect())
    }
}
