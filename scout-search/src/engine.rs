//! Trait definition for pluggable search backends.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::transport::Transport;
use crate::types::{SearchEngine, SearchResult};

/// A pluggable search backend.
///
/// Implementors build their request, send it through the run's
/// [`Transport`] (which applies rate limits, retries and cool-down) and
/// parse the response into [`SearchResult`] values.
pub trait SearchEngineTrait: Send + Sync {
    /// Perform a web search and return at most `max_results` parsed results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails or the response cannot
    /// be parsed.
    fn search(
        &self,
        transport: &Transport,
        query: &str,
        max_results: usize,
        config: &SearchConfig,
    ) -> impl std::future::Future<Output = Result<Vec<SearchResult>, SearchError>> + Send;

    /// Returns which [`SearchEngine`] variant this implementation represents.
    fn engine_type(&self) -> SearchEngine;

    /// Ranking weight for results from this engine.
    fn weight(&self) -> f64 {
        self.engine_type().weight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use tokio_util::sync::CancellationToken;

    struct MockEngine {
        results: Vec<SearchResult>,
    }

    impl SearchEngineTrait for MockEngine {
        async fn search(
            &self,
            _transport: &Transport,
            _query: &str,
            max_results: usize,
            _config: &SearchConfig,
        ) -> Result<Vec<SearchResult>, SearchError> {
            if self.results.is_empty() {
                return Err(SearchError::Parse("mock engine failure".into()));
            }
            Ok(self.results.iter().take(max_results).cloned().collect())
        }

        fn engine_type(&self) -> SearchEngine {
            SearchEngine::Bing
        }
    }

    fn transport() -> Transport {
        Transport::new(&NetworkConfig::default(), None, CancellationToken::new())
            .expect("transport")
    }

    #[tokio::test]
    async fn mock_engine_respects_limit() {
        let result = SearchResult {
            title: "Funko".into(),
            url: "https://funko.com".into(),
            snippet: "Official site".into(),
            engine: "Bing".into(),
            score: 0.0,
        };
        let engine = MockEngine {
            results: vec![result.clone(), result],
        };
        let results = engine
            .search(&transport(), "funko", 1, &SearchConfig::default())
            .await
            .expect("should succeed");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn default_weight_delegates_to_search_engine() {
        let engine = MockEngine { results: vec![] };
        assert!((engine.weight() - 0.8).abs() < f64::EPSILON);
    }
}
