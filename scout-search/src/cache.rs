//! Searcher-owned result cache.
//!
//! Keyed by (lowercased query, result limit, sorted engine set). Backed by
//! [`moka`] with a TTL; a TTL of zero disables caching.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::types::{SearchEngine, SearchResult};

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    limit: usize,
    engine_hash: u64,
}

impl CacheKey {
    pub fn new(query: &str, limit: usize, engines: &[SearchEngine]) -> Self {
        let mut sorted: Vec<&'static str> = engines.iter().map(SearchEngine::name).collect();
        sorted.sort_unstable();
        sorted.dedup();
        let mut hasher = DefaultHasher::new();
        sorted.hash(&mut hasher);
        Self {
            query: query.trim().to_lowercase(),
            limit,
            engine_hash: hasher.finish(),
        }
    }
}

#[derive(Clone)]
pub struct SearchCache {
    inner: Option<Cache<CacheKey, Vec<SearchResult>>>,
}

impl SearchCache {
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: CacheKey, results: Vec<SearchResult>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, results).await;
        }
    }
}

impl std::fmt::Debug for SearchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCache")
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}
