//! Search and network configuration with sensible defaults.
//!
//! [`SearchConfig`] controls which engines are queried and how results are
//! cached. [`NetworkConfig`] controls the request budget shared by every
//! network call: global and per-host concurrency, retries and the 429
//! cool-down window.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::SearchEngine;

/// Default Serper API endpoint.
pub const DEFAULT_SERPER_URL: &str = "https://google.serper.dev";

/// Configuration for web search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Which search engines to query. Queried concurrently; results are merged.
    pub engines: Vec<SearchEngine>,
    /// Maximum number of results to return after deduplication and ranking.
    pub max_results: usize,
    /// Per-engine HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering from engines that support it.
    pub safe_search: bool,
    /// How long to cache results in seconds. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Random delay range in milliseconds `(min, max)` before each engine request.
    pub request_delay_ms: (u64, u64),
    /// Custom User-Agent string. If `None`, rotates through a built-in list.
    pub user_agent: Option<String>,
    /// API key for the Serper engine.
    pub serper_api_key: Option<String>,
    /// Base URL of the Serper API.
    pub serper_base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engines: vec![SearchEngine::DuckDuckGo, SearchEngine::Bing],
            max_results: 10,
            timeout_seconds: 8,
            safe_search: true,
            cache_ttl_seconds: 600,
            request_delay_ms: (100, 500),
            user_agent: None,
            serper_api_key: None,
            serper_base_url: DEFAULT_SERPER_URL.to_owned(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.engines.is_empty() {
            return Err(SearchError::Config(
                "at least one engine must be enabled".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        let serper_key_missing = self
            .serper_api_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty());
        if self.engines.contains(&SearchEngine::Serper) && serper_key_missing {
            return Err(SearchError::Config(
                "the serper engine requires serper_api_key".into(),
            ));
        }
        Ok(())
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

/// Per-host cool-down triggered by repeated HTTP 429 responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Consecutive 429 responses before the host is paused.
    pub rate_limit_threshold: u32,
    /// Seconds a paused host is left alone before one probe is allowed.
    pub cooldown_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            rate_limit_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Request budget shared by every network call of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum requests in flight across all hosts.
    pub global_in_flight: usize,
    /// Maximum requests in flight to any single host.
    pub per_host: usize,
    /// Timeout applied to each individual request.
    pub request_timeout_secs: u64,
    /// Largest response body kept by the page fetcher.
    pub max_body_bytes: usize,
    pub retry: RetryConfig,
    pub cooldown: CooldownConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            global_in_flight: 16,
            per_host: 2,
            request_timeout_secs: 10,
            max_body_bytes: 2 * 1024 * 1024,
            retry: RetryConfig::default(),
            cooldown: CooldownConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Validates the request budget.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.global_in_flight == 0 || self.per_host == 0 {
            return Err(SearchError::Config(
                "global_in_flight and per_host must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SearchError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SearchError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(SearchError::Config(
                "retry.base_delay_ms must be <= retry.max_delay_ms".into(),
            ));
        }
        if self.cooldown.rate_limit_threshold == 0 {
            return Err(SearchError::Config(
                "cooldown.rate_limit_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
