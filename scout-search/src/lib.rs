//! # scout-search
//!
//! Web search and page fetching for brandscout, with the request
//! discipline third-party sites expect.
//!
//! ## Design
//!
//! - Scrapes DuckDuckGo and Bing HTML, optionally queries the Serper API
//! - Queries engines concurrently and merges/ranks results
//! - Every request goes through a run-scoped [`Transport`]: global and
//!   per-host concurrency limits, bounded exponential backoff on
//!   timeouts/5xx/429, and a per-host cool-down after repeated 429s
//! - No process-global state: clients, caches and breakers belong to the
//!   caller and die with it
//! - Cancellation is threaded through every wait and request

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod content;
pub mod engine;
pub mod engines;
pub mod error;
pub mod fetch;
pub mod http;
pub mod limiter;
pub mod rank;
pub mod retry;
pub mod search;
pub mod transport;
pub mod types;

pub use circuit_breaker::{CircuitState, HostCooldown};
pub use config::{CooldownConfig, NetworkConfig, RetryConfig, SearchConfig};
pub use content::extract_content;
pub use engine::SearchEngineTrait;
pub use error::{Result, SearchError};
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use retry::RetryPolicy;
pub use search::Searcher;
pub use transport::Transport;
pub use types::{PageContent, SearchEngine, SearchResult};
