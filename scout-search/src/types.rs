//! Core types for search results and engine identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single search result returned from a web search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Which search engine returned this result.
    pub engine: String,
    /// Aggregated relevance score (higher is better). Results returned by
    /// several engines receive a cross-engine boost.
    pub score: f64,
}

/// Supported search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    /// DuckDuckGo HTML endpoint, no key required.
    DuckDuckGo,
    /// Bing HTML results page.
    Bing,
    /// Serper JSON API (Google results), requires an API key.
    Serper,
}

impl SearchEngine {
    /// Returns the human-readable name of this engine.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "DuckDuckGo",
            Self::Bing => "Bing",
            Self::Serper => "Serper",
        }
    }

    /// Returns the weight of this engine in result ranking.
    pub fn weight(&self) -> f64 {
        match self {
            Self::DuckDuckGo => 1.0,
            Self::Bing => 0.8,
            Self::Serper => 1.2,
        }
    }

    /// Best-effort parse of an engine name as stored on [`SearchResult::engine`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|e| e.name() == name)
    }

    /// Returns all available engine variants.
    pub fn all() -> &'static [SearchEngine] {
        &[Self::DuckDuckGo, Self::Bing, Self::Serper]
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Readable content extracted from a fetched web page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    /// Visible text with scripts, styles and navigation removed.
    pub text: String,
    pub word_count: usize,
}
