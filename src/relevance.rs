//! Brand-relevance validation for candidates that lack a confirmed brand.
//!
//! The candidate's homepage is fetched (best effort, bounded) and each
//! brand counts as present when it appears as a case-insensitive substring,
//! as a substring of the punctuation-free text, or as a word window whose
//! similarity reaches the fuzzy threshold.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use scout_search::{extract_content, PageFetcher, SearchError};

use crate::config::RelevanceConfig;
use crate::normalize::{compact, similarity};

/// Brands shorter than this are only matched exactly.
const MIN_FUZZY_LEN: usize = 4;

pub struct RelevanceChecker {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
    fuzzy_threshold: f64,
}

impl RelevanceChecker {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &RelevanceConfig) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            fuzzy_threshold: config.fuzzy_threshold,
        }
    }

    /// Brands from `brands` mentioned on `domain`'s homepage. An unreachable
    /// site yields the empty set.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] when the fetch was cut short by a
    /// cancelled run; the site was never checked.
    pub async fn brands_on_site(
        &self,
        domain: &str,
        brands: &[String],
    ) -> scout_search::Result<BTreeSet<String>> {
        let url = format!("https://{domain}/");
        let page = match tokio::time::timeout(self.timeout, self.fetcher.fetch(&url)).await {
            Ok(Ok(page)) => page,
            Ok(Err(SearchError::Cancelled)) => return Err(SearchError::Cancelled),
            Ok(Err(err)) => {
                tracing::debug!(domain, error = %err, "relevance fetch failed");
                return Ok(BTreeSet::new());
            }
            Err(_) => {
                tracing::debug!(domain, "relevance fetch timed out");
                return Ok(BTreeSet::new());
            }
        };
        let text = match extract_content(&page.body, &page.final_url) {
            Ok(content) => format!("{} {}", content.title, content.text),
            Err(_) => return Ok(BTreeSet::new()),
        };
        Ok(brands_in_text(&text, brands, self.fuzzy_threshold))
    }
}

/// Brands from `brands` that `text` mentions.
pub fn brands_in_text(text: &str, brands: &[String], fuzzy_threshold: f64) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let compact_text = compact(text);
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    brands
        .iter()
        .filter(|brand| {
            let brand_lower = brand.trim().to_lowercase();
            if brand_lower.is_empty() {
                return false;
            }
            if lower.contains(&brand_lower) {
                return true;
            }
            let brand_compact = compact(brand);
            if brand_compact.len() >= 3 && compact_text.contains(&brand_compact) {
                return true;
            }
            brand_compact.len() >= MIN_FUZZY_LEN
                && fuzzy_window_match(&words, &brand_lower, fuzzy_threshold)
        })
        .cloned()
        .collect()
}

fn fuzzy_window_match(words: &[&str], brand: &str, threshold: f64) -> bool {
    let width = brand.split_whitespace().count().max(1);
    if words.len() < width {
        return false;
    }
    words
        .windows(width)
        .any(|window| similarity(&window.join(" "), brand) >= threshold)
}
