//! Merging per-engine result lists into one ranked list.
//!
//! Scoring: `engine_weight / (1 + 0.1 · position)`, then results sharing a
//! normalised URL are merged (best score kept) and boosted by 20% for each
//! additional engine that returned them.

use std::collections::HashMap;

use url::Url;

use crate::types::{SearchEngine, SearchResult};

/// Query parameters that never change page identity.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "ref",
    "srsltid",
];

/// Canonical form of a URL for duplicate detection: no fragment, no
/// default port, no tracking params, sorted query, no trailing slash.
/// Unparseable input is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }
    parsed.to_string()
}

/// Position-decay score for one engine's ordered results.
pub fn score_results(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    for (position, result) in results.iter_mut().enumerate() {
        let weight = SearchEngine::from_name(&result.engine).map_or(1.0, |e| e.weight());
        result.score = weight / (1.0 + position as f64 * 0.1);
    }
    results
}

/// Boost for a URL returned by `engine_count` engines.
pub fn cross_engine_boost(score: f64, engine_count: usize) -> f64 {
    score * (1.0 + 0.2 * engine_count.saturating_sub(1) as f64)
}

/// Merge scored results from all engines, boost, sort and truncate.
///
/// Ties are broken by URL so the order is stable for identical input.
pub fn merge_ranked(results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    let mut groups: HashMap<String, (SearchResult, Vec<String>)> = HashMap::new();
    for result in results {
        let key = normalize_url(&result.url);
        match groups.get_mut(&key) {
            Some((best, engines)) => {
                if !engines.contains(&result.engine) {
                    engines.push(result.engine.clone());
                }
                if result.score > best.score {
                    *best = result;
                }
            }
            None => {
                let engines = vec![result.engine.clone()];
                groups.insert(key, (result, engines));
            }
        }
    }

    let mut merged: Vec<SearchResult> = groups
        .into_values()
        .map(|(mut result, engines)| {
            result.score = cross_engine_boost(result.score, engines.len());
            result
        })
        .collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    merged.truncate(max_results);
    merged
}
