//! HTTP client construction and response classification.
//!
//! One [`reqwest::Client`] is built per run and shared through
//! [`crate::transport::Transport`]; nothing in this crate keeps a
//! process-wide client.

use crate::error::SearchError;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// Realistic browser User-Agent strings, one picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for scraping and API calls.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, SearchError> {
    let ua = match user_agent {
        Some(ua) => ua,
        None => random_user_agent(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

/// Extract the lowercase host of `url`, the key for per-host limits.
///
/// # Errors
///
/// Returns [`SearchError::Permanent`] for unparseable or host-less URLs.
pub fn host_of(url: &str) -> Result<String, SearchError> {
    let parsed = Url::parse(url)
        .map_err(|e| SearchError::permanent(url, None, format!("invalid URL: {e}")))?;
    parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| SearchError::permanent(url, None, "URL has no host"))
}

/// Map an HTTP status to the error taxonomy. `None` means success.
pub fn classify_status(host: &str, status: StatusCode) -> Option<SearchError> {
    if status.is_success() || status.is_redirection() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        return Some(SearchError::transient(host, format!("HTTP {}", status.as_u16())));
    }
    Some(SearchError::permanent(
        host,
        Some(status.as_u16()),
        format!("HTTP {}", status.as_u16()),
    ))
}

/// Map a transport-level reqwest failure to the error taxonomy.
pub fn classify_reqwest(host: &str, err: &reqwest::Error) -> SearchError {
    if let Some(status) = err.status() {
        if let Some(classified) = classify_status(host, status) {
            return classified;
        }
    }
    if err.is_builder() {
        return SearchError::permanent(host, None, format!("invalid request: {err}"));
    }
    if err.is_timeout() {
        return SearchError::transient(host, "request timed out");
    }
    SearchError::transient(host, format!("request failed: {err}"))
}
