//! Serper JSON API (Google results).
//!
//! Keyed, so it is only enabled when `serper_api_key` is configured. A 401
//! or 403 is an auth failure and classified as permanent.

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::engine::SearchEngineTrait;
use crate::error::SearchError;
use crate::transport::Transport;
use crate::types::{SearchEngine, SearchResult};

/// Serper search API client.
pub struct SerperEngine;

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SearchEngineTrait for SerperEngine {
    async fn search(
        &self,
        transport: &Transport,
        query: &str,
        max_results: usize,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = config
            .serper_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SearchError::Config("serper_api_key is not set".into()))?;
        let endpoint = format!("{}/search", config.serper_base_url.trim_end_matches('/'));
        let body = SerperRequest {
            q: query,
            num: max_results.min(100),
        };

        tracing::trace!(query, "Serper search");
        let response = transport
            .send(&endpoint, |client| {
                client
                    .post(&endpoint)
                    .header("X-API-KEY", api_key)
                    .json(&body)
            })
            .await?;
        let text = transport.read_text(response).await?;
        parse_serper_json(&text, max_results)
    }

    fn engine_type(&self) -> SearchEngine {
        SearchEngine::Serper
    }
}

fn parse_serper_json(text: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    let parsed: SerperResponse = serde_json::from_str(text)
        .map_err(|e| SearchError::Parse(format!("invalid Serper response: {e}")))?;
    let results: Vec<SearchResult> = parsed
        .organic
        .into_iter()
        .filter(|item| !item.link.is_empty())
        .take(max_results)
        .map(|item| SearchResult {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
            engine: SearchEngine::Serper.name().to_string(),
            score: 0.0,
        })
        .collect();
    tracing::debug!(count = results.len(), "Serper results parsed");
    Ok(results)
}
