//! Bing HTML results page, a fallback index different from DuckDuckGo's.

use crate::config::SearchConfig;
use crate::engine::SearchEngineTrait;
use crate::error::SearchError;
use crate::transport::Transport;
use crate::types::{SearchEngine, SearchResult};
use scraper::{Html, Selector};

const ENDPOINT: &str = "https://www.bing.com/search";

/// Bing HTML search scraper.
pub struct BingEngine;

impl SearchEngineTrait for BingEngine {
    async fn search(
        &self,
        transport: &Transport,
        query: &str,
        max_results: usize,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "Bing search");

        let safe_search = if config.safe_search { "Strict" } else { "Off" };
        let response = transport
            .send(ENDPOINT, |client| {
                client
                    .get(ENDPOINT)
                    .query(&[("q", query), ("setlang", "en"), ("safeSearch", safe_search)])
                    .header("Accept", "text/html,application/xhtml+xml")
                    .header("Accept-Language", "en-US,en;q=0.9")
            })
            .await?;
        let html = transport.read_text(response).await?;

        tracing::trace!(bytes = html.len(), "Bing response received");
        parse_bing_html(&html, max_results)
    }

    fn engine_type(&self) -> SearchEngine {
        SearchEngine::Bing
    }
}

/// Parse organic `li.b_algo` results. Click-tracking links back to
/// bing.com are dropped because they carry no usable target domain.
fn parse_bing_html(html: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse("li.b_algo")
        .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let link_sel = Selector::parse("h2 a")
        .map_err(|e| SearchError::Parse(format!("invalid link selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".b_caption p, .b_lineclamp2")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();
    for element in document.select(&result_sel) {
        let Some(link) = element.select(&link_sel).next() else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        let url = link.value().attr("href").unwrap_or_default().trim();
        if title.is_empty() || !url.starts_with("http") || is_bing_tracking(url) {
            continue;
        }

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url: url.to_string(),
            snippet,
            engine: SearchEngine::Bing.name().to_string(),
            score: 0.0,
        });
        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "Bing results parsed");
    Ok(results)
}

fn is_bing_tracking(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("bing.com")))
        .unwrap_or(false)
}
