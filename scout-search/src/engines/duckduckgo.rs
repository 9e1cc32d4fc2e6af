//! DuckDuckGo HTML endpoint, the default keyless engine.

use crate::config::SearchConfig;
use crate::engine::SearchEngineTrait;
use crate::error::SearchError;
use crate::transport::Transport;
use crate::types::{SearchEngine, SearchResult};
use scraper::{Html, Selector};
use url::Url;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo HTML search scraper (POST, no JavaScript required).
pub struct DuckDuckGoEngine;

impl DuckDuckGoEngine {
    /// Unwrap DuckDuckGo's `//duckduckgo.com/l/?uddg=<target>` redirect links.
    fn extract_url(href: &str) -> Option<String> {
        let full_href = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&full_href).ok()?;
        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(full_href)
        }
    }
}

impl SearchEngineTrait for DuckDuckGoEngine {
    async fn search(
        &self,
        transport: &Transport,
        query: &str,
        max_results: usize,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "DuckDuckGo search");

        let mut params = vec![("q", query)];
        if config.safe_search {
            params.push(("kp", "1"));
        }

        let response = transport
            .send(ENDPOINT, |client| {
                client
                    .post(ENDPOINT)
                    .form(&params)
                    .header("Accept-Language", "en-US,en;q=0.9")
            })
            .await?;
        let html = transport.read_text(response).await?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");
        parse_duckduckgo_html(&html, max_results)
    }

    fn engine_type(&self) -> SearchEngine {
        SearchEngine::DuckDuckGo
    }
}

/// Parse a DuckDuckGo HTML response into search results, skipping ads.
pub(crate) fn parse_duckduckgo_html(
    html: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();
    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };
        let title = title_el.text().collect::<String>().trim().to_string();
        let Some(url) = title_el
            .value()
            .attr("href")
            .and_then(DuckDuckGoEngine::extract_url)
        else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url,
            snippet,
            engine: SearchEngine::DuckDuckGo.name().to_string(),
            score: 0.0,
        });
        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_DDG_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Ffunko.com%2Fwhere-to-buy&amp;rut=abc123">
        Where to Buy | Funko
    </a>
    <div class="result__snippet">Find a Funko retailer near you.</div>
</div>
<div class="result results_links results_links_deep web-result result--ad">
    <a class="result__a" href="https://ads.example.com/">Sponsored figures</a>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://www.ebay.com/usr/collectiblesshop">
        collectiblesshop on eBay
    </a>
    <div class="result__snippet">Vinyl figures and more.</div>
</div>
</body>
</html>"#;

    #[test]
    fn extract_url_from_ddg_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(
            DuckDuckGoEngine::extract_url(href),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn extract_url_direct_and_invalid() {
        assert_eq!(
            DuckDuckGoEngine::extract_url("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
        assert!(DuckDuckGoEngine::extract_url("not-a-url").is_none());
    }

    #[test]
    fn parse_mock_html_skips_ads() {
        let results = parse_duckduckgo_html(MOCK_DDG_HTML, 10).expect("should parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Where to Buy | Funko");
        assert_eq!(results[0].url, "https://funko.com/where-to-buy");
        assert!(results[0].snippet.contains("retailer"));
        assert_eq!(results[1].url, "https://www.ebay.com/usr/collectiblesshop");
    }

    #[test]
    fn parse_respects_max_results() {
        let results = parse_duckduckgo_html(MOCK_DDG_HTML, 1).expect("should parse");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        let results = parse_duckduckgo_html("<html><body></body></html>", 10).expect("parse");
        assert!(results.is_empty());
    }
}
