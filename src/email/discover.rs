//! Email discovery on a company's own pages.
//!
//! Guessed mailboxes are only offered when every contact page was actually
//! tried. A cancelled run gets [`SearchError::Cancelled`] instead.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use scout_search::{PageFetcher, SearchError};
use tokio_util::sync::CancellationToken;

use crate::config::EmailConfig;
use crate::error::{Result, ScoutError};
use crate::model::EmailOrigin;
use crate::strategies::extract::domain_matches;

/// Pages fetched on every domain.
pub const CONTACT_PATHS: &[&str] = &["/", "/contact", "/about", "/impressum"];

/// Mailboxes guessed when no page lists an address.
pub const FALLBACK_MAILBOXES: &[&str] = &["info", "sales", "contact"];

const BLACKLIST: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "mailer-daemon",
    "postmaster",
    "example.com",
    "sentry",
    "wixpress",
];

const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

const EMAIL_PATTERN: &str = r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b";

/// `sales [at] shop [dot] com` and the `(at)`/`{at}` variants.
const OBFUSCATED_PATTERN: &str = r"(?i)\b([a-z0-9._%+-]+)\s*[\[({]\s*at\s*[\])}]\s*([a-z0-9-]+(?:(?:\s*[\[({]\s*dot\s*[\])}]\s*|\.)[a-z0-9-]+)+)\b";

const DOT_PATTERN: &str = r"(?i)\s*[\[({]\s*dot\s*[\])}]\s*";

/// An address found for a domain and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEmail {
    pub email: String,
    pub origin: EmailOrigin,
}

pub struct EmailDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    pattern: Regex,
    obfuscated: Regex,
    dot: Regex,
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
}

impl EmailDiscoverer {
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] if the address pattern fails to compile.
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &EmailConfig) -> Result<Self> {
        let compile = |p: &str| Regex::new(p).map_err(|e| ScoutError::Config(e.to_string()));
        Ok(Self {
            fetcher,
            pattern: compile(EMAIL_PATTERN)?,
            obfuscated: compile(OBFUSCATED_PATTERN)?,
            dot: compile(DOT_PATTERN)?,
            concurrency: config.per_domain_concurrency.max(1),
            timeout: Duration::from_secs(config.request_timeout_secs),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop fetching once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Addresses on `domain`'s contact pages, or the fallback guesses when
    /// none are found. Ordered by address.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] when the run is cancelled before
    /// or during the page fetches.
    pub async fn discover(&self, domain: &str) -> scout_search::Result<Vec<DiscoveredEmail>> {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let jobs: Vec<(usize, &'static str, String)> = CONTACT_PATHS
            .iter()
            .enumerate()
            .map(|(idx, path)| (idx, *path, format!("https://{domain}{path}")))
            .collect();
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.timeout;
        let mut pages: Vec<(usize, &'static str, PageOutcome)> = stream::iter(jobs)
            .map(move |(idx, path, url)| {
                let fetcher = Arc::clone(&fetcher);
                async move { (idx, path, fetch_page(fetcher, url, timeout).await) }
            })
            .buffer_unordered(self.concurrency)
            .boxed()
            .collect()
            .await;

        if self.cancel.is_cancelled()
            || pages
                .iter()
                .any(|(_, _, outcome)| matches!(outcome, PageOutcome::Cancelled))
        {
            return Err(SearchError::Cancelled);
        }

        pages.sort_by_key(|(idx, _, _)| *idx);

        // First page in path order wins the origin.
        let mut found: BTreeMap<String, EmailOrigin> = BTreeMap::new();
        for (_, path, outcome) in pages {
            let PageOutcome::Body(body) = outcome else { continue };
            for email in self.extract(&body, domain) {
                found.entry(email).or_insert_with(|| EmailOrigin::Page {
                    path: path.to_owned(),
                });
            }
        }

        if found.is_empty() {
            tracing::debug!(domain, "no addresses on pages, using fallback guesses");
            return Ok(fallback_guesses(domain));
        }
        Ok(found
            .into_iter()
            .map(|(email, origin)| DiscoveredEmail { email, origin })
            .collect())
    }

    /// Addresses on one page that belong to `domain`.
    pub fn extract(&self, html: &str, domain: &str) -> Vec<String> {
        let mut raw: Vec<String> = self
            .pattern
            .find_iter(html)
            .map(|m| m.as_str().to_owned())
            .collect();
        raw.extend(mailto_addresses(html));
        raw.extend(self.obfuscated.captures_iter(html).map(|caps| {
            let host = self.dot.replace_all(&caps[2], ".");
            format!("{}@{host}", &caps[1])
        }));

        let mut out: Vec<String> = raw
            .into_iter()
            .map(|e| e.trim().trim_end_matches('.').to_lowercase())
            .filter(|e| is_acceptable(e, domain))
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

enum PageOutcome {
    Body(String),
    Missing,
    Cancelled,
}

async fn fetch_page(fetcher: Arc<dyn PageFetcher>, url: String, timeout: Duration) -> PageOutcome {
    match tokio::time::timeout(timeout, fetcher.fetch(&url)).await {
        Ok(Ok(page)) => PageOutcome::Body(page.body),
        Ok(Err(SearchError::Cancelled)) => PageOutcome::Cancelled,
        Ok(Err(err)) => {
            tracing::debug!(url, error = %err, "contact page fetch failed");
            PageOutcome::Missing
        }
        Err(_) => {
            tracing::debug!(url, "contact page fetch timed out");
            PageOutcome::Missing
        }
    }
}

fn mailto_addresses(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href^='mailto:'], a[href^='MAILTO:']") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let rest = href.get(7..)?;
            let address = rest.split('?').next().unwrap_or_default();
            Some(address.replace("%40", "@"))
        })
        .collect()
}

fn is_acceptable(email: &str, domain: &str) -> bool {
    let Some((local, email_domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.contains('@') {
        return false;
    }
    if ASSET_SUFFIXES.iter().any(|s| email.ends_with(s)) || email.contains("@2x") {
        return false;
    }
    if BLACKLIST.iter().any(|pattern| email.contains(pattern)) {
        return false;
    }
    domain_matches(email_domain, domain)
}

/// `info@`, `sales@` and `contact@` on `domain`, marked as guessed.
pub fn fallback_guesses(domain: &str) -> Vec<DiscoveredEmail> {
    let mut guesses: Vec<DiscoveredEmail> = FALLBACK_MAILBOXES
        .iter()
        .map(|mailbox| DiscoveredEmail {
            email: format!("{mailbox}@{domain}"),
            origin: EmailOrigin::Guessed,
        })
        .collect();
    guesses.sort_by(|a, b| a.email.cmp(&b.email));
    guesses
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::strategies::testing::FixtureFetcher;

    fn discoverer(fetcher: FixtureFetcher) -> EmailDiscoverer {
        EmailDiscoverer::new(Arc::new(fetcher), &EmailConfig::default()).expect("discoverer")
    }

    #[test]
    fn extract_filters_noise() {
        let d = discoverer(FixtureFetcher::default());
        let html = r#"
            <p>Write to Info@RetailerX.com or sales@shop.retailerx.com.</p>
            <a href="mailto:orders@retailerx.com?subject=Hi">Order</a>
            <img src="logo@2x.png"> icon@retailerx.png
            <p>noreply@retailerx.com, someone@gmail.com, user@example.com</p>"#;
        let emails = d.extract(html, "retailerx.com");
        assert_eq!(
            emails,
            vec![
                "info@retailerx.com".to_string(),
                "orders@retailerx.com".to_string(),
                "sales@shop.retailerx.com".to_string(),
            ]
        );
    }

    #[test]
    fn extract_reads_spelled_out_addresses() {
        let d = discoverer(FixtureFetcher::default());
        let html = r#"
            <p>Wholesale: sales [at] retailerx [dot] com</p>
            <p>Press: press(at)retailerx.com, orders {AT} shop (dot) retailerx (dot) com</p>
            <p>Not ours: hello [at] gmail [dot] com. Meet us at the booth.</p>"#;
        assert_eq!(
            d.extract(html, "retailerx.com"),
            vec![
                "orders@shop.retailerx.com".to_string(),
                "press@retailerx.com".to_string(),
                "sales@retailerx.com".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn discover_records_first_page_path() {
        let fetcher = FixtureFetcher::default()
            .with("https://retailerx.com/contact", "<p>info@retailerx.com</p>")
            .with("https://retailerx.com/about", "<p>info@retailerx.com press@retailerx.com</p>");
        let found = discoverer(fetcher).discover("retailerx.com").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].email, "info@retailerx.com");
        assert_eq!(
            found[0].origin,
            EmailOrigin::Page {
                path: "/contact".into()
            }
        );
        assert_eq!(
            found[1].origin,
            EmailOrigin::Page {
                path: "/about".into()
            }
        );
    }

    #[tokio::test]
    async fn falls_back_to_guesses() {
        let found = discoverer(FixtureFetcher::default()).discover("retailerx.com").await.unwrap();
        let emails: Vec<&str> = found.iter().map(|d| d.email.as_str()).collect();
        assert_eq!(
            emails,
            vec!["contact@retailerx.com", "info@retailerx.com", "sales@retailerx.com"]
        );
        assert!(found.iter().all(|d| d.origin == EmailOrigin::Guessed));
    }

    /// Fetcher whose first request cancels the run.
    struct CancellingFetcher {
        cancel: CancellationToken,
    }

    #[async_trait::async_trait]
    impl PageFetcher for CancellingFetcher {
        async fn fetch(&self, _url: &str) -> scout_search::Result<scout_search::FetchedPage> {
            self.cancel.cancel();
            Err(SearchError::Cancelled)
        }

        async fn probe(&self, _url: &str) -> scout_search::Result<bool> {
            Err(SearchError::Cancelled)
        }
    }

    #[tokio::test]
    async fn cancelled_fetches_yield_no_guesses() {
        let cancel = CancellationToken::new();
        let fetcher = CancellingFetcher {
            cancel: cancel.clone(),
        };
        let discoverer = EmailDiscoverer::new(Arc::new(fetcher), &EmailConfig::default())
            .unwrap()
            .with_cancel(cancel);
        let outcome = discoverer.discover("retailerx.com").await;
        assert!(matches!(outcome, Err(SearchError::Cancelled)));
    }
}
