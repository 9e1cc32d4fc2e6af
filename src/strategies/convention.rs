//! Convention strategy: vendor and exhibitor lists from fan conventions and
//! trade fairs.
//!
//! Brand queries confirm the brand tag on what they find. Generic sweeps
//! produce provisional candidates that must pass relevance validation.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Datelike;

use super::extract::vendor_listings;
use super::{Emitter, RunContext, Strategy, StrategyStats, Term};
use crate::model::{Candidate, SourceTag};
use crate::normalize::country_from_domain;

const BRAND_QUERY_SUFFIXES: &[&str] = &[
    "vendor list",
    "exhibitors",
    "comic con retailers",
    "anime expo vendors",
    "toy fair exhibitors",
];

const GENERIC_QUERIES: &[&str] = &[
    "comic con vendor list",
    "toy fair exhibitor list",
    "collectibles expo vendors",
    "pop culture convention vendors",
    "anime convention vendors",
    "gaming convention exhibitors",
];

const VENDOR_TERMS: &[&str] = &["vendor", "exhibitor", "dealer", "artist-alley", "artist alley", "booth"];

#[derive(Debug, Clone, Default)]
pub struct ConventionStrategy {
    years: Vec<i32>,
}

impl ConventionStrategy {
    /// `years` qualify the generic sweep; empty means the current year.
    pub fn new(years: Vec<i32>) -> Self {
        Self { years }
    }

    fn queries(&self, term: &Term) -> Vec<String> {
        match term {
            Term::Brand(brand) => BRAND_QUERY_SUFFIXES
                .iter()
                .map(|suffix| format!("{brand} {suffix}"))
                .collect(),
            Term::Generic => {
                let years = if self.years.is_empty() {
                    vec![chrono::Utc::now().year()]
                } else {
                    self.years.clone()
                };
                GENERIC_QUERIES
                    .iter()
                    .map(|q| (*q).to_owned())
                    .chain(years.into_iter().map(|y| format!("comic con {y} vendors")))
                    .collect()
            }
            Term::Category(_) => Vec::new(),
        }
    }
}

fn mentions_vendors(text: &str) -> bool {
    let lower = text.to_lowercase();
    VENDOR_TERMS.iter().any(|t| lower.contains(t))
}

#[async_trait]
impl Strategy for ConventionStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::Convention
    }

    fn terms(&self, brands: &[String]) -> Vec<Term> {
        brands
            .iter()
            .cloned()
            .map(Term::Brand)
            .chain(std::iter::once(Term::Generic))
            .collect()
    }

    async fn run(&self, term: &Term, emit: &Emitter, ctx: &RunContext) -> StrategyStats {
        let mut stats = StrategyStats::default();
        let brand = match term {
            Term::Brand(brand) => Some(brand.as_str()),
            _ => None,
        };
        let max_pages = ctx.config.strategies.max_pages_per_query;
        let mut fetched = HashSet::new();
        let mut seen = HashSet::new();

        for query in self.queries(term) {
            let Some(hits) = ctx.search(&query, &mut stats).await else {
                if ctx.is_cancelled() {
                    break;
                }
                continue;
            };
            let pages: Vec<String> = hits
                .into_iter()
                .filter(|hit| mentions_vendors(&hit.title) || mentions_vendors(&hit.url))
                .map(|hit| hit.url)
                .filter(|url| !fetched.contains(url))
                .take(max_pages)
                .collect();

            for url in pages {
                fetched.insert(url.clone());
                let Some(page) = ctx.fetch(&url, &mut stats).await else {
                    if ctx.is_cancelled() {
                        return stats.finish();
                    }
                    continue;
                };
                for listing in vendor_listings(&page.body, &page.final_url) {
                    let key = listing
                        .domain
                        .clone()
                        .unwrap_or_else(|| listing.name.to_lowercase());
                    if !seen.insert(key) {
                        continue;
                    }
                    let mut candidate = Candidate::new(SourceTag::Convention, listing.name, &url);
                    if let Some(domain) = listing.domain.as_deref() {
                        candidate = candidate
                            .with_domain(domain)
                            .with_country(country_from_domain(domain));
                    }
                    if let Some(brand) = brand {
                        candidate = candidate.with_brand(brand);
                    }
                    if !emit.emit(candidate, &mut stats).await {
                        return stats.finish();
                    }
                }
            }
        }
        stats.finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::gateway::SearchHit;
    use crate::strategies::testing::*;

    const VENDOR_PAGE: &str = r#"
        <ul>
          <li class="vendor"><h3>Kaiju Collectibles</h3><a href="https://kaijucollect.com">Website</a></li>
          <li class="vendor"><h3>Pin Parade</h3></li>
        </ul>"#;

    #[test]
    fn generic_queries_include_years() {
        let strategy = ConventionStrategy::new(vec![2024, 2025]);
        let queries = strategy.queries(&Term::Generic);
        assert!(queries.contains(&"comic con vendor list".to_string()));
        assert!(queries.contains(&"comic con 2024 vendors".to_string()));
        assert!(queries.contains(&"comic con 2025 vendors".to_string()));

        let current = ConventionStrategy::default().queries(&Term::Generic);
        let year = chrono::Utc::now().year();
        assert!(current.contains(&format!("comic con {year} vendors")));
    }

    #[test]
    fn terms_add_one_generic_sweep() {
        let terms = ConventionStrategy::default().terms(&["Funko".into(), "Tubbz".into()]);
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[2], Term::Generic);
    }

    #[tokio::test]
    async fn brand_queries_tag_vendors_with_brand() {
        let gateway = FixtureGateway::default().with(
            "Funko vendor list",
            vec![
                SearchHit::new("https://nycc.example.com/vendors", "NYCC Vendor List", ""),
                SearchHit::new("https://news.example.com/funko", "Funko news", ""),
            ],
        );
        let fetcher = FixtureFetcher::default().with("https://nycc.example.com/vendors", VENDOR_PAGE);
        let (ctx, _pause) = context(gateway, fetcher);
        let (candidates, stats) =
            collect(&ConventionStrategy::default(), &Term::Brand("Funko".into()), &ctx).await;

        let kaiju = candidates
            .iter()
            .find(|c| c.raw_name == "Kaiju Collectibles")
            .expect("kaiju");
        assert_eq!(kaiju.domain.as_deref(), Some("kaijucollect.com"));
        assert!(kaiju.brand_tags.contains("Funko"));
        assert!(candidates.iter().any(|c| c.raw_name == "Pin Parade"));
        assert_eq!(stats.pages_fetched, 1);
        assert_eq!(stats.queries, BRAND_QUERY_SUFFIXES.len());
    }

    #[tokio::test]
    async fn generic_sweep_is_provisional() {
        let gateway = FixtureGateway::default().with(
            "comic con vendor list",
            vec![SearchHit::new("https://nycc.example.com/vendors", "Exhibitors", "")],
        );
        let fetcher = FixtureFetcher::default().with("https://nycc.example.com/vendors", VENDOR_PAGE);
        let (ctx, _pause) = context(gateway, fetcher);
        let (candidates, _) =
            collect(&ConventionStrategy::new(vec![2024]), &Term::Generic, &ctx).await;
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(Candidate::is_provisional));
    }
}
