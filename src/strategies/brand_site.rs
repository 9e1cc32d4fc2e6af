//! Brand web site strategy: find the brand's own domains, then scrape every
//! where-to-buy style page they serve.

use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use super::extract::{is_aggregator, retailer_listings};
use super::{Emitter, RunContext, Strategy, StrategyStats, Term};
use crate::model::{Candidate, SourceTag};
use crate::normalize::{compact, country_from_domain, normalize_domain};

/// Paths probed on every brand domain, in order.
pub const RETAILER_PATHS: &[&str] = &[
    "/where-to-buy",
    "/store-locator",
    "/stockists",
    "/retailers",
    "/distributors",
    "/partners",
    "/find-a-store",
    "/dealers",
    "/stores",
    "/collections",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BrandSiteStrategy;

impl BrandSiteStrategy {
    fn queries(brand: &str) -> Vec<String> {
        vec![
            format!("{brand} official site"),
            format!("{brand} where to buy"),
            format!("{brand} authorized retailers stockists"),
        ]
    }
}

/// A hit's domain is a plausible brand domain when the brand's compact
/// slug occurs in it.
fn is_brand_domain(domain: &str, slug: &str) -> bool {
    !slug.is_empty() && compact(domain).contains(slug) && !is_aggregator(domain)
}

fn is_retailer_page(url: &Url) -> bool {
    let path = url.path().trim_end_matches('/');
    RETAILER_PATHS.iter().any(|p| path.ends_with(p))
}

#[async_trait]
impl Strategy for BrandSiteStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::BrandSite
    }

    async fn run(&self, term: &Term, emit: &Emitter, ctx: &RunContext) -> StrategyStats {
        let mut stats = StrategyStats::default();
        let Term::Brand(brand) = term else {
            return stats;
        };
        let slug = compact(brand);
        let config = &ctx.config.strategies;

        // Every hit is evaluated; retailer lists often live on secondary domains.
        let mut domains: Vec<String> = Vec::new();
        let mut direct_pages: Vec<String> = Vec::new();
        for query in Self::queries(brand) {
            let Some(hits) = ctx.search(&query, &mut stats).await else {
                if ctx.is_cancelled() {
                    return stats.finish();
                }
                continue;
            };
            for hit in hits {
                let Ok(url) = Url::parse(&hit.url) else { continue };
                let Some(domain) = url.host_str().and_then(normalize_domain) else {
                    continue;
                };
                if !is_brand_domain(&domain, &slug) {
                    continue;
                }
                if is_retailer_page(&url) && !direct_pages.contains(&hit.url) {
                    direct_pages.push(hit.url.clone());
                }
                if !domains.contains(&domain) {
                    domains.push(domain);
                }
            }
        }
        domains.truncate(config.max_brand_domains);
        tracing::debug!(brand, domains = ?domains, "brand domains found");

        let mut pages: Vec<(String, String)> = Vec::new();
        for domain in &domains {
            for path in RETAILER_PATHS.iter().take(config.max_pages_per_brand_domain) {
                pages.push((format!("https://{domain}{path}"), domain.clone()));
            }
        }
        for url in direct_pages {
            let domain = Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().and_then(normalize_domain))
                .unwrap_or_default();
            if !pages.iter().any(|(u, _)| *u == url) {
                pages.push((url, domain));
            }
        }

        let mut seen = HashSet::new();
        for (url, own_domain) in pages {
            let Some(page) = ctx.fetch(&url, &mut stats).await else {
                if ctx.is_cancelled() {
                    break;
                }
                continue;
            };
            if page.status != 200 {
                continue;
            }
            let listings = retailer_listings(&page.body, &page.final_url, &own_domain);
            tracing::debug!(brand, url, count = listings.len(), "retailer page scraped");
            for listing in listings {
                if listing
                    .domain
                    .as_deref()
                    .is_some_and(|d| is_brand_domain(d, &slug))
                {
                    continue;
                }
                let key = listing
                    .domain
                    .clone()
                    .unwrap_or_else(|| listing.name.to_lowercase());
                if !seen.insert(key) {
                    continue;
                }
                let mut candidate = Candidate::new(SourceTag::BrandSite, listing.name, &url)
                    .with_brand(brand);
                if let Some(domain) = listing.domain.as_deref() {
                    candidate = candidate
                        .with_domain(domain)
                        .with_country(country_from_domain(domain));
                }
                if !emit.emit(candidate, &mut stats).await {
                    return stats.finish();
                }
            }
        }
        stats.finish()
    }
}
