//! Marketplace strategy: sellers carrying a brand on one marketplace.

use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use super::extract::{external_url_in_text, title_name};
use super::{Emitter, RunContext, Strategy, StrategyStats, Term};
use crate::model::{Candidate, Marketplace, SourceTag};
use crate::normalize::{compact, country_from_domain, normalize_domain};

/// Title words that mark a result as a store page rather than a listing.
const STORE_WORDS: &[&str] = &["store", "shop", "seller", "tienda", "loja"];

#[derive(Debug, Clone, Copy)]
pub struct MarketplaceStrategy {
    marketplace: Marketplace,
}

impl MarketplaceStrategy {
    pub fn new(marketplace: Marketplace) -> Self {
        Self { marketplace }
    }

    /// Seller identifier from the URL path, e.g. `/usr/collectiblesshop`.
    fn seller_from_url(&self, url: &Url) -> Option<String> {
        let mut target = url.path().to_owned();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        self.marketplace.seller_markers().iter().find_map(|marker| {
            let start = target.find(marker)? + marker.len();
            let slug = target[start..]
                .split(['/', '?', '&', '#'])
                .next()
                .unwrap_or_default();
            let name = slug.replace(['+', '_'], " ").replace("%20", " ");
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_owned())
        })
    }

    fn is_store_title(title: &str) -> bool {
        let lower = title.to_lowercase();
        STORE_WORDS.iter().any(|w| lower.contains(w))
    }

    /// Seller name for a hit, or `None` when the hit is a product listing.
    fn seller_name(&self, url: &Url, title: &str, brand: &str) -> Option<String> {
        let from_title = title_name(title).filter(|name| {
            let slug = compact(name);
            slug != compact(self.marketplace.display_name()) && slug != compact(brand)
        });
        let from_url = self.seller_from_url(url);
        // Amazon seller ids are opaque; prefer a readable title there.
        let name = match (from_url, from_title) {
            (Some(id), Some(title))
                if self.marketplace == Marketplace::Amazon
                    && id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) =>
            {
                Some(title)
            }
            (Some(id), _) => Some(id),
            (None, Some(title)) if Self::is_store_title(title.as_str()) || Self::is_store_title(&url.to_string()) => {
                Some(title)
            }
            _ => None,
        }?;
        let slug = compact(&name);
        (slug != compact(brand) && slug != compact(self.marketplace.display_name())).then_some(name)
    }
}

#[async_trait]
impl Strategy for MarketplaceStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::Marketplace(self.marketplace)
    }

    async fn run(&self, term: &Term, emit: &Emitter, ctx: &RunContext) -> StrategyStats {
        let mut stats = StrategyStats::default();
        let Term::Brand(brand) = term else {
            return stats;
        };
        let query = self.marketplace.query(brand);
        let Some(hits) = ctx.search(&query, &mut stats).await else {
            return stats.finish();
        };

        let brand_slug = compact(brand);
        let mut seen = HashSet::new();
        for hit in hits {
            let Ok(url) = Url::parse(&hit.url) else { continue };
            let Some(host) = url.host_str().and_then(normalize_domain) else {
                continue;
            };
            if !self.marketplace.owns_domain(&host) {
                continue;
            }
            let Some(name) = self.seller_name(&url, &hit.title, brand) else {
                continue;
            };
            if !seen.insert(name.to_lowercase()) {
                continue;
            }
            let external = external_url_in_text(&hit.snippet)
                .filter(|(_, domain)| !compact(domain).contains(&brand_slug));
            let mut candidate = Candidate::new(self.tag(), name, &hit.url)
                .with_brand(brand)
                .with_country(country_from_domain(&host));
            if let Some((_, domain)) = external {
                candidate = candidate.with_domain(&domain);
            }
            if !emit.emit(candidate, &mut stats).await {
                break;
            }
        }
        stats.finish()
    }
}
