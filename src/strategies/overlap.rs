//! Category-overlap strategy: shops selling the kind of product the brands
//! make. Queries are brand-agnostic, so every candidate is provisional.

use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use super::extract::{is_aggregator, title_name};
use super::{Emitter, RunContext, Strategy, StrategyStats, Term};
use crate::model::{Candidate, SourceTag};
use crate::normalize::{country_from_domain, infer_name_from_domain, normalize_domain};

#[derive(Debug, Clone, Default)]
pub struct OverlapStrategy {
    categories: Vec<String>,
}

impl OverlapStrategy {
    pub fn new(categories: Vec<String>) -> Self {
        Self { categories }
    }

    fn queries(category: &str) -> [String; 2] {
        [
            format!("{category} collectibles store"),
            format!("{category} retailer"),
        ]
    }
}

#[async_trait]
impl Strategy for OverlapStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::Overlap
    }

    fn terms(&self, _brands: &[String]) -> Vec<Term> {
        let mut seen = HashSet::new();
        self.categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
            .map(|c| Term::Category(c.to_owned()))
            .collect()
    }

    async fn run(&self, term: &Term, emit: &Emitter, ctx: &RunContext) -> StrategyStats {
        let mut stats = StrategyStats::default();
        let Term::Category(category) = term else {
            return stats;
        };
        let mut seen = HashSet::new();
        for query in Self::queries(category) {
            let Some(hits) = ctx.search(&query, &mut stats).await else {
                if ctx.is_cancelled() {
                    break;
                }
                continue;
            };
            for hit in hits {
                let Some(domain) = Url::parse(&hit.url)
                    .ok()
                    .and_then(|u| u.host_str().and_then(normalize_domain))
                else {
                    continue;
                };
                if is_aggregator(&domain) || !seen.insert(domain.clone()) {
                    continue;
                }
                let name = title_name(&hit.title).unwrap_or_else(|| infer_name_from_domain(&domain));
                let candidate = Candidate::new(SourceTag::Overlap, name, &hit.url)
                    .with_domain(&domain)
                    .with_country(country_from_domain(&domain));
                if !emit.emit(candidate, &mut stats).await {
                    return stats.finish();
                }
            }
        }
        stats.finish()
    }
}
