//! Company name → canonical domain.
//!
//! Primary path: web search for the name (plus locality), skipping
//! directories, social networks and marketplaces, accepting the first hit
//! whose title or snippet matches the name. Fallback path: guess domains
//! from the name and TLD list and keep the first that resolves in DNS and
//! answers over HTTP(S). An unresolved name is not an error.
//!
//! A cancelled run stops both paths: a search that fails with
//! [`SearchError::Cancelled`] is reported as such and no guesses are probed.

use std::sync::Arc;

use async_trait::async_trait;
use scout_search::{PageFetcher, SearchError};
use tokio_util::sync::CancellationToken;
use trust_dns_resolver::TokioAsyncResolver;
use url::Url;

use crate::config::ResolverConfig;
use crate::gateway::{SearchGateway, SearchHit};
use crate::normalize::{compact, normalize_domain, normalize_name, similarity};
use crate::strategies::extract::{domain_matches, is_aggregator, title_name};

/// Reachability checks for generated domain candidates.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// `true` when the domain has address records.
    async fn resolves(&self, domain: &str) -> bool;
    /// `true` when the domain answers over HTTPS or HTTP.
    async fn reachable(&self, domain: &str) -> bool;
}

/// [`HostProbe`] over DNS and the run's page fetcher.
pub struct NetworkProbe {
    dns: Arc<TokioAsyncResolver>,
    fetcher: Arc<dyn PageFetcher>,
}

impl NetworkProbe {
    pub fn new(dns: Arc<TokioAsyncResolver>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { dns, fetcher }
    }
}

#[async_trait]
impl HostProbe for NetworkProbe {
    async fn resolves(&self, domain: &str) -> bool {
        match self.dns.lookup_ip(domain).await {
            Ok(ips) => ips.iter().next().is_some(),
            Err(err) => {
                tracing::trace!(domain, error = %err, "no address records");
                false
            }
        }
    }

    async fn reachable(&self, domain: &str) -> bool {
        for scheme in ["https", "http"] {
            if matches!(self.fetcher.probe(&format!("{scheme}://{domain}/")).await, Ok(true)) {
                return true;
            }
        }
        false
    }
}

pub struct DomainResolver {
    gateway: Arc<dyn SearchGateway>,
    probe: Arc<dyn HostProbe>,
    config: ResolverConfig,
    cancel: CancellationToken,
}

impl DomainResolver {
    pub fn new(
        gateway: Arc<dyn SearchGateway>,
        probe: Arc<dyn HostProbe>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            gateway,
            probe,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop resolving once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Canonical domain for `name`, or `None` when neither path finds one.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] once the run is cancelled. Every
    /// other failure only means the name is unresolved.
    pub async fn resolve(
        &self,
        name: &str,
        locality: Option<&str>,
    ) -> scout_search::Result<Option<String>> {
        if normalize_name(name).is_empty() {
            return Ok(None);
        }
        if let Some(domain) = self.from_search(name, locality).await? {
            tracing::debug!(name, domain, "domain resolved from search");
            return Ok(Some(domain));
        }
        let domain = self.from_candidates(name).await?;
        match &domain {
            Some(domain) => tracing::debug!(name, domain, "domain resolved by probing"),
            None => tracing::debug!(name, "domain unresolved"),
        }
        Ok(domain)
    }

    fn ensure_running(&self) -> scout_search::Result<()> {
        if self.cancel.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn is_blacklisted(&self, domain: &str) -> bool {
        is_aggregator(domain)
            || self
                .config
                .blacklist_extra
                .iter()
                .any(|root| domain_matches(domain, root.trim().to_ascii_lowercase().as_str()))
    }

    async fn from_search(
        &self,
        name: &str,
        locality: Option<&str>,
    ) -> scout_search::Result<Option<String>> {
        self.ensure_running()?;
        let query = match locality.map(str::trim).filter(|l| !l.is_empty()) {
            Some(locality) => format!("{name} {locality}"),
            None => name.to_owned(),
        };
        let hits = match self.gateway.search(&query, 10).await {
            Ok(hits) => hits,
            Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
            Err(err) => {
                tracing::debug!(name, error = %err, "resolver search failed");
                self.ensure_running()?;
                return Ok(None);
            }
        };
        let mut ranked: Vec<SearchHit> = hits;
        ranked.sort_by_key(|hit| hit.rank);
        Ok(ranked.into_iter().find_map(|hit| {
            let domain = Url::parse(&hit.url)
                .ok()
                .and_then(|u| u.host_str().and_then(normalize_domain))?;
            if self.is_blacklisted(&domain) {
                return None;
            }
            self.hit_matches(name, &hit, &domain).then_some(domain)
        }))
    }

    fn hit_matches(&self, name: &str, hit: &SearchHit, domain: &str) -> bool {
        let wanted = normalize_name(name);
        let title = title_name(&hit.title).unwrap_or_default();
        if similarity(&title, name) >= self.config.name_similarity {
            return true;
        }
        if normalize_name(&hit.title).contains(&wanted) || normalize_name(&hit.snippet).contains(&wanted) {
            return true;
        }
        let slug = compact(&wanted);
        slug.len() >= 4 && compact(domain).contains(&slug)
    }

    /// Domain guesses in probe order: compact name, compact raw name, then
    /// the hyphenated name, each with every fallback TLD.
    pub fn candidate_domains(&self, name: &str) -> Vec<String> {
        let normalized = normalize_name(name);
        let mut stems: Vec<String> = Vec::new();
        for stem in [
            compact(&normalized),
            compact(name),
            normalized.split_whitespace().collect::<Vec<_>>().join("-"),
        ] {
            let valid = !stem.is_empty()
                && stem.is_ascii()
                && !stem.starts_with('-')
                && !stems.contains(&stem);
            if valid {
                stems.push(stem);
            }
        }
        stems
            .iter()
            .flat_map(|stem| {
                self.config
                    .fallback_tlds
                    .iter()
                    .map(move |tld| format!("{stem}.{}", tld.trim_start_matches('.')))
            })
            .take(self.config.max_fallback_candidates)
            .collect()
    }

    async fn from_candidates(&self, name: &str) -> scout_search::Result<Option<String>> {
        for domain in self.candidate_domains(name) {
            self.ensure_running()?;
            if self.probe.resolves(&domain).await && self.probe.reachable(&domain).await {
                return Ok(Some(domain));
            }
        }
        Ok(None)
    }
}
