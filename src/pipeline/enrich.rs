//! The aggregation consumer.
//!
//! Single reader of the run's candidate channel. Each candidate is
//! validated (provisional ones only), given a domain, enriched with
//! verified contacts and merged into the run's [`Deduplicator`]. Domain,
//! relevance and email lookups are cached per run so each unique name or
//! domain costs at most one lookup.
//!
//! Once the run is cancelled the consumer keeps draining the channel but
//! makes no further network calls, so the per-strategy counts stay exact.
//! A lookup cut short by the cancel is neither cached nor trusted: the
//! candidate is merged as if it had been drained.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dedup::{contacts_for, Deduplicator};
use crate::email::{ContactFinder, EmailDiscoverer, EmailVerifier, VerifiedEmail};
use crate::error::Result;
use crate::model::{Candidate, CompanyRecord, ContactRecord};
use crate::normalize::normalize_name;
use crate::pipeline::events::{EventLog, LogKind};
use crate::pipeline::resources::RunResources;
use crate::relevance::RelevanceChecker;
use crate::resolver::DomainResolver;
use crate::strategies::RunContext;

/// What the consumer hands back once the channel closes.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub companies: Vec<CompanyRecord>,
    pub contacts: Vec<ContactRecord>,
    pub per_strategy: BTreeMap<String, usize>,
    pub candidates_total: usize,
    pub rejected: usize,
    pub unvalidated: usize,
    pub unresolved_domains: usize,
    pub companies_before_dedup: usize,
    pub companies_after_dedup: usize,
}

pub struct Enricher {
    ctx: RunContext,
    brands: Vec<String>,
    log: Arc<EventLog>,
    resolver: DomainResolver,
    relevance: RelevanceChecker,
    contacts: ContactFinder,
    domains: HashMap<(String, String), Option<String>>,
    site_brands: HashMap<String, BTreeSet<String>>,
    emails: HashMap<String, Vec<VerifiedEmail>>,
}

impl Enricher {
    /// # Errors
    ///
    /// Fails if the email discoverer cannot be built.
    pub fn new(
        ctx: RunContext,
        brands: Vec<String>,
        log: Arc<EventLog>,
        resources: &RunResources,
    ) -> Result<Self> {
        let config = ctx.config.clone();
        let resolver = DomainResolver::new(
            resources.gateway.clone(),
            resources.probe.clone(),
            config.resolver.clone(),
        )
        .with_cancel(ctx.cancel.clone());
        let relevance = RelevanceChecker::new(resources.fetcher.clone(), &config.relevance);
        let discoverer = EmailDiscoverer::new(resources.fetcher.clone(), &config.email)?;
        let verifier = EmailVerifier::new(resources.mx.clone(), resources.smtp.clone());
        let contacts = ContactFinder::new(
            discoverer,
            verifier,
            config.email.max_contacts_per_company,
        )
        .with_cancel(ctx.cancel.clone());
        Ok(Self {
            ctx,
            brands,
            log,
            resolver,
            relevance,
            contacts,
            domains: HashMap::new(),
            site_brands: HashMap::new(),
            emails: HashMap::new(),
        })
    }

    /// Drain `rx` until every sender is gone. `per_strategy` is pre-seeded
    /// with zero counts for the enabled strategies.
    pub async fn consume(
        mut self,
        mut rx: mpsc::Receiver<Candidate>,
        per_strategy: BTreeMap<String, usize>,
    ) -> Aggregation {
        let contact_limit = self.ctx.config.email.max_contacts_per_company;
        let mut dedup = Deduplicator::new().with_contact_limit(contact_limit);
        let mut out = Aggregation {
            per_strategy,
            ..Default::default()
        };

        while let Some(candidate) = rx.recv().await {
            out.candidates_total += 1;
            *out.per_strategy
                .entry(candidate.source.to_string())
                .or_default() += 1;

            if !self.ctx.checkpoint().await {
                self.drain_one(&candidate, &mut dedup, &mut out);
                continue;
            }
            self.enrich_one(&candidate, &mut dedup, &mut out).await;
        }

        out.companies_before_dedup = dedup.input_count();
        out.companies_after_dedup = dedup.len();
        let (companies, contacts) = dedup.finish();
        out.companies = companies;
        out.contacts = contacts;
        out
    }

    /// Merge without network work. Provisional candidates cannot be
    /// validated any more and are dropped.
    fn drain_one(&self, candidate: &Candidate, dedup: &mut Deduplicator, out: &mut Aggregation) {
        if candidate.is_provisional() {
            out.unvalidated += 1;
            return;
        }
        let record = CompanyRecord::from_candidate(candidate, None);
        if record.domain.is_none() {
            out.unresolved_domains += 1;
        }
        dedup.add(record, Vec::new());
    }

    async fn enrich_one(
        &mut self,
        candidate: &Candidate,
        dedup: &mut Deduplicator,
        out: &mut Aggregation,
    ) {
        let source = candidate.source.to_string();
        let domain = match &candidate.domain {
            Some(domain) => Some(domain.clone()),
            None => match self.resolve(candidate).await {
                Ok(domain) => domain,
                Err(_) => {
                    self.drain_one(candidate, dedup, out);
                    return;
                }
            },
        };

        let mut record = CompanyRecord::from_candidate(candidate, domain.clone());
        if candidate.is_provisional() {
            let confirmed = match &domain {
                Some(domain) => match self.brands_on_site(domain).await {
                    Ok(found) => found,
                    Err(_) => {
                        out.unvalidated += 1;
                        return;
                    }
                },
                None => BTreeSet::new(),
            };
            if confirmed.is_empty() {
                out.rejected += 1;
                self.log.debug(
                    LogKind::CandidateRejected,
                    Some(&source),
                    format!(
                        "{} ({}) mentions none of the brands",
                        candidate.raw_name,
                        domain.as_deref().unwrap_or("no domain")
                    ),
                );
                return;
            }
            record.brand_focus = confirmed.iter().next().cloned();
            record.product_overlap = confirmed;
        }

        let contacts = match &record.domain {
            Some(domain) => match self.emails_for(domain).await {
                Ok(emails) => contacts_for(&record, &emails),
                Err(_) => Vec::new(),
            },
            None => {
                out.unresolved_domains += 1;
                Vec::new()
            }
        };

        self.log.debug(
            LogKind::CandidateAccepted,
            Some(&source),
            format!(
                "{} ({}), {} contact(s)",
                record.canonical_name,
                record.domain.as_deref().unwrap_or("no domain"),
                contacts.len()
            ),
        );
        dedup.add(record, contacts);
    }

    async fn resolve(&mut self, candidate: &Candidate) -> scout_search::Result<Option<String>> {
        let locality = candidate.country_hint.clone().unwrap_or_default();
        let key = (normalize_name(&candidate.raw_name), locality.to_ascii_lowercase());
        if let Some(cached) = self.domains.get(&key) {
            return Ok(cached.clone());
        }
        let locality = (!locality.is_empty()).then_some(locality.as_str());
        let domain = self.resolver.resolve(&candidate.raw_name, locality).await?;
        self.domains.insert(key, domain.clone());
        Ok(domain)
    }

    async fn brands_on_site(&mut self, domain: &str) -> scout_search::Result<BTreeSet<String>> {
        if let Some(cached) = self.site_brands.get(domain) {
            return Ok(cached.clone());
        }
        let found = self.relevance.brands_on_site(domain, &self.brands).await?;
        self.site_brands.insert(domain.to_owned(), found.clone());
        Ok(found)
    }

    async fn emails_for(&mut self, domain: &str) -> scout_search::Result<Vec<VerifiedEmail>> {
        if let Some(cached) = self.emails.get(domain) {
            return Ok(cached.clone());
        }
        let found = self.contacts.find(domain).await?;
        self.emails.insert(domain.to_owned(), found.clone());
        Ok(found)
    }
}
