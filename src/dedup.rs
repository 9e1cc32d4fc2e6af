//! Company deduplication and merge.
//!
//! Records are grouped by [`CompanyRecord::key`]. Every merged field is
//! chosen by a total order over the inputs rather than by arrival order, so
//! the final set is identical however concurrent strategies interleave:
//!
//! - `product_overlap` is the union of all inputs.
//! - `source` is the smallest tag (brand site before marketplaces before
//!   conventions before overlap).
//! - `brand_focus`, `canonical_name`, `country` and `region` come from the
//!   input with the smallest `(source, value)` pair that sets them, so the
//!   highest-precedence discovery writes them first and nothing overwrites it.
//! - Contacts are unioned by lowercase email, keeping the higher confidence.

use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap};

use crate::email::sort_by_confidence;
use crate::email::VerifiedEmail;
use crate::model::{CompanyRecord, CompanyStatus, ContactRecord, SourceTag};
use crate::normalize::region_from_country;

/// Keeps the smallest `(source, value)` pair seen.
#[derive(Debug, Clone, Default)]
struct Ranked(Option<(SourceTag, String)>);

impl Ranked {
    fn offer(&mut self, source: SourceTag, value: Option<&String>) {
        let Some(value) = value else { return };
        let better = match &self.0 {
            None => true,
            Some((s, v)) => (source, value.as_str()) < (*s, v.as_str()),
        };
        if better {
            self.0 = Some((source, value.clone()));
        }
    }

    fn value(self) -> Option<String> {
        self.0.map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
struct Group {
    template: CompanyRecord,
    name: Ranked,
    brand_focus: Ranked,
    country: Ranked,
    region: Ranked,
    contacts: BTreeMap<String, ContactRecord>,
}

impl Group {
    fn new(record: CompanyRecord) -> Self {
        let mut group = Self {
            template: record.clone(),
            name: Ranked::default(),
            brand_focus: Ranked::default(),
            country: Ranked::default(),
            region: Ranked::default(),
            contacts: BTreeMap::new(),
        };
        group.template.product_overlap.clear();
        group.absorb(record);
        group
    }

    fn absorb(&mut self, record: CompanyRecord) {
        let source = record.source;
        self.name.offer(source, Some(&record.canonical_name));
        self.brand_focus.offer(source, record.brand_focus.as_ref());
        self.country.offer(source, record.country.as_ref());
        self.region.offer(source, record.region.as_ref());
        self.template.source = self.template.source.min(source);
        if self.template.domain.is_none() {
            self.template.domain = record.domain;
        }
        self.template
            .product_overlap
            .extend(record.product_overlap);
    }

    fn add_contact(&mut self, contact: ContactRecord) {
        let email = contact.email.to_lowercase();
        match self.contacts.get(&email) {
            Some(existing) if !outranks(&contact, existing) => {}
            _ => {
                self.contacts.insert(email.clone(), ContactRecord { email, ..contact });
            }
        }
    }
}

fn outranks(a: &ContactRecord, b: &ContactRecord) -> bool {
    match a.confidence_score.partial_cmp(&b.confidence_score) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) => false,
        _ => a.last_validated > b.last_validated,
    }
}

/// Merges company records and their contacts into canonical companies.
#[derive(Debug, Default)]
pub struct Deduplicator {
    groups: BTreeMap<String, Group>,
    inputs: usize,
    contact_limit: Option<usize>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` contacts per company, highest confidence first.
    pub fn with_contact_limit(mut self, limit: usize) -> Self {
        self.contact_limit = Some(limit);
        self
    }

    /// Merge one record and the contacts found for it.
    ///
    /// `brand_focus` is not first-writer-wins: the group keeps the value
    /// from the smallest `(source, value)` pair among every record that sets
    /// it, so the same inputs give the same brand in any arrival order. Two
    /// records from the same source settle on the alphabetically smaller
    /// brand.
    pub fn add(&mut self, record: CompanyRecord, contacts: Vec<ContactRecord>) {
        self.inputs += 1;
        let key = record.key();
        let group = match self.groups.entry(key) {
            btree_map::Entry::Occupied(occupied) => {
                let group = occupied.into_mut();
                group.absorb(record);
                group
            }
            btree_map::Entry::Vacant(vacant) => vacant.insert(Group::new(record)),
        };
        for contact in contacts {
            group.add_contact(contact);
        }
    }

    /// Records added so far (before dedup).
    pub fn input_count(&self) -> usize {
        self.inputs
    }

    /// Distinct companies so far (after dedup).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Canonical companies sorted by key, and their contacts grouped by
    /// company in the same order.
    pub fn finish(self) -> (Vec<CompanyRecord>, Vec<ContactRecord>) {
        let mut companies = Vec::with_capacity(self.groups.len());
        let mut contacts = Vec::new();
        for (key, group) in self.groups {
            let Group {
                mut template,
                name,
                brand_focus,
                country,
                region,
                contacts: group_contacts,
            } = group;
            if let Some(name) = name.value() {
                template.canonical_name = name;
            }
            template.brand_focus = brand_focus.value();
            template.country = country.value();
            template.region = region.value().or_else(|| {
                template
                    .country
                    .as_deref()
                    .and_then(region_from_country)
                    .map(str::to_owned)
            });

            let mut ranked: Vec<ContactRecord> = group_contacts.into_values().collect();
            ranked.sort_by(|a, b| {
                b.confidence_score
                    .partial_cmp(&a.confidence_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.email.cmp(&b.email))
            });
            if let Some(limit) = self.contact_limit {
                ranked.truncate(limit);
            }
            template.status = if ranked.is_empty() {
                CompanyStatus::New
            } else {
                CompanyStatus::Enriched
            };
            for contact in &mut ranked {
                contact.company_ref = key.clone();
            }
            contacts.extend(ranked);
            companies.push(template);
        }
        (companies, contacts)
    }
}

/// Contact records for `company` from verified emails.
pub fn contacts_for(company: &CompanyRecord, emails: &[VerifiedEmail]) -> Vec<ContactRecord> {
    let mut emails = emails.to_vec();
    sort_by_confidence(&mut emails);
    let key = company.key();
    let now = chrono::Utc::now();
    emails
        .into_iter()
        .map(|e| ContactRecord {
            company_ref: key.clone(),
            email: e.email,
            confidence_score: e.confidence,
            name: None,
            title: None,
            origin: e.origin,
            last_validated: now,
        })
        .collect()
}
