//! Lead storage.
//!
//! Companies are keyed by [`CompanyRecord::key`] (domain, else normalised
//! name plus country) and contacts by lowercase email within their
//! company, so saving the same run twice changes nothing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};
use crate::model::{CompanyRecord, CompanyStatus, ContactRecord};
use crate::pipeline::RunResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub trait PersistenceGateway: Send + Sync {
    fn upsert_company(&self, company: &CompanyRecord) -> Result<UpsertOutcome>;

    fn upsert_contact(&self, contact: &ContactRecord) -> Result<UpsertOutcome>;

    /// Make preceding upserts durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Counts from [`save_result`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStats {
    pub companies_saved: usize,
    pub companies_updated: usize,
    pub contacts_saved: usize,
    pub errors: usize,
}

/// Persist every company and contact of a run. Individual failures are
/// logged and counted.
pub fn save_result(store: &dyn PersistenceGateway, result: &RunResult) -> SaveStats {
    let mut stats = SaveStats::default();
    for company in &result.companies {
        match store.upsert_company(company) {
            Ok(UpsertOutcome::Inserted) => stats.companies_saved += 1,
            Ok(UpsertOutcome::Updated) => stats.companies_updated += 1,
            Err(err) => {
                stats.errors += 1;
                tracing::warn!(company = %company.canonical_name, error = %err, "company not saved");
            }
        }
    }
    for contact in &result.contacts {
        match store.upsert_contact(contact) {
            Ok(_) => stats.contacts_saved += 1,
            Err(err) => {
                stats.errors += 1;
                tracing::warn!(email = %contact.email, error = %err, "contact not saved");
            }
        }
    }
    if let Err(err) = store.flush() {
        stats.errors += 1;
        tracing::warn!(error = %err, "store flush failed");
    }
    tracing::info!(
        companies_saved = stats.companies_saved,
        companies_updated = stats.companies_updated,
        contacts_saved = stats.contacts_saved,
        errors = stats.errors,
        "run persisted"
    );
    stats
}

/// Stored companies and contacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub companies: BTreeMap<String, CompanyRecord>,
    pub contacts: BTreeMap<String, ContactRecord>,
}

impl StoreData {
    fn upsert_company(&mut self, company: &CompanyRecord) -> UpsertOutcome {
        match self.companies.get_mut(&company.key()) {
            Some(existing) => {
                merge_company(existing, company);
                UpsertOutcome::Updated
            }
            None => {
                self.companies.insert(company.key(), company.clone());
                UpsertOutcome::Inserted
            }
        }
    }

    fn upsert_contact(&mut self, contact: &ContactRecord) -> UpsertOutcome {
        let key = contact_key(contact);
        match self.contacts.get_mut(&key) {
            Some(existing) => {
                merge_contact(existing, contact);
                UpsertOutcome::Updated
            }
            None => {
                let mut contact = contact.clone();
                contact.email = contact.email.to_lowercase();
                self.contacts.insert(key, contact);
                UpsertOutcome::Inserted
            }
        }
    }
}

fn contact_key(contact: &ContactRecord) -> String {
    format!("{}|{}", contact.company_ref, contact.email.to_lowercase())
}

/// Union brands, keep the stored brand focus and name, fill gaps.
fn merge_company(existing: &mut CompanyRecord, incoming: &CompanyRecord) {
    existing
        .product_overlap
        .extend(incoming.product_overlap.iter().cloned());
    if existing.brand_focus.is_none() {
        existing.brand_focus = incoming.brand_focus.clone();
    }
    if existing.country.is_none() {
        existing.country = incoming.country.clone();
    }
    if existing.region.is_none() {
        existing.region = incoming.region.clone();
    }
    existing.source = existing.source.min(incoming.source);
    if incoming.status == CompanyStatus::Enriched {
        existing.status = CompanyStatus::Enriched;
    }
}

/// The latest validation wins; known name and title are kept.
fn merge_contact(existing: &mut ContactRecord, incoming: &ContactRecord) {
    if incoming.last_validated >= existing.last_validated {
        existing.confidence_score = incoming.confidence_score;
        existing.origin = incoming.origin.clone();
        existing.last_validated = incoming.last_validated;
    }
    if existing.name.is_none() {
        existing.name = incoming.name.clone();
    }
    if existing.title.is_none() {
        existing.title = incoming.title.clone();
    }
}

fn poisoned() -> ScoutError {
    ScoutError::Persistence("store lock poisoned".into())
}

/// Process-local store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<StoreData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> StoreData {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl PersistenceGateway for InMemoryStore {
    fn upsert_company(&self, company: &CompanyRecord) -> Result<UpsertOutcome> {
        Ok(self.data.lock().map_err(|_| poisoned())?.upsert_company(company))
    }

    fn upsert_contact(&self, contact: &ContactRecord) -> Result<UpsertOutcome> {
        Ok(self.data.lock().map_err(|_| poisoned())?.upsert_contact(contact))
    }
}

/// A JSON document on disk. Upserts apply in memory; [`flush`] rewrites
/// the file atomically (temp file, fsync, rename).
///
/// [`flush`]: PersistenceGateway::flush
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).map_err(|e| {
                ScoutError::Persistence(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            StoreData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> StoreData {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn write_atomic(&self, json: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ScoutError::Persistence(format!(
                "failed to rename '{}' to '{}': {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })
    }
}

impl PersistenceGateway for JsonFileStore {
    fn upsert_company(&self, company: &CompanyRecord) -> Result<UpsertOutcome> {
        Ok(self.data.lock().map_err(|_| poisoned())?.upsert_company(company))
    }

    fn upsert_contact(&self, contact: &ContactRecord) -> Result<UpsertOutcome> {
        Ok(self.data.lock().map_err(|_| poisoned())?.upsert_contact(contact))
    }

    fn flush(&self) -> Result<()> {
        let json = {
            let data = self.data.lock().map_err(|_| poisoned())?;
            serde_json::to_string_pretty(&*data)?
        };
        self.write_atomic(&json)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::model::{Candidate, EmailOrigin, Marketplace, SourceTag};

    fn company(source: SourceTag, domain: Option<&str>, brand: &str) -> CompanyRecord {
        let mut candidate = Candidate::new(source, "RetailerX", "https://funko.com").with_brand(brand);
        if let Some(domain) = domain {
            candidate = candidate.with_domain(domain);
        }
        CompanyRecord::from_candidate(&candidate, None)
    }

    fn contact(email: &str, confidence: f64, at: DateTime<Utc>) -> ContactRecord {
        ContactRecord {
            company_ref: "domain:retailerx.com".into(),
            email: email.into(),
            confidence_score: confidence,
            name: None,
            title: None,
            origin: EmailOrigin::Guessed,
            last_validated: at,
        }
    }

    #[test]
    fn update_unions_brands_and_keeps_focus() {
        let store = InMemoryStore::new();
        let first = company(SourceTag::Overlap, Some("retailerx.com"), "Funko");
        let second = company(SourceTag::BrandSite, Some("retailerx.com"), "Tubbz");

        assert_eq!(store.upsert_company(&first).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_company(&second).unwrap(), UpsertOutcome::Updated);

        let data = store.data();
        let stored = &data.companies["domain:retailerx.com"];
        assert_eq!(stored.product_overlap.len(), 2);
        assert_eq!(stored.brand_focus.as_deref(), Some("Funko"));
        assert_eq!(stored.source, SourceTag::BrandSite);
    }

    #[test]
    fn domainless_companies_are_keyed_by_name() {
        let store = InMemoryStore::new();
        let ebay = SourceTag::Marketplace(Marketplace::Ebay);
        store.upsert_company(&company(ebay, None, "Funko")).unwrap();
        let again = store.upsert_company(&company(ebay, None, "Funko")).unwrap();
        assert_eq!(again, UpsertOutcome::Updated);
        assert_eq!(store.data().companies.len(), 1);
    }

    #[test]
    fn contacts_dedup_by_lowercase_email_and_take_latest_validation() {
        let store = InMemoryStore::new();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.upsert_contact(&contact("Info@RetailerX.com", 0.5, new)).unwrap();
        let outcome = store
            .upsert_contact(&contact("info@retailerx.com", 0.9, old))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        let data = store.data();
        assert_eq!(data.contacts.len(), 1);
        let stored = data.contacts.values().next().unwrap();
        assert_eq!(stored.email, "info@retailerx.com");
        assert!((stored.confidence_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads").join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store
            .upsert_company(&company(SourceTag::BrandSite, Some("retailerx.com"), "Funko"))
            .unwrap();
        store.flush().unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.data(), store.data());
        let outcome = reopened
            .upsert_company(&company(SourceTag::BrandSite, Some("retailerx.com"), "Funko"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
    }

    #[test]
    fn corrupt_store_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(ScoutError::Persistence(_))
        ));
    }
}
