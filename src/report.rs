//! Run summary for humans (text) and machines (JSON).

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::persistence::SaveStats;
use crate::pipeline::{RunResult, RunState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub name: String,
    pub domain: Option<String>,
    pub source: String,
    pub brands: Vec<String>,
    pub contacts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub run_id: Uuid,
    pub brands: Vec<String>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub by_strategy: BTreeMap<String, usize>,
    pub degraded_strategies: Vec<String>,
    pub total_before_dedup: usize,
    pub total_after_dedup: usize,
    pub rejected: usize,
    pub unresolved_domains: usize,
    pub contacts: usize,
    pub errors: usize,
    pub save: Option<SaveStats>,
    pub companies: Vec<CompanySummary>,
}

impl DiscoveryReport {
    pub fn new(result: &RunResult, save: Option<SaveStats>) -> Self {
        let mut contacts_by_company: BTreeMap<&str, usize> = BTreeMap::new();
        for contact in &result.contacts {
            *contacts_by_company.entry(contact.company_ref.as_str()).or_default() += 1;
        }
        let companies = result
            .companies
            .iter()
            .map(|c| CompanySummary {
                name: c.canonical_name.clone(),
                domain: c.domain.clone(),
                source: c.source.to_string(),
                brands: c.product_overlap.iter().cloned().collect(),
                contacts: contacts_by_company
                    .get(c.key().as_str())
                    .copied()
                    .unwrap_or_default(),
            })
            .collect();

        let stats = &result.stats;
        Self {
            run_id: result.run.run_id,
            brands: result.run.brands.clone(),
            state: result.run.state,
            started_at: result.run.started_at,
            ended_at: result.run.ended_at,
            by_strategy: stats.per_strategy.clone(),
            degraded_strategies: stats.degraded_strategies.clone(),
            total_before_dedup: stats.companies_before_dedup,
            total_after_dedup: stats.companies_after_dedup,
            rejected: stats.rejected,
            unresolved_domains: stats.unresolved_domains,
            contacts: stats.contacts_total,
            errors: stats.errors,
            save,
            companies,
        }
    }

    /// # Errors
    ///
    /// Serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "COMPETITOR DISCOVERY REPORT");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Run:      {}", self.run_id);
        let _ = writeln!(out, "Brands:   {}", self.brands.join(", "));
        let _ = writeln!(out, "State:    {}", self.state);
        let _ = writeln!(out, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(ended) = self.ended_at {
            let elapsed = (ended - self.started_at).num_seconds();
            let _ = writeln!(out, "Finished: {} ({elapsed}s)", ended.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        let _ = writeln!(out, "\nDISCOVERY BY STRATEGY");
        for (strategy, count) in &self.by_strategy {
            let flag = if self.degraded_strategies.contains(strategy) {
                "  (degraded)"
            } else {
                ""
            };
            let _ = writeln!(out, "  {strategy:<28}{count:>6}{flag}");
        }

        let _ = writeln!(out, "\nDEDUPLICATION");
        let _ = writeln!(out, "  Before dedup:       {}", self.total_before_dedup);
        let _ = writeln!(out, "  After dedup:        {}", self.total_after_dedup);
        let _ = writeln!(out, "  Rejected:           {}", self.rejected);
        let _ = writeln!(out, "  Unresolved domains: {}", self.unresolved_domains);
        let _ = writeln!(out, "  Contacts:           {}", self.contacts);
        let _ = writeln!(out, "  Errors:             {}", self.errors);

        if let Some(save) = &self.save {
            let _ = writeln!(out, "\nSAVED");
            let _ = writeln!(out, "  New companies:      {}", save.companies_saved);
            let _ = writeln!(out, "  Updated companies:  {}", save.companies_updated);
            let _ = writeln!(out, "  Contacts:           {}", save.contacts_saved);
            let _ = writeln!(out, "  Errors:             {}", save.errors);
        }

        let _ = writeln!(out, "\nCOMPANIES ({})", self.companies.len());
        for company in &self.companies {
            let _ = writeln!(
                out,
                "  {} [{}] via {} | brands: {} | contacts: {}",
                company.name,
                company.domain.as_deref().unwrap_or("no domain"),
                company.source,
                company.brands.join(", "),
                company.contacts
            );
        }
        out
    }
}
