//! Configuration for brandscout.
//!
//! Loaded from TOML; every section and field has a default so partial files
//! work. The Serper API key may come from `SERPER_API_KEY`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScoutError};
use crate::model::Marketplace;
use scout_search::{NetworkConfig, SearchConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Maximum events kept in a run's log history.
    pub log_history_limit: usize,
    pub search: SearchConfig,
    pub network: NetworkConfig,
    pub strategies: StrategyConfig,
    pub resolver: ResolverConfig,
    pub email: EmailConfig,
    pub relevance: RelevanceConfig,
    pub pipeline: PipelineConfig,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            log_history_limit: 10_000,
            search: SearchConfig::default(),
            network: NetworkConfig::default(),
            strategies: StrategyConfig::default(),
            resolver: ResolverConfig::default(),
            email: EmailConfig::default(),
            relevance: RelevanceConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Which strategies run and what they search for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub brand_site: bool,
    /// Marketplaces searched; empty disables the marketplace strategy.
    pub marketplaces: Vec<Marketplace>,
    pub convention: bool,
    pub overlap: bool,
    /// Category terms for the overlap strategy.
    pub overlap_categories: Vec<String>,
    /// Years for year-qualified convention queries. Empty means the current year.
    pub convention_years: Vec<i32>,
    /// Results requested per search query.
    pub max_results_per_query: usize,
    /// Distinct brand domains probed for retailer pages.
    pub max_brand_domains: usize,
    /// Retailer-list pages scraped per brand domain.
    pub max_pages_per_brand_domain: usize,
    /// Result pages scraped per convention or overlap query.
    pub max_pages_per_query: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            brand_site: true,
            marketplaces: Marketplace::all().to_vec(),
            convention: true,
            overlap: true,
            overlap_categories: [
                "pop culture",
                "anime figure",
                "vinyl figure",
                "gaming merch",
                "comic book",
                "toy",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            convention_years: Vec::new(),
            max_results_per_query: 10,
            max_brand_domains: 3,
            max_pages_per_brand_domain: 10,
            max_pages_per_query: 3,
        }
    }
}

/// Domain resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum name similarity for a search hit to be accepted.
    pub name_similarity: f64,
    /// TLDs appended to generated domain candidates, in order.
    pub fallback_tlds: Vec<String>,
    /// Cap on generated domain candidates.
    pub max_fallback_candidates: usize,
    /// Extra directory/aggregator domains never returned as a company domain.
    pub blacklist_extra: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name_similarity: 0.75,
            fallback_tlds: ["com", "net", "org", "co", "io", "biz"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            max_fallback_candidates: 20,
            blacklist_extra: Vec::new(),
        }
    }
}

/// Email discovery and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Concurrent page fetches per domain.
    pub per_domain_concurrency: usize,
    /// Upper bound on each contact-page fetch.
    pub request_timeout_secs: u64,
    /// Contacts kept per company, highest confidence first.
    pub max_contacts_per_company: usize,
    /// Whether to run the SMTP `RCPT TO` probe.
    pub smtp_probe: bool,
    /// Envelope sender used by the SMTP probe.
    pub smtp_sender: String,
    /// Name sent in `EHLO`.
    pub helo_name: String,
    pub smtp_timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            per_domain_concurrency: 2,
            request_timeout_secs: 10,
            max_contacts_per_company: 5,
            smtp_probe: false,
            smtp_sender: "verify@brandscout.invalid".to_owned(),
            helo_name: "brandscout.invalid".to_owned(),
            smtp_timeout_secs: 10,
        }
    }
}

/// Brand-relevance validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Upper bound on the homepage fetch.
    pub fetch_timeout_secs: u64,
    /// Minimum fuzzy score for a brand mention without an exact match.
    pub fuzzy_threshold: f64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 8,
            fuzzy_threshold: 0.9,
        }
    }
}

/// Run-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long strategy tasks may keep running after cancellation.
    pub cancel_grace_ms: u64,
    /// Capacity of the candidate aggregation channel.
    pub channel_capacity: usize,
    /// Capacity of the live log broadcast channel.
    pub log_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cancel_grace_ms: 2_000,
            channel_capacity: 256,
            log_channel_capacity: 1_024,
        }
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScoutError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/brandscout/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("brandscout").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("brandscout")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/brandscout-config/config.toml")
        }
    }

    /// Fill the Serper key from `SERPER_API_KEY` when the file has none.
    pub fn with_env_overrides(mut self) -> Self {
        if self.search.serper_api_key.is_none() {
            if let Ok(key) = std::env::var("SERPER_API_KEY") {
                if !key.trim().is_empty() {
                    self.search.serper_api_key = Some(key);
                }
            }
        }
        self
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.network.validate()?;
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        if !unit(self.resolver.name_similarity) || !unit(self.relevance.fuzzy_threshold) {
            return Err(ScoutError::Config(
                "similarity thresholds must be within [0, 1]".into(),
            ));
        }
        if self.resolver.fallback_tlds.is_empty() {
            return Err(ScoutError::Config("fallback_tlds must not be empty".into()));
        }
        if self.email.per_domain_concurrency == 0 || self.email.max_contacts_per_company == 0 {
            return Err(ScoutError::Config(
                "email concurrency and contact limit must be greater than 0".into(),
            ));
        }
        if self.strategies.max_results_per_query == 0 {
            return Err(ScoutError::Config(
                "max_results_per_query must be greater than 0".into(),
            ));
        }
        if self.log_history_limit == 0 {
            return Err(ScoutError::Config(
                "log_history_limit must be greater than 0".into(),
            ));
        }
        if self.pipeline.channel_capacity == 0 || self.pipeline.log_channel_capacity == 0 {
            return Err(ScoutError::Config(
                "channel capacities must be greater than 0".into(),
            ));
        }
        let any_strategy = self.strategies.brand_site
            || !self.strategies.marketplaces.is_empty()
            || self.strategies.convention
            || self.strategies.overlap;
        if !any_strategy {
            return Err(ScoutError::Config(
                "at least one strategy must be enabled".into(),
            ));
        }
        Ok(())
    }
}
