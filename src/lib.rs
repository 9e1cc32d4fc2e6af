//! brandscout: discovers and enriches sales leads that stock competitor
//! brands.
//!
//! A discovery run takes a list of competitor brands and returns the
//! companies selling them, with verified contact addresses.
//!
//! # Architecture
//!
//! The run is built from independent stages connected by async channels:
//! - **Strategies**: brand sites, eight marketplaces, convention vendor
//!   lists and category overlap, one task per (strategy, term)
//! - **Relevance**: confirms which brands a provisional candidate's site
//!   mentions
//! - **Resolver**: company name to canonical domain
//! - **Email**: discovery on contact pages, then MX/SMTP verification
//! - **Dedup**: order-independent merge into canonical companies
//! - **Pipeline**: run lifecycle, pause/resume/cancel, broadcast log
//!
//! Search and page fetching live in the `scout-search` crate.

pub mod config;
pub mod dedup;
pub mod email;
pub mod error;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod persistence;
pub mod pipeline;
pub mod relevance;
pub mod report;
pub mod resolver;
pub mod strategies;

pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use model::{Candidate, CompanyRecord, ContactRecord, Marketplace, SourceTag};
pub use persistence::{InMemoryStore, JsonFileStore, PersistenceGateway, SaveStats, save_result};
pub use pipeline::{DiscoveryService, RunResult, RunState};
pub use report::DiscoveryReport;
