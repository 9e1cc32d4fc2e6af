//! Search engine implementations.
//!
//! Each module provides a struct implementing [`crate::engine::SearchEngineTrait`].

pub mod bing;
pub mod duckduckgo;
pub mod serper;

pub use bing::BingEngine;
pub use duckduckgo::DuckDuckGoEngine;
pub use serper::SerperEngine;
