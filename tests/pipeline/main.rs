//! End-to-end discovery runs over fixture networks.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod control;
mod fixtures;
mod scenarios;
