//! metricsnap - Metric snapshot collection and querying library.
//!
//! This library provides the core functionality shared between:
//! - `msnap-ingest` - scrapes an endpoint for a bounded time and stores one snapshot
//! - `msnap` - one-shot queries and the interactive snapshot browser

pub mod collector;
pub mod config;
pub mod query;
pub mod session;
pub mod storage;
pub mod tui;
pub mod util;
