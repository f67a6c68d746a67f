#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crawl orchestration for the koopi discount scraper.
//!
//! Turns the query list into a shuffled, capped work list and drives every
//! task through a cache-aside fetcher. Network fetches are throttled by two
//! independent semaphores: a concurrency limit and a smaller politeness
//! pool whose tokens are only returned after a randomized delay. A single
//! [`tokio_util::sync::CancellationToken`] makes the whole run stop
//! cleanly on SIGINT/SIGTERM.

pub mod accumulator;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod lock;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod signals;
pub mod worklist;

use std::path::PathBuf;

/// Errors that abort a crawl while building the work list.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The query list could not be opened or read.
    #[error("Failed to read query list {path}: {source}")]
    Input {
        /// Path of the query list.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A query list row is missing columns or has a bad page count.
    #[error("Malformed query list row at line {line}: {reason}")]
    MalformedRow {
        /// 1-based line number in the query list.
        line: u64,
        /// What is wrong with the row.
        reason: String,
    },
}
