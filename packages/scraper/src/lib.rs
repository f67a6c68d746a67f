#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing page fetching and offer extraction.
//!
//! Provides the [`PageSource`] trait with its reqwest-backed implementation
//! ([`http`]), the replaceable extraction rule table ([`rules`]), text
//! clean-up helpers ([`text`]), and the listing extractor ([`listing`]) that
//! turns a discount search page into [`koopi_offer_models::Offer`] records.
//!
//! This crate knows nothing about caching, scheduling, or output files. It
//! fetches bytes and maps bytes to offers.

pub mod http;
pub mod listing;
pub mod rules;
pub mod text;

/// Errors that can occur while fetching or parsing a listing page.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed before a response arrived (connect error,
    /// timeout, body read failure).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} for {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// The status code returned by the server.
        status: reqwest::StatusCode,
    },

    /// Parsing a document or a rule table failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can fetch the raw bytes behind a URL.
///
/// [`http::HttpPageSource`] is the production implementation. Tests
/// substitute in-memory sources to observe how many requests a crawl makes.
pub trait PageSource: Send + Sync {
    /// Fetches `url` and returns the response body verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] on transport failure or a non-success status.
    fn get(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ScrapeError>> + Send;
}
