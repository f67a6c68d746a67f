#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offer record, fetch task, and site configuration types.
//!
//! These are the values that flow between the crawl pipeline stages: the
//! work-list builder produces [`FetchTask`]s from [`QueryRow`]s, the
//! extraction engine produces [`Offer`]s, and every stage that builds or
//! strips URLs reads them from the shared [`SiteConfig`].

use serde::{Deserialize, Serialize};

/// A single discount offer extracted from one listing row.
///
/// Field order matters: the derived [`Ord`] is used as the deterministic
/// tie-breaker when two offers share a product name.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Offer {
    /// Product name, trimmed and whitespace-collapsed.
    pub name: String,
    /// Category taken from the input row that produced this offer.
    pub category: String,
    /// Search query that produced this offer.
    pub query: String,
    /// Price as a decimal string (`"29.90"`).
    pub price: String,
    /// Price per unit as a decimal string (`"59.80 Kč/1 kg"`).
    pub price_per_unit: String,
    /// Discount percentage, sign-normalized (`"-35 %"`).
    pub discount: String,
    /// Free-text note after synonym rewrites.
    pub note: String,
    /// Loyalty-club qualifier, empty when the offer is open to everyone.
    pub club: String,
    /// Package volume or size (`"500 g"`).
    pub volume: String,
    /// Retailer name.
    pub market: String,
    /// Validity period as free text.
    pub validity: String,
    /// Absolute product URL.
    pub url: String,
    /// Absolute product image URL.
    pub image_url: String,
    /// Sub-category derived from the note, empty when no rule matched.
    pub sub_category: String,
}

impl Offer {
    /// Returns the generic product key: name ⧺ volume ⧺ category ⧺
    /// sub-category.
    ///
    /// Offers for the same product across different markets and prices share
    /// this key.
    #[must_use]
    pub fn product_key(&self) -> String {
        format!(
            "{}{}{}{}",
            self.name, self.volume, self.category, self.sub_category
        )
    }
}

/// One row of the crawl input: a category, a search query, and how many
/// result pages to visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRow {
    /// Category label attached to every offer found by this query.
    pub category: String,
    /// Search text sent to the site.
    pub query: String,
    /// Number of result pages to fetch, starting at page 1.
    pub pages: u32,
}

/// A single unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTask {
    /// Absolute URL of the listing page.
    pub url: String,
    /// File name of the cached copy of this page inside the HTML cache.
    pub cache_key: String,
    /// Category of the input row.
    pub category: String,
    /// Query of the input row.
    pub query: String,
}

/// URLs and path prefixes of the crawled site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Host prefix prepended to relative product URLs.
    pub home_url: String,
    /// Host prefix prepended to relative image URLs.
    pub image_url: String,
    /// Search URL; the escaped query is appended directly.
    pub search_url: String,
    /// Query-string fragment that precedes the page number for pages ≥ 2.
    pub page_param: String,
    /// CDN path prefix stripped from image URLs in the outputs.
    pub thumbs_prefix: String,
    /// Placeholder image the site uses for products without a picture.
    pub no_image_url: String,
    /// Image token written to the feed in place of a missing picture.
    pub default_image: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: "https://www.kupi.cz".to_owned(),
            image_url: "https://img.kupi.cz".to_owned(),
            search_url: "https://www.kupi.cz/hledej?f=".to_owned(),
            page_param: "&page=".to_owned(),
            thumbs_prefix: "https://img.kupi.cz/kupi/thumbs/".to_owned(),
            no_image_url: "https://img.kupi.cz/img/no_img/no_discounts.png".to_owned(),
            default_image: "default.png".to_owned(),
        }
    }
}

impl SiteConfig {
    /// Makes a product URL absolute by prepending [`Self::home_url`] unless
    /// it already starts with `http`.
    #[must_use]
    pub fn absolute_product_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_owned()
        } else {
            format!("{}{href}", self.home_url)
        }
    }

    /// Makes an image URL absolute by prepending [`Self::image_url`] unless
    /// it already starts with `http`.
    #[must_use]
    pub fn absolute_image_url(&self, src: &str) -> String {
        if src.starts_with("http") {
            src.to_owned()
        } else {
            format!("{}{src}", self.image_url)
        }
    }

    /// Returns the image host with a trailing slash, used when stripping
    /// the host from image URLs.
    #[must_use]
    pub fn image_host_prefix(&self) -> String {
        format!("{}/", self.image_url.trim_end_matches('/'))
    }
}
