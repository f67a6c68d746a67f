//! JSON offer feed.
//!
//! The feed is a single document:
//!
//! ```json
//! {
//!   "created": "2025-10-19T08:00:00+02:00",
//!   "count": 1,
//!   "goods": [{ "id": "…", "cat": "Mléčné", "name": "Jogurt bílý", "offer_count": 2, … }],
//!   "markets": ["Albert", "Billa"]
//! }
//! ```
//!
//! Image references are reduced to a `.webp` file name in the thumbnail
//! store, or the default image token when the product has no picture.

use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use koopi_offer_models::SiteConfig;
use serde::{Deserialize, Serialize};

use crate::OutputError;
use crate::catalog::{Catalog, CatalogEntry};
use crate::csv_export::table_product_url;

/// One offer in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    #[serde(rename = "cat")]
    pub category: String,
    #[serde(rename = "subcat")]
    pub sub_category: String,
    pub query: String,
    pub name: String,
    pub price: String,
    #[serde(rename = "priceperunit")]
    pub price_per_unit: String,
    pub discount: String,
    pub note: String,
    pub club: String,
    pub volume: String,
    pub market: String,
    pub validity: String,
    pub url: String,
    pub image: String,
    pub offer_count: usize,
}

/// The whole feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// RFC 3339 generation time.
    pub created: String,
    pub count: usize,
    pub goods: Vec<FeedItem>,
    pub markets: Vec<String>,
}

/// Reduces an image URL to its feed form.
///
/// A `.png` or `.jpg` extension becomes `.webp`, the thumbnail path prefix
/// is stripped, and a missing or placeholder image becomes the default
/// image token.
#[must_use]
pub fn feed_image(url: &str, site: &SiteConfig) -> String {
    let webp = url
        .strip_suffix(".png")
        .or_else(|| url.strip_suffix(".jpg"))
        .map_or_else(|| url.to_owned(), |stem| format!("{stem}.webp"));

    let image = webp
        .strip_prefix(site.thumbs_prefix.as_str())
        .unwrap_or(&webp);
    let image = image
        .strip_prefix(site.no_image_url.as_str())
        .unwrap_or(image);

    let placeholder = placeholder_stem(&site.no_image_url);
    if image.is_empty() || placeholder.is_some_and(|stem| image.contains(stem)) {
        return site.default_image.clone();
    }
    image.to_owned()
}

/// File stem of the placeholder image URL (`no_discounts`).
fn placeholder_stem(no_image_url: &str) -> Option<&str> {
    no_image_url
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
}

impl FeedItem {
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry, site: &SiteConfig) -> Self {
        let offer = &entry.offer;
        Self {
            id: entry.id.clone(),
            category: offer.category.clone(),
            sub_category: offer.sub_category.clone(),
            query: offer.query.clone(),
            name: offer.name.clone(),
            price: offer.price.replacen(',', ".", 1),
            price_per_unit: offer.price_per_unit.clone(),
            discount: offer.discount.clone(),
            note: offer.note.clone(),
            club: offer.club.clone(),
            volume: offer.volume.clone(),
            market: offer.market.clone(),
            validity: offer.validity.clone(),
            url: table_product_url(&offer.url, site).to_owned(),
            image: feed_image(&offer.image_url, site),
            offer_count: entry.offer_count,
        }
    }
}

impl Feed {
    /// Builds the feed for `catalog`, stamped with `created`.
    #[must_use]
    pub fn build<Tz>(catalog: &Catalog, site: &SiteConfig, created: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let goods: Vec<FeedItem> = catalog
            .entries
            .iter()
            .map(|entry| FeedItem::from_entry(entry, site))
            .collect();

        Self {
            created: created.to_rfc3339_opts(SecondsFormat::Secs, true),
            count: goods.len(),
            goods,
            markets: catalog.aggregates.markets.clone(),
        }
    }

    /// Builds the feed stamped with the current local time.
    #[must_use]
    pub fn build_now(catalog: &Catalog, site: &SiteConfig) -> Self {
        Self::build(catalog, site, &Local::now())
    }

    /// Writes the feed as pretty-printed JSON to `path`, replacing any
    /// previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write_file(&self, path: &Path) -> Result<(), OutputError> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::write_atomic(path, &json)
    }
}
