//! Discount listing extractor.
//!
//! A search results page is a sequence of product groups
//! (`div.group_discounts`), each holding the product name, link, and image
//! plus one `.discount_row` per retailer offer. Every surviving row becomes
//! one [`Offer`].

use std::sync::LazyLock;

use koopi_offer_models::{Offer, SiteConfig};
use scraper::{ElementRef, Html, Selector};

use crate::ScrapeError;
use crate::rules::Rules;
use crate::text::{collapse_whitespace, decimal_dot, normalize_discount, strip_volume_separator};

/// Parses a selector that is known to be valid at compile time.
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid CSS selector '{css}': {e}"))
}

static GROUP: LazyLock<Selector> = LazyLock::new(|| selector("div.group_discounts"));
static NAME: LazyLock<Selector> = LazyLock::new(|| selector("div.product_name h2 a"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("div.product_image a img"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector(".discount_row"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".discount_price_value"));
static PRICE_PER_UNIT: LazyLock<Selector> = LazyLock::new(|| selector(".price_per_unit"));
static DISCOUNT: LazyLock<Selector> = LazyLock::new(|| selector(".discount_percentage"));
static VOLUME: LazyLock<Selector> = LazyLock::new(|| selector(".discount_amount"));
static NOTE: LazyLock<Selector> = LazyLock::new(|| selector(".discount_note"));
static CLUB: LazyLock<Selector> = LazyLock::new(|| selector(".discounts_club"));
static VALIDITY: LazyLock<Selector> = LazyLock::new(|| selector(".discounts_validity"));
static MARKET: LazyLock<Selector> = LazyLock::new(|| selector(".discounts_shop_name a span"));

/// Class that marks a product group whose offers have expired.
const INACTIVE_CLASS: &str = "notactive";

/// Concatenated text of every element under `root` matching `sel`.
fn text_of(root: ElementRef<'_>, sel: &Selector) -> String {
    root.select(sel).flat_map(|el| el.text()).collect()
}

/// First value of `attr` on an element under `root` matching `sel`.
fn attr_of<'a>(root: ElementRef<'a>, sel: &Selector, attr: &str) -> &'a str {
    root.select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
}

/// Maps listing pages to offers using a rule table and the site's URLs.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Rules,
    site: SiteConfig,
}

impl Extractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new(rules: Rules, site: SiteConfig) -> Self {
        Self { rules, site }
    }

    /// Returns the rule table in use.
    #[must_use]
    pub const fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Parses `body` and extracts every offer on the page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the body is not valid UTF-8.
    pub fn extract(
        &self,
        body: &[u8],
        category: &str,
        query: &str,
    ) -> Result<Vec<Offer>, ScrapeError> {
        let html = std::str::from_utf8(body)
            .map_err(|e| ScrapeError::Parse(format!("listing is not valid UTF-8: {e}")))?;
        let document = Html::parse_document(html);
        Ok(self.extract_document(&document, category, query))
    }

    /// Extracts every offer from an already parsed document.
    #[must_use]
    pub fn extract_document(&self, document: &Html, category: &str, query: &str) -> Vec<Offer> {
        let mut offers = Vec::new();

        for group in document.select(&GROUP) {
            if group.value().classes().any(|c| c == INACTIVE_CLASS) {
                continue;
            }

            let name = collapse_whitespace(&text_of(group, &NAME));
            if name.is_empty() {
                continue;
            }
            if self.rules.is_denied(&name) {
                log::debug!("[{query}] skipping denied product '{name}'");
                continue;
            }

            let url = self
                .site
                .absolute_product_url(attr_of(group, &NAME, "href"));
            let image_url = self
                .site
                .absolute_image_url(attr_of(group, &IMAGE, "data-src"));

            for row in group.select(&ROW) {
                let note = self
                    .rules
                    .rewrite_note(text_of(row, &NOTE).trim());
                let note = collapse_whitespace(&note);
                let sub_category = self.rules.sub_category(&note);

                offers.push(Offer {
                    name: name.clone(),
                    category: category.to_owned(),
                    query: query.to_owned(),
                    price: decimal_dot(&text_of(row, &PRICE)),
                    price_per_unit: decimal_dot(&text_of(row, &PRICE_PER_UNIT)),
                    discount: normalize_discount(&text_of(row, &DISCOUNT)),
                    note,
                    club: collapse_whitespace(&text_of(row, &CLUB)),
                    volume: strip_volume_separator(&text_of(row, &VOLUME)),
                    market: collapse_whitespace(&text_of(row, &MARKET)),
                    validity: collapse_whitespace(&text_of(row, &VALIDITY)),
                    url: url.clone(),
                    image_url: image_url.clone(),
                    sub_category,
                });
            }
        }

        offers
    }
}
