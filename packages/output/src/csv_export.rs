//! Semicolon-delimited offer table.
//!
//! Prices use a decimal comma on the site, so the table uses `;` as its
//! field delimiter. Product and image URLs are written relative to the
//! site's hosts.

use std::io::Write;
use std::path::Path;

use koopi_offer_models::SiteConfig;

use crate::OutputError;
use crate::catalog::CatalogEntry;

/// Column names, in output order.
pub const HEADER: [&str; 14] = [
    "Name",
    "Price",
    "PricePerUnit",
    "Discount",
    "Category",
    "SubCat",
    "Note",
    "Club",
    "Volume",
    "Market",
    "Validity",
    "Url",
    "ImageUrl",
    "Query",
];

/// Image URL as written to the table: CDN thumbnail path, placeholder, and
/// image host stripped.
#[must_use]
pub fn table_image_url<'a>(url: &'a str, site: &SiteConfig) -> &'a str {
    let url = url.strip_prefix(site.thumbs_prefix.as_str()).unwrap_or(url);
    let url = url.strip_prefix(site.no_image_url.as_str()).unwrap_or(url);
    let host = site.image_host_prefix();
    url.strip_prefix(host.as_str()).unwrap_or(url)
}

/// Product URL as written to the table: site host stripped.
#[must_use]
pub fn table_product_url<'a>(url: &'a str, site: &SiteConfig) -> &'a str {
    url.strip_prefix(site.home_url.as_str()).unwrap_or(url)
}

/// Writes the header and one row per entry to `writer`.
///
/// # Errors
///
/// Returns [`OutputError::Csv`] if a row cannot be written.
pub fn write_csv<W: Write>(
    writer: W,
    entries: &[CatalogEntry],
    site: &SiteConfig,
) -> Result<(), OutputError> {
    let mut csv_writer = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    csv_writer.write_record(HEADER)?;

    for entry in entries {
        let offer = &entry.offer;
        csv_writer.write_record([
            offer.name.as_str(),
            offer.price.as_str(),
            offer.price_per_unit.as_str(),
            offer.discount.as_str(),
            offer.category.as_str(),
            offer.sub_category.as_str(),
            offer.note.as_str(),
            offer.club.as_str(),
            offer.volume.as_str(),
            offer.market.as_str(),
            offer.validity.as_str(),
            table_product_url(&offer.url, site),
            table_image_url(&offer.image_url, site),
            offer.query.as_str(),
        ])?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes the table to `path`, replacing any previous file.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
pub fn write_csv_file(
    path: &Path,
    entries: &[CatalogEntry],
    site: &SiteConfig,
) -> Result<(), OutputError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, entries, site)?;
    crate::write_atomic(path, &buffer)
}

#[cfg(test)]
mod tests {
    use koopi_offer_models::Offer;

    use super::*;

    fn entry(offer: Offer) -> CatalogEntry {
        CatalogEntry {
            id: String::new(),
            offer_count: 1,
            offer,
        }
    }

    fn render(entries: &[CatalogEntry]) -> String {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, entries, &SiteConfig::default()).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn header_only_for_empty_catalog() {
        assert_eq!(
            render(&[]),
            "Name;Price;PricePerUnit;Discount;Category;SubCat;Note;Club;Volume;Market;Validity;Url;ImageUrl;Query\n"
        );
    }

    #[test]
    fn writes_row_with_relative_urls() {
        let offer = Offer {
            name: "Jogurt bílý".to_owned(),
            price: "9.90 Kč".to_owned(),
            category: "Mléčné".to_owned(),
            market: "Albert".to_owned(),
            url: "https://www.kupi.cz/sleva/jogurt-bily".to_owned(),
            image_url: "https://img.kupi.cz/kupi/thumbs/jogurt-bily.jpg".to_owned(),
            query: "jogurt".to_owned(),
            ..Offer::default()
        };
        let csv = render(&[entry(offer)]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Jogurt bílý;9.90 Kč;;;Mléčné;;;;;Albert;;/sleva/jogurt-bily;jogurt-bily.jpg;jogurt"
        );
    }

    #[test]
    fn quotes_fields_containing_delimiter() {
        let offer = Offer {
            name: "Pivo; plech".to_owned(),
            ..Offer::default()
        };
        let csv = render(&[entry(offer)]);
        assert!(csv.lines().nth(1).unwrap().starts_with("\"Pivo; plech\";"));
    }

    #[test]
    fn image_url_prefixes_are_stripped() {
        let site = SiteConfig::default();
        assert_eq!(
            table_image_url("https://img.kupi.cz/kupi/thumbs/a.png", &site),
            "a.png"
        );
        assert_eq!(
            table_image_url("https://img.kupi.cz/img/no_img/no_discounts.png", &site),
            ""
        );
        assert_eq!(table_image_url("https://img.kupi.cz/other/b.jpg", &site), "other/b.jpg");
        assert_eq!(table_image_url("https://cdn.example/c.jpg", &site), "https://cdn.example/c.jpg");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("koopi.csv");
        write_csv_file(&path, &[], &SiteConfig::default()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Name;Price;"));
    }
}
