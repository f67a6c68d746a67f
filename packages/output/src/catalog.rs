//! Final, ordered offer catalog with per-product statistics.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use koopi_offer_models::Offer;

use crate::collation::CzechCollator;

/// Stable identifier of a generic product: the MD5 of its name, volume,
/// category, and sub-category.
///
/// Every offer of the same product gets the same ID regardless of market
/// or price.
#[must_use]
pub fn product_id(offer: &Offer) -> String {
    format!("{:x}", md5::compute(offer.product_key()))
}

/// An offer with its product ID and the number of offers for that product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub offer_count: usize,
    pub offer: Offer,
}

/// Run-wide statistics over the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    /// Distinct non-empty market names in collation order.
    pub markets: Vec<String>,
    /// Offers per market.
    pub market_counts: BTreeMap<String, usize>,
    /// Distinct non-empty package volumes.
    pub volumes: BTreeSet<String>,
}

impl Aggregates {
    /// `"Albert (12), Billa (7)"` style summary in market order.
    #[must_use]
    pub fn market_stats(&self) -> String {
        self.markets
            .iter()
            .map(|market| {
                let count = self.market_counts.get(market).copied().unwrap_or_default();
                format!("{market} ({count})")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Deduplicated offers, sorted for output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    pub aggregates: Aggregates,
}

impl Catalog {
    /// Builds the catalog from already deduplicated offers.
    #[must_use]
    pub fn assemble(mut offers: Vec<Offer>, collator: &CzechCollator) -> Self {
        let mut product_counts: HashMap<String, usize> = HashMap::new();
        let mut market_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut volumes = BTreeSet::new();

        for offer in &offers {
            *product_counts.entry(offer.product_key()).or_default() += 1;
            if !offer.market.is_empty() {
                *market_counts.entry(offer.market.clone()).or_default() += 1;
            }
            if !offer.volume.is_empty() {
                volumes.insert(offer.volume.clone());
            }
        }

        let mut markets: Vec<String> = market_counts.keys().cloned().collect();
        collator.sort_strings(&mut markets);
        collator.sort_offers(&mut offers);

        let entries = offers
            .into_iter()
            .map(|offer| CatalogEntry {
                id: product_id(&offer),
                offer_count: product_counts
                    .get(&offer.product_key())
                    .copied()
                    .unwrap_or(1),
                offer,
            })
            .collect();

        Self {
            entries,
            aggregates: Aggregates {
                markets,
                market_counts,
                volumes,
            },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
