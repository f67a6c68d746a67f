//! Offer deduplication.

use std::collections::BTreeMap;

use koopi_offer_models::Offer;

use crate::normalize::normalize_note;

/// Key under which two offers count as the same offer.
///
/// Name, price, price per unit, normalized note, club, volume, market, and
/// validity, concatenated.
#[must_use]
pub fn dedup_key(offer: &Offer) -> String {
    let note = normalize_note(&offer.note);
    [
        offer.name.as_str(),
        offer.price.as_str(),
        offer.price_per_unit.as_str(),
        note.as_str(),
        offer.club.as_str(),
        offer.volume.as_str(),
        offer.market.as_str(),
        offer.validity.as_str(),
    ]
    .concat()
}

/// Collapses offers with equal [`dedup_key`]s. A later offer replaces an
/// earlier one under the same key.
///
/// The result is ordered by key; callers impose their own presentation
/// order.
#[must_use]
pub fn dedupe(offers: Vec<Offer>) -> Vec<Offer> {
    let before = offers.len();
    let unique: BTreeMap<String, Offer> = offers
        .into_iter()
        .map(|offer| (dedup_key(&offer), offer))
        .collect();

    log::debug!("Deduplicated {before} offers into {}", unique.len());
    unique.into_values().collect()
}
