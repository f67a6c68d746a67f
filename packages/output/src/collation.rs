//! Czech collation.
//!
//! Product names sort by Czech alphabetic order: `č` after `c`, `ch` as
//! its own letter after `h`, `ř` after `r`, and so on. Byte order would put
//! every accented initial after `z`.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;
use koopi_offer_models::Offer;

use crate::OutputError;

/// Compares strings by Czech collation rules.
pub struct CzechCollator {
    collator: Collator,
}

impl std::fmt::Debug for CzechCollator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CzechCollator").finish_non_exhaustive()
    }
}

impl CzechCollator {
    /// Loads the Czech collation tables compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Collation`] if the tables cannot be loaded.
    pub fn new() -> Result<Self, OutputError> {
        let collator = Collator::try_new(&locale!("cs").into(), CollatorOptions::new())
            .map_err(|e| OutputError::Collation(e.to_string()))?;
        Ok(Self { collator })
    }

    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b)
    }

    /// Sorts strings in place.
    pub fn sort_strings(&self, items: &mut [String]) {
        items.sort_by(|a, b| self.compare(a, b).then_with(|| a.cmp(b)));
    }

    /// Sorts offers by name, falling back to full field order so equal
    /// names still come out in a reproducible order.
    pub fn sort_offers(&self, offers: &mut [Offer]) {
        offers.sort_by(|a, b| self.compare(&a.name, &b.name).then_with(|| a.cmp(b)));
    }
}
