//! Extraction rule table.
//!
//! The denylist, note rewrites, and sub-category rules are data, not code.
//! The default table is baked into the binary from `rules/default.toml` via
//! [`include_str!`]; a crawl configuration may replace it wholesale.

use serde::{Deserialize, Serialize};

use crate::ScrapeError;

/// Rule table embedded at compile time.
const DEFAULT_RULES_TOML: &str = include_str!("../rules/default.toml");

/// A literal find-and-replace applied to offer notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRewrite {
    /// Text to find.
    pub from: String,
    /// Replacement text.
    pub to: String,
}

/// Assigns a sub-category to offers whose note contains a substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCategoryRule {
    /// Substring searched for in the rewritten note.
    pub contains: String,
    /// Sub-category assigned on a match.
    pub sub_category: String,
}

/// The complete rule table consulted by the listing extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Product-name substrings that exclude a product group.
    #[serde(default)]
    pub denylist: Vec<String>,
    /// Note rewrites, applied in order.
    #[serde(default)]
    pub note_rewrites: Vec<NoteRewrite>,
    /// Sub-category rules; a later match overrides an earlier one.
    #[serde(default)]
    pub sub_categories: Vec<SubCategoryRule>,
}

impl Rules {
    /// Parses a rule table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the TOML is malformed.
    pub fn parse(toml_str: &str) -> Result<Self, ScrapeError> {
        toml::from_str(toml_str).map_err(|e| ScrapeError::Parse(e.to_string()))
    }

    /// Returns the rule table embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. It is checked by the unit
    /// tests of this module.
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(DEFAULT_RULES_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse rules/default.toml: {e}"))
    }

    /// Returns `true` if `name` contains any denylist entry, ignoring case.
    #[must_use]
    pub fn is_denied(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.denylist
            .iter()
            .any(|entry| lower.contains(&entry.to_lowercase()))
    }

    /// Applies every note rewrite in order.
    #[must_use]
    pub fn rewrite_note(&self, note: &str) -> String {
        self.note_rewrites
            .iter()
            .fold(note.to_owned(), |acc, rewrite| {
                acc.replace(&rewrite.from, &rewrite.to)
            })
    }

    /// Derives the sub-category of an already rewritten note.
    ///
    /// Returns an empty string when no rule matches.
    #[must_use]
    pub fn sub_category(&self, note: &str) -> String {
        self.sub_categories
            .iter()
            .rev()
            .find(|rule| note.contains(&rule.contains))
            .map(|rule| rule.sub_category.clone())
            .unwrap_or_default()
    }
}
