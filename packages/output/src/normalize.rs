//! Note normalization for duplicate detection.
//!
//! Two notes that differ only in case, Czech diacritics, or punctuation
//! describe the same offer and must produce the same deduplication key.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of anything that is not an ASCII letter or digit.
static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Maps a lowercase Czech letter with a diacritic to its base letter.
const fn fold_czech(c: char) -> char {
    match c {
        'á' => 'a',
        'č' => 'c',
        'ď' => 'd',
        'é' | 'ě' => 'e',
        'í' => 'i',
        'ľ' => 'l',
        'ň' => 'n',
        'ó' => 'o',
        'ř' => 'r',
        'š' => 's',
        'ť' => 't',
        'ú' | 'ů' => 'u',
        'ý' => 'y',
        'ž' => 'z',
        c => c,
    }
}

/// Normalizes a note: lowercase, strip Czech diacritics, turn every run of
/// non-alphanumerics into one space, and trim.
#[must_use]
pub fn normalize_note(note: &str) -> String {
    let folded: String = note.to_lowercase().chars().map(fold_czech).collect();
    NON_ALNUM_RE.replace_all(&folded, " ").trim().to_owned()
}
