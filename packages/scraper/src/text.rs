//! Text clean-up helpers for listing fields.

/// Trims and collapses every run of whitespace (including newlines) into a
/// single space.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts the Czech decimal comma into a dot.
#[must_use]
pub fn decimal_dot(input: &str) -> String {
    input.trim().replace(',', ".")
}

/// Replaces the en dash the site uses for negative discounts with an ASCII
/// hyphen.
#[must_use]
pub fn normalize_discount(input: &str) -> String {
    input.trim().replace('\u{2013}', "-").trim().to_owned()
}

/// Removes the leading `/` separator from a package size (`"/ 500 g"`).
#[must_use]
pub fn strip_volume_separator(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('/')
        .unwrap_or(trimmed)
        .trim()
        .to_owned()
}
