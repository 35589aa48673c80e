//! Internal helpers for text folding and amount formatting.
//!
//! These utilities are **not** part of the public API. They keep string
//! comparison consistent between filtering, sorting and facets.

use unicode_normalization::UnicodeNormalization;

/// Case-folds a string for comparisons.
///
/// Applies NFKC so compatibility forms (full-width digits, ligatures) compare
/// equal to their plain counterparts, then lowercases.
pub(crate) fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.nfkc() {
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Formats a minor-unit amount the way a user would type it.
///
/// Trailing fractional zeros are dropped, so `-5000` becomes `-50` and
/// `1250` becomes `12.5`. Used by the free-text search.
pub(crate) fn amount_text(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    let major = abs / 100;
    let minor = abs % 100;
    match minor {
        0 => format!("{sign}{major}"),
        m if m % 10 == 0 => format!("{sign}{major}.{}", m / 10),
        m => format!("{sign}{major}.{m:02}"),
    }
}

/// Trims a label and returns `None` if nothing is left.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
