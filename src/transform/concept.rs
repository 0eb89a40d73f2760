//! Identifier slugging and canonical decimal formatting.

use std::sync::LazyLock;

use regex::Regex;

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W_]+").expect("static pattern is valid"));

/// Convert a textual label to canonical identifier form
///
/// The label is trimmed and lowercased, every run of non-alphanumeric
/// characters (underscores included) becomes a single `_`, and leading or
/// trailing separators are removed.
#[must_use]
pub fn to_concept_id(label: &str) -> String {
    let replaced = NON_IDENTIFIER.replace_all(label.trim(), "_");
    replaced.trim_matches('_').to_lowercase()
}

/// Format a number with a bounded number of significant digits
///
/// The result is plain decimal text: never an exponent, trailing zeros and a
/// dangling decimal point removed. Ties round to even in every magnitude, so
/// identical inputs always produce identical bytes. Non-finite values yield
/// `None`.
#[must_use]
pub fn format_float_digits(value: f64, digits: usize) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value == 0.0 {
        return Some("0".to_string());
    }

    let digits = digits.max(1) as i32;
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = digits - 1 - magnitude;

    let text = if decimals > 0 {
        let text = format!("{value:.prec$}", prec = decimals as usize);
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        }
    } else {
        let scale = 10f64.powi(-decimals);
        format!("{:.0}", (value / scale).round_ties_even() * scale)
    };

    if text == "-0" {
        Some("0".to_string())
    } else {
        Some(text)
    }
}
