//! Parsing of wiki-formatted magnitudes
//!
//! Accepts the shapes tables use for values and costs: `+5%`, `x1.5`, `2.5x`,
//! `30s`, `1,250`, `1.5K`, `2M`, `3.1B`, `4T`, `7q`, `9Q`.

use crate::errors::{LedgerError, Result};
use crate::identity::normalize_text;

fn suffix_multiplier(ch: char) -> Option<f64> {
    match ch {
        'k' | 'K' => Some(1e3),
        'M' => Some(1e6),
        'B' => Some(1e9),
        'T' => Some(1e12),
        'q' => Some(1e15),
        'Q' => Some(1e18),
        _ => None,
    }
}

/// Parse a raw cell into a number, reporting `field` on failure.
pub fn parse_magnitude(field: &str, raw: &str) -> Result<f64> {
    let unparseable = || LedgerError::UnparseableValue {
        field: field.to_string(),
        raw: raw.to_string(),
    };

    let normalized = normalize_text(raw);
    let mut s: String = normalized
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }
    for prefix in ['x', 'X', '×'] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    for suffix in ['%', 'x', 'X', '×', 's'] {
        if let Some(rest) = s.strip_suffix(suffix) {
            s = rest.to_string();
            break;
        }
    }

    let mut multiplier = 1.0;
    if let Some(last) = s.chars().last() {
        if let Some(m) = suffix_multiplier(last) {
            multiplier = m;
            s.pop();
        }
    }

    if s.is_empty() {
        return Err(unparseable());
    }

    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
        .ok_or_else(unparseable)
}
