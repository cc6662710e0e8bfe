//! Text normalization and entity identity
//!
//! Entity ids are slugs of the canonical name. Leveled rows, which share one name,
//! get a composite id of base id, optional variant and level.

/// Sentinel id for names that slug to nothing
pub const UNKNOWN_ENTITY_ID: &str = "unknown";

const PLACEHOLDER_TOKENS: &[&str] = &["", "-", "–", "—", "?", "n/a", "na", "null", "none"];

/// Decode the two HTML entities tables leak, collapse whitespace runs, trim.
pub fn normalize_text(raw: &str) -> String {
    let decoded = raw.replace("&nbsp;", " ").replace("&amp;", "&");
    let mut out = String::with_capacity(decoded.len());
    let mut prev_space = false;
    for ch in decoded.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Casefolded slug: non-alphanumeric runs become a single `_`.
///
/// ```
/// use wikiledger_core::identity::derive_entity_id;
/// assert_eq!(derive_entity_id("Coin Bonus"), "coin_bonus");
/// assert_eq!(derive_entity_id("  --  "), "unknown");
/// ```
pub fn derive_entity_id(canonical_name: &str) -> String {
    let mut out = String::with_capacity(canonical_name.len());
    let mut pending_sep = false;
    for ch in canonical_name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        UNKNOWN_ENTITY_ID.to_string()
    } else {
        out
    }
}

/// Identity for one level of a leveled table.
pub fn derive_composite_id(base_id: &str, level: u32, variant: Option<&str>) -> String {
    let raw = match variant.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => format!("{}_{}_lvl_{}", base_id, v, level),
        None => format!("{}_lvl_{}", base_id, level),
    };
    derive_entity_id(&raw)
}

/// Blank, dash and "null"-like cells.
pub fn is_placeholder(value: &str) -> bool {
    let v = normalize_text(value).to_lowercase();
    PLACEHOLDER_TOKENS.contains(&v.as_str())
}

/// The literal marker of a summary row.
pub fn is_total_marker(value: &str) -> bool {
    normalize_text(value).eq_ignore_ascii_case("total")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_entities() {
        assert_eq!(normalize_text("  Coin\t\n Bonus  "), "Coin Bonus");
        assert_eq!(normalize_text("Black&nbsp;Hole"), "Black Hole");
        assert_eq!(normalize_text("Lab &amp; Cards"), "Lab & Cards");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_entity_id_slugging() {
        assert_eq!(derive_entity_id("Coin Bonus"), "coin_bonus");
        assert_eq!(derive_entity_id("Damage / Meter"), "damage_meter");
        assert_eq!(derive_entity_id("  Spotlight!!  "), "spotlight");
        assert_eq!(derive_entity_id("x2.5 Multiplier"), "x2_5_multiplier");
        assert_eq!(derive_entity_id(""), UNKNOWN_ENTITY_ID);
        assert_eq!(derive_entity_id("—"), UNKNOWN_ENTITY_ID);
    }

    #[test]
    fn test_composite_id() {
        assert_eq!(derive_composite_id("death_wave", 3, None), "death_wave_lvl_3");
        assert_eq!(
            derive_composite_id("death_wave", 1, Some("Damage Upgrades")),
            "death_wave_damage_upgrades_lvl_1"
        );
        assert_eq!(derive_composite_id("death_wave", 2, Some("  ")), "death_wave_lvl_2");
    }

    #[test]
    fn test_placeholders() {
        for token in ["", " ", "-", "—", "null", "None", "N/A", "?"] {
            assert!(is_placeholder(token), "{:?} should be a placeholder", token);
        }
        assert!(!is_placeholder("0"));
        assert!(!is_placeholder("Total"));
        assert!(is_total_marker(" TOTAL "));
        assert!(!is_total_marker("Totals"));
    }
}
