//! Finding key naming.
//!
//! Keys are dotted paths rooted at the document kind:
//!
//! - `llc1.<charge>.present`, e.g. `llc1.conservation_area.present`
//! - `con29.<field>`, e.g. `con29.flood_zone`
//! - `con29.roads_footways.<subfield>`
//!
//! Charge types are enum-like CamelCase names and are converted to
//! snake_case. Runs of capitals are treated as one word, so acronyms stay
//! whole: `TPO` becomes `tpo`, `S106` becomes `s106`.

pub const CON29_PLANNING_DECISIONS: &str = "con29.planning_decisions";
pub const CON29_ENFORCEMENT_NOTICES: &str = "con29.enforcement_notices_present";
pub const CON29_CONTAMINATED_LAND: &str = "con29.contaminated_land_designation";
pub const CON29_S106: &str = "con29.s106_present";
pub const CON29_CIL_OUTSTANDING: &str = "con29.cil_outstanding";
pub const CON29_FLOOD_ZONE: &str = "con29.flood_zone";
pub const CON29_RADON: &str = "con29.radon_affected";
pub const CON29_BUILDING_REGS: &str = "con29.building_regs_completion_present";
pub const ROADS_HIGHWAY_ADOPTED: &str = "con29.roads_footways.abutting_highway_adopted";
pub const ROADS_AUTHORITY: &str = "con29.roads_footways.authority";

/// Convert an enum-like name to snake_case.
///
/// A word break is inserted before an uppercase letter that follows a
/// lowercase letter or digit, and before the last capital of an acronym
/// that is followed by lowercase (`HTTPServer` -> `http_server`).
/// Non-alphanumeric characters collapse to a single `_`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('_') {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// `llc1.<snake_case charge>.present`
pub fn charge_key(charge_type: &str) -> String {
    format!("llc1.{}.present", snake_case(charge_type))
}

/// Inverse of [`charge_key`] for the given known charge types.
///
/// Returns the charge type whose key equals `key`, if any.
pub fn charge_type_for_key<'a>(key: &str, known: &[&'a str]) -> Option<&'a str> {
    known.iter().copied().find(|t| charge_key(t) == key)
}
