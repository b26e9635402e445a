//! Regex extraction of structured facts from LLC1 and CON29 text.
//!
//! Both parsers are total: any input, including the empty string, yields a
//! complete fact set. A field whose pattern is absent stays unknown (`None`).
//!
//! Council documents vary wildly in layout, so every pattern is a loose scan
//! for a field label followed by the first yes/no style token after it.

use std::sync::LazyLock;

use regex::Regex;

use crate::facts::{
    Charge, Con29Facts, Decision, Llc1Facts, PlanningDecision, RoadsFootways,
};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction pattern must compile")
}

// ── Tri-state interpretation ──

static TRUE_ISH: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(?:yes|present|true|y|provided|outstanding|payable|affected)\b")
});
static FALSE_ISH: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(?:no|absent|false|n|none|not\s*affected|missing)\b")
});

/// Interpret a captured answer fragment as a tri-state boolean.
///
/// The true-ish set is checked first, so a fragment matching both sets
/// (e.g. `"not affected"`, which contains `affected`) reads as `Some(true)`.
/// No fragment, or one matching neither set, is `None`.
pub fn interpret_tri_state(fragment: Option<&str>) -> Option<bool> {
    let fragment = fragment?;
    if TRUE_ISH.is_match(fragment) {
        Some(true)
    } else if FALSE_ISH.is_match(fragment) {
        Some(false)
    } else {
        None
    }
}

// ── LLC1 ──

/// Known LLC1 charge types and the phrase that registers each one.
pub const LLC1_CHARGES: &[(&str, &str)] = &[
    ("ConservationArea", r"(?is)\bconservation\s+area\b"),
    ("ListedBuilding", r"(?is)\blisted\s+building\b"),
    ("TPO", r"(?is)\b(?:tree\s+preservation|TPO)\b"),
    ("S106", r"(?is)\b(?:section\s*106|s106)\b"),
];

static LLC1_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    LLC1_CHARGES
        .iter()
        .map(|(charge_type, pattern)| (*charge_type, compile(pattern)))
        .collect()
});

/// Parse LLC1 register text. Emits exactly one [`Charge`] per known type,
/// in [`LLC1_CHARGES`] order, with `present = false` when the phrase is absent.
pub fn parse_llc1(text: &str) -> Llc1Facts {
    let charges = LLC1_PATTERNS
        .iter()
        .map(|(charge_type, re)| Charge {
            charge_type: charge_type.to_string(),
            present: re.is_match(text),
            reference: None,
            source: Some("LLC1".to_string()),
            evidence: None,
        })
        .collect();
    Llc1Facts { charges }
}

// ── CON29 ──

// Each pattern has exactly one capture group: the answer fragment.
static HIGHWAY_ADOPTED: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)(?:abutting.*?adopted|highway.*adopted).*?(yes|no|true|false)")
});
static HIGHWAY_AUTHORITY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?im)\bhighways?\s+authority\s*[:-]\s*(.+?)\s*$"));
static ENFORCEMENT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\benforcement\s+notices?\b.*?(yes|no|true|false)")
});
static CONTAMINATED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)\bcontaminated\s+land\b.*?(yes|no|true|false)"));
static S106: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\b(?:section\s*106|s106)\b.*?(yes|no|true|false|outstanding|payable|none)")
});
static CIL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\bCIL\b.*?(yes|no|true|false|outstanding|none|payable)")
});
static FLOOD_ZONE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bflood\s*zone\s*([123])\b"));
static RADON: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\bradon\b.*?(affected|not\s*affected|yes|no|true|false)")
});
static BUILDING_REGS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?is)\b(?:building\s*reg(?:ulation)?s?|completion\s*certificate)\b.*?(provided|missing|yes|no|true|false)",
    )
});

// Loose on purpose: every group is optional and the gaps are lazy, so most
// matches carry a single fragment. Entries are kept when any group matched.
static PLANNING: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"(?is)(?:ref(?:erence)?[:\s]*([A-Z0-9/-]+))?.{0,80}?",
        r"(?:desc(?:ription)?[:\s]*(.{0,160}?))?.{0,60}?",
        r"(?:decision[:\s]*(granted|refused|approved|undetermined))?.{0,60}?",
        r"(?:date[:\s]*([0-9]{1,2}\s\w+\s[0-9]{2,4}|[0-9/-]{6,10}))?",
    ))
});

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn tri_state(re: &Regex, text: &str) -> Option<bool> {
    interpret_tri_state(capture(re, text))
}

fn planning_decisions(text: &str) -> Vec<PlanningDecision> {
    let mut decisions = Vec::new();
    for caps in PLANNING.captures_iter(text) {
        // An empty capture is treated the same as a missing one.
        let group = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
        };
        let (reference, description, decision, date) = (group(1), group(2), group(3), group(4));
        if reference.is_none() && description.is_none() && decision.is_none() && date.is_none() {
            continue;
        }
        decisions.push(PlanningDecision {
            reference: reference.unwrap_or("N/A").to_string(),
            description: description.map(str::to_string),
            decision: decision.and_then(|d| d.parse::<Decision>().ok()),
            date: date.map(str::to_string),
            evidence: None,
        });
    }
    decisions
}

/// Parse CON29 replies. Each field is searched independently; a field
/// whose pattern is not found stays `None`.
pub fn parse_con29(text: &str) -> Con29Facts {
    Con29Facts {
        planning_decisions: planning_decisions(text),
        roads_footways: RoadsFootways {
            abutting_highway_adopted: tri_state(&HIGHWAY_ADOPTED, text),
            authority: capture(&HIGHWAY_AUTHORITY, text).map(str::to_string),
            evidence: None,
        },
        enforcement_notices_present: tri_state(&ENFORCEMENT, text),
        contaminated_land_designation: tri_state(&CONTAMINATED, text),
        s106_present: tri_state(&S106, text),
        cil_outstanding: tri_state(&CIL, text),
        flood_zone: capture(&FLOOD_ZONE, text).map(str::to_string),
        radon_affected: tri_state(&RADON, text),
        building_regs_completion_present: tri_state(&BUILDING_REGS, text),
        evidence: None,
    }
}
