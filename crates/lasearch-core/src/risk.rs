//! Deterministic risk rules over LLC1 and CON29 facts.
//!
//! Each rule is an independent guarded check. A rule fires only on an
//! explicit `Some(true)` / `Some(false)` match; an unknown field never
//! fires anything. Either fact set may be missing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::facts::{Con29Facts, Evidence, Llc1Facts};
use crate::key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCode {
    UnadoptedRoad,
    ConservationArea,
    ListedBuilding,
    EnforcementNotice,
    ContaminatedLand,
    Section106,
    #[serde(rename = "CILOutstanding")]
    CilOutstanding,
    FloodZone3,
    RadonAffected,
    MissingBuildingRegs,
}

impl RiskCode {
    pub const ALL: [RiskCode; 10] = [
        RiskCode::UnadoptedRoad,
        RiskCode::ConservationArea,
        RiskCode::ListedBuilding,
        RiskCode::EnforcementNotice,
        RiskCode::ContaminatedLand,
        RiskCode::Section106,
        RiskCode::CilOutstanding,
        RiskCode::FloodZone3,
        RiskCode::RadonAffected,
        RiskCode::MissingBuildingRegs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCode::UnadoptedRoad => "UnadoptedRoad",
            RiskCode::ConservationArea => "ConservationArea",
            RiskCode::ListedBuilding => "ListedBuilding",
            RiskCode::EnforcementNotice => "EnforcementNotice",
            RiskCode::ContaminatedLand => "ContaminatedLand",
            RiskCode::Section106 => "Section106",
            RiskCode::CilOutstanding => "CILOutstanding",
            RiskCode::FloodZone3 => "FloodZone3",
            RiskCode::RadonAffected => "RadonAffected",
            RiskCode::MissingBuildingRegs => "MissingBuildingRegs",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RiskCode::UnadoptedRoad | RiskCode::FloodZone3 => Severity::High,
            _ => Severity::Medium,
        }
    }

    /// Client-facing explanation stored alongside the risk.
    pub fn message(&self) -> &'static str {
        match self {
            RiskCode::UnadoptedRoad => {
                "The abutting highway is not adopted; the owner may be liable for road maintenance."
            }
            RiskCode::ConservationArea => {
                "The property lies in a conservation area; alterations and demolition are restricted."
            }
            RiskCode::ListedBuilding => {
                "The property is a listed building; works need listed building consent."
            }
            RiskCode::EnforcementNotice => "A planning enforcement notice is recorded against the property.",
            RiskCode::ContaminatedLand => "The land is designated as contaminated land.",
            RiskCode::Section106 => "A Section 106 agreement affects the property; review its obligations.",
            RiskCode::CilOutstanding => "Community Infrastructure Levy is outstanding.",
            RiskCode::FloodZone3 => {
                "The property is in Flood Zone 3; insurers and lenders may impose conditions."
            }
            RiskCode::RadonAffected => "The property is in a radon affected area.",
            RiskCode::MissingBuildingRegs => {
                "No building regulations completion certificate was provided."
            }
        }
    }
}

impl fmt::Display for RiskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskCode::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown risk code: {s}"))
    }
}

/// A derived risk with pointers back to the facts that fired it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub code: RiskCode,
    pub severity: Severity,
    pub evidence: Vec<Evidence>,
}

impl RiskFlag {
    fn new(code: RiskCode, evidence: Vec<Evidence>) -> Self {
        Self {
            code,
            severity: code.severity(),
            evidence,
        }
    }
}

/// A risk as persisted against a matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub matter_id: String,
    pub code: RiskCode,
    #[serde(alias = "level")]
    pub severity: Severity,
    pub message: String,
    pub evidence: Vec<Evidence>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

impl Risk {
    pub fn from_flag(matter_id: &str, flag: RiskFlag) -> Self {
        Self {
            matter_id: matter_id.to_string(),
            code: flag.code,
            severity: flag.severity,
            message: flag.code.message().to_string(),
            evidence: flag.evidence,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ── Rules ──

/// Charges whose type starts with `prefix` (case-insensitive) and are present.
fn llc1_rule(llc1: Option<&Llc1Facts>, prefix: &str, code: RiskCode) -> Option<RiskFlag> {
    let llc1 = llc1?;
    let hits: Vec<_> = llc1
        .charges
        .iter()
        .filter(|c| c.present && c.charge_type.to_ascii_lowercase().starts_with(prefix))
        .collect();
    if hits.is_empty() {
        return None;
    }
    let evidence = hits
        .iter()
        .filter_map(|c| {
            c.evidence
                .as_ref()
                .map(|ev| ev.with_note(key::charge_key(&c.charge_type)))
        })
        .collect();
    Some(RiskFlag::new(code, evidence))
}

/// Fires when `field` is exactly `Some(expected)`.
fn con29_rule(
    con29: &Con29Facts,
    field: Option<bool>,
    expected: bool,
    key: &str,
    code: RiskCode,
) -> Option<RiskFlag> {
    (field == Some(expected)).then(|| RiskFlag::new(code, con29_evidence(con29, key)))
}

fn con29_evidence(con29: &Con29Facts, key: &str) -> Vec<Evidence> {
    con29
        .evidence
        .iter()
        .map(|ev| ev.with_note(key))
        .collect()
}

/// Derive risk flags from whatever facts are available, in rule-table order.
pub fn derive_risks(llc1: Option<&Llc1Facts>, con29: Option<&Con29Facts>) -> Vec<RiskFlag> {
    let mut risks = Vec::new();

    if let Some(c) = con29 {
        let adopted = c.roads_footways.abutting_highway_adopted;
        if adopted == Some(false) {
            let evidence = c
                .roads_footways
                .evidence
                .as_ref()
                .or(c.evidence.as_ref())
                .map(|ev| vec![ev.with_note(key::ROADS_HIGHWAY_ADOPTED)])
                .unwrap_or_default();
            risks.push(RiskFlag::new(RiskCode::UnadoptedRoad, evidence));
        }
    }

    risks.extend(llc1_rule(llc1, "conservation", RiskCode::ConservationArea));
    risks.extend(llc1_rule(llc1, "listed", RiskCode::ListedBuilding));

    let Some(c) = con29 else {
        return risks;
    };

    let rules = [
        (c.enforcement_notices_present, true, key::CON29_ENFORCEMENT_NOTICES, RiskCode::EnforcementNotice),
        (c.contaminated_land_designation, true, key::CON29_CONTAMINATED_LAND, RiskCode::ContaminatedLand),
        (c.s106_present, true, key::CON29_S106, RiskCode::Section106),
        (c.cil_outstanding, true, key::CON29_CIL_OUTSTANDING, RiskCode::CilOutstanding),
    ];
    for (field, expected, key, code) in rules {
        risks.extend(con29_rule(c, field, expected, key, code));
    }

    if c.flood_zone.as_deref() == Some("3") {
        risks.push(RiskFlag::new(
            RiskCode::FloodZone3,
            con29_evidence(c, key::CON29_FLOOD_ZONE),
        ));
    }

    risks.extend(con29_rule(c, c.radon_affected, true, key::CON29_RADON, RiskCode::RadonAffected));
    // The one rule keyed on an explicit `false`.
    risks.extend(con29_rule(
        c,
        c.building_regs_completion_present,
        false,
        key::CON29_BUILDING_REGS,
        RiskCode::MissingBuildingRegs,
    ));

    risks
}

/// Follow-up items worth raising with the client. Advisory only; these are
/// not risks and are never persisted.
pub fn checklist(llc1: Option<&Llc1Facts>, con29: Option<&Con29Facts>) -> Vec<&'static str> {
    let mut needs = Vec::new();
    let s106 = llc1.is_some_and(|l| l.is_present("S106"))
        || con29.is_some_and(|c| c.s106_present == Some(true));
    if s106 {
        needs.push("Section 106 agreement: check obligations and outstanding charges.");
    }
    if llc1.is_some_and(|l| l.is_present("TPO")) {
        needs.push("Tree Preservation Order: check consent before any tree works.");
    }
    if con29.is_some_and(|c| c.flood_zone.as_deref() == Some("3")) {
        needs.push("Potential flood exposure: insurer or lender may require conditions.");
    }
    needs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{parse_con29, parse_llc1};

    fn codes(risks: &[RiskFlag]) -> Vec<RiskCode> {
        risks.iter().map(|r| r.code).collect()
    }

    fn all_true_con29() -> Con29Facts {
        Con29Facts {
            enforcement_notices_present: Some(true),
            contaminated_land_designation: Some(true),
            s106_present: Some(true),
            cil_outstanding: Some(true),
            radon_affected: Some(true),
            ..Con29Facts::default()
        }
    }

    #[test]
    fn full_con29_sample_yields_seven_risks() {
        let con29 = parse_con29(
            "Enforcement notice: yes. Contaminated land: yes. Abutting highway adopted: no. \
             Flood Zone 3. CIL outstanding. Radon affected. \
             Building Regulations completion: missing.",
        );
        let risks = derive_risks(None, Some(&con29));
        assert_eq!(
            codes(&risks),
            [
                RiskCode::UnadoptedRoad,
                RiskCode::EnforcementNotice,
                RiskCode::ContaminatedLand,
                RiskCode::CilOutstanding,
                RiskCode::FloodZone3,
                RiskCode::RadonAffected,
                RiskCode::MissingBuildingRegs,
            ]
        );
        let high: Vec<_> = risks
            .iter()
            .filter(|r| r.severity == Severity::High)
            .map(|r| r.code)
            .collect();
        assert_eq!(high, [RiskCode::UnadoptedRoad, RiskCode::FloodZone3]);
    }

    #[test]
    fn empty_documents_yield_no_risks() {
        let llc1 = parse_llc1("");
        let con29 = parse_con29("");
        assert!(derive_risks(Some(&llc1), Some(&con29)).is_empty());
        assert!(derive_risks(None, None).is_empty());
    }

    #[test]
    fn building_regs_provided_is_not_a_risk() {
        let con29 = parse_con29("Building Regulations completion: provided");
        assert!(derive_risks(None, Some(&con29)).is_empty());
    }

    #[test]
    fn unknown_building_regs_is_not_a_risk() {
        let con29 = Con29Facts {
            building_regs_completion_present: None,
            ..Con29Facts::default()
        };
        assert!(!codes(&derive_risks(None, Some(&con29))).contains(&RiskCode::MissingBuildingRegs));
    }

    #[test]
    fn explicit_false_building_regs_is_a_risk() {
        let con29 = Con29Facts {
            building_regs_completion_present: Some(false),
            ..Con29Facts::default()
        };
        assert_eq!(codes(&derive_risks(None, Some(&con29))), [RiskCode::MissingBuildingRegs]);
    }

    #[test]
    fn unknown_fields_never_fire() {
        // Every tri-state field unknown, one at a time against an otherwise all-true set.
        type Clear = fn(&mut Con29Facts);
        let cases: [(Clear, RiskCode); 6] = [
            (|c: &mut Con29Facts| c.enforcement_notices_present = None, RiskCode::EnforcementNotice),
            (|c: &mut Con29Facts| c.contaminated_land_designation = None, RiskCode::ContaminatedLand),
            (|c: &mut Con29Facts| c.s106_present = None, RiskCode::Section106),
            (|c: &mut Con29Facts| c.cil_outstanding = None, RiskCode::CilOutstanding),
            (|c: &mut Con29Facts| c.radon_affected = None, RiskCode::RadonAffected),
            (|c: &mut Con29Facts| c.roads_footways.abutting_highway_adopted = None, RiskCode::UnadoptedRoad),
        ];
        for (clear, code) in cases {
            let mut con29 = all_true_con29();
            con29.roads_footways.abutting_highway_adopted = Some(false);
            clear(&mut con29);
            let fired = codes(&derive_risks(None, Some(&con29)));
            assert!(!fired.contains(&code), "{code} fired on unknown");
        }
    }

    #[test]
    fn explicit_false_fields_do_not_fire_true_rules() {
        let con29 = Con29Facts {
            enforcement_notices_present: Some(false),
            contaminated_land_designation: Some(false),
            s106_present: Some(false),
            cil_outstanding: Some(false),
            radon_affected: Some(false),
            roads_footways: crate::facts::RoadsFootways {
                abutting_highway_adopted: Some(true),
                ..Default::default()
            },
            flood_zone: Some("2".into()),
            ..Con29Facts::default()
        };
        assert!(derive_risks(None, Some(&con29)).is_empty());
    }

    #[test]
    fn llc1_only_input() {
        let llc1 = parse_llc1("This is in a Conservation Area and a Listed Building.");
        let risks = derive_risks(Some(&llc1), None);
        assert_eq!(codes(&risks), [RiskCode::ConservationArea, RiskCode::ListedBuilding]);
        assert!(risks.iter().all(|r| r.severity == Severity::Medium));
    }

    #[test]
    fn con29_only_input_ignores_llc1_rules() {
        let risks = derive_risks(None, Some(&all_true_con29()));
        let fired = codes(&risks);
        assert!(!fired.contains(&RiskCode::ConservationArea));
        assert!(!fired.contains(&RiskCode::ListedBuilding));
        assert!(fired.contains(&RiskCode::Section106));
    }

    #[test]
    fn llc1_rule_matches_type_prefix() {
        let mut llc1 = parse_llc1("");
        llc1.charges.push(crate::facts::Charge {
            charge_type: "ConservationAreaArticle4".into(),
            present: true,
            reference: None,
            source: None,
            evidence: None,
        });
        assert_eq!(codes(&derive_risks(Some(&llc1), None)), [RiskCode::ConservationArea]);
    }

    #[test]
    fn evidence_points_at_source_field() {
        let ev = Evidence::new("files/con29.pdf", Some(4));
        let con29 = parse_con29("Flood Zone 3").attach_evidence(&ev);
        let risks = derive_risks(None, Some(&con29));
        assert_eq!(risks.len(), 1);
        assert_eq!(
            risks[0].evidence,
            [Evidence {
                file_ref: "files/con29.pdf".into(),
                page: Some(4),
                note: Some(key::CON29_FLOOD_ZONE.into()),
            }]
        );
    }

    #[test]
    fn llc1_evidence_names_the_charge() {
        let ev = Evidence::new("llc1.pdf", Some(1));
        let llc1 = parse_llc1("Listed Building").attach_evidence(&ev);
        let risks = derive_risks(Some(&llc1), None);
        assert_eq!(
            risks[0].evidence[0].note.as_deref(),
            Some("llc1.listed_building.present")
        );
    }

    #[test]
    fn risk_code_strings_round_trip() {
        for code in RiskCode::ALL {
            assert_eq!(code.as_str().parse::<RiskCode>().unwrap(), code);
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("high".parse::<Severity>().is_err());
    }

    #[test]
    fn persisted_risk_carries_message() {
        let flag = RiskFlag::new(RiskCode::FloodZone3, Vec::new());
        let risk = Risk::from_flag("m1", flag);
        assert_eq!(risk.severity, Severity::High);
        assert_eq!(risk.message, RiskCode::FloodZone3.message());
        let json = serde_json::to_value(&risk).unwrap();
        assert_eq!(json["code"], "FloodZone3");
        assert_eq!(json["severity"], "HIGH");
    }

    #[test]
    fn checklist_items() {
        let llc1 = parse_llc1("S106 agreement. Tree Preservation Order.");
        let con29 = parse_con29("Flood zone 3");
        let items = checklist(Some(&llc1), Some(&con29));
        assert_eq!(items.len(), 3);
        assert!(checklist(None, None).is_empty());
    }
}
