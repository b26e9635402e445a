//! Normalised findings: one key/value fact per row, with evidence.
//!
//! Facts are flattened into findings on ingest and rebuilt from findings
//! when risks are recomputed, so the risk set is always a function of the
//! matter's current findings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::LLC1_CHARGES;
use crate::facts::{Charge, Con29Facts, Evidence, Llc1Facts, PlanningDecision};
use crate::key;
use crate::risk::{RiskFlag, checklist, derive_risks};

/// Confidence recorded for regex-extracted facts.
pub const DEFAULT_CONFIDENCE: u8 = 90;

/// A persisted fact about a matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub matter_id: String,
    /// Dotted path, e.g. `con29.flood_zone`.
    pub key: String,
    /// JSON value. `null` means the document was read but the fact is unknown.
    pub value: Value,
    pub evidence: Option<Evidence>,
    /// 0..=100. Unknown values carry 0.
    pub confidence: u8,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

impl Finding {
    pub fn new(
        matter_id: &str,
        key: impl Into<String>,
        value: Value,
        evidence: Option<Evidence>,
        confidence: u8,
    ) -> Self {
        let confidence = if value.is_null() { 0 } else { confidence.min(100) };
        Self {
            matter_id: matter_id.to_string(),
            key: key.into(),
            value,
            evidence,
            confidence,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn tri_state_value(v: Option<bool>) -> Value {
    v.map(Value::Bool).unwrap_or(Value::Null)
}

fn string_value(v: Option<&str>) -> Value {
    v.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null)
}

/// One `llc1.<charge>.present` finding per charge.
pub fn findings_from_llc1(matter_id: &str, facts: &Llc1Facts, confidence: u8) -> Vec<Finding> {
    facts
        .charges
        .iter()
        .map(|c| {
            Finding::new(
                matter_id,
                key::charge_key(&c.charge_type),
                Value::Bool(c.present),
                c.evidence.clone(),
                confidence,
            )
        })
        .collect()
}

/// Every CON29 field as a finding. Unknown fields are kept as `null` so
/// that "not determined" stays distinct from an explicit "no".
pub fn findings_from_con29(matter_id: &str, facts: &Con29Facts, confidence: u8) -> Vec<Finding> {
    let doc = facts.evidence.clone();
    let roads = facts.roads_footways.evidence.clone().or_else(|| doc.clone());
    let decisions = serde_json::to_value(&facts.planning_decisions).unwrap_or(Value::Array(Vec::new()));

    let fields = [
        (key::CON29_PLANNING_DECISIONS, decisions, doc.clone()),
        (
            key::ROADS_HIGHWAY_ADOPTED,
            tri_state_value(facts.roads_footways.abutting_highway_adopted),
            roads.clone(),
        ),
        (
            key::ROADS_AUTHORITY,
            string_value(facts.roads_footways.authority.as_deref()),
            roads,
        ),
        (
            key::CON29_ENFORCEMENT_NOTICES,
            tri_state_value(facts.enforcement_notices_present),
            doc.clone(),
        ),
        (
            key::CON29_CONTAMINATED_LAND,
            tri_state_value(facts.contaminated_land_designation),
            doc.clone(),
        ),
        (key::CON29_S106, tri_state_value(facts.s106_present), doc.clone()),
        (
            key::CON29_CIL_OUTSTANDING,
            tri_state_value(facts.cil_outstanding),
            doc.clone(),
        ),
        (
            key::CON29_FLOOD_ZONE,
            string_value(facts.flood_zone.as_deref()),
            doc.clone(),
        ),
        (key::CON29_RADON, tri_state_value(facts.radon_affected), doc.clone()),
        (
            key::CON29_BUILDING_REGS,
            tri_state_value(facts.building_regs_completion_present),
            doc,
        ),
    ];

    fields
        .into_iter()
        .map(|(key, value, evidence)| Finding::new(matter_id, key, value, evidence, confidence))
        .collect()
}

// ── Reconstruction ──

fn read_bool(f: &Finding) -> Option<bool> {
    match &f.value {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => {
            warn!(key = %f.key, value = %other, "finding is not a boolean; treating as unknown");
            None
        }
    }
}

fn read_string(f: &Finding) -> Option<String> {
    match &f.value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            warn!(key = %f.key, value = %other, "finding is not a string; treating as unknown");
            None
        }
    }
}

/// The fact sets a matter's current findings describe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSets {
    pub llc1: Option<Llc1Facts>,
    pub con29: Option<Con29Facts>,
}

impl FactSets {
    /// Rebuild fact sets from findings. A document kind with no findings
    /// is `None`; a later finding for the same key overrides an earlier one.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let known: Vec<&str> = LLC1_CHARGES.iter().map(|(t, _)| *t).collect();
        let mut llc1_seen = false;
        let mut charges: Vec<Charge> = known
            .iter()
            .map(|t| Charge {
                charge_type: t.to_string(),
                present: false,
                reference: None,
                source: Some("LLC1".to_string()),
                evidence: None,
            })
            .collect();

        let mut con29: Option<Con29Facts> = None;

        for f in findings {
            if f.key.starts_with("llc1.") {
                llc1_seen = true;
                let Some(charge_type) = key::charge_type_for_key(&f.key, &known) else {
                    debug!(key = %f.key, "ignoring unrecognised llc1 finding");
                    continue;
                };
                if let Some(charge) = charges.iter_mut().find(|c| c.charge_type == charge_type) {
                    charge.present = read_bool(f) == Some(true);
                    charge.evidence = f.evidence.clone();
                }
                continue;
            }

            if !f.key.starts_with("con29.") {
                debug!(key = %f.key, "ignoring finding outside llc1/con29");
                continue;
            }

            let c = con29.get_or_insert_with(Con29Facts::default);
            if c.evidence.is_none() {
                c.evidence = f.evidence.clone();
            }
            match f.key.as_str() {
                key::CON29_PLANNING_DECISIONS => {
                    c.planning_decisions =
                        serde_json::from_value::<Vec<PlanningDecision>>(f.value.clone())
                            .unwrap_or_else(|e| {
                                warn!(error = %e, "malformed planning decisions finding");
                                Vec::new()
                            });
                }
                key::ROADS_HIGHWAY_ADOPTED => {
                    c.roads_footways.abutting_highway_adopted = read_bool(f);
                    c.roads_footways.evidence = f.evidence.clone();
                }
                key::ROADS_AUTHORITY => c.roads_footways.authority = read_string(f),
                key::CON29_ENFORCEMENT_NOTICES => c.enforcement_notices_present = read_bool(f),
                key::CON29_CONTAMINATED_LAND => c.contaminated_land_designation = read_bool(f),
                key::CON29_S106 => c.s106_present = read_bool(f),
                key::CON29_CIL_OUTSTANDING => c.cil_outstanding = read_bool(f),
                key::CON29_FLOOD_ZONE => c.flood_zone = read_string(f),
                key::CON29_RADON => c.radon_affected = read_bool(f),
                key::CON29_BUILDING_REGS => c.building_regs_completion_present = read_bool(f),
                other => debug!(key = other, "ignoring unrecognised con29 finding"),
            }
        }

        Self {
            llc1: llc1_seen.then_some(Llc1Facts { charges }),
            con29,
        }
    }

    pub fn risks(&self) -> Vec<RiskFlag> {
        derive_risks(self.llc1.as_ref(), self.con29.as_ref())
    }

    pub fn checklist(&self) -> Vec<&'static str> {
        checklist(self.llc1.as_ref(), self.con29.as_ref())
    }
}
