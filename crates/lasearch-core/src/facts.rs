//! Structured facts extracted from LLC1 and CON29 documents.
//!
//! Every boolean-like CON29 field is tri-state: `Some(true)`, `Some(false)`,
//! or `None` for "not determined". `None` is never read as `false`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Pointer back to the source document a fact or risk came from.
///
/// Weak reference: identifies a stored file (and optionally a page) but
/// does not own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub file_ref: String,
    pub page: Option<u32>,
    pub note: Option<String>,
}

impl Evidence {
    pub fn new(file_ref: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            file_ref: file_ref.into(),
            page,
            note: None,
        }
    }

    /// Copy of this evidence annotated with the field that fired.
    pub fn with_note(&self, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..self.clone()
        }
    }
}

/// Source document kinds the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    Llc1,
    Con29,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Llc1, DocumentKind::Con29];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Llc1 => "LLC1",
            DocumentKind::Con29 => "CON29",
        }
    }

    /// Leading segment of every finding key derived from this kind.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Llc1 => "llc1",
            DocumentKind::Con29 => "con29",
        }
    }

    /// Kind whose findings use `key`, judged by its first dotted segment.
    pub fn of_key(key: &str) -> Option<Self> {
        let head = key.split('.').next()?;
        Self::ALL.into_iter().find(|k| k.key_prefix() == head)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LLC1" => Ok(DocumentKind::Llc1),
            "CON29" => Ok(DocumentKind::Con29),
            _ => Err(CoreError::UnknownDocumentKind(s.to_string())),
        }
    }
}

// ── LLC1 ──

/// A single LLC1 register entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Enum-like name: `ConservationArea`, `ListedBuilding`, `TPO`, `S106`, ...
    pub charge_type: String,
    pub present: bool,
    pub reference: Option<String>,
    pub source: Option<String>,
    pub evidence: Option<Evidence>,
}

/// All charges found in one LLC1 document, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Llc1Facts {
    pub charges: Vec<Charge>,
}

impl Llc1Facts {
    pub fn charge(&self, charge_type: &str) -> Option<&Charge> {
        self.charges.iter().find(|c| c.charge_type == charge_type)
    }

    /// Whether a charge of the given type is registered.
    pub fn is_present(&self, charge_type: &str) -> bool {
        self.charge(charge_type).is_some_and(|c| c.present)
    }

    pub fn attach_evidence(mut self, evidence: &Evidence) -> Self {
        for charge in &mut self.charges {
            charge.evidence = Some(evidence.clone());
        }
        self
    }
}

// ── CON29 ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Granted,
    Refused,
    Approved,
    Undetermined,
}

impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(Decision::Granted),
            "refused" => Ok(Decision::Refused),
            "approved" => Ok(Decision::Approved),
            "undetermined" => Ok(Decision::Undetermined),
            _ => Err(CoreError::UnknownDecision(s.to_string())),
        }
    }
}

/// One planning history entry. `date` is kept as free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningDecision {
    /// `"N/A"` when no reference was found.
    #[serde(rename = "ref")]
    pub reference: String,
    pub description: Option<String>,
    pub decision: Option<Decision>,
    pub date: Option<String>,
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadsFootways {
    pub abutting_highway_adopted: Option<bool>,
    pub authority: Option<String>,
    pub evidence: Option<Evidence>,
}

/// Replies to the standard CON29 enquiries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Con29Facts {
    pub planning_decisions: Vec<PlanningDecision>,
    pub roads_footways: RoadsFootways,
    pub enforcement_notices_present: Option<bool>,
    pub contaminated_land_designation: Option<bool>,
    pub s106_present: Option<bool>,
    pub cil_outstanding: Option<bool>,
    /// `"1"`, `"2"` or `"3"`.
    pub flood_zone: Option<String>,
    pub radon_affected: Option<bool>,
    pub building_regs_completion_present: Option<bool>,
    /// The document these replies were read from.
    pub evidence: Option<Evidence>,
}

impl Con29Facts {
    pub fn attach_evidence(mut self, evidence: &Evidence) -> Self {
        self.roads_footways.evidence = Some(evidence.clone());
        for decision in &mut self.planning_decisions {
            decision.evidence = Some(evidence.clone());
        }
        self.evidence = Some(evidence.clone());
        self
    }
}
