//! Local authority search core: LLC1/CON29 extraction, findings, and risk rules.

mod error;
pub mod extract;
pub mod facts;
pub mod finding;
pub mod key;
pub mod risk;
pub mod schema;

pub use error::CoreError;
pub use extract::{interpret_tri_state, parse_con29, parse_llc1};
pub use facts::{
    Charge, Con29Facts, Decision, DocumentKind, Evidence, Llc1Facts, PlanningDecision,
    RoadsFootways,
};
pub use finding::{FactSets, Finding};
pub use risk::{Risk, RiskCode, RiskFlag, Severity, checklist, derive_risks};
pub use schema::tables;
