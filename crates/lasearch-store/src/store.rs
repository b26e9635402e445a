//! The persistence seam: what the ingest adapter needs from a backend.

use lasearch_core::{DocumentKind, Finding, Risk};

use crate::StoreError;

/// Which of a matter's existing findings a commit replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// Every finding for the matter.
    Matter,
    /// Only findings whose key belongs to one of these kinds.
    Kinds(Vec<DocumentKind>),
}

impl ClearScope {
    /// Whether an existing finding with `key` is removed by this scope.
    pub fn clears(&self, key: &str) -> bool {
        match self {
            ClearScope::Matter => true,
            ClearScope::Kinds(kinds) => {
                DocumentKind::of_key(key).is_some_and(|k| kinds.contains(&k))
            }
        }
    }
}

/// One atomic replace-and-recompute for a matter.
///
/// Findings in `clear` scope are deleted and `findings` inserted; the
/// matter's risks are always replaced wholesale by `risks`.
#[derive(Debug, Clone)]
pub struct MatterUpdate {
    pub matter_id: String,
    pub clear: ClearScope,
    pub findings: Vec<Finding>,
    pub risks: Vec<Risk>,
}

/// Finding and risk storage keyed by matter.
///
/// `commit` must be all-or-nothing: on error the matter's findings and
/// risks are left exactly as they were.
pub trait MatterStore: Send + Sync {
    /// Current findings for a matter, ordered by key.
    fn findings(&self, matter_id: &str) -> Result<Vec<Finding>, StoreError>;

    /// Current risks for a matter, in the order they were derived.
    fn risks(&self, matter_id: &str) -> Result<Vec<Risk>, StoreError>;

    /// Findings (ordered by key) and risks read together, so both come
    /// from the same commit.
    fn snapshot(&self, matter_id: &str) -> Result<(Vec<Finding>, Vec<Risk>), StoreError>;

    fn commit(&self, update: &MatterUpdate) -> Result<(), StoreError>;

    /// Delete every finding and risk for a matter.
    fn reset(&self, matter_id: &str) -> Result<(), StoreError>;
}
