//! In-process store, used by tests and short-lived tools.

use std::collections::HashMap;
use std::sync::Mutex;

use lasearch_core::{Finding, Risk};
use tracing::debug;

use crate::{MatterStore, MatterUpdate, StoreError};

#[derive(Debug, Default, Clone)]
struct MatterRecord {
    findings: Vec<Finding>,
    risks: Vec<Risk>,
}

/// Findings and risks held in a `Mutex<HashMap>`.
///
/// A commit builds the new record off to the side and swaps it in, so a
/// reader never observes a half-applied update.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matters: Mutex<HashMap<String, MatterRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, matter_id: &str, f: impl FnOnce(&MatterRecord) -> T) -> Result<T, StoreError> {
        let matters = self.matters.lock().map_err(|_| StoreError::LockPoisoned)?;
        let empty = MatterRecord::default();
        Ok(f(matters.get(matter_id).unwrap_or(&empty)))
    }
}

fn sorted_findings(record: &MatterRecord) -> Vec<Finding> {
    let mut findings = record.findings.clone();
    findings.sort_by(|a, b| a.key.cmp(&b.key));
    findings
}

impl MatterStore for MemoryStore {
    fn findings(&self, matter_id: &str) -> Result<Vec<Finding>, StoreError> {
        self.read(matter_id, sorted_findings)
    }

    fn risks(&self, matter_id: &str) -> Result<Vec<Risk>, StoreError> {
        self.read(matter_id, |r| r.risks.clone())
    }

    fn snapshot(&self, matter_id: &str) -> Result<(Vec<Finding>, Vec<Risk>), StoreError> {
        self.read(matter_id, |r| (sorted_findings(r), r.risks.clone()))
    }

    fn commit(&self, update: &MatterUpdate) -> Result<(), StoreError> {
        let mut matters = self.matters.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current = matters.get(&update.matter_id).cloned().unwrap_or_default();

        let mut findings: Vec<Finding> = current
            .findings
            .into_iter()
            .filter(|f| !update.clear.clears(&f.key))
            .collect();
        findings.extend(update.findings.iter().cloned());

        debug!(
            matter_id = %update.matter_id,
            findings = findings.len(),
            risks = update.risks.len(),
            "memory commit"
        );
        matters.insert(
            update.matter_id.clone(),
            MatterRecord {
                findings,
                risks: update.risks.clone(),
            },
        );
        Ok(())
    }

    fn reset(&self, matter_id: &str) -> Result<(), StoreError> {
        let mut matters = self.matters.lock().map_err(|_| StoreError::LockPoisoned)?;
        matters.remove(matter_id);
        Ok(())
    }
}
