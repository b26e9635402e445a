//! Document ingestion: parse, normalise to findings, recompute risks, commit.
//!
//! Every ingest for a matter runs under that matter's lock, and the read of
//! current findings, the risk recompute and the commit all happen inside
//! it. The commit itself is a single atomic [`MatterStore::commit`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use lasearch_core::finding::{DEFAULT_CONFIDENCE, findings_from_con29, findings_from_llc1};
use lasearch_core::{
    DocumentKind, Evidence, FactSets, Finding, Risk, RiskCode, parse_con29, parse_llc1,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{ClearScope, MatterStore, MatterUpdate, StoreError};

/// Which existing findings a new ingest batch replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceScope {
    /// Only findings of the document kinds present in the batch. An LLC1
    /// re-upload leaves earlier CON29 findings in place.
    #[default]
    DocumentKind,
    /// Every finding for the matter, whatever the batch contains.
    Matter,
}

impl fmt::Display for ReplaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceScope::DocumentKind => f.write_str("kind"),
            ReplaceScope::Matter => f.write_str("matter"),
        }
    }
}

impl FromStr for ReplaceScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kind" | "document-kind" => Ok(ReplaceScope::DocumentKind),
            "matter" => Ok(ReplaceScope::Matter),
            other => Err(format!("unknown replace scope {other:?} (expected kind or matter)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub replace_scope: ReplaceScope,
    /// Confidence recorded on determined findings.
    pub confidence: u8,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            replace_scope: ReplaceScope::default(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

/// A raw document handed in for a matter.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// `"LLC1"` or `"CON29"`; anything else is skipped.
    pub kind: String,
    /// Identifier of the stored file, recorded as evidence.
    pub file_ref: String,
    pub page: Option<u32>,
    pub content: Vec<u8>,
}

impl SourceDocument {
    pub fn new(kind: impl Into<String>, file_ref: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            file_ref: file_ref.into(),
            page: None,
            content: content.into(),
        }
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Outcome of one ingest call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub matter_id: String,
    pub ingested: Vec<DocumentKind>,
    /// Kinds of documents that were not recognised and skipped.
    pub skipped: Vec<String>,
    pub findings_written: usize,
    pub risks: Vec<RiskCode>,
}

/// Current state of a matter, for reporting and export.
#[derive(Debug, Clone, Serialize)]
pub struct MatterReport {
    pub matter_id: String,
    pub findings: Vec<Finding>,
    pub risks: Vec<Risk>,
    pub checklist: Vec<String>,
}

/// The finding/risk store adapter.
pub struct Ingestor<S> {
    store: S,
    options: IngestOptions,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: MatterStore> Ingestor<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, IngestOptions::default())
    }

    pub fn with_options(store: S, options: IngestOptions) -> Self {
        Self {
            store,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `f` holding the matter's lock. The lock entry is removed again
    /// once no other caller holds or waits on it.
    fn with_matter_lock<T>(
        &self,
        matter_id: &str,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
            Arc::clone(locks.entry(matter_id.to_string()).or_default())
        };

        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(StoreError::LockPoisoned),
        };

        let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(matter_id);
        }
        result
    }

    /// Parse `documents`, replace the matter's findings in scope, and
    /// recompute its risks from the resulting findings.
    ///
    /// Unrecognised document kinds are logged and skipped. A batch with no
    /// recognised documents leaves the matter untouched. Within a batch, a
    /// later document of the same kind wins key by key.
    pub fn ingest_documents(
        &self,
        matter_id: &str,
        documents: &[SourceDocument],
    ) -> Result<IngestReport, StoreError> {
        self.with_matter_lock(matter_id, || self.ingest_locked(matter_id, documents))
    }

    fn ingest_locked(
        &self,
        matter_id: &str,
        documents: &[SourceDocument],
    ) -> Result<IngestReport, StoreError> {
        let mut report = IngestReport {
            matter_id: matter_id.to_string(),
            ..IngestReport::default()
        };
        let mut fresh: BTreeMap<String, Finding> = BTreeMap::new();

        for doc in documents {
            let kind = match doc.kind.parse::<DocumentKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(matter_id, file_ref = %doc.file_ref, error = %e, "skipping document");
                    report.skipped.push(doc.kind.clone());
                    continue;
                }
            };

            let text = String::from_utf8_lossy(&doc.content);
            let evidence = Evidence::new(doc.file_ref.as_str(), doc.page);
            let findings = match kind {
                DocumentKind::Llc1 => {
                    let facts = parse_llc1(&text).attach_evidence(&evidence);
                    findings_from_llc1(matter_id, &facts, self.options.confidence)
                }
                DocumentKind::Con29 => {
                    let facts = parse_con29(&text).attach_evidence(&evidence);
                    findings_from_con29(matter_id, &facts, self.options.confidence)
                }
            };
            debug!(matter_id, %kind, file_ref = %doc.file_ref, count = findings.len(), "parsed document");

            for f in findings {
                fresh.insert(f.key.clone(), f);
            }
            if !report.ingested.contains(&kind) {
                report.ingested.push(kind);
            }
        }

        if report.ingested.is_empty() {
            info!(matter_id, skipped = report.skipped.len(), "no recognised documents; matter unchanged");
            return Ok(report);
        }

        let clear = match self.options.replace_scope {
            ReplaceScope::DocumentKind => ClearScope::Kinds(report.ingested.clone()),
            ReplaceScope::Matter => ClearScope::Matter,
        };
        let fresh: Vec<Finding> = fresh.into_values().collect();

        let mut current: Vec<Finding> = self
            .store
            .findings(matter_id)?
            .into_iter()
            .filter(|f| !clear.clears(&f.key))
            .collect();
        current.extend(fresh.iter().cloned());

        let risks: Vec<Risk> = FactSets::from_findings(&current)
            .risks()
            .into_iter()
            .map(|flag| Risk::from_flag(matter_id, flag))
            .collect();

        report.findings_written = fresh.len();
        report.risks = risks.iter().map(|r| r.code).collect();

        self.store.commit(&MatterUpdate {
            matter_id: matter_id.to_string(),
            clear,
            findings: fresh,
            risks,
        })?;

        info!(
            matter_id,
            documents = report.ingested.len(),
            findings = report.findings_written,
            risks = report.risks.len(),
            "ingested documents"
        );
        Ok(report)
    }

    /// Current findings and risks for a matter, plus advisory checklist items.
    /// Findings and risks always come from the same commit.
    pub fn report(&self, matter_id: &str) -> Result<MatterReport, StoreError> {
        let (findings, risks) = self.store.snapshot(matter_id)?;
        let checklist = FactSets::from_findings(&findings)
            .checklist()
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(MatterReport {
            matter_id: matter_id.to_string(),
            findings,
            risks,
            checklist,
        })
    }

    pub fn reset(&self, matter_id: &str) -> Result<(), StoreError> {
        self.with_matter_lock(matter_id, || self.store.reset(matter_id))?;
        info!(matter_id, "matter reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use lasearch_core::key;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    const LLC1: &str = "LLC1 SAMPLE\nConservation Area: YES (CA-2015-0032)\n";
    const CON29: &str = "CON29 SAMPLE\nAbutting Highway Adopted: NO\nHighways Authority: HCC Highways\n";
    const CON29_FULL: &str = "Enforcement notice: yes. Contaminated land: yes. \
        Abutting highway adopted: no. Flood Zone 3. CIL outstanding. Radon affected. \
        Building Regulations completion: missing.";

    fn llc1(text: &str) -> SourceDocument {
        SourceDocument::new("LLC1", "files/llc1.txt", text).on_page(1)
    }

    fn con29(text: &str) -> SourceDocument {
        SourceDocument::new("CON29", "files/con29.txt", text).on_page(1)
    }

    fn codes<S: MatterStore>(ingestor: &Ingestor<S>, matter_id: &str) -> Vec<RiskCode> {
        ingestor
            .store()
            .risks(matter_id)
            .unwrap()
            .iter()
            .map(|r| r.code)
            .collect()
    }

    fn value<S: MatterStore>(ingestor: &Ingestor<S>, matter_id: &str, key: &str) -> Option<Value> {
        ingestor
            .store()
            .findings(matter_id)
            .unwrap()
            .into_iter()
            .find(|f| f.key == key)
            .map(|f| f.value)
    }

    #[test]
    fn ingest_both_documents() {
        let ingestor = Ingestor::new(MemoryStore::new());
        let report = ingestor
            .ingest_documents("m1", &[llc1(LLC1), con29(CON29)])
            .unwrap();

        assert_eq!(report.ingested, [DocumentKind::Llc1, DocumentKind::Con29]);
        assert!(report.skipped.is_empty());
        assert_eq!(report.findings_written, 14);
        assert_eq!(report.risks, [RiskCode::UnadoptedRoad, RiskCode::ConservationArea]);
        assert_eq!(codes(&ingestor, "m1"), report.risks);
        assert_eq!(
            value(&ingestor, "m1", key::ROADS_AUTHORITY),
            Some(Value::from("HCC Highways"))
        );
    }

    #[test]
    fn findings_carry_evidence() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29(CON29_FULL)]).unwrap();
        let findings = ingestor.store().findings("m1").unwrap();
        assert!(findings.iter().all(|f| {
            f.evidence == Some(Evidence::new("files/con29.txt", Some(1)))
        }));

        let risks = ingestor.store().risks("m1").unwrap();
        assert_eq!(risks.len(), 7);
        let flood = risks.iter().find(|r| r.code == RiskCode::FloodZone3).unwrap();
        assert_eq!(flood.evidence[0].file_ref, "files/con29.txt");
        assert_eq!(flood.evidence[0].note.as_deref(), Some(key::CON29_FLOOD_ZONE));
    }

    #[test]
    fn reingest_replaces_rather_than_accumulates() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29(CON29_FULL)]).unwrap();
        ingestor
            .ingest_documents("m1", &[con29("Building Regulations completion: provided")])
            .unwrap();

        let findings = ingestor.store().findings("m1").unwrap();
        assert_eq!(findings.len(), 10);
        assert_eq!(value(&ingestor, "m1", key::CON29_FLOOD_ZONE), Some(Value::Null));
        assert_eq!(
            value(&ingestor, "m1", key::CON29_BUILDING_REGS),
            Some(Value::Bool(true))
        );
        assert!(codes(&ingestor, "m1").is_empty());
    }

    #[test]
    fn kind_scope_keeps_other_kind() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29(CON29)]).unwrap();
        ingestor.ingest_documents("m1", &[llc1("Listed Building")]).unwrap();

        assert_eq!(
            value(&ingestor, "m1", key::ROADS_HIGHWAY_ADOPTED),
            Some(Value::Bool(false))
        );
        // Risks are recomputed from both kinds' current findings.
        assert_eq!(
            codes(&ingestor, "m1"),
            [RiskCode::UnadoptedRoad, RiskCode::ListedBuilding]
        );
    }

    #[test]
    fn matter_scope_wipes_other_kind() {
        let options = IngestOptions {
            replace_scope: ReplaceScope::Matter,
            ..IngestOptions::default()
        };
        let ingestor = Ingestor::with_options(MemoryStore::new(), options);
        ingestor.ingest_documents("m1", &[con29(CON29)]).unwrap();
        ingestor.ingest_documents("m1", &[llc1("Listed Building")]).unwrap();

        assert_eq!(value(&ingestor, "m1", key::ROADS_HIGHWAY_ADOPTED), None);
        assert_eq!(ingestor.store().findings("m1").unwrap().len(), 4);
        assert_eq!(codes(&ingestor, "m1"), [RiskCode::ListedBuilding]);
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let ingestor = Ingestor::new(MemoryStore::new());
        let report = ingestor
            .ingest_documents(
                "m1",
                &[SourceDocument::new("CON29O", "files/con29o.txt", "Radon: yes"), con29(CON29)],
            )
            .unwrap();
        assert_eq!(report.skipped, ["CON29O"]);
        assert_eq!(report.ingested, [DocumentKind::Con29]);
        assert_eq!(value(&ingestor, "m1", key::CON29_RADON), Some(Value::Null));
    }

    #[test]
    fn batch_of_unknown_kinds_leaves_matter_untouched() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29(CON29_FULL)]).unwrap();
        let report = ingestor
            .ingest_documents("m1", &[SourceDocument::new("TITLE", "t.pdf", "lease 70 years")])
            .unwrap();
        assert!(report.ingested.is_empty());
        assert_eq!(codes(&ingestor, "m1").len(), 7);
    }

    #[test]
    fn later_document_of_same_kind_wins() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor
            .ingest_documents("m1", &[con29("Flood zone 3"), con29("Flood zone 1")])
            .unwrap();
        assert_eq!(value(&ingestor, "m1", key::CON29_FLOOD_ZONE), Some(Value::from("1")));
        assert!(codes(&ingestor, "m1").is_empty());
    }

    #[test]
    fn non_utf8_content_is_tolerated() {
        let ingestor = Ingestor::new(MemoryStore::new());
        let mut bytes = b"Flood Zone 3 \xff\xfe".to_vec();
        bytes.extend_from_slice(b" Radon: yes");
        ingestor
            .ingest_documents("m1", &[SourceDocument::new("con29", "scan.bin", bytes)])
            .unwrap();
        assert_eq!(
            codes(&ingestor, "m1"),
            [RiskCode::FloodZone3, RiskCode::RadonAffected]
        );
    }

    #[test]
    fn report_includes_checklist() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor
            .ingest_documents("m1", &[llc1("Tree Preservation Order"), con29("Flood Zone 3")])
            .unwrap();
        let report = ingestor.report("m1").unwrap();
        assert_eq!(report.findings.len(), 14);
        assert_eq!(report.risks.len(), 1);
        assert_eq!(report.checklist.len(), 2);
    }

    #[test]
    fn reset_clears_matter() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29(CON29_FULL)]).unwrap();
        ingestor.reset("m1").unwrap();
        let report = ingestor.report("m1").unwrap();
        assert!(report.findings.is_empty());
        assert!(report.risks.is_empty());
    }

    #[test]
    fn replace_scope_parses() {
        assert_eq!("kind".parse::<ReplaceScope>().unwrap(), ReplaceScope::DocumentKind);
        assert_eq!("Matter".parse::<ReplaceScope>().unwrap(), ReplaceScope::Matter);
        assert!("all".parse::<ReplaceScope>().is_err());
        assert_eq!(ReplaceScope::Matter.to_string(), "matter");
    }

    // ── Atomicity ──

    /// Delegates to a MemoryStore but can be told to fail every commit.
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    impl MatterStore for FlakyStore {
        fn findings(&self, matter_id: &str) -> Result<Vec<Finding>, StoreError> {
            self.inner.findings(matter_id)
        }

        fn risks(&self, matter_id: &str) -> Result<Vec<Risk>, StoreError> {
            self.inner.risks(matter_id)
        }

        fn snapshot(&self, matter_id: &str) -> Result<(Vec<Finding>, Vec<Risk>), StoreError> {
            self.inner.snapshot(matter_id)
        }

        fn commit(&self, update: &MatterUpdate) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Other("disk full".into()));
            }
            self.inner.commit(update)
        }

        fn reset(&self, matter_id: &str) -> Result<(), StoreError> {
            self.inner.reset(matter_id)
        }
    }

    #[test]
    fn failed_commit_leaves_prior_state() {
        let ingestor = Ingestor::new(FlakyStore {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(false),
        });
        ingestor.ingest_documents("m1", &[con29(CON29_FULL)]).unwrap();
        let before = ingestor.report("m1").unwrap();

        ingestor.store().fail.store(true, Ordering::SeqCst);
        let err = ingestor
            .ingest_documents("m1", &[con29("Flood zone 1")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));

        let after = ingestor.report("m1").unwrap();
        assert_eq!(after.findings, before.findings);
        assert_eq!(after.risks, before.risks);
    }

    // ── Concurrency ──

    #[test]
    fn concurrent_ingests_for_one_matter_do_not_lose_updates() {
        let ingestor = Ingestor::new(MemoryStore::new());
        std::thread::scope(|s| {
            for i in 0..16 {
                let ingestor = &ingestor;
                s.spawn(move || {
                    let doc = if i % 2 == 0 {
                        llc1("Listed Building")
                    } else {
                        con29("Flood Zone 3")
                    };
                    ingestor.ingest_documents("m1", &[doc]).unwrap();
                });
            }
        });

        assert_eq!(ingestor.store().findings("m1").unwrap().len(), 14);
        assert_eq!(
            codes(&ingestor, "m1"),
            [RiskCode::ListedBuilding, RiskCode::FloodZone3]
        );
        assert!(ingestor.locks.lock().unwrap().is_empty());
    }

    #[test]
    fn report_never_mixes_commits() {
        let ingestor = Ingestor::new(MemoryStore::new());
        ingestor.ingest_documents("m1", &[con29("Flood zone 1")]).unwrap();

        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                for i in 0..2_000 {
                    let text = if i % 2 == 0 { "Flood zone 3" } else { "Flood zone 1" };
                    ingestor.ingest_documents("m1", &[con29(text)]).unwrap();
                }
            });

            while !writer.is_finished() {
                let report = ingestor.report("m1").unwrap();
                let zone3 = report
                    .findings
                    .iter()
                    .any(|f| f.key == key::CON29_FLOOD_ZONE && f.value == Value::from("3"));
                let flagged = report.risks.iter().any(|r| r.code == RiskCode::FloodZone3);
                assert_eq!(zone3, flagged, "findings and risks disagree");
            }
        });
    }

    #[test]
    fn lock_entries_are_released() {
        let ingestor = Ingestor::new(MemoryStore::new());
        for matter in ["m1", "m2", "m3"] {
            ingestor.ingest_documents(matter, &[con29(CON29)]).unwrap();
        }
        ingestor.reset("m2").unwrap();
        assert!(ingestor.locks.lock().unwrap().is_empty());
    }
}
