//! Plain-text rendering of a matter report.
//!
//! Findings are grouped by document kind and printed as aligned key/value
//! rows. An unknown value is shown as "not determined" so it never reads
//! like an explicit "no".

use std::fmt::Write;

use lasearch_core::{DocumentKind, Evidence, Finding, Risk};
use lasearch_store::MatterReport;
use serde_json::Value;

const MAX_LIST_ITEMS: usize = 10;

const NOT_DETERMINED: &str = "not determined (manual review recommended)";

// ── Public API ──

pub fn print_report(report: &MatterReport) {
    print!("{}", render_report(report));
}

pub fn print_findings(findings: &[Finding]) {
    let mut out = String::new();
    for kind in DocumentKind::ALL {
        render_findings_section(&mut out, kind, findings);
    }
    print!("{out}");
}

pub fn print_risks(risks: &[Risk]) {
    let mut out = String::new();
    render_risks(&mut out, risks);
    print!("{out}");
}

pub fn render_report(report: &MatterReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Matter {} ===", report.matter_id);
    let _ = writeln!(out);

    if report.findings.is_empty() {
        let _ = writeln!(out, "No documents ingested.");
        return out;
    }

    let _ = writeln!(out, "Risks");
    render_risks(&mut out, &report.risks);
    let _ = writeln!(out);

    for kind in DocumentKind::ALL {
        render_findings_section(&mut out, kind, &report.findings);
    }

    if !report.checklist.is_empty() {
        let _ = writeln!(out, "Checklist");
        for item in &report.checklist {
            let _ = writeln!(out, "  - {item}");
        }
        let _ = writeln!(out);
    }
    out
}

// ── Section rendering ──

fn render_risks(out: &mut String, risks: &[Risk]) {
    if risks.is_empty() {
        let _ = writeln!(out, "  none identified");
        return;
    }
    for r in risks {
        let _ = writeln!(out, "  [{:<6}] {:<20} {}", r.severity.as_str(), r.code.as_str(), r.message);
        for ev in &r.evidence {
            let _ = writeln!(out, "           source: {}", evidence_label(ev));
        }
    }
}

fn render_findings_section(out: &mut String, kind: DocumentKind, findings: &[Finding]) {
    let prefix = format!("{}.", kind.key_prefix());
    let rows: Vec<&Finding> = findings.iter().filter(|f| f.key.starts_with(&prefix)).collect();
    if rows.is_empty() {
        return;
    }

    let _ = writeln!(out, "{kind}");
    if let Some(ev) = rows.iter().find_map(|f| f.evidence.as_ref()) {
        let _ = writeln!(out, "  {:<40} {}", "source", evidence_label(ev));
    }
    for f in rows {
        let label = f.key.strip_prefix(&prefix).unwrap_or(&f.key);
        match &f.value {
            Value::Array(items) => render_list(out, label, items),
            value => {
                let _ = writeln!(out, "  {:<40} {}", label, format_value(value));
            }
        }
    }
    let _ = writeln!(out);
}

fn render_list(out: &mut String, label: &str, items: &[Value]) {
    if items.is_empty() {
        let _ = writeln!(out, "  {:<40} none found", label);
        return;
    }
    let _ = writeln!(out, "  {} ({}):", label, items.len());
    for item in items.iter().take(MAX_LIST_ITEMS) {
        let _ = writeln!(out, "    {}", format_list_item(item));
    }
    if items.len() > MAX_LIST_ITEMS {
        let _ = writeln!(out, "    ... and {} more", items.len() - MAX_LIST_ITEMS);
    }
}

// ── Helpers ──

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => NOT_DETERMINED.to_string(),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One planning decision as `ref  decision  date`, skipping absent parts.
fn format_list_item(item: &Value) -> String {
    let Value::Object(map) = item else {
        return format_value(item);
    };
    ["ref", "decision", "date", "description"]
        .iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("  ")
}

fn evidence_label(ev: &Evidence) -> String {
    match ev.page {
        Some(page) => format!("{} p.{page}", ev.file_ref),
        None => ev.file_ref.clone(),
    }
}
