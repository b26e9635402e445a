//! DuckDB storage for matter findings and risks.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::array::{Array, Int32Array, Int64Array, LargeStringArray, StringArray};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use duckdb::{Connection, params};
use lasearch_core::{Evidence, Finding, Risk, tables};
use tracing::{debug, info};

use crate::{ClearScope, MatterStore, MatterUpdate, StoreError};

/// DuckDB-backed [`MatterStore`].
///
/// Tables are created from the Arrow schemas in [`tables`] on open. Every
/// [`commit`](MatterStore::commit) runs in one transaction, so a failed
/// insert rolls back the deletes that preceded it.
///
/// Use [`open`](Self::open) for an in-memory database and
/// [`open_persistent`](Self::open_persistent) for a file that survives
/// process restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened matter store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        let ddl = [
            create_table_sql(
                tables::FINDINGS,
                &tables::findings_schema(),
                &["CHECK (confidence BETWEEN 0 AND 100)"],
            ),
            create_table_sql(tables::RISKS, &tables::risks_schema(), &[]),
        ];
        conn.execute_batch(&ddl.join(";\n"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn query(conn: &Connection, sql: &str, matter_id: &str) -> Result<Vec<RecordBatch>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([matter_id])?.collect();
    Ok(batches)
}

fn read_findings(conn: &Connection, matter_id: &str) -> Result<Vec<Finding>, StoreError> {
    let sql = format!(
        "SELECT matter_id, key, value, evidence_file, evidence_page, evidence_note, \
         confidence, created_at FROM {} WHERE matter_id = ? ORDER BY key",
        tables::FINDINGS
    );
    let mut out = Vec::new();
    for batch in &query(conn, &sql, matter_id)? {
        decode_findings(batch, &mut out)?;
    }
    Ok(out)
}

fn read_risks(conn: &Connection, matter_id: &str) -> Result<Vec<Risk>, StoreError> {
    let sql = format!(
        "SELECT matter_id, code, severity, message, evidence, created_at \
         FROM {} WHERE matter_id = ? ORDER BY ordinal",
        tables::RISKS
    );
    let mut out = Vec::new();
    for batch in &query(conn, &sql, matter_id)? {
        decode_risks(batch, &mut out)?;
    }
    Ok(out)
}

/// `CREATE TABLE IF NOT EXISTS` for an Arrow schema of Utf8/Int32 columns.
fn create_table_sql(name: &str, schema: &Schema, constraints: &[&str]) -> String {
    let mut columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let ty = match f.data_type() {
                DataType::Int32 => "INTEGER",
                _ => "VARCHAR",
            };
            let null = if f.is_nullable() { "" } else { " NOT NULL" };
            format!("{} {ty}{null}", f.name())
        })
        .collect();
    columns.extend(constraints.iter().map(|c| c.to_string()));
    format!("CREATE TABLE IF NOT EXISTS {name} ({})", columns.join(", "))
}

impl MatterStore for DuckStore {
    fn findings(&self, matter_id: &str) -> Result<Vec<Finding>, StoreError> {
        read_findings(&*self.conn()?, matter_id)
    }

    fn risks(&self, matter_id: &str) -> Result<Vec<Risk>, StoreError> {
        read_risks(&*self.conn()?, matter_id)
    }

    fn snapshot(&self, matter_id: &str) -> Result<(Vec<Finding>, Vec<Risk>), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let findings = read_findings(&tx, matter_id)?;
        let risks = read_risks(&tx, matter_id)?;
        tx.commit()?;
        Ok((findings, risks))
    }

    fn commit(&self, update: &MatterUpdate) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let matter_id = update.matter_id.as_str();

        match &update.clear {
            ClearScope::Matter => {
                tx.execute(
                    &format!("DELETE FROM {} WHERE matter_id = ?", tables::FINDINGS),
                    params![matter_id],
                )?;
            }
            ClearScope::Kinds(kinds) => {
                for kind in kinds {
                    tx.execute(
                        &format!(
                            "DELETE FROM {} WHERE matter_id = ? AND key LIKE ?",
                            tables::FINDINGS
                        ),
                        params![matter_id, format!("{}.%", kind.key_prefix())],
                    )?;
                }
            }
        }

        let insert_finding = format!(
            "INSERT INTO {} (matter_id, key, value, evidence_file, evidence_page, \
             evidence_note, confidence, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            tables::FINDINGS
        );
        for f in &update.findings {
            let evidence = f.evidence.as_ref();
            let page = evidence
                .and_then(|e| e.page)
                .map(i32::try_from)
                .transpose()
                .map_err(|_| StoreError::Other(format!("page number out of range for {}", f.key)))?;
            tx.execute(
                &insert_finding,
                params![
                    matter_id,
                    f.key,
                    serde_json::to_string(&f.value)?,
                    evidence.map(|e| e.file_ref.as_str()),
                    page,
                    evidence.and_then(|e| e.note.as_deref()),
                    i32::from(f.confidence),
                    f.created_at,
                ],
            )?;
        }

        tx.execute(
            &format!("DELETE FROM {} WHERE matter_id = ?", tables::RISKS),
            params![matter_id],
        )?;
        let insert_risk = format!(
            "INSERT INTO {} (matter_id, ordinal, code, severity, message, evidence, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            tables::RISKS
        );
        for (ordinal, r) in update.risks.iter().enumerate() {
            let ordinal = i32::try_from(ordinal)
                .map_err(|_| StoreError::Other("too many risks for one matter".into()))?;
            tx.execute(
                &insert_risk,
                params![
                    matter_id,
                    ordinal,
                    r.code.as_str(),
                    r.severity.as_str(),
                    r.message,
                    serde_json::to_string(&r.evidence)?,
                    r.created_at,
                ],
            )?;
        }

        tx.commit()?;
        debug!(
            matter_id,
            findings = update.findings.len(),
            risks = update.risks.len(),
            "duckdb commit"
        );
        Ok(())
    }

    fn reset(&self, matter_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in [tables::FINDINGS, tables::RISKS] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE matter_id = ?"),
                params![matter_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

// ── Arrow decoding ──

fn decode_findings(batch: &RecordBatch, out: &mut Vec<Finding>) -> Result<(), StoreError> {
    let table = tables::FINDINGS;
    let matter_id = column(batch, table, "matter_id")?;
    let key = column(batch, table, "key")?;
    let value = column(batch, table, "value")?;
    let file = column(batch, table, "evidence_file")?;
    let page = column(batch, table, "evidence_page")?;
    let note = column(batch, table, "evidence_note")?;
    let confidence = column(batch, table, "confidence")?;
    let created_at = column(batch, table, "created_at")?;

    for row in 0..batch.num_rows() {
        let evidence = get_string(file, row).map(|file_ref| Evidence {
            file_ref,
            page: get_i32(page, row).and_then(|p| u32::try_from(p).ok()),
            note: get_string(note, row),
        });
        let confidence = required_i32(confidence, table, "confidence", row)?;
        out.push(Finding {
            matter_id: required_string(matter_id, table, "matter_id", row)?,
            key: required_string(key, table, "key", row)?,
            value: serde_json::from_str(&required_string(value, table, "value", row)?)?,
            evidence,
            confidence: u8::try_from(confidence).map_err(|_| StoreError::Decode {
                table,
                detail: format!("confidence {confidence} out of range"),
            })?,
            created_at: required_string(created_at, table, "created_at", row)?,
        });
    }
    Ok(())
}

fn decode_risks(batch: &RecordBatch, out: &mut Vec<Risk>) -> Result<(), StoreError> {
    let table = tables::RISKS;
    let matter_id = column(batch, table, "matter_id")?;
    let code = column(batch, table, "code")?;
    let severity = column(batch, table, "severity")?;
    let message = column(batch, table, "message")?;
    let evidence = column(batch, table, "evidence")?;
    let created_at = column(batch, table, "created_at")?;

    for row in 0..batch.num_rows() {
        let decode = |detail: String| StoreError::Decode { table, detail };
        out.push(Risk {
            matter_id: required_string(matter_id, table, "matter_id", row)?,
            code: required_string(code, table, "code", row)?
                .parse()
                .map_err(decode)?,
            severity: required_string(severity, table, "severity", row)?
                .parse()
                .map_err(decode)?,
            message: required_string(message, table, "message", row)?,
            evidence: serde_json::from_str(&required_string(evidence, table, "evidence", row)?)?,
            created_at: required_string(created_at, table, "created_at", row)?,
        });
    }
    Ok(())
}

fn column<'a>(
    batch: &'a RecordBatch,
    table: &'static str,
    name: &str,
) -> Result<&'a dyn Array, StoreError> {
    batch
        .column_by_name(name)
        .map(|c| c.as_ref())
        .ok_or_else(|| StoreError::Decode {
            table,
            detail: format!("missing column {name}"),
        })
}

/// Extract a string value from an Arrow array (handles Utf8 and LargeUtf8).
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}

fn get_i32(col: &dyn Array, row: usize) -> Option<i32> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<Int32Array>()
        .map(|arr| arr.value(row))
        .or_else(|| {
            col.as_any()
                .downcast_ref::<Int64Array>()
                .and_then(|arr| i32::try_from(arr.value(row)).ok())
        })
}

fn required_string(
    col: &dyn Array,
    table: &'static str,
    name: &str,
    row: usize,
) -> Result<String, StoreError> {
    get_string(col, row).ok_or_else(|| StoreError::Decode {
        table,
        detail: format!("{name} is null or not a string at row {row}"),
    })
}

fn required_i32(
    col: &dyn Array,
    table: &'static str,
    name: &str,
    row: usize,
) -> Result<i32, StoreError> {
    get_i32(col, row).ok_or_else(|| StoreError::Decode {
        table,
        detail: format!("{name} is null or not an integer at row {row}"),
    })
}
