use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{Decision, RunStatus};

/// One persisted extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRecord {
    pub id: Uuid,
    pub document_id: String,
    pub processed_at: NaiveDateTime,
    pub status: RunStatus,
    pub decision: Option<Decision>,
    pub valid: bool,
    pub guardrails_passed: bool,
    pub loan_type: Option<String>,
    /// Consensus map serialised as JSON.
    pub fields: String,
    pub validation_errors: Vec<String>,
    pub low_confidence_fields: Vec<String>,
}

pub fn insert_extraction_run(
    conn: &Connection,
    record: &ExtractionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_runs (id, document_id, processed_at, status, decision, valid,
         guardrails_passed, loan_type, fields, validation_errors, low_confidence_fields)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id.to_string(),
            record.document_id,
            record.processed_at,
            record.status.as_str(),
            record.decision.map(|d| d.as_str()),
            record.valid as i32,
            record.guardrails_passed as i32,
            record.loan_type,
            record.fields,
            serde_json::to_string(&record.validation_errors)?,
            serde_json::to_string(&record.low_confidence_fields)?,
        ],
    )?;
    Ok(())
}

pub fn get_extraction_run(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{SELECT_RUN} WHERE id = ?1"))?;
    let result = stmt.query_row(params![id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(record_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All runs for a document, oldest first.
pub fn get_runs_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<ExtractionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_RUN} WHERE document_id = ?1 ORDER BY processed_at"
    ))?;
    let rows = stmt.query_map(params![document_id], read_row)?;
    rows.map(|r| record_from_row(r?)).collect()
}

/// Runs that ended with the given decision (e.g. the human review queue).
pub fn get_runs_by_decision(
    conn: &Connection,
    decision: Decision,
) -> Result<Vec<ExtractionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_RUN} WHERE decision = ?1 ORDER BY processed_at"
    ))?;
    let rows = stmt.query_map(params![decision.as_str()], read_row)?;
    rows.map(|r| record_from_row(r?)).collect()
}

const SELECT_RUN: &str = "SELECT id, document_id, processed_at, status, decision, valid,
     guardrails_passed, loan_type, fields, validation_errors, low_confidence_fields
     FROM extraction_runs";

// Internal row type for ExtractionRecord mapping
struct ExtractionRow {
    id: String,
    document_id: String,
    processed_at: NaiveDateTime,
    status: String,
    decision: Option<String>,
    valid: i32,
    guardrails_passed: i32,
    loan_type: Option<String>,
    fields: String,
    validation_errors: String,
    low_confidence_fields: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExtractionRow> {
    Ok(ExtractionRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        processed_at: row.get(2)?,
        status: row.get(3)?,
        decision: row.get(4)?,
        valid: row.get(5)?,
        guardrails_passed: row.get(6)?,
        loan_type: row.get(7)?,
        fields: row.get(8)?,
        validation_errors: row.get(9)?,
        low_confidence_fields: row.get(10)?,
    })
}

fn record_from_row(row: ExtractionRow) -> Result<ExtractionRecord, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidValue {
        field: "id".into(),
        value: row.id.clone(),
    })?;
    Ok(ExtractionRecord {
        id,
        document_id: row.document_id,
        processed_at: row.processed_at,
        status: RunStatus::from_str(&row.status)?,
        decision: row.decision.as_deref().map(Decision::from_str).transpose()?,
        valid: row.valid != 0,
        guardrails_passed: row.guardrails_passed != 0,
        loan_type: row.loan_type,
        fields: row.fields,
        validation_errors: serde_json::from_str(&row.validation_errors)?,
        low_confidence_fields: serde_json::from_str(&row.low_confidence_fields)?,
    })
}
