use std::path::Path;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, ExtractionRecord};
use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::DatabaseError;
use crate::models::{Decision, RunStatus};
use crate::pipeline::orchestrator::RunState;

/// Result sink (allows mocking for tests).
///
/// Best-effort: returns the stored identifier, or `None` when the write
/// failed. Implementations log their own failures.
pub trait ResultStore {
    fn store(&self, state: &RunState) -> Option<String>;
}

/// Runs persisted to the `extraction_runs` SQLite table.
pub struct SqliteResultStore {
    conn: Connection,
}

impl SqliteResultStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        tracing::info!(path = %path.display(), "Opening results database");
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn get_run(&self, id: &Uuid) -> Result<Option<ExtractionRecord>, DatabaseError> {
        repository::get_extraction_run(&self.conn, id)
    }

    pub fn runs_for_document(&self, document_id: &str) -> Result<Vec<ExtractionRecord>, DatabaseError> {
        repository::get_runs_for_document(&self.conn, document_id)
    }

    /// Runs that ended with `decision`, e.g. the human review queue.
    pub fn list_by_decision(&self, decision: Decision) -> Result<Vec<ExtractionRecord>, DatabaseError> {
        repository::get_runs_by_decision(&self.conn, decision)
    }

    fn write(&self, state: &RunState) -> Result<Uuid, DatabaseError> {
        let record = record_from_state(state)?;
        repository::insert_extraction_run(&self.conn, &record)?;
        Ok(record.id)
    }
}

impl ResultStore for SqliteResultStore {
    fn store(&self, state: &RunState) -> Option<String> {
        match self.write(state) {
            Ok(id) => {
                tracing::info!(document_id = %state.document_id, run_id = %id, "Run stored");
                Some(id.to_string())
            }
            Err(e) => {
                tracing::error!(document_id = %state.document_id, error = %e, "Failed to store run");
                None
            }
        }
    }
}

/// Discards results. For runs that need no persistence.
pub struct NullResultStore;

impl ResultStore for NullResultStore {
    fn store(&self, state: &RunState) -> Option<String> {
        tracing::warn!(document_id = %state.document_id, "No result store configured, run not persisted");
        None
    }
}

fn record_from_state(state: &RunState) -> Result<ExtractionRecord, DatabaseError> {
    let fields = match &state.consensus {
        Some(map) => serde_json::to_string(map)?,
        None => "{}".to_string(),
    };
    let validation = state.validation.as_ref();

    Ok(ExtractionRecord {
        id: state.run_id,
        document_id: state.document_id.clone(),
        processed_at: chrono::Local::now().naive_local(),
        status: RunStatus::Stored,
        decision: state.decision,
        valid: validation.is_some_and(|v| v.valid),
        guardrails_passed: state.guardrails.as_ref().is_some_and(|g| g.passed),
        loan_type: state
            .consensus
            .as_ref()
            .and_then(|c| c.loan_type())
            .map(str::to_string),
        fields,
        validation_errors: validation.map(|v| v.errors.clone()).unwrap_or_default(),
        low_confidence_fields: state
            .low_confidence_fields
            .iter()
            .map(|f| f.as_str().to_string())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMap, ExtractionMethod, FieldValue, LoanField};
    use crate::pipeline::extraction::ValidationReport;
    use crate::pipeline::guardrails::GuardrailReport;

    fn decided_state(document_id: &str, decision: Decision) -> RunState {
        let mut state = RunState::new(document_id);
        state.consensus = Some(
            ExtractionMap::all_absent(ExtractionMethod::Consensus)
                .with_field(
                    LoanField::BorrowerName,
                    FieldValue::new("John Smith", 0.95, ExtractionMethod::Consensus),
                )
                .with_loan_type("personal_loan"),
        );
        state.guardrails = Some(GuardrailReport {
            passed: true,
            issues: vec![],
        });
        state.validation = Some(ValidationReport {
            valid: decision == Decision::Approved,
            errors: if decision == Decision::Approved {
                vec![]
            } else {
                vec!["Loan amount $250000000 exceeds max $50000000".into()]
            },
        });
        state.low_confidence_fields = vec![LoanField::LoanTerm];
        state.decision = Some(decision);
        state
    }

    #[test]
    fn store_then_get_run() {
        let store = SqliteResultStore::in_memory().unwrap();
        let state = decided_state("loan-001.pdf", Decision::Approved);

        let id = store.store(&state).unwrap();
        assert_eq!(id, state.run_id.to_string());

        let record = store.get_run(&state.run_id).unwrap().unwrap();
        assert_eq!(record.document_id, "loan-001.pdf");
        assert_eq!(record.status, RunStatus::Stored);
        assert_eq!(record.decision, Some(Decision::Approved));
        assert!(record.valid);
        assert!(record.guardrails_passed);
        assert_eq!(record.loan_type.as_deref(), Some("personal_loan"));
        assert_eq!(record.low_confidence_fields, vec!["loan_term"]);

        let fields: ExtractionMap = serde_json::from_str(&record.fields).unwrap();
        assert_eq!(
            fields.get(LoanField::BorrowerName).unwrap().value(),
            Some("John Smith")
        );
    }

    #[test]
    fn review_queue_lists_flagged_runs() {
        let store = SqliteResultStore::in_memory().unwrap();
        store.store(&decided_state("a.pdf", Decision::Approved)).unwrap();
        store.store(&decided_state("b.pdf", Decision::NeedsReview)).unwrap();

        let queue = store.list_by_decision(Decision::NeedsReview).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].document_id, "b.pdf");
        assert_eq!(queue[0].validation_errors.len(), 1);
    }

    #[test]
    fn duplicate_run_id_returns_none() {
        let store = SqliteResultStore::in_memory().unwrap();
        let state = decided_state("a.pdf", Decision::Approved);
        assert!(store.store(&state).is_some());
        assert!(store.store(&state).is_none());
        assert_eq!(store.runs_for_document("a.pdf").unwrap().len(), 1);
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runs.db");
        let state = decided_state("a.pdf", Decision::NeedsReview);

        {
            let store = SqliteResultStore::open(&path).unwrap();
            store.store(&state).unwrap();
        }

        let reopened = SqliteResultStore::open(&path).unwrap();
        let record = reopened.get_run(&state.run_id).unwrap().unwrap();
        assert_eq!(record.decision, Some(Decision::NeedsReview));
    }

    #[test]
    fn null_store_returns_none() {
        assert!(NullResultStore
            .store(&decided_state("a.pdf", Decision::Approved))
            .is_none());
    }
}
