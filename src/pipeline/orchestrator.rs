//! Extraction orchestrator.
//!
//! Drives one document through a fixed step sequence:
//! ocr → clean → index → extract → consensus → guardrails → validate →
//! decide → store.
//!
//! Every collaborator sits behind a trait so runs are fully testable with
//! mock implementations. A collaborator fault ends the run in the `failed`
//! status; everything else (hallucination flags, low confidence, business
//! rule breaches) folds into the final decision.

use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::config::{ConfigError, ExtractionSettings, RetrievalSettings, Settings};
use crate::db::DatabaseError;
use crate::models::{Decision, ExtractionMap, LoanField, RunStatus};
use crate::pipeline::consensus;
use crate::pipeline::extraction::{
    join_block_text, BusinessValidator, Classification, DocumentClassifier, DocumentSource,
    ExtractionError, KeywordClassifier, MockDocumentSource, OcrTextCleaner, RuleEngine,
    RuleExtractor, TextCleaner, TextFileSource, ValidationReport,
};
use crate::pipeline::guardrails::{self, GuardrailReport};
use crate::pipeline::monitor::{PipelineMonitor, RunTrace, StepOutcome};
use crate::pipeline::oracle::{LlmUsage, MockLlmClient, OracleError, OracleExtractor, PromptedOracle};
use crate::pipeline::persistence::{ResultStore, SqliteResultStore};
use crate::pipeline::retrieval::{
    Chunk, EmbeddingModel, HashingEmbedder, RetrievalError, SemanticRetriever,
};
use crate::pipeline::validation::RuleValidator;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Oracle extraction failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Step {step} is missing its input: {input}")]
    MissingInput { step: Step, input: &'static str },

    #[error("Run failed at {step}: {reason}")]
    RunFailed { step: Step, reason: String },
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Ocr,
    Clean,
    Index,
    Extract,
    Consensus,
    Guardrails,
    Validate,
    Decide,
    Store,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Ocr,
        Step::Clean,
        Step::Index,
        Step::Extract,
        Step::Consensus,
        Step::Guardrails,
        Step::Validate,
        Step::Decide,
        Step::Store,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Ocr => "ocr",
            Step::Clean => "clean",
            Step::Index => "index",
            Step::Extract => "extract",
            Step::Consensus => "consensus",
            Step::Guardrails => "guardrails",
            Step::Validate => "validate",
            Step::Decide => "decide",
            Step::Store => "store",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and why a run stopped early.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub step: Step,
    pub reason: String,
}

/// Everything one run has produced so far. Steps only ever fill fields in.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub document_id: String,
    pub status: RunStatus,
    pub failure: Option<RunFailure>,
    pub raw_text: Option<String>,
    pub clean_text: Option<String>,
    pub chunks: Vec<Chunk>,
    pub classification: Option<Classification>,
    pub rule_result: Option<ExtractionMap>,
    /// `None` when the oracle produced nothing.
    pub llm_result: Option<ExtractionMap>,
    /// Model usage of the oracle call, when the oracle is model-backed.
    pub llm_usage: Option<LlmUsage>,
    pub consensus: Option<ExtractionMap>,
    pub guardrails: Option<GuardrailReport>,
    pub validation: Option<ValidationReport>,
    pub decision: Option<Decision>,
    pub low_confidence_fields: Vec<LoanField>,
    pub stored_id: Option<String>,
    pub trace: Option<RunTrace>,
}

impl RunState {
    pub fn new(document_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            status: RunStatus::Started,
            failure: None,
            raw_text: None,
            clean_text: None,
            chunks: Vec::new(),
            classification: None,
            rule_result: None,
            llm_result: None,
            llm_usage: None,
            consensus: None,
            guardrails: None,
            validation: None,
            decision: None,
            low_confidence_fields: Vec::new(),
            stored_id: None,
            trace: None,
        }
    }

    /// Move to `next`, refusing skips, reversals and moves out of a terminal status.
    pub fn advance(&mut self, next: RunStatus) -> Result<(), ProcessingError> {
        if !self.status.can_advance_to(next) {
            return Err(ProcessingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn fail(&mut self, step: Step, reason: String) {
        self.status = RunStatus::Failed;
        self.failure = Some(RunFailure { step, reason });
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            document_id: self.document_id.clone(),
            status: self.status,
            decision: self.decision,
            loan_type: self
                .consensus
                .as_ref()
                .and_then(|c| c.loan_type())
                .map(str::to_string),
            valid: self.validation.as_ref().is_some_and(|v| v.valid),
            errors: self
                .validation
                .as_ref()
                .map(|v| v.errors.clone())
                .unwrap_or_default(),
            guardrails_passed: self.guardrails.as_ref().map(|g| g.passed),
            low_confidence_fields: self.low_confidence_fields.clone(),
            fields: self.consensus.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// Client-facing view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub document_id: String,
    pub status: RunStatus,
    pub decision: Option<Decision>,
    pub loan_type: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
    /// `None` when the run stopped before the guardrail step.
    pub guardrails_passed: Option<bool>,
    pub low_confidence_fields: Vec<LoanField>,
    pub fields: Option<ExtractionMap>,
    pub failure: Option<RunFailure>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The external collaborators a run calls out to.
pub struct Collaborators {
    pub source: Box<dyn DocumentSource>,
    pub cleaner: Box<dyn TextCleaner>,
    pub classifier: Box<dyn DocumentClassifier>,
    pub rules: Box<dyn RuleExtractor>,
    pub oracle: Box<dyn OracleExtractor>,
    pub validator: Box<dyn BusinessValidator>,
    pub store: Box<dyn ResultStore>,
    pub embedder: Box<dyn EmbeddingModel>,
}

/// Single-threaded step machine over [`RunState`].
///
/// Holds no per-run state: each call to [`run`](Self::run) builds a fresh
/// state and retrieval index and drops the index when it returns.
pub struct ExtractionOrchestrator {
    parts: Collaborators,
    extraction: ExtractionSettings,
    retrieval: RetrievalSettings,
}

impl ExtractionOrchestrator {
    pub fn new(settings: &Settings, parts: Collaborators) -> Self {
        Self {
            parts,
            extraction: settings.extraction.clone(),
            retrieval: settings.retrieval.clone(),
        }
    }

    /// Process one document to a terminal status (`stored` or `failed`).
    pub fn run(&self, document_id: &str) -> RunState {
        let mut state = RunState::new(document_id);
        let mut monitor = PipelineMonitor::start(document_id);
        let mut retriever = SemanticRetriever::new(
            self.parts.embedder.as_ref(),
            self.retrieval.chunk_size,
            self.retrieval.chunk_overlap,
        );

        tracing::info!(document_id = %document_id, run_id = %state.run_id, "Extraction run started");

        for step in Step::ALL {
            tracing::info!(document_id = %document_id, step = %step, "Running step");
            let started = Instant::now();

            match self.execute(step, &mut state, &mut retriever) {
                Ok(()) => {
                    monitor.record(step.as_str(), started.elapsed(), StepOutcome::Success);
                    if let (Step::Extract, Some(usage)) = (step, &state.llm_usage) {
                        monitor.record_llm_call(usage);
                    }
                }
                Err(e) => {
                    monitor.record(step.as_str(), started.elapsed(), StepOutcome::Failed);
                    tracing::error!(
                        document_id = %document_id,
                        step = %step,
                        error = %e,
                        "Run aborted"
                    );
                    state.fail(step, e.to_string());
                    break;
                }
            }
        }

        state.trace = Some(monitor.finish());
        tracing::info!(
            document_id = %document_id,
            status = %state.status,
            decision = ?state.decision,
            "Extraction run finished"
        );
        state
    }

    /// Like [`run`](Self::run) but a failed run is returned as an error.
    pub fn run_checked(&self, document_id: &str) -> Result<RunState, ProcessingError> {
        let state = self.run(document_id);
        match state.failure {
            Some(failure) => Err(ProcessingError::RunFailed {
                step: failure.step,
                reason: failure.reason,
            }),
            None => Ok(state),
        }
    }

    fn execute(
        &self,
        step: Step,
        state: &mut RunState,
        retriever: &mut SemanticRetriever<'_>,
    ) -> Result<(), ProcessingError> {
        match step {
            Step::Ocr => self.step_ocr(state),
            Step::Clean => self.step_clean(state),
            Step::Index => self.step_index(state, retriever),
            Step::Extract => self.step_extract(state, retriever),
            Step::Consensus => self.step_consensus(state),
            Step::Guardrails => self.step_guardrails(state),
            Step::Validate => self.step_validate(state),
            Step::Decide => self.step_decide(state),
            Step::Store => self.step_store(state),
        }
    }

    fn step_ocr(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let blocks = self.parts.source.process(&state.document_id)?;
        let raw = join_block_text(&blocks);
        tracing::debug!(blocks = blocks.len(), text_len = raw.len(), "OCR text assembled");
        state.raw_text = Some(raw);
        state.advance(RunStatus::OcrComplete)
    }

    fn step_clean(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let raw = require(Step::Clean, "raw_text", state.raw_text.as_deref())?;
        state.clean_text = Some(self.parts.cleaner.clean(raw));
        state.advance(RunStatus::Cleaned)
    }

    fn step_index(
        &self,
        state: &mut RunState,
        retriever: &mut SemanticRetriever<'_>,
    ) -> Result<(), ProcessingError> {
        let text = require(Step::Index, "clean_text", state.clean_text.as_deref())?;
        state.chunks = retriever.store_document(&state.document_id, text)?;
        tracing::info!(chunk_count = state.chunks.len(), "Document indexed");
        state.advance(RunStatus::StoredInVectordb)
    }

    fn step_extract(
        &self,
        state: &mut RunState,
        retriever: &mut SemanticRetriever<'_>,
    ) -> Result<(), ProcessingError> {
        let text = require(Step::Extract, "clean_text", state.clean_text.as_deref())?;

        let passages = retriever.retrieve(&self.retrieval.query, self.retrieval.top_k)?;
        tracing::info!(passages = passages.len(), "Retrieved oracle context");
        let context = passages.join(" ");

        let classification = self.parts.classifier.classify(text);
        let rule_result = self.parts.rules.extract(text, classification.loan_type)?;
        let llm_result = self.parts.oracle.extract(&context)?;

        if llm_result.is_none() {
            tracing::warn!(
                oracle = %self.parts.oracle.name(),
                "Oracle returned no result, consensus will use rule values"
            );
        }

        state.classification = Some(classification);
        state.rule_result = Some(rule_result);
        state.llm_result = llm_result;
        state.llm_usage = self.parts.oracle.last_usage();
        state.advance(RunStatus::Extracted)
    }

    fn step_consensus(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let rule = require(Step::Consensus, "rule_result", state.rule_result.as_ref())?;
        let merged = consensus::resolve(rule, state.llm_result.as_ref());
        for (field, fv) in merged.iter() {
            tracing::debug!(
                field = %field,
                method = %fv.method(),
                confidence = fv.confidence(),
                "Field resolved"
            );
        }
        state.consensus = Some(merged);
        state.advance(RunStatus::ConsensusComplete)
    }

    fn step_guardrails(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let merged = require(Step::Guardrails, "consensus", state.consensus.as_ref())?;
        let text = require(Step::Guardrails, "clean_text", state.clean_text.as_deref())?;
        let report = guardrails::check(merged, text);
        if !report.passed {
            tracing::warn!(
                flagged = ?report.flagged_fields(),
                "Guardrails flagged possible hallucinations"
            );
        }
        state.guardrails = Some(report);
        state.advance(RunStatus::GuardrailsChecked)
    }

    fn step_validate(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let merged = require(Step::Validate, "consensus", state.consensus.as_ref())?;
        state.validation = Some(self.parts.validator.validate(merged));
        state.advance(RunStatus::Validated)
    }

    fn step_decide(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        let merged = require(Step::Decide, "consensus", state.consensus.as_ref())?;
        let validation = require(Step::Decide, "validation", state.validation.as_ref())?;
        let guardrails = require(Step::Decide, "guardrails", state.guardrails.as_ref())?;

        let low_confidence: Vec<LoanField> = merged
            .iter()
            .filter(|(_, fv)| fv.confidence() < self.extraction.review_threshold)
            .map(|(field, _)| field)
            .collect();

        let decision = if !validation.valid {
            tracing::warn!(errors = ?validation.errors, "Decision: invalid, sending to review");
            Decision::NeedsReview
        } else if !low_confidence.is_empty() {
            tracing::warn!(fields = ?low_confidence, "Decision: low confidence, sending to review");
            Decision::NeedsReview
        } else if self.extraction.guardrail_forces_review && !guardrails.passed {
            tracing::warn!("Decision: guardrail failure, sending to review");
            Decision::NeedsReview
        } else {
            tracing::info!("Decision: all fields approved");
            Decision::Approved
        };

        state.low_confidence_fields = low_confidence;
        state.decision = Some(decision);
        state.advance(decision.into())
    }

    fn step_store(&self, state: &mut RunState) -> Result<(), ProcessingError> {
        state.stored_id = self.parts.store.store(state);
        if state.stored_id.is_none() {
            tracing::error!(document_id = %state.document_id, "Result was not persisted");
        }
        state.advance(RunStatus::Stored)
    }
}

fn require<T>(step: Step, input: &'static str, value: Option<T>) -> Result<T, ProcessingError> {
    value.ok_or(ProcessingError::MissingInput { step, input })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build an orchestrator with the bundled local implementations.
///
/// - OCR: `TextFileSource` over the configured documents directory, else
///   `MockDocumentSource` with the sample personal loan agreement
/// - Oracle: `PromptedOracle` over `MockLlmClient::sample()`, prompted with
///   the configured model name and supported loan types
/// - Embeddings: `OnnxEmbedder` when built with `onnx-embeddings` and a
///   model directory is configured, else `HashingEmbedder`
/// - Storage: SQLite at the configured path, else in memory
pub fn build_orchestrator(settings: &Settings) -> Result<ExtractionOrchestrator, ProcessingError> {
    let store = match &settings.storage.database_path {
        Some(path) => SqliteResultStore::open(path)?,
        None => SqliteResultStore::in_memory()?,
    };

    let source: Box<dyn DocumentSource> = match &settings.documents_dir {
        Some(dir) => Box::new(TextFileSource::new(dir)),
        None => Box::new(MockDocumentSource::sample_personal_loan()),
    };

    let parts = Collaborators {
        source,
        cleaner: Box::new(OcrTextCleaner),
        classifier: Box::new(KeywordClassifier::new(
            settings.classifier.confidence_threshold,
        )),
        rules: Box::new(RuleEngine::new(settings.extraction.rule_confidence)),
        oracle: Box::new(
            PromptedOracle::new(MockLlmClient::sample(), &settings.extraction.oracle_model)
                .with_loan_types(&settings.supported_loan_types),
        ),
        validator: Box::new(RuleValidator::new(&settings.validation)),
        store: Box::new(store),
        embedder: build_embedder(&settings.retrieval)?,
    };

    Ok(ExtractionOrchestrator::new(settings, parts))
}

/// Pick the embedding model, respecting feature flags.
fn build_embedder(
    retrieval: &RetrievalSettings,
) -> Result<Box<dyn EmbeddingModel>, ProcessingError> {
    #[cfg(feature = "onnx-embeddings")]
    {
        if let Some(dir) = &retrieval.model_dir {
            let embedder = crate::pipeline::retrieval::OnnxEmbedder::load(dir)?;
            return Ok(Box::new(embedder));
        }
    }

    tracing::info!(dimension = retrieval.embedding_dim, "Using hashing embedder");
    Ok(Box::new(HashingEmbedder::new(retrieval.embedding_dim)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
