pub mod extraction;
pub mod retrieval;
pub mod oracle;
pub mod consensus;
pub mod guardrails;
pub mod validation;
pub mod persistence;
pub mod monitor;
pub mod orchestrator; // Step machine: ocr → … → decide → store

pub use orchestrator::{
    build_orchestrator, Collaborators, ExtractionOrchestrator, ProcessingError, RunFailure,
    RunState, RunSummary, Step,
};
