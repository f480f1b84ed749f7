use serde::{Deserialize, Serialize};

use super::OracleError;
use crate::models::ExtractionMap;

/// Token counts of one model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Field extractor that works from retrieved context rather than the full text.
///
/// `Ok(None)` means the oracle produced nothing usable; the consensus stage
/// then falls back to the rule engine. `Err` is an upstream fault.
pub trait OracleExtractor {
    fn extract(&self, context: &str) -> Result<Option<ExtractionMap>, OracleError>;

    /// Short label for logs.
    fn name(&self) -> &str;

    /// Usage of the most recent `extract` that got a reply from a model.
    fn last_usage(&self) -> Option<LlmUsage> {
        None
    }
}

/// Text-generation backend abstraction (allows mocking for tests)
pub trait LlmClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, OracleError>;
}
