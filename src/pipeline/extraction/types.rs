use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::models::{ClassificationMethod, ExtractionMap, LoanType};

/// Kind of OCR block, following the page/line/word hierarchy OCR services emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Line,
    Word,
}

/// One OCR block. Page blocks usually carry no text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub block_type: BlockType,
    pub text: String,
    pub id: String,
}

impl TextBlock {
    pub fn line(id: &str, text: &str) -> Self {
        Self {
            block_type: BlockType::Line,
            text: text.to_string(),
            id: id.to_string(),
        }
    }
}

/// Outcome of keyword classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub loan_type: LoanType,
    pub confidence: f32,
    pub method: ClassificationMethod,
}

/// Business-rule verdict on a consensus map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Document source (OCR service) abstraction (allows mocking for tests)
pub trait DocumentSource {
    fn process(&self, document_id: &str) -> Result<Vec<TextBlock>, ExtractionError>;
}

/// Pure OCR text cleanup. Has no failure mode.
pub trait TextCleaner {
    fn clean(&self, raw_text: &str) -> String;
}

/// Deterministic pattern-based extractor. Must return every known field.
pub trait RuleExtractor {
    fn extract(&self, text: &str, loan_type: LoanType) -> Result<ExtractionMap, ExtractionError>;
}

pub trait DocumentClassifier {
    fn classify(&self, text: &str) -> Classification;
}

pub trait BusinessValidator {
    fn validate(&self, extraction: &ExtractionMap) -> ValidationReport;
}
