use std::sync::LazyLock;

use regex::Regex;

use super::types::RuleExtractor;
use super::ExtractionError;
use crate::models::{ExtractionMap, ExtractionMethod, FieldValue, LoanField, LoanType};

/// One case-insensitive pattern per field; capture group 1 is the value.
static FIELD_PATTERNS: LazyLock<Vec<(LoanField, Regex)>> = LazyLock::new(|| {
    vec![
        (
            LoanField::BorrowerName,
            Regex::new(r"(?i)(?:borrower|applicant|name)\s*[:\-]\s*([A-Z][a-z]+ [A-Z][a-z]+)").unwrap(),
        ),
        (
            LoanField::LoanAmount,
            Regex::new(r"(?i)(?:loan amount|principal|amount)\s*[:\-]\s*\$?([\d,]+\.?\d*)").unwrap(),
        ),
        (
            LoanField::InterestRate,
            Regex::new(r"(?i)(?:interest rate|rate|apr)\s*[:\-]\s*([\d.]+)\s*%").unwrap(),
        ),
        (
            LoanField::LoanTerm,
            Regex::new(r"(?i)(?:term|duration|period)\s*[:\-]\s*(\d+)\s*(?:months|month)").unwrap(),
        ),
        (
            LoanField::MonthlyPayment,
            Regex::new(r"(?i)(?:monthly payment|payment)\s*[:\-]\s*\$?([\d,]+\.?\d*)").unwrap(),
        ),
    ]
});

/// Regex field extractor. Every hit gets the same fixed confidence.
pub struct RuleEngine {
    confidence: f32,
}

impl RuleEngine {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl RuleExtractor for RuleEngine {
    fn extract(&self, text: &str, loan_type: LoanType) -> Result<ExtractionMap, ExtractionError> {
        let mut result = ExtractionMap::all_absent(ExtractionMethod::RuleBased);

        for (field, pattern) in FIELD_PATTERNS.iter() {
            let captured = pattern
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());

            match &captured {
                Some(value) => tracing::info!(field = %field, value = %value, "Rule match"),
                None => tracing::warn!(field = %field, "No rule match"),
            }

            result.insert(
                *field,
                FieldValue::from_option(captured, self.confidence, ExtractionMethod::RuleBased),
            );
        }

        result.set_loan_type(Some(loan_type.as_str().to_string()));
        Ok(result)
    }
}
