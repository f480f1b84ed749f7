use super::types::{Classification, DocumentClassifier};
use crate::models::{ClassificationMethod, LoanType};

/// Indicative keywords per loan type, in tie-break order.
const LOAN_KEYWORDS: &[(LoanType, &[&str])] = &[
    (
        LoanType::PersonalLoan,
        &["borrower", "personal", "unsecured", "apr", "monthly payment"],
    ),
    (LoanType::AutoLoan, &["vehicle", "vin", "dealer", "mileage", "auto"]),
    (
        LoanType::CommercialLoan,
        &["commercial", "business", "dscr", "ltv", "collateral"],
    ),
    (
        LoanType::Heloc,
        &["credit limit", "draw period", "heloc", "home equity", "cltv"],
    ),
    (
        LoanType::SbaLoan,
        &["sba", "guarantee", "7(a)", "small business", "proceeds"],
    ),
];

/// Scores each loan type by the share of its keywords present in the text.
pub struct KeywordClassifier {
    confidence_threshold: f32,
}

impl KeywordClassifier {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl DocumentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();

        let mut best = (LOAN_KEYWORDS[0].0, 0.0f32);
        for (index, (loan_type, keywords)) in LOAN_KEYWORDS.iter().enumerate() {
            let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
            let score = hits as f32 / keywords.len() as f32;
            // Strictly greater keeps the earlier type on ties
            if index == 0 || score > best.1 {
                best = (*loan_type, score);
            }
        }

        let (loan_type, confidence) = best;
        let method = if confidence >= self.confidence_threshold {
            ClassificationMethod::Keyword
        } else {
            tracing::warn!(
                loan_type = %loan_type,
                confidence,
                threshold = self.confidence_threshold,
                "Classification below confidence threshold"
            );
            ClassificationMethod::LowConfidence
        };

        tracing::info!(loan_type = %loan_type, confidence, "Document classified");
        Classification {
            loan_type,
            confidence,
            method,
        }
    }
}
