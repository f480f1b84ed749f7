//! Grounding checks for extracted values.
//!
//! A value is grounded when any of these hold against the source text:
//! 1. Exact: the lower-cased value is a substring of the lower-cased source.
//! 2. Numeric: same test after dropping thousands separators on both sides
//!    (`"25000"` is grounded by `"$25,000"`).
//! 3. Tokens: for multi-word values, every word appears somewhere in the source.
//!
//! Null and blank values are skipped. The report is advisory; it never edits
//! the map.

use serde::{Deserialize, Serialize};

use crate::models::{ExtractionMap, GuardrailReason, LoanField};

/// A value that could not be located in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailIssue {
    pub field: LoanField,
    pub value: String,
    pub reason: GuardrailReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailReport {
    /// True iff `issues` is empty.
    pub passed: bool,
    pub issues: Vec<GuardrailIssue>,
}

impl GuardrailReport {
    fn from_issues(issues: Vec<GuardrailIssue>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }

    pub fn flagged_fields(&self) -> Vec<LoanField> {
        self.issues.iter().map(|i| i.field).collect()
    }
}

/// Check every non-null known field of `extraction` against `source_text`.
pub fn check(extraction: &ExtractionMap, source_text: &str) -> GuardrailReport {
    let source = NormalizedSource::new(source_text);
    let mut issues = Vec::new();

    for field in LoanField::ALL {
        let Some(value) = extraction
            .get(field)
            .and_then(|fv| fv.value())
            .filter(|v| !v.trim().is_empty())
        else {
            continue;
        };

        if source.grounds(value) {
            tracing::debug!(field = %field, "Value grounded in source");
            continue;
        }

        tracing::warn!(field = %field, value = %value, "Value not found in source text");
        issues.push(GuardrailIssue {
            field,
            value: value.to_string(),
            reason: GuardrailReason::Hallucination,
            message: format!("{field} value '{value}' not found in source document"),
        });
    }

    if !issues.is_empty() {
        tracing::warn!(issue_count = issues.len(), "Guardrail check failed");
    }
    GuardrailReport::from_issues(issues)
}

/// Source text prepared once for all field checks.
struct NormalizedSource {
    lower: String,
    numeric: String,
}

impl NormalizedSource {
    fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let numeric = strip_digit_separators(&lower);
        Self { lower, numeric }
    }

    fn grounds(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.exact(&value) || self.numeric(&value) || self.tokens(&value)
    }

    fn exact(&self, value: &str) -> bool {
        self.lower.contains(value)
    }

    fn numeric(&self, value: &str) -> bool {
        if !value.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
        self.numeric.contains(&strip_digit_separators(value))
    }

    fn tokens(&self, value: &str) -> bool {
        let tokens: Vec<&str> = value.split_whitespace().collect();
        tokens.len() > 1 && tokens.iter().all(|t| self.lower.contains(t))
    }
}

/// Drop commas that sit between two digits: `"$1,250,000.00"` → `"$1250000.00"`.
fn strip_digit_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            !(c == ','
                && i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(char::is_ascii_digit))
        })
        .map(|(_, &c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, FieldValue};

    const SOURCE: &str = "Borrower: John Smith Loan Amount: $25,000 Interest Rate: 5.99% \
                          Term: 60 months Monthly Payment: $483.15";

    fn single(field: LoanField, value: &str) -> ExtractionMap {
        ExtractionMap::new().with_field(field, FieldValue::new(value, 0.9, ExtractionMethod::Consensus))
    }

    #[test]
    fn literal_substring_passes_case_insensitively() {
        let report = check(&single(LoanField::BorrowerName, "JOHN SMITH"), SOURCE);
        assert!(report.passed);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn unrelated_value_is_hallucination() {
        let report = check(&single(LoanField::BorrowerName, "Alice Cooper"), SOURCE);
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.field, LoanField::BorrowerName);
        assert_eq!(issue.value, "Alice Cooper");
        assert_eq!(issue.reason, GuardrailReason::Hallucination);
        assert!(issue.message.contains("borrower_name"));
    }

    #[test]
    fn numeric_value_matches_formatted_source() {
        assert!(check(&single(LoanField::LoanAmount, "25000"), SOURCE).passed);
        assert!(check(&single(LoanField::LoanAmount, "$25,000"), SOURCE).passed);

        let report = check(&single(LoanField::LoanAmount, "26000"), SOURCE);
        assert!(!report.passed);
        assert_eq!(report.flagged_fields(), vec![LoanField::LoanAmount]);
    }

    #[test]
    fn formatted_value_matches_plain_source() {
        let source = "Principal 1250000.00 due at maturity";
        assert!(check(&single(LoanField::LoanAmount, "1,250,000.00"), source).passed);
    }

    #[test]
    fn multi_token_value_matches_scattered_tokens() {
        let source = "Applicant surname: Smith. Given name: John.";
        assert!(check(&single(LoanField::BorrowerName, "John Smith"), source).passed);
        assert!(!check(&single(LoanField::BorrowerName, "John Doe"), source).passed);
    }

    #[test]
    fn single_token_gets_no_token_fallback() {
        let source = "Loan agreement";
        assert!(!check(&single(LoanField::BorrowerName, "Smith"), source).passed);
    }

    #[test]
    fn null_and_missing_values_are_skipped() {
        let map = ExtractionMap::all_absent(ExtractionMethod::Consensus);
        let report = check(&map, SOURCE);
        assert!(report.passed);

        assert!(check(&ExtractionMap::new(), "").passed);
    }

    #[test]
    fn blank_value_is_treated_as_absent() {
        for blank in ["", "   "] {
            let report = check(&single(LoanField::BorrowerName, blank), "Borrower: John Smith");
            assert!(report.passed, "blank value {blank:?} was flagged");
            assert!(report.issues.is_empty());
        }
    }

    #[test]
    fn issues_follow_field_order_and_passed_tracks_issues() {
        let map = ExtractionMap::new()
            .with_field(LoanField::MonthlyPayment, FieldValue::new("999.99", 0.9, ExtractionMethod::Llm))
            .with_field(LoanField::BorrowerName, FieldValue::new("Jane Roe", 0.9, ExtractionMethod::Llm))
            .with_field(LoanField::InterestRate, FieldValue::new("5.99", 0.9, ExtractionMethod::Llm));

        let report = check(&map, SOURCE);
        assert!(!report.passed);
        assert_eq!(
            report.flagged_fields(),
            vec![LoanField::BorrowerName, LoanField::MonthlyPayment]
        );
    }

    #[test]
    fn strips_only_separators_between_digits() {
        assert_eq!(strip_digit_separators("$1,250,000"), "$1250000");
        assert_eq!(strip_digit_separators("smith, john"), "smith, john");
        assert_eq!(strip_digit_separators("5, 000"), "5, 000");
    }
}
