use crate::config::ValidationSettings;
use crate::models::{ExtractionMap, LoanField};

use super::extraction::{BusinessValidator, ValidationReport};

/// Business-rule ceilings on amount, rate and term.
///
/// Null fields are not checked. A value present but not parseable as a
/// number is reported as an error rather than silently accepted.
pub struct RuleValidator {
    limits: ValidationSettings,
}

impl RuleValidator {
    pub fn new(limits: &ValidationSettings) -> Self {
        Self {
            limits: limits.clone(),
        }
    }
}

impl BusinessValidator for RuleValidator {
    fn validate(&self, extraction: &ExtractionMap) -> ValidationReport {
        let mut errors = Vec::new();

        if let Some(raw) = value_of(extraction, LoanField::LoanAmount) {
            match parse_decimal(raw) {
                Some(amount) if amount > self.limits.max_loan_amount => errors.push(format!(
                    "Loan amount ${amount} exceeds max ${}",
                    self.limits.max_loan_amount
                )),
                Some(_) => {}
                None => errors.push(format!("Loan amount '{raw}' is not a number")),
            }
        }

        if let Some(raw) = value_of(extraction, LoanField::InterestRate) {
            match parse_decimal(raw) {
                Some(rate) if rate > self.limits.max_interest_rate => errors.push(format!(
                    "Interest rate {rate}% exceeds max {}%",
                    self.limits.max_interest_rate
                )),
                Some(_) => {}
                None => errors.push(format!("Interest rate '{raw}' is not a number")),
            }
        }

        if let Some(raw) = value_of(extraction, LoanField::LoanTerm) {
            match parse_number::<u32>(raw) {
                Some(term) if term > self.limits.max_loan_term_months => errors.push(format!(
                    "Loan term {term} months exceeds max {}",
                    self.limits.max_loan_term_months
                )),
                Some(_) => {}
                None => errors.push(format!("Loan term '{raw}' is not a number")),
            }
        }

        if errors.is_empty() {
            tracing::info!("Validation passed");
        } else {
            for error in &errors {
                tracing::error!(error = %error, "Validation failed");
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

fn value_of(extraction: &ExtractionMap, field: LoanField) -> Option<&str> {
    extraction
        .get(field)
        .and_then(|fv| fv.value())
        .filter(|v| !v.trim().is_empty())
}

/// Parse after dropping currency, percent and thousands-separator noise.
fn parse_number<T: std::str::FromStr>(raw: &str) -> Option<T> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// Finite decimals only: `NaN` and `inf` parse as `f64` but compare false
/// against every ceiling.
fn parse_decimal(raw: &str) -> Option<f64> {
    parse_number::<f64>(raw).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, FieldValue};

    fn map(amount: &str, rate: &str, term: &str) -> ExtractionMap {
        let fv = |v: &str| FieldValue::new(v, 0.9, ExtractionMethod::Consensus);
        ExtractionMap::new()
            .with_field(LoanField::LoanAmount, fv(amount))
            .with_field(LoanField::InterestRate, fv(rate))
            .with_field(LoanField::LoanTerm, fv(term))
    }

    fn validator() -> RuleValidator {
        RuleValidator::new(&ValidationSettings::default())
    }

    #[test]
    fn sample_loan_is_valid() {
        let report = validator().validate(&map("25,000", "5.99", "60"));
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn amount_over_ceiling_is_invalid() {
        let report = validator().validate(&map("250000000", "5.99", "60"));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Loan amount"));
    }

    #[test]
    fn every_breach_is_reported_in_order() {
        let report = validator().validate(&map("$60,000,000", "36%", "481"));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].starts_with("Loan amount"));
        assert!(report.errors[1].starts_with("Interest rate"));
        assert!(report.errors[2].starts_with("Loan term"));
    }

    #[test]
    fn values_at_ceiling_pass() {
        let report = validator().validate(&map("50000000", "35", "480"));
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn unparseable_value_is_an_error() {
        let report = validator().validate(&map("twenty thousand", "5.99", "60"));
        assert!(!report.valid);
        assert!(report.errors[0].contains("not a number"));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for raw in ["NaN", "inf", "-infinity"] {
            let report = validator().validate(&map(raw, raw, "60"));
            assert!(!report.valid, "{raw} passed validation");
            assert_eq!(
                report.errors,
                vec![
                    format!("Loan amount '{raw}' is not a number"),
                    format!("Interest rate '{raw}' is not a number"),
                ]
            );
        }
    }

    #[test]
    fn null_fields_are_not_checked() {
        let report = validator().validate(&ExtractionMap::all_absent(ExtractionMethod::Consensus));
        assert!(report.valid);
    }

    #[test]
    fn limits_come_from_settings() {
        let limits = ValidationSettings {
            max_loan_amount: 10_000.0,
            ..ValidationSettings::default()
        };
        let report = RuleValidator::new(&limits).validate(&map("25,000", "5.99", "60"));
        assert!(!report.valid);
    }
}
