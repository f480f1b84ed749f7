use std::cell::RefCell;

use super::types::{LlmUsage, OracleExtractor};
use super::OracleError;
use crate::models::{ExtractionMap, ExtractionMethod, FieldValue, LoanField};

/// Returns the same response for every context.
pub struct FixedOracle {
    response: Option<ExtractionMap>,
}

impl FixedOracle {
    pub fn new(response: ExtractionMap) -> Self {
        Self {
            response: Some(response),
        }
    }

    /// An oracle that never produces a map.
    pub fn null() -> Self {
        Self { response: None }
    }

    /// Canned answer for the sample personal loan agreement.
    pub fn sample() -> Self {
        let fv = |v: &str, c: f32| FieldValue::new(v, c, ExtractionMethod::Llm);
        Self::new(
            ExtractionMap::new()
                .with_field(LoanField::BorrowerName, fv("John Smith", 0.95))
                .with_field(LoanField::LoanAmount, fv("25000", 0.97))
                .with_field(LoanField::InterestRate, fv("5.99", 0.96))
                .with_field(LoanField::LoanTerm, fv("60", 0.94))
                .with_field(LoanField::MonthlyPayment, fv("483.15", 0.93))
                .with_loan_type("personal_loan"),
        )
    }
}

impl OracleExtractor for FixedOracle {
    fn extract(&self, context: &str) -> Result<Option<ExtractionMap>, OracleError> {
        tracing::debug!(context_len = context.len(), "Fixed oracle response");
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Always errors. Stands in for an unreachable backend.
pub struct FailingOracle {
    reason: String,
}

impl FailingOracle {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl OracleExtractor for FailingOracle {
    fn extract(&self, _context: &str) -> Result<Option<ExtractionMap>, OracleError> {
        Err(OracleError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Primary oracle with a secondary tried when the primary errors.
///
/// When both error the chain answers `Ok(None)`, so the run continues on
/// rule-engine values alone. A primary `Ok(None)` is returned as is.
pub struct FallbackOracle {
    primary: Box<dyn OracleExtractor>,
    secondary: Box<dyn OracleExtractor>,
    usage: RefCell<Option<LlmUsage>>,
}

impl FallbackOracle {
    pub fn new(primary: Box<dyn OracleExtractor>, secondary: Box<dyn OracleExtractor>) -> Self {
        Self {
            primary,
            secondary,
            usage: RefCell::new(None),
        }
    }
}

impl OracleExtractor for FallbackOracle {
    fn extract(&self, context: &str) -> Result<Option<ExtractionMap>, OracleError> {
        self.usage.replace(None);
        match self.primary.extract(context) {
            Ok(result) => {
                self.usage.replace(self.primary.last_usage());
                return Ok(result);
            }
            Err(e) => tracing::warn!(
                oracle = %self.primary.name(),
                error = %e,
                fallback = %self.secondary.name(),
                "Primary oracle failed, falling back"
            ),
        }

        match self.secondary.extract(context) {
            Ok(result) => {
                self.usage.replace(self.secondary.last_usage());
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    oracle = %self.secondary.name(),
                    error = %e,
                    "Both oracles failed"
                );
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }

    fn last_usage(&self) -> Option<LlmUsage> {
        self.usage.borrow().clone()
    }
}
