use std::cell::RefCell;

use super::parser::parse_extraction_response;
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::types::{LlmClient, LlmUsage, OracleExtractor};
use super::OracleError;
use crate::models::ExtractionMap;

/// Rough chars-per-token ratio for English prompt text.
const CHARS_PER_TOKEN: usize = 4;

/// Token estimate for backends that do not report counts.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Oracle backed by a text-generation client.
///
/// Transport and parse failures are returned as errors; wrap in a
/// [`FallbackOracle`](super::FallbackOracle) to degrade to `Ok(None)`.
pub struct PromptedOracle<C: LlmClient> {
    client: C,
    model: String,
    loan_types: Vec<String>,
    usage: RefCell<Option<LlmUsage>>,
}

impl<C: LlmClient> PromptedOracle<C> {
    pub fn new(client: C, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            loan_types: Vec::new(),
            usage: RefCell::new(None),
        }
    }

    /// Loan types the model may answer with.
    pub fn with_loan_types(mut self, loan_types: &[String]) -> Self {
        self.loan_types = loan_types.to_vec();
        self
    }
}

impl<C: LlmClient> OracleExtractor for PromptedOracle<C> {
    fn extract(&self, context: &str) -> Result<Option<ExtractionMap>, OracleError> {
        let prompt = build_extraction_prompt(context, &self.loan_types);
        tracing::info!(model = %self.model, context_len = context.len(), "Requesting oracle extraction");

        self.usage.replace(None);
        let response = self
            .client
            .generate(&self.model, &prompt, EXTRACTION_SYSTEM_PROMPT)?;

        let usage = LlmUsage {
            model: self.model.clone(),
            input_tokens: estimate_tokens(EXTRACTION_SYSTEM_PROMPT) + estimate_tokens(&prompt),
            output_tokens: estimate_tokens(&response),
        };
        tracing::debug!(
            model = %usage.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Oracle call completed"
        );
        self.usage.replace(Some(usage));

        let map = parse_extraction_response(&response)?;
        tracing::info!(model = %self.model, fields_found = map.found_count(), "Oracle extraction parsed");
        Ok(Some(map))
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn last_usage(&self) -> Option<LlmUsage> {
        self.usage.borrow().clone()
    }
}

/// Returns a fixed reply regardless of prompt.
pub struct MockLlmClient {
    response: String,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }

    /// Reply for the sample personal loan agreement.
    pub fn sample() -> Self {
        Self::new(
            r#"```json
{
  "borrower_name": {"value": "John Smith", "confidence": 0.95},
  "loan_amount": {"value": "25000", "confidence": 0.97},
  "interest_rate": {"value": "5.99", "confidence": 0.96},
  "loan_term": {"value": "60", "confidence": 0.94},
  "monthly_payment": {"value": "483.15", "confidence": 0.93},
  "loan_type": "personal_loan"
}
```"#,
        )
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _model: &str, _prompt: &str, _system: &str) -> Result<String, OracleError> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoanField;

    /// Records the prompt it was given.
    struct RecordingClient {
        prompts: RefCell<Vec<String>>,
        reply: Result<String, String>,
    }

    impl LlmClient for RecordingClient {
        fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, OracleError> {
            assert_eq!(model, "loan-extractor");
            assert_eq!(system, EXTRACTION_SYSTEM_PROMPT);
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(OracleError::Backend)
        }
    }

    #[test]
    fn extracts_through_client() {
        let client = MockLlmClient::new(
            r#"{"borrower_name": "John Smith", "loan_amount": "25000", "loan_type": "personal_loan"}"#,
        );
        let oracle = PromptedOracle::new(client, "loan-extractor");
        let map = oracle.extract("Borrower: John Smith").unwrap().unwrap();

        assert_eq!(map.get(LoanField::BorrowerName).unwrap().value(), Some("John Smith"));
        assert_eq!(map.found_count(), 2);
        assert_eq!(oracle.name(), "loan-extractor");
    }

    #[test]
    fn prompt_carries_context() {
        let client = RecordingClient {
            prompts: RefCell::new(Vec::new()),
            reply: Ok("{}".to_string()),
        };
        let oracle = PromptedOracle::new(client, "loan-extractor");
        oracle.extract("Term: 60 months").unwrap();

        let prompts = oracle.client.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Term: 60 months"));
    }

    #[test]
    fn prompt_lists_supported_loan_types() {
        let client = RecordingClient {
            prompts: RefCell::new(Vec::new()),
            reply: Ok("{}".to_string()),
        };
        let types = vec!["heloc".to_string(), "sba_loan".to_string()];
        let oracle = PromptedOracle::new(client, "loan-extractor").with_loan_types(&types);
        oracle.extract("ctx").unwrap();

        let prompts = oracle.client.prompts.borrow();
        assert!(prompts[0].contains("One of: heloc, sba_loan\n"));
        assert!(!prompts[0].contains("auto_loan"));
    }

    #[test]
    fn usage_is_estimated_per_call() {
        let oracle = PromptedOracle::new(MockLlmClient::new(r#"{"loan_term": "60"}"#), "loan-extractor");
        assert!(oracle.last_usage().is_none());

        oracle.extract("Term: 60 months").unwrap();
        let usage = oracle.last_usage().unwrap();
        assert_eq!(usage.model, "loan-extractor");
        assert_eq!(usage.output_tokens, 5);
        assert!(usage.input_tokens > estimate_tokens(EXTRACTION_SYSTEM_PROMPT));
    }

    #[test]
    fn failed_call_clears_usage() {
        let client = RecordingClient {
            prompts: RefCell::new(Vec::new()),
            reply: Err("503".to_string()),
        };
        let oracle = PromptedOracle::new(client, "loan-extractor");
        assert!(oracle.extract("ctx").is_err());
        assert!(oracle.last_usage().is_none());
    }

    #[test]
    fn sample_client_matches_fixed_sample() {
        let oracle = PromptedOracle::new(MockLlmClient::sample(), "mock");
        let map = oracle.extract("ctx").unwrap().unwrap();
        let fixed = crate::pipeline::oracle::FixedOracle::sample().extract("ctx").unwrap().unwrap();
        assert_eq!(map, fixed);
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn backend_error_propagates() {
        let client = RecordingClient {
            prompts: RefCell::new(Vec::new()),
            reply: Err("503".to_string()),
        };
        let oracle = PromptedOracle::new(client, "loan-extractor");
        assert!(matches!(oracle.extract("ctx"), Err(OracleError::Backend(_))));
    }

    #[test]
    fn unparseable_reply_is_an_error() {
        let oracle = PromptedOracle::new(MockLlmClient::new("no idea"), "loan-extractor");
        assert!(matches!(
            oracle.extract("ctx"),
            Err(OracleError::MalformedResponse(_))
        ));
    }
}
