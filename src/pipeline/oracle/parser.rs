use std::str::FromStr;

use serde_json::{Map, Value};

use super::OracleError;
use crate::models::{ExtractionMap, ExtractionMethod, FieldValue, LoanField};

/// Confidence given to a field the model reported without one.
pub const DEFAULT_FIELD_CONFIDENCE: f32 = 0.9;

/// Parse a model reply into a complete extraction map.
///
/// Accepts a bare JSON object or one wrapped in a ```json fence. Field
/// entries may be a string, a number, null, or `{"value", "confidence"}`.
/// Unknown keys are ignored; missing fields come back null.
pub fn parse_extraction_response(response: &str) -> Result<ExtractionMap, OracleError> {
    let json_str = extract_json_block(response)?;
    let root: Value =
        serde_json::from_str(json_str).map_err(|e| OracleError::JsonParsing(e.to_string()))?;
    let Value::Object(obj) = root else {
        return Err(OracleError::MalformedResponse(
            "Top-level JSON is not an object".into(),
        ));
    };

    let mut map = ExtractionMap::all_absent(ExtractionMethod::Llm);
    for (key, entry) in &obj {
        let Ok(field) = LoanField::from_str(key) else {
            continue;
        };
        map.insert(field, parse_field(entry));
    }
    map.set_loan_type(
        obj.get("loan_type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
    Ok(map)
}

fn extract_json_block(response: &str) -> Result<&str, OracleError> {
    if let Some(start) = response.find("```json") {
        let body = &response[start + 7..];
        let end = body
            .find("```")
            .ok_or_else(|| OracleError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(body[..end].trim());
    }

    let start = response.find('{');
    let end = response.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(OracleError::MalformedResponse("No JSON object found".into())),
    }
}

fn parse_field(entry: &Value) -> FieldValue {
    match entry {
        Value::Object(inner) => {
            let confidence = confidence_of(inner);
            FieldValue::from_option(
                inner.get("value").and_then(scalar_text),
                confidence,
                ExtractionMethod::Llm,
            )
        }
        other => FieldValue::from_option(
            scalar_text(other),
            DEFAULT_FIELD_CONFIDENCE,
            ExtractionMethod::Llm,
        ),
    }
}

fn confidence_of(inner: &Map<String, Value>) -> f32 {
    inner
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c as f32)
        .unwrap_or(DEFAULT_FIELD_CONFIDENCE)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(number_text(n)),
        _ => None,
    }
}

/// Whole-valued floats lose their `.0`: `25000.0` reads as `"25000"`.
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_values() {
        let map = parse_extraction_response(
            r#"{"borrower_name": "John Smith", "loan_amount": 25000, "interest_rate": 5.99,
                "loan_term": "60", "monthly_payment": "483.15", "loan_type": "personal_loan"}"#,
        )
        .unwrap();

        assert!(map.is_complete());
        let amount = map.get(LoanField::LoanAmount).unwrap();
        assert_eq!(amount.value(), Some("25000"));
        assert_eq!(amount.confidence(), DEFAULT_FIELD_CONFIDENCE);
        assert_eq!(amount.method(), ExtractionMethod::Llm);
        assert_eq!(map.get(LoanField::InterestRate).unwrap().value(), Some("5.99"));
        assert_eq!(map.loan_type(), Some("personal_loan"));
    }

    #[test]
    fn parses_fenced_object_entries() {
        let response = r#"Here you go:
```json
{"borrower_name": {"value": "John Smith", "confidence": 0.95, "method": "llm"},
 "loan_amount": {"value": "25000", "confidence": 1.7}}
```"#;
        let map = parse_extraction_response(response).unwrap();
        let name = map.get(LoanField::BorrowerName).unwrap();
        assert_eq!(name.value(), Some("John Smith"));
        assert_eq!(name.confidence(), 0.95);
        assert_eq!(map.get(LoanField::LoanAmount).unwrap().confidence(), 1.0);
    }

    #[test]
    fn whole_floats_render_as_integers() {
        let map = parse_extraction_response(
            r#"{"loan_amount": 25000.0, "interest_rate": 5.99, "loan_term": 60, "monthly_payment": {"value": 483.0}}"#,
        )
        .unwrap();

        assert_eq!(map.get(LoanField::LoanAmount).unwrap().value(), Some("25000"));
        assert_eq!(map.get(LoanField::InterestRate).unwrap().value(), Some("5.99"));
        assert_eq!(map.get(LoanField::LoanTerm).unwrap().value(), Some("60"));
        assert_eq!(map.get(LoanField::MonthlyPayment).unwrap().value(), Some("483"));

        let source = "Loan Amount: $25,000 Rate: 5.99% Term: 60 months Payment: $483.00";
        let report = crate::pipeline::guardrails::check(&map, source);
        assert!(report.passed, "flagged: {:?}", report.flagged_fields());
    }

    #[test]
    fn missing_and_null_fields_are_absent() {
        let map = parse_extraction_response(r#"{"borrower_name": null, "junk": 1}"#).unwrap();
        assert!(map.is_complete());
        assert_eq!(map.found_count(), 0);
        assert_eq!(map.get(LoanField::LoanTerm).unwrap().confidence(), 0.0);
        assert_eq!(map.loan_type(), None);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_extraction_response("I could not read the document."),
            Err(OracleError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_extraction_response("{not json}"),
            Err(OracleError::JsonParsing(_))
        ));
        assert!(matches!(
            parse_extraction_response("```json\n{\"a\": 1}"),
            Err(OracleError::MalformedResponse(_))
        ));
    }
}
