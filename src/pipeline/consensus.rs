//! Consensus resolution between the rule engine and the oracle extractor.
//!
//! Per field:
//! 1. Equal non-null values agree: keep the value, take the higher confidence.
//! 2. Otherwise the strictly more confident source wins.
//! 3. Ties (including two nulls) go to the rule engine.
//!
//! `loan_type` is taken from the oracle when it has one, else from the rules.

use crate::models::{ExtractionMap, ExtractionMethod, FieldValue, LoanField};

/// Merge a rule-based map and an optional oracle map into one complete map.
///
/// Pure and deterministic. A missing oracle map, a missing field, or a
/// malformed entry all count as a null value with zero confidence.
pub fn resolve(rule: &ExtractionMap, oracle: Option<&ExtractionMap>) -> ExtractionMap {
    let empty = ExtractionMap::new();
    let oracle = oracle.unwrap_or(&empty);

    let mut merged = ExtractionMap::new();
    for field in LoanField::ALL {
        let (rule_value, rule_conf) = read(rule, field);
        let (llm_value, llm_conf) = read(oracle, field);
        merged.insert(field, resolve_field(rule_value, rule_conf, llm_value, llm_conf));
    }

    let loan_type = oracle.loan_type().or(rule.loan_type()).map(str::to_string);
    merged.set_loan_type(loan_type);
    merged
}

fn resolve_field(
    rule_value: Option<&str>,
    rule_conf: f32,
    llm_value: Option<&str>,
    llm_conf: f32,
) -> FieldValue {
    match (rule_value, llm_value) {
        (Some(r), Some(l)) if r == l => {
            FieldValue::new(r, rule_conf.max(llm_conf), ExtractionMethod::Consensus)
        }
        _ if llm_conf > rule_conf => FieldValue::from_option(
            llm_value.map(str::to_string),
            llm_conf,
            ExtractionMethod::LlmPreferred,
        ),
        _ => FieldValue::from_option(
            rule_value.map(str::to_string),
            rule_conf,
            ExtractionMethod::RulePreferred,
        ),
    }
}

fn read(map: &ExtractionMap, field: LoanField) -> (Option<&str>, f32) {
    match map.get(field) {
        Some(fv) if fv.is_well_formed() => match fv.value() {
            Some(v) => (Some(v), fv.confidence()),
            None => (None, 0.0),
        },
        _ => (None, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(value: &str, conf: f32) -> FieldValue {
        FieldValue::new(value, conf, ExtractionMethod::RuleBased)
    }

    fn llm(value: &str, conf: f32) -> FieldValue {
        FieldValue::new(value, conf, ExtractionMethod::Llm)
    }

    #[test]
    fn agreement_takes_max_confidence() {
        let r = ExtractionMap::new().with_field(LoanField::LoanAmount, rule("25000", 0.85));
        let l = ExtractionMap::new().with_field(LoanField::LoanAmount, llm("25000", 0.95));

        let out = resolve(&r, Some(&l));
        let fv = out.get(LoanField::LoanAmount).unwrap();
        assert_eq!(fv.value(), Some("25000"));
        assert_eq!(fv.confidence(), 0.95);
        assert_eq!(fv.method(), ExtractionMethod::Consensus);
    }

    #[test]
    fn agreement_is_case_sensitive() {
        let r = ExtractionMap::new().with_field(LoanField::BorrowerName, rule("John Smith", 0.85));
        let l = ExtractionMap::new().with_field(LoanField::BorrowerName, llm("JOHN SMITH", 0.80));

        let fv = resolve(&r, Some(&l)).get(LoanField::BorrowerName).unwrap().clone();
        assert_eq!(fv.method(), ExtractionMethod::RulePreferred);
        assert_eq!(fv.value(), Some("John Smith"));
    }

    #[test]
    fn higher_confidence_wins_disagreement() {
        let r = ExtractionMap::new()
            .with_field(LoanField::InterestRate, rule("5.99", 0.85))
            .with_field(LoanField::LoanTerm, rule("60", 0.85));
        let l = ExtractionMap::new()
            .with_field(LoanField::InterestRate, llm("6.99", 0.97))
            .with_field(LoanField::LoanTerm, llm("72", 0.50));

        let out = resolve(&r, Some(&l));
        let rate = out.get(LoanField::InterestRate).unwrap();
        assert_eq!(rate.value(), Some("6.99"));
        assert_eq!(rate.method(), ExtractionMethod::LlmPreferred);
        let term = out.get(LoanField::LoanTerm).unwrap();
        assert_eq!(term.value(), Some("60"));
        assert_eq!(term.method(), ExtractionMethod::RulePreferred);
    }

    #[test]
    fn equal_confidence_prefers_rule() {
        let r = ExtractionMap::new().with_field(LoanField::LoanTerm, rule("60", 0.9));
        let l = ExtractionMap::new().with_field(LoanField::LoanTerm, llm("72", 0.9));

        let fv = resolve(&r, Some(&l)).get(LoanField::LoanTerm).unwrap().clone();
        assert_eq!(fv.value(), Some("60"));
        assert_eq!(fv.method(), ExtractionMethod::RulePreferred);
    }

    #[test]
    fn both_null_is_not_agreement() {
        let r = ExtractionMap::all_absent(ExtractionMethod::RuleBased);
        let l = ExtractionMap::all_absent(ExtractionMethod::Llm);

        let out = resolve(&r, Some(&l));
        for (_, fv) in out.iter() {
            assert_eq!(fv.value(), None);
            assert_eq!(fv.confidence(), 0.0);
            assert_eq!(fv.method(), ExtractionMethod::RulePreferred);
        }
    }

    #[test]
    fn empty_inputs_yield_complete_null_map() {
        let out = resolve(&ExtractionMap::new(), None);
        assert!(out.is_complete());
        assert_eq!(out.found_count(), 0);
        assert_eq!(out.loan_type(), None);
    }

    #[test]
    fn missing_oracle_falls_back_to_rules() {
        let r = ExtractionMap::new()
            .with_field(LoanField::BorrowerName, rule("John Smith", 0.85))
            .with_loan_type("personal_loan");

        let out = resolve(&r, None);
        let name = out.get(LoanField::BorrowerName).unwrap();
        assert_eq!(name.value(), Some("John Smith"));
        assert_eq!(name.confidence(), 0.85);
        assert_eq!(name.method(), ExtractionMethod::RulePreferred);
        assert_eq!(out.loan_type(), Some("personal_loan"));
    }

    #[test]
    fn null_rule_value_loses_to_any_oracle_value() {
        let r = ExtractionMap::all_absent(ExtractionMethod::RuleBased);
        let l = ExtractionMap::new().with_field(LoanField::MonthlyPayment, llm("483.15", 0.94));

        let fv = resolve(&r, Some(&l)).get(LoanField::MonthlyPayment).unwrap().clone();
        assert_eq!(fv.value(), Some("483.15"));
        assert_eq!(fv.method(), ExtractionMethod::LlmPreferred);
    }

    #[test]
    fn malformed_entry_counts_as_null() {
        let bad: ExtractionMap = serde_json::from_str(
            r#"{"loan_amount": {"value": "99999", "confidence": 7.5, "method": "llm"}}"#,
        )
        .unwrap();
        let r = ExtractionMap::new().with_field(LoanField::LoanAmount, rule("25,000", 0.85));

        let fv = resolve(&r, Some(&bad)).get(LoanField::LoanAmount).unwrap().clone();
        assert_eq!(fv.value(), Some("25,000"));
        assert_eq!(fv.method(), ExtractionMethod::RulePreferred);
    }

    #[test]
    fn oracle_loan_type_is_preferred() {
        let r = ExtractionMap::new().with_loan_type("personal_loan");
        let l = ExtractionMap::new().with_loan_type("auto_loan");
        assert_eq!(resolve(&r, Some(&l)).loan_type(), Some("auto_loan"));
        assert_eq!(
            resolve(&r, Some(&ExtractionMap::new())).loan_type(),
            Some("personal_loan")
        );
    }

    #[test]
    fn resolve_is_idempotent_and_agreement_is_order_free() {
        let a = ExtractionMap::new()
            .with_field(LoanField::LoanAmount, rule("25000", 0.85))
            .with_field(LoanField::LoanTerm, rule("60", 0.85));
        let b = ExtractionMap::new()
            .with_field(LoanField::LoanAmount, llm("25000", 0.95))
            .with_field(LoanField::LoanTerm, llm("72", 0.96));

        assert_eq!(resolve(&a, Some(&b)), resolve(&a, Some(&b)));

        let ab = resolve(&a, Some(&b));
        let ba = resolve(&b, Some(&a));
        assert_eq!(ab.get(LoanField::LoanAmount), ba.get(LoanField::LoanAmount));
    }

    #[test]
    fn never_fabricates_values() {
        let r = ExtractionMap::new().with_field(LoanField::LoanAmount, rule("25000", 0.85));
        let l = ExtractionMap::new().with_field(LoanField::LoanTerm, llm("60", 0.96));

        let out = resolve(&r, Some(&l));
        for (field, fv) in out.iter() {
            if let Some(v) = fv.value() {
                let from_rule = r.get(field).and_then(FieldValue::value) == Some(v);
                let from_llm = l.get(field).and_then(FieldValue::value) == Some(v);
                assert!(from_rule || from_llm, "{field} has fabricated value {v}");
            }
        }
    }
}
