use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::{ExtractionMethod, LoanField};

/// One extracted field: the raw value an extractor produced, how sure it is,
/// and which strategy produced it.
///
/// Fields are private so a value cannot be edited after an extractor hands it
/// over; downstream stages build new instances instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    value: Option<String>,
    confidence: f32,
    method: ExtractionMethod,
}

impl FieldValue {
    /// A found value. Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn new(value: impl Into<String>, confidence: f32, method: ExtractionMethod) -> Self {
        Self {
            value: Some(value.into()),
            confidence: clamp_confidence(confidence),
            method,
        }
    }

    /// Build from an optional value (e.g. a regex capture that may be missing).
    pub fn from_option(value: Option<String>, confidence: f32, method: ExtractionMethod) -> Self {
        match value {
            Some(v) => Self::new(v, confidence, method),
            None => Self::absent(method),
        }
    }

    /// The "not found" entry: null value, zero confidence.
    pub fn absent(method: ExtractionMethod) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            method,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// False for entries whose confidence escaped [0, 1] (only reachable
    /// through deserialization of untrusted input).
    pub fn is_well_formed(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Per-field extraction output plus the document's loan type.
///
/// Serialises flat, e.g. `{"borrower_name": {...}, ..., "loan_type": "heloc"}`.
/// Maps coming from an extractor may be partial; a map handed downstream by
/// the consensus stage always covers every [`LoanField`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMap {
    #[serde(flatten)]
    fields: BTreeMap<LoanField, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loan_type: Option<String>,
}

impl ExtractionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known field present with a null value.
    pub fn all_absent(method: ExtractionMethod) -> Self {
        let fields = LoanField::ALL
            .iter()
            .map(|f| (*f, FieldValue::absent(method)))
            .collect();
        Self {
            fields,
            loan_type: None,
        }
    }

    pub fn with_field(mut self, field: LoanField, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn with_loan_type(mut self, loan_type: impl Into<String>) -> Self {
        self.loan_type = Some(loan_type.into());
        self
    }

    pub fn insert(&mut self, field: LoanField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn set_loan_type(&mut self, loan_type: Option<String>) {
        self.loan_type = loan_type;
    }

    pub fn get(&self, field: LoanField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn loan_type(&self) -> Option<&str> {
        self.loan_type.as_deref()
    }

    /// Entries in fixed field order.
    pub fn iter(&self) -> impl Iterator<Item = (LoanField, &FieldValue)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }

    /// True when every known field has an entry (null values allowed).
    pub fn is_complete(&self) -> bool {
        LoanField::ALL.iter().all(|f| self.fields.contains_key(f))
    }

    pub fn found_count(&self) -> usize {
        self.fields.values().filter(|v| v.is_present()).count()
    }
}
