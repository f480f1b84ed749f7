use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(LoanField {
    BorrowerName => "borrower_name",
    LoanAmount => "loan_amount",
    InterestRate => "interest_rate",
    LoanTerm => "loan_term",
    MonthlyPayment => "monthly_payment",
});

impl LoanField {
    /// The fixed field set every extraction run must cover, in output order.
    pub const ALL: [LoanField; 5] = [
        LoanField::BorrowerName,
        LoanField::LoanAmount,
        LoanField::InterestRate,
        LoanField::LoanTerm,
        LoanField::MonthlyPayment,
    ];
}

str_enum!(ExtractionMethod {
    RuleBased => "rule_based",
    Llm => "llm",
    Consensus => "consensus",
    LlmPreferred => "llm_preferred",
    RulePreferred => "rule_preferred",
    Unknown => "unknown",
});

str_enum!(LoanType {
    PersonalLoan => "personal_loan",
    AutoLoan => "auto_loan",
    CommercialLoan => "commercial_loan",
    Heloc => "heloc",
    SbaLoan => "sba_loan",
});

str_enum!(ClassificationMethod {
    Keyword => "keyword",
    LowConfidence => "low_confidence",
});

str_enum!(GuardrailReason {
    Hallucination => "hallucination",
});

str_enum!(RunStatus {
    Started => "started",
    OcrComplete => "ocr_complete",
    Cleaned => "cleaned",
    StoredInVectordb => "stored_in_vectordb",
    Extracted => "extracted",
    ConsensusComplete => "consensus_complete",
    GuardrailsChecked => "guardrails_checked",
    Validated => "validated",
    Approved => "approved",
    NeedsReview => "needs_review",
    Stored => "stored",
    Failed => "failed",
});

impl RunStatus {
    /// Whether the state machine may move from `self` to `next`.
    ///
    /// Only forward, single-step transitions are legal. `Validated` branches
    /// to either decision, both decisions lead to `Stored`, and any
    /// non-terminal status may abort into `Failed`.
    pub fn can_advance_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        match (self, next) {
            (Stored | Failed, _) => false,
            (_, Failed) => true,
            (Started, OcrComplete)
            | (OcrComplete, Cleaned)
            | (Cleaned, StoredInVectordb)
            | (StoredInVectordb, Extracted)
            | (Extracted, ConsensusComplete)
            | (ConsensusComplete, GuardrailsChecked)
            | (GuardrailsChecked, Validated)
            | (Validated, Approved)
            | (Validated, NeedsReview)
            | (Approved, Stored)
            | (NeedsReview, Stored) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Stored | RunStatus::Failed)
    }
}

str_enum!(Decision {
    Approved => "approved",
    NeedsReview => "needs_review",
});

impl From<Decision> for RunStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => RunStatus::Approved,
            Decision::NeedsReview => RunStatus::NeedsReview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn loan_field_round_trip() {
        for field in LoanField::ALL {
            assert_eq!(LoanField::from_str(field.as_str()).unwrap(), field);
        }
    }

    #[test]
    fn extraction_method_strings() {
        assert_eq!(ExtractionMethod::RuleBased.as_str(), "rule_based");
        assert_eq!(ExtractionMethod::LlmPreferred.as_str(), "llm_preferred");
        assert_eq!(
            ExtractionMethod::from_str("consensus").unwrap(),
            ExtractionMethod::Consensus
        );
    }

    #[test]
    fn unknown_string_is_invalid_enum() {
        let err = LoanType::from_str("mortgage").unwrap_err();
        assert!(err.to_string().contains("mortgage"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&RunStatus::StoredInVectordb).unwrap();
        assert_eq!(json, "\"stored_in_vectordb\"");
        let back: LoanType = serde_json::from_str("\"sba_loan\"").unwrap();
        assert_eq!(back, LoanType::SbaLoan);
    }

    #[test]
    fn run_status_forward_only() {
        assert!(RunStatus::Started.can_advance_to(RunStatus::OcrComplete));
        assert!(RunStatus::Validated.can_advance_to(RunStatus::NeedsReview));
        assert!(RunStatus::Approved.can_advance_to(RunStatus::Stored));
        assert!(!RunStatus::Cleaned.can_advance_to(RunStatus::OcrComplete));
        assert!(!RunStatus::Started.can_advance_to(RunStatus::Cleaned));
        assert!(!RunStatus::Extracted.can_advance_to(RunStatus::Approved));
    }

    #[test]
    fn any_open_status_may_fail() {
        assert!(RunStatus::Started.can_advance_to(RunStatus::Failed));
        assert!(RunStatus::GuardrailsChecked.can_advance_to(RunStatus::Failed));
        assert!(!RunStatus::Stored.can_advance_to(RunStatus::Failed));
        assert!(!RunStatus::Failed.can_advance_to(RunStatus::Failed));
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(RunStatus::from(Decision::Approved), RunStatus::Approved);
        assert_eq!(RunStatus::from(Decision::NeedsReview), RunStatus::NeedsReview);
    }
}
