pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a loan document extraction assistant. Extract ONLY values that are
explicitly written in the document text you are given. If a field is not
present, output null for it. Never guess, compute or infer a value.
Output MUST be a single JSON object and nothing else.
"#;

/// Build the extraction prompt around the retrieved document context.
pub fn build_extraction_prompt(context: &str, loan_types: &[String]) -> String {
    let loan_types = if loan_types.is_empty() {
        "personal_loan, auto_loan, commercial_loan, heloc, sba_loan".to_string()
    } else {
        loan_types.join(", ")
    };

    format!(
        r#"Extract the following fields from this loan document text.
Return ONLY valid JSON with these fields:

- borrower_name: Full name of the borrower
- loan_amount: Numeric amount (no $ or commas)
- interest_rate: Numeric rate (no % sign)
- loan_term: Number of months
- monthly_payment: Numeric amount (no $ or commas)
- loan_type: One of: {loan_types}

Each field may be a bare value or {{"value": ..., "confidence": 0.0-1.0}}.

<document>
{context}
</document>

JSON response:"#
    )
}
