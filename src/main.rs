use std::process::ExitCode;

const DEFAULT_DOCUMENT: &str = "test_loan.pdf";

fn main() -> ExitCode {
    loanscan_lib::init_tracing();

    let document_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string());

    let state = match loanscan_lib::run(&document_id) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Could not start extraction");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&state.summary()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Could not render run summary");
            return ExitCode::FAILURE;
        }
    }

    if state.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
