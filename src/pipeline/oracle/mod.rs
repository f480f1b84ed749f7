//! Second-opinion field extraction.
//!
//! The orchestrator sees only [`OracleExtractor`]. Shipped adapters: a fixed
//! response, a primary/secondary fallback chain and a prompt-driven adapter
//! over any [`LlmClient`]. No network client ships with the crate.

pub mod types;
pub mod fixed;
pub mod prompt;
pub mod parser;
pub mod prompted;

pub use types::*;
pub use fixed::*;
pub use prompt::*;
pub use parser::*;
pub use prompted::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    #[error("Model backend returned error: {0}")]
    Backend(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
