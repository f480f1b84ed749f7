pub mod types;
pub mod ocr;
pub mod sanitize;
pub mod rules;
pub mod classify;
pub mod tables;

pub use types::*;
pub use ocr::*;
pub use sanitize::*;
pub use rules::*;
pub use classify::*;
pub use tables::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("OCR processing failed for {document_id}: {reason}")]
    OcrProcessing { document_id: String, reason: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
