use std::sync::LazyLock;

use regex::Regex;

use super::types::TextCleaner;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A thousands group split by OCR, e.g. "25, 000".
static BROKEN_THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d), (\d{3})\b").unwrap());

/// Character confusions OCR engines make on loan paperwork.
const OCR_CONFUSIONS: &[(&str, &str)] = &[
    ("|", "l"),       // pipe read for a lowercase L
    ("0rrow", "orrow"), // zero read for O in "Borrower"
    ("$S", "$5"),     // S read for 5 after a currency sign
];

/// Sanitize OCR output before extraction.
/// Collapses whitespace, repairs common misreads, drops non-printable and
/// non-ASCII characters, and re-joins split digit groups.
pub fn clean_ocr_text(raw: &str) -> String {
    let mut text = WHITESPACE_RUN.replace_all(raw, " ").into_owned();

    for (wrong, right) in OCR_CONFUSIONS {
        text = text.replace(wrong, right);
    }

    text.retain(|c| matches!(c, ' '..='~'));

    let text = BROKEN_THOUSANDS.replace_all(&text, "$1,$2");
    text.trim().to_string()
}

/// Default [`TextCleaner`] backed by [`clean_ocr_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OcrTextCleaner;

impl TextCleaner for OcrTextCleaner {
    fn clean(&self, raw_text: &str) -> String {
        let cleaned = clean_ocr_text(raw_text);
        tracing::info!(
            raw_chars = raw_text.len(),
            clean_chars = cleaned.len(),
            "Cleaned OCR text"
        );
        cleaned
    }
}
