use std::path::{Path, PathBuf};

use super::types::{BlockType, DocumentSource, TextBlock};
use super::ExtractionError;

/// Join the text of all blocks that carry any, separated by single spaces.
pub fn join_block_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .filter(|b| !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads pre-OCR'd text files: `<root>/<document_id>` or, failing that,
/// `<root>/<document_id>.txt`. Each non-blank line becomes a line block.
pub struct TextFileSource {
    root: PathBuf,
}

impl TextFileSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn resolve(&self, document_id: &str) -> Option<PathBuf> {
        let direct = self.root.join(document_id);
        if direct.is_file() {
            return Some(direct);
        }
        let with_ext = self.root.join(format!("{document_id}.txt"));
        with_ext.is_file().then_some(with_ext)
    }
}

impl DocumentSource for TextFileSource {
    fn process(&self, document_id: &str) -> Result<Vec<TextBlock>, ExtractionError> {
        let path = self
            .resolve(document_id)
            .ok_or_else(|| ExtractionError::DocumentNotFound(document_id.to_string()))?;
        let content = std::fs::read_to_string(&path)?;

        let mut blocks = vec![TextBlock {
            block_type: BlockType::Page,
            text: String::new(),
            id: "page-1".to_string(),
        }];
        blocks.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .enumerate()
                .map(|(i, l)| TextBlock::line(&format!("line-{}", i + 1), l)),
        );

        tracing::info!(
            document_id = %document_id,
            path = %path.display(),
            blocks = blocks.len(),
            "Text file source returned blocks"
        );
        Ok(blocks)
    }
}

/// Mock OCR source for testing and local runs. Returns fixed blocks for any
/// document id.
pub struct MockDocumentSource {
    blocks: Vec<TextBlock>,
}

impl MockDocumentSource {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self { blocks }
    }

    /// One line block per entry.
    pub fn from_lines(lines: &[&str]) -> Self {
        Self::new(
            lines
                .iter()
                .enumerate()
                .map(|(i, l)| TextBlock::line(&format!("line-{}", i + 1), l))
                .collect(),
        )
    }

    /// The sample personal loan agreement used for local runs.
    pub fn sample_personal_loan() -> Self {
        let mut blocks = vec![TextBlock {
            block_type: BlockType::Page,
            text: String::new(),
            id: "page-1".to_string(),
        }];
        blocks.extend(
            [
                "PERSONAL LOAN AGREEMENT",
                "Borrower: John Smith",
                "Loan Amount: $25,000",
                "Interest Rate: 5.99%",
                "Term: 60 months",
                "Monthly Payment: $483.15",
            ]
            .iter()
            .enumerate()
            .map(|(i, l)| TextBlock::line(&format!("line-{}", i + 1), l)),
        );
        Self::new(blocks)
    }
}

impl DocumentSource for MockDocumentSource {
    fn process(&self, document_id: &str) -> Result<Vec<TextBlock>, ExtractionError> {
        tracing::info!(
            document_id = %document_id,
            blocks = self.blocks.len(),
            "Mock OCR returned blocks"
        );
        Ok(self.blocks.clone())
    }
}
