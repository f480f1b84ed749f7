use serde::{Deserialize, Serialize};

use super::RetrievalError;

/// A contiguous slice of the cleaned document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the document's chunk sequence, starting at 0.
    pub index: usize,
    pub text: String,
    /// Byte offset of `text` within the document.
    pub byte_offset: usize,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Chunking strategy trait
pub trait Chunker {
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Embedding model abstraction
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError>;
    fn dimension(&self) -> usize;
}

