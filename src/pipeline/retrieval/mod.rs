pub mod types;
pub mod chunker;
pub mod embedder;
pub mod index;
pub mod retriever;

pub use types::*;
pub use chunker::*;
pub use embedder::*;
pub use index::*;
pub use retriever::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Chunk count {chunks} does not match embedding count {embeddings}")]
    IndexMismatch { chunks: usize, embeddings: usize },

    #[error("Embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}
