use super::chunker::RecursiveChunker;
use super::index::ChunkIndex;
use super::types::{Chunk, Chunker, EmbeddingModel, ScoredChunk};
use super::RetrievalError;

/// Single-document semantic search.
///
/// Holds at most one document's index. `store_document` replaces it, and
/// `retrieve` before any store returns nothing. Scoped to one run: not
/// meant to be shared across concurrent documents.
pub struct SemanticRetriever<'a> {
    embedder: &'a dyn EmbeddingModel,
    chunker: Box<dyn Chunker + 'a>,
    document_id: Option<String>,
    index: Option<ChunkIndex>,
}

impl<'a> SemanticRetriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingModel, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_chunker(
            embedder,
            Box::new(RecursiveChunker::new(chunk_size, chunk_overlap)),
        )
    }

    pub fn with_chunker(embedder: &'a dyn EmbeddingModel, chunker: Box<dyn Chunker + 'a>) -> Self {
        Self {
            embedder,
            chunker,
            document_id: None,
            index: None,
        }
    }

    /// Chunk and embed `text`, replacing any previously indexed document.
    /// Empty text yields an empty index.
    pub fn store_document(
        &mut self,
        document_id: &str,
        text: &str,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        self.index = None;
        self.document_id = None;

        let chunks = self.chunker.chunk(text);
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            self.embedder.embed_batch(&texts)?
        };

        let index = ChunkIndex::from_parts(chunks.clone(), embeddings, self.embedder.dimension())?;

        tracing::debug!(
            document_id = %document_id,
            chunk_count = index.len(),
            "Document indexed for retrieval"
        );

        self.index = Some(index);
        self.document_id = Some(document_id.to_string());
        Ok(chunks)
    }

    /// Texts of the `k` chunks most similar to `query`, best first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Same as [`retrieve`](Self::retrieve) but keeps index and score.
    pub fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let Some(index) = self.index.as_ref().filter(|i| !i.is_empty()) else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query)?;
        index.top_k(&query_vec, k)
    }

    pub fn chunk_count(&self) -> usize {
        self.index.as_ref().map_or(0, ChunkIndex::len)
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }
}
