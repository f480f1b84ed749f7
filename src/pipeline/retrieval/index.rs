use std::cmp::Ordering;

use super::types::{Chunk, ScoredChunk};
use super::RetrievalError;

/// Chunks of a single document alongside their embeddings.
///
/// Scoring is the raw dot product. Embeddings from the bundled models are
/// L2-normalized, which makes this cosine similarity.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

impl ChunkIndex {
    /// Pair chunks with embeddings. Counts must match and every embedding
    /// must have `dimension` components.
    pub fn from_parts(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        dimension: usize,
    ) -> Result<Self, RetrievalError> {
        if chunks.len() != embeddings.len() {
            return Err(RetrievalError::IndexMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }
        Ok(Self {
            chunks,
            embeddings,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The `k` best-scoring chunks, highest first. Equal scores keep
    /// document order. Returns `min(k, len)` entries.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, dot(query, emb)))
            .collect();

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                index: self.chunks[i].index,
                text: self.chunks[i].text.clone(),
                score,
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            byte_offset: index * 10,
        }
    }

    fn three_chunk_index() -> ChunkIndex {
        ChunkIndex::from_parts(
            vec![chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")],
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
            3,
        )
        .unwrap()
    }

    #[test]
    fn top_one_returns_nearest_chunk() {
        let index = three_chunk_index();
        let hits = index.top_k(&[0.1, 0.2, 0.9], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 2);
        assert_eq!(hits[0].text, "gamma");
    }

    #[test]
    fn results_are_ordered_by_score() {
        let index = three_chunk_index();
        let hits = index.top_k(&[0.5, 0.2, 0.9], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        let index = three_chunk_index();
        assert_eq!(index.top_k(&[1.0, 1.0, 1.0], 10).unwrap().len(), 3);
        assert!(index.top_k(&[1.0, 1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_document_order() {
        let index = three_chunk_index();
        let hits = index.top_k(&[1.0, 1.0, 1.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let err = ChunkIndex::from_parts(vec![chunk(0, "a")], vec![], 3).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::IndexMismatch {
                chunks: 1,
                embeddings: 0
            }
        ));

        let err = ChunkIndex::from_parts(vec![chunk(0, "a")], vec![vec![1.0, 0.0]], 3).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn wrong_query_dimension_is_rejected() {
        let index = three_chunk_index();
        assert!(matches!(
            index.top_k(&[1.0], 1),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = ChunkIndex::from_parts(vec![], vec![], 4).unwrap();
        assert!(index.is_empty());
        assert!(index.top_k(&[0.0; 4], 3).unwrap().is_empty());
    }
}
