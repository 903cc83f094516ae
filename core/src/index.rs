use crate::document::Chunk;
use crate::error::{Result, RetrievalError};
use crate::vectorizer::{SparseVector, TermStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered chunks, their vectors (parallel, same order) and the statistics they were built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    chunks: Vec<Chunk>,
    vectors: Vec<SparseVector>,
    stats: TermStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub num_chunks: usize,
    pub num_documents: usize,
    pub vocabulary_size: usize,
    pub avg_chunk_terms: f64,
}

impl Index {
    pub fn new(chunks: Vec<Chunk>, vectors: Vec<SparseVector>, stats: TermStats) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RetrievalError::CorruptIndex(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        Ok(Self { chunks, vectors, stats })
    }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn vectors(&self) -> &[SparseVector] { &self.vectors }
    pub fn stats(&self) -> &TermStats { &self.stats }
    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn get(&self, position: usize) -> Option<(&Chunk, &SparseVector)> {
        Some((self.chunks.get(position)?, self.vectors.get(position)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, &SparseVector)> {
        self.chunks.iter().zip(self.vectors.iter())
    }

    pub fn summary(&self) -> IndexSummary {
        let documents: BTreeSet<&str> = self.chunks.iter().map(|c| c.document_id.as_str()).collect();
        let total_terms: usize = self.chunks.iter().map(|c| c.text.split(' ').filter(|t| !t.is_empty()).count()).sum();
        IndexSummary {
            num_chunks: self.chunks.len(),
            num_documents: documents.len(),
            vocabulary_size: self.stats.vocabulary_size(),
            avg_chunk_terms: if self.chunks.is_empty() { 0.0 } else { total_terms as f64 / self.chunks.len() as f64 },
        }
    }
}
