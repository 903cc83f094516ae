//! Dense vectorization behind a narrow capability trait.
//!
//! [`TfIdfProvider`] is the reference implementation: it lays the fitted TF-IDF weights
//! out over the sorted vocabulary. External embedding models plug in by implementing
//! [`EmbeddingProvider`] and are ranked by [`DenseRetriever`] with the same cosine contract
//! as the sparse path.

use crate::document::Chunk;
use crate::engine::QueryHit;
use crate::error::{Result, RetrievalError};
use crate::index::Index;
use crate::ranker::rank_dense;
use crate::tokenizer::tokenize;
use crate::vectorizer::{transform, TermStats};
use std::collections::BTreeMap;

pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector returned by [`embed`](Self::embed).
    fn dimensions(&self) -> usize;

    /// One vector per input text, in input order. Must be deterministic for a fixed model.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

pub struct TfIdfProvider {
    stats: TermStats,
    columns: BTreeMap<String, usize>,
}

impl TfIdfProvider {
    pub fn new(stats: TermStats) -> Self {
        let columns = stats.vocabulary().enumerate().map(|(i, t)| (t.to_string(), i)).collect();
        Self { stats, columns }
    }

    pub fn from_index(index: &Index) -> Self {
        Self::new(index.stats().clone())
    }
}

impl EmbeddingProvider for TfIdfProvider {
    fn name(&self) -> &str { "tfidf" }

    fn dimensions(&self) -> usize { self.columns.len() }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut dense = vec![0.0f32; self.columns.len()];
                for (term, weight) in transform(&tokenize(text), &self.stats) {
                    if let Some(&col) = self.columns.get(&term) {
                        dense[col] = weight as f32;
                    }
                }
                dense
            })
            .collect())
    }
}

fn check_batch<P: EmbeddingProvider>(provider: &P, embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
    let unavailable = |message: String| RetrievalError::ProviderUnavailable { provider: provider.name().to_string(), message };
    if embeddings.len() != expected {
        return Err(unavailable(format!("returned {} vectors for {} texts", embeddings.len(), expected)));
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != provider.dimensions()) {
        return Err(unavailable(format!("returned a {}-d vector, expected {}", bad.len(), provider.dimensions())));
    }
    if let Some(pos) = embeddings.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(unavailable(format!("vector {pos} has non-finite components")));
    }
    Ok(())
}

/// Exact cosine retrieval over provider embeddings of a fixed chunk list.
pub struct DenseRetriever<P> {
    provider: P,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl<P: EmbeddingProvider> DenseRetriever<P> {
    pub fn build(provider: P, chunks: Vec<Chunk>) -> Result<Self> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = provider.embed(&texts)?;
        check_batch(&provider, &vectors, texts.len())?;
        tracing::info!(provider = provider.name(), chunks = chunks.len(), dimensions = provider.dimensions(), "dense vectors ready");
        Ok(Self { provider, chunks, vectors })
    }

    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let embedded = self.provider.embed(&[text])?;
        check_batch(&self.provider, &embedded, 1)?;
        Ok(rank_dense(&embedded[0], &self.vectors, top_k)
            .into_iter()
            .map(|(position, score)| QueryHit::new(score as f64, position, &self.chunks[position]))
            .collect())
    }
}
