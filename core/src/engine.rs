use crate::chunker::windows;
use crate::config::EngineConfig;
use crate::document::{Chunk, Document};
use crate::error::{Result, RetrievalError};
use crate::index::{Index, IndexSummary};
use crate::ranker::rank;
use crate::store::{load_index, IndexPaths};
use crate::tokenizer::tokenize;
use crate::vectorizer::{fit, transform};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A ranked chunk handed back to callers. Owns its data; never borrows the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub score: f64,
    pub position: usize,
    pub document_id: String,
    pub ordinal: usize,
    pub text: String,
}

impl QueryHit {
    pub(crate) fn new(score: f64, position: usize, chunk: &Chunk) -> Self {
        Self {
            score,
            position,
            document_id: chunk.document_id.clone(),
            ordinal: chunk.ordinal,
            text: chunk.text.clone(),
        }
    }
}

/// Build pipeline: tokenize, chunk, fit over every chunk, then vectorize each chunk.
pub fn build_index(documents: &[Document], config: &EngineConfig) -> Result<Index> {
    config.validate()?;
    if documents.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }

    let mut chunks = Vec::new();
    let mut corpus: Vec<Vec<String>> = Vec::new();
    for doc in documents {
        let tokens = tokenize(&doc.raw_text);
        let doc_windows = windows(&tokens, &config.chunking);
        tracing::debug!(document = %doc.id, tokens = tokens.len(), chunks = doc_windows.len(), "chunked document");
        for (ordinal, window) in doc_windows.into_iter().enumerate() {
            chunks.push(Chunk { document_id: doc.id.clone(), ordinal, text: window.join(" ") });
            corpus.push(window.to_vec());
        }
    }
    if chunks.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }

    let stats = fit(&corpus);
    let vectors = corpus.iter().map(|tokens| transform(&tokens[..], &stats)).collect();
    tracing::info!(
        documents = documents.len(),
        chunks = chunks.len(),
        vocabulary = stats.vocabulary_size(),
        "index built"
    );
    Index::new(chunks, vectors, stats)
}

/// Owns the published index and answers queries against it.
///
/// The published index sits behind an `Arc`; a query takes a snapshot and ranks without
/// holding the lock, so [`publish`](Self::publish) never exposes a half-swapped index.
pub struct RetrievalEngine {
    config: EngineConfig,
    current: RwLock<Arc<Index>>,
}

impl RetrievalEngine {
    pub fn new(index: Index, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, current: RwLock::new(Arc::new(index)) })
    }

    /// Load a persisted index. Fails rather than serving a missing or inconsistent index.
    pub fn open(paths: &IndexPaths, config: EngineConfig) -> Result<Self> {
        Self::new(load_index(paths)?, config)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn snapshot(&self) -> Arc<Index> {
        self.current.read().clone()
    }

    /// Swap in a fully built index and return the one it replaces.
    pub fn publish(&self, index: Index) -> Arc<Index> {
        let next = Arc::new(index);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Load from disk and publish; the current index stays in place if loading fails.
    pub fn reload(&self, paths: &IndexPaths) -> Result<IndexSummary> {
        match load_index(paths) {
            Ok(index) => {
                let summary = index.summary();
                self.publish(index);
                tracing::info!(chunks = summary.num_chunks, "published reloaded index");
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, root = %paths.root.display(), "reload rejected, keeping current index");
                Err(e)
            }
        }
    }

    pub fn query(&self, text: &str) -> Vec<QueryHit> {
        self.query_top_k(text, self.config.top_k)
    }

    pub fn query_top_k(&self, text: &str, top_k: usize) -> Vec<QueryHit> {
        let index = self.snapshot();
        let tokens = tokenize(text);
        let query = transform(&tokens, index.stats());
        tracing::debug!(terms = tokens.len(), matched = query.len(), top_k, "query");
        rank(&query, &index, top_k)
            .into_iter()
            .map(|s| QueryHit::new(s.score, s.position, s.chunk))
            .collect()
    }

    pub fn summary(&self) -> IndexSummary {
        self.snapshot().summary()
    }
}
