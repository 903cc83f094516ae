pub mod chunker;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod provider;
pub mod ranker;
pub mod store;
pub mod tokenizer;
pub mod vectorizer;

pub use chunker::ChunkParams;
pub use config::EngineConfig;
pub use document::{Chunk, Document};
pub use engine::{build_index, QueryHit, RetrievalEngine};
pub use error::{Result, RetrievalError};
pub use index::{Index, IndexSummary};
pub use provider::{DenseRetriever, EmbeddingProvider, TfIdfProvider};
pub use store::{load_index, save_index, IndexPaths};
pub use vectorizer::{SparseVector, TermStats};
