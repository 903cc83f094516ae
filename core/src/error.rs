use std::path::PathBuf;
use thiserror::Error;

/// Conditions the retrieval core reports back to its caller.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid chunking or ranking parameters, detected before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("corpus produced no chunks to index")]
    EmptyCorpus,

    #[error("index not found at {}", path.display())]
    IndexNotFound { path: PathBuf },

    /// The stored artifacts exist but disagree with each other or cannot be decoded.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("embedding provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
