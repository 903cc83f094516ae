use crate::chunker::ChunkParams;
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_SIZE: usize = 400;
pub const DEFAULT_OVERLAP: usize = 60;
pub const DEFAULT_TOP_K: usize = 3;

/// Immutable settings shared by the build and query pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chunking: ChunkParams,
    pub top_k: usize,
}

impl EngineConfig {
    pub fn new(window_size: usize, overlap: usize, top_k: usize) -> Result<Self> {
        let config = Self { chunking: ChunkParams::new(window_size, overlap)?, top_k };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrievalError::Configuration("top_k must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::new(DEFAULT_WINDOW_SIZE, DEFAULT_OVERLAP).expect("default chunk params are valid"),
            top_k: DEFAULT_TOP_K,
        }
    }
}
