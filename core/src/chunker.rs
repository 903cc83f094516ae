use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};

/// Validated window parameters. `window_size - overlap` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkParams")]
pub struct ChunkParams {
    window_size: usize,
    overlap: usize,
}

#[derive(Deserialize)]
struct RawChunkParams {
    window_size: usize,
    overlap: usize,
}

impl TryFrom<RawChunkParams> for ChunkParams {
    type Error = RetrievalError;

    fn try_from(raw: RawChunkParams) -> Result<Self> {
        Self::new(raw.window_size, raw.overlap)
    }
}

impl ChunkParams {
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(RetrievalError::Configuration("window_size must be greater than zero".into()));
        }
        if overlap >= window_size {
            return Err(RetrievalError::Configuration(format!(
                "overlap ({overlap}) must be less than window_size ({window_size})"
            )));
        }
        Ok(Self { window_size, overlap })
    }

    pub fn window_size(&self) -> usize { self.window_size }
    pub fn overlap(&self) -> usize { self.overlap }
    fn stride(&self) -> usize { self.window_size - self.overlap }
}

/// Token slices covered by each chunk, in order.
pub fn windows<'a, T>(tokens: &'a [T], params: &ChunkParams) -> Vec<&'a [T]> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + params.window_size).min(tokens.len());
        out.push(&tokens[start..end]);
        if end == tokens.len() {
            break;
        }
        start += params.stride();
    }
    out
}

/// Split a token stream into overlapping windows joined with single spaces.
pub fn chunk(tokens: &[String], params: &ChunkParams) -> Vec<String> {
    windows(tokens, params).into_iter().map(|w| w.join(" ")).collect()
}
