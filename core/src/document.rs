use serde::{Deserialize, Serialize};

/// A source document as supplied by a corpus loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { id: id.into(), raw_text: raw_text.into() }
    }
}

/// One window of a document's token stream; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    /// 0-based position within the owning document's chunk sequence.
    pub ordinal: usize,
    pub text: String,
}
