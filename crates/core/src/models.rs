use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub raw_text: String,
    pub checksum: String,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// A contiguous span of a document's text.
///
/// `text` is the exact slice of the source between `start_char` and
/// `end_char`. Its first `overlap_chars` characters repeat the tail of the
/// previous chunk of the same document; the remainder is the chunk body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
    pub overlap_chars: usize,
}

impl Chunk {
    /// The part of the chunk not shared with its predecessor.
    pub fn body(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_chars) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub document_id: String,
    pub chunk: Chunk,
    pub score: f64,
}

impl ScoredResult {
    pub fn chunk_text(&self) -> &str {
        &self.chunk.text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub checksum: String,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(document: &Document) -> Self {
        Self {
            document_id: document.document_id.clone(),
            checksum: document.checksum.clone(),
            chunk_count: document.chunk_count,
            uploaded_at: document.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    pub top_k: usize,
    /// Inclusive lower bound applied before truncating to `top_k`.
    pub min_score: f64,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: crate::index::DEFAULT_TOP_K,
            min_score: 0.0,
        }
    }
}
