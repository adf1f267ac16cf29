use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document {document_id} produced no non-empty chunks")]
    EmptyDocument { document_id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("duplicate document id {document_id}: already ingested from {first}")]
    DuplicateDocumentId { document_id: String, first: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Index(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index lock poisoned: {0}")]
    LockPoisoned(String),
}
