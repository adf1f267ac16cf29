pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod keywords;
pub mod models;
pub mod service;

pub use chunking::{build_chunks, chunk_by_paragraph, ChunkingConfig};
pub use embeddings::{stable_hash, Embedder, HashedWordEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, SearchError};
pub use extractor::{extract_text, DocumentFormat, TextExtractor};
pub use index::{
    cosine_similarity, hybrid_score, keyword_overlap, HybridIndex, IndexRecord, InsertOutcome,
    DEFAULT_TOP_K, KEYWORD_WEIGHT, VECTOR_WEIGHT,
};
pub use ingest::{
    collect_inputs, digest_bytes, discover_documents, document_id_for, IndexedDocument,
    IngestionReport, SkippedDocument,
};
pub use keywords::{keyword_set, tokenize};
pub use models::{
    Chunk, Document, DocumentSummary, IndexStats, IngestionOptions, RetrievalOptions, ScoredResult,
};
pub use service::RetrievalService;
