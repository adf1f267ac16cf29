use crate::embeddings::{Embedder, HashedWordEmbedder};
use crate::keywords::keyword_set;
use crate::models::{Chunk, Document, DocumentSummary, IndexStats, ScoredResult};
use crate::SearchError;
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

pub const VECTOR_WEIGHT: f64 = 0.7;
pub const KEYWORD_WEIGHT: f64 = 0.3;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub tokens: BTreeSet<String>,
}

impl IndexRecord {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        let tokens = keyword_set(&chunk.text);
        Self {
            chunk,
            vector,
            tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(usize),
    Replaced(usize),
    Unchanged(usize),
}

impl InsertOutcome {
    pub fn chunk_count(self) -> usize {
        match self {
            Self::Inserted(count) | Self::Replaced(count) | Self::Unchanged(count) => count,
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    documents: Vec<Document>,
    records: Vec<IndexRecord>,
}

impl IndexState {
    fn remove(&mut self, document_id: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|document| document.document_id != document_id);
        self.records.retain(|record| record.chunk.document_id != document_id);
        self.documents.len() != before
    }
}

/// In-memory store of embedded chunks, scored against queries with a fixed
/// blend of cosine similarity and keyword overlap.
///
/// Writers (`insert`, `remove_document`, `clear`) take the lock exclusively;
/// queries share it.
pub struct HybridIndex<E = HashedWordEmbedder> {
    embedder: E,
    state: RwLock<IndexState>,
}

impl Default for HybridIndex<HashedWordEmbedder> {
    fn default() -> Self {
        Self::new(HashedWordEmbedder::default())
    }
}

impl<E> HybridIndex<E>
where
    E: Embedder,
{
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Embeds `chunks` and stores them under `document`.
    ///
    /// An id already present with the same checksum is left untouched; with a
    /// different checksum its old records are dropped before the new ones are
    /// appended.
    pub fn insert(
        &self,
        document: Document,
        chunks: Vec<Chunk>,
    ) -> Result<InsertOutcome, SearchError> {
        let records = chunks
            .into_iter()
            .map(|chunk| {
                let vector = self.embedder.embed(&chunk.text);
                IndexRecord::new(chunk, vector)
            })
            .collect();
        self.insert_records(document, records)
    }

    pub fn insert_records(
        &self,
        document: Document,
        records: Vec<IndexRecord>,
    ) -> Result<InsertOutcome, SearchError> {
        let expected = self.dimensions();
        if let Some(record) = records.iter().find(|record| record.vector.len() != expected) {
            return Err(SearchError::DimensionMismatch {
                expected,
                actual: record.vector.len(),
            });
        }

        let mut state = self.write()?;
        let existing = state
            .documents
            .iter()
            .find(|stored| stored.document_id == document.document_id);

        if let Some(stored) = existing {
            if stored.checksum == document.checksum {
                debug!(document_id = %document.document_id, "document unchanged, skipping");
                return Ok(InsertOutcome::Unchanged(stored.chunk_count));
            }
        }

        let replaced = state.remove(&document.document_id);
        let count = records.len();
        info!(
            document_id = %document.document_id,
            chunk_count = count,
            replaced,
            "indexed document"
        );
        state.documents.push(Document {
            chunk_count: count,
            ..document
        });
        state.records.extend(records);

        Ok(if replaced {
            InsertOutcome::Replaced(count)
        } else {
            InsertOutcome::Inserted(count)
        })
    }

    /// Scores every stored chunk against `text` and returns the best `k`.
    ///
    /// A query without any searchable word is reported as an embedding error,
    /// unless the store is empty, which always yields an empty list.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredResult>, SearchError> {
        let expected = self.dimensions();
        if expected == 0 {
            return Err(SearchError::Embedding(
                "embedder produces zero-dimension vectors".to_string(),
            ));
        }

        let vector = self.embedder.embed(text);
        if vector.len() != expected || vector.iter().any(|value| !value.is_finite()) {
            return Err(SearchError::Embedding(format!(
                "malformed query vector of length {}",
                vector.len()
            )));
        }

        let tokens = keyword_set(text);
        if tokens.is_empty() {
            if self.read()?.records.is_empty() {
                return Ok(Vec::new());
            }
            return Err(SearchError::Embedding(
                "query has no searchable terms".to_string(),
            ));
        }

        self.query_vector(&vector, &tokens, k)
    }

    /// Ranks stored chunks against a precomputed query vector and token set.
    ///
    /// Ties keep insertion order.
    pub fn query_vector(
        &self,
        vector: &[f32],
        tokens: &BTreeSet<String>,
        k: usize,
    ) -> Result<Vec<ScoredResult>, SearchError> {
        let expected = self.dimensions();
        if vector.len() != expected {
            return Err(SearchError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let state = self.read()?;
        if k == 0 || state.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = state
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let cosine = cosine_similarity(vector, &record.vector)?;
                let overlap = keyword_overlap(tokens, &record.tokens);
                Ok::<_, SearchError>((position, hybrid_score(cosine, overlap)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);

        debug!(
            candidates = state.records.len(),
            returned = scored.len(),
            "scored query"
        );

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let chunk = state.records[position].chunk.clone();
                ScoredResult {
                    document_id: chunk.document_id.clone(),
                    chunk,
                    score,
                }
            })
            .collect())
    }

    pub fn remove_document(&self, document_id: &str) -> Result<bool, SearchError> {
        let removed = self.write()?.remove(document_id);
        if removed {
            info!(document_id, "removed document");
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), SearchError> {
        let mut state = self.write()?;
        let documents = state.documents.len();
        state.documents.clear();
        state.records.clear();
        info!(documents, "cleared index");
        Ok(())
    }

    /// Distinct document ids in insertion order.
    pub fn list_documents(&self) -> Result<Vec<String>, SearchError> {
        Ok(self
            .read()?
            .documents
            .iter()
            .map(|document| document.document_id.clone())
            .collect())
    }

    pub fn documents(&self) -> Result<Vec<DocumentSummary>, SearchError> {
        Ok(self.read()?.documents.iter().map(DocumentSummary::from).collect())
    }

    pub fn document(&self, document_id: &str) -> Result<Option<Document>, SearchError> {
        Ok(self
            .read()?
            .documents
            .iter()
            .find(|document| document.document_id == document_id)
            .cloned())
    }

    pub fn stats(&self) -> Result<IndexStats, SearchError> {
        let state = self.read()?;
        Ok(IndexStats {
            documents: state.documents.len(),
            chunks: state.records.len(),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState>, SearchError> {
        self.state
            .read()
            .map_err(|error| SearchError::LockPoisoned(error.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState>, SearchError> {
        self.state
            .write()
            .map_err(|error| SearchError::LockPoisoned(error.to_string()))
    }
}

/// Cosine of the angle between `left` and `right`; 0 when either is the
/// zero vector.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f64, SearchError> {
    if left.len() != right.len() {
        return Err(SearchError::DimensionMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }

    let mut dot = 0f64;
    let mut left_norm = 0f64;
    let mut right_norm = 0f64;
    for (a, b) in left.iter().zip(right) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (left_norm.sqrt() * right_norm.sqrt()))
}

/// Shared tokens over the union of both sets (Jaccard); 0 for two empty sets.
pub fn keyword_overlap(query: &BTreeSet<String>, record: &BTreeSet<String>) -> f64 {
    let union = query.union(record).count();
    if union == 0 {
        return 0.0;
    }
    query.intersection(record).count() as f64 / union as f64
}

pub fn hybrid_score(cosine: f64, overlap: f64) -> f64 {
    (VECTOR_WEIGHT * cosine + KEYWORD_WEIGHT * overlap).clamp(0.0, 1.0)
}
