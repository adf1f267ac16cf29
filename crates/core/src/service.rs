use crate::chunking::build_chunks;
use crate::embeddings::{Embedder, HashedWordEmbedder};
use crate::index::{HybridIndex, InsertOutcome};
use crate::ingest::digest_bytes;
use crate::models::{
    Document, DocumentSummary, IndexStats, IngestionOptions, RetrievalOptions, ScoredResult,
};
use crate::{IngestError, SearchError};
use chrono::Utc;
use tracing::warn;

/// Owns one [`HybridIndex`] for the lifetime of the surrounding service.
///
/// Share it between request workers behind an `Arc`; every method takes
/// `&self`.
pub struct RetrievalService<E = HashedWordEmbedder> {
    index: HybridIndex<E>,
    ingestion: IngestionOptions,
    retrieval: RetrievalOptions,
}

impl Default for RetrievalService<HashedWordEmbedder> {
    fn default() -> Self {
        Self::new(IngestionOptions::default(), RetrievalOptions::default())
    }
}

impl RetrievalService<HashedWordEmbedder> {
    pub fn new(ingestion: IngestionOptions, retrieval: RetrievalOptions) -> Self {
        Self::with_embedder(HashedWordEmbedder::default(), ingestion, retrieval)
    }
}

impl<E> RetrievalService<E>
where
    E: Embedder,
{
    pub fn with_embedder(
        embedder: E,
        ingestion: IngestionOptions,
        retrieval: RetrievalOptions,
    ) -> Self {
        Self {
            index: HybridIndex::new(embedder),
            ingestion,
            retrieval,
        }
    }

    pub fn index(&self) -> &HybridIndex<E> {
        &self.index
    }

    /// Chunks, embeds and indexes one document, returning its chunk count.
    pub fn ingest(&self, document_id: &str, raw_text: &str) -> Result<usize, IngestError> {
        Ok(self.index_document(document_id, raw_text)?.chunk_count())
    }

    /// Like [`RetrievalService::ingest`], but reports whether an existing
    /// document with the same id was replaced or left unchanged.
    pub fn index_document(
        &self,
        document_id: &str,
        raw_text: &str,
    ) -> Result<InsertOutcome, IngestError> {
        let chunks = build_chunks(document_id, raw_text, &self.ingestion)?;
        let document = Document {
            document_id: document_id.to_string(),
            raw_text: raw_text.to_string(),
            checksum: digest_bytes(raw_text.as_bytes()),
            chunk_count: chunks.len(),
            uploaded_at: Utc::now(),
        };

        Ok(self.index.insert(document, chunks)?)
    }

    /// Ranked chunks for `query`. Failures are logged and produce an empty
    /// list so a chat turn can continue without sources.
    pub fn retrieve(&self, query: &str, top_k: Option<usize>) -> Vec<ScoredResult> {
        match self.try_retrieve(query, top_k) {
            Ok(results) => results,
            Err(error) => {
                warn!(%error, "retrieval degraded to empty result");
                Vec::new()
            }
        }
    }

    pub fn try_retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredResult>, SearchError> {
        let k = top_k.unwrap_or(self.retrieval.top_k);
        let mut results = self.index.query(query, k)?;
        results.retain(|result| result.score >= self.retrieval.min_score);
        Ok(results)
    }

    pub fn clear_all(&self) -> Result<(), SearchError> {
        self.index.clear()
    }

    pub fn list_document_ids(&self) -> Result<Vec<String>, SearchError> {
        self.index.list_documents()
    }

    pub fn remove_document(&self, document_id: &str) -> Result<bool, SearchError> {
        self.index.remove_document(document_id)
    }

    pub fn documents(&self) -> Result<Vec<DocumentSummary>, SearchError> {
        self.index.documents()
    }

    pub fn stats(&self) -> Result<IndexStats, SearchError> {
        self.index.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HANDBOOK: &str = "Railway schedule\n\nTrains to the coast leave every hour from platform 4.\n\n\
Delays are announced on the departure boards and by the station staff.";

    #[test]
    fn ingest_then_retrieve() -> Result<(), Box<dyn std::error::Error>> {
        let service = RetrievalService::default();
        let count = service.ingest("handbook.txt", HANDBOOK)?;
        service.ingest("menu.txt", "Soup of the day is tomato. Dessert is apple pie.")?;

        assert_eq!(count, 1);
        let results = service.retrieve("railway schedule platform", None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "handbook.txt");
        assert!(results[0].chunk_text().contains("platform 4"));
        assert!(results[0].score > results[1].score);
        Ok(())
    }

    #[test]
    fn empty_document_is_reported_and_not_indexed() -> Result<(), SearchError> {
        let service = RetrievalService::default();
        let result = service.ingest("empty.txt", " \n\n ");

        assert!(matches!(result, Err(IngestError::EmptyDocument { .. })));
        assert!(service.list_document_ids()?.is_empty());
        Ok(())
    }

    #[test]
    fn clear_all_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let service = RetrievalService::default();
        service.ingest("handbook.txt", HANDBOOK)?;

        service.clear_all()?;
        service.clear_all()?;

        assert!(service.list_document_ids()?.is_empty());
        assert!(service.retrieve("railway", None).is_empty());
        assert!(service.try_retrieve("railway", Some(3))?.is_empty());
        Ok(())
    }

    #[test]
    fn degenerate_query_yields_empty_result() -> Result<(), Box<dyn std::error::Error>> {
        let service = RetrievalService::default();
        service.ingest("handbook.txt", HANDBOOK)?;

        assert!(service.retrieve("", None).is_empty());
        assert!(service.retrieve("?!", Some(5)).is_empty());
        assert!(matches!(
            service.try_retrieve("", None),
            Err(SearchError::Embedding(_))
        ));
        Ok(())
    }

    #[test]
    fn top_k_defaults_to_options() -> Result<(), Box<dyn std::error::Error>> {
        let options = IngestionOptions {
            chunk_max_chars: 60,
            chunk_overlap_chars: 10,
        };
        let service = RetrievalService::new(options, RetrievalOptions::default());
        let text = (0..20)
            .map(|n| format!("Section {n} covers pump maintenance."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let count = service.ingest("pumps.md", &text)?;

        assert!(count > 5);
        assert_eq!(service.retrieve("pump", None).len(), 5);
        assert_eq!(service.retrieve("pump", Some(1_000)).len(), count);
        Ok(())
    }

    #[test]
    fn min_score_filters_weak_matches() -> Result<(), Box<dyn std::error::Error>> {
        let retrieval = RetrievalOptions {
            top_k: 5,
            min_score: 0.2,
        };
        let service = RetrievalService::new(IngestionOptions::default(), retrieval);
        service.ingest("handbook.txt", HANDBOOK)?;
        service.ingest("menu.txt", "Soup of the day is tomato.")?;

        let results = service.retrieve("railway schedule platform", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "handbook.txt");
        Ok(())
    }

    #[test]
    fn reingest_with_new_text_replaces_document() -> Result<(), Box<dyn std::error::Error>> {
        let service = RetrievalService::default();
        service.ingest("notes.txt", "old content about boilers")?;
        service.ingest("notes.txt", "new content about turbines")?;

        assert_eq!(
            service.index_document("notes.txt", "new content about turbines")?,
            InsertOutcome::Unchanged(1)
        );
        assert_eq!(
            service.index_document("notes.txt", "newer content about pumps")?,
            InsertOutcome::Replaced(1)
        );
        service.ingest("notes.txt", "new content about turbines")?;

        assert_eq!(service.list_document_ids()?, vec!["notes.txt"]);
        assert_eq!(service.stats()?, IndexStats { documents: 1, chunks: 1 });
        let results = service.retrieve("turbines", None);
        assert!(results[0].chunk_text().contains("turbines"));
        let stored = service.index().document("notes.txt")?.ok_or("document missing")?;
        assert_eq!(stored.raw_text, "new content about turbines");
        assert_eq!(stored.chunk_count, 1);
        Ok(())
    }

    #[test]
    fn concurrent_workers_share_one_service() -> Result<(), Box<dyn std::error::Error>> {
        let service = Arc::new(RetrievalService::default());

        let handles = (0..8)
            .map(|worker| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    let id = format!("upload-{worker}.txt");
                    let ingested = service.ingest(&id, HANDBOOK).is_ok();
                    let retrieved = service.retrieve("railway", Some(3)).len();
                    (ingested, retrieved)
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let (ingested, retrieved) = handle.join().map_err(|_| "worker panicked")?;
            assert!(ingested);
            assert!(retrieved >= 1);
        }
        assert_eq!(service.list_document_ids()?.len(), 8);
        Ok(())
    }
}
