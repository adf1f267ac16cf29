use crate::embeddings::Embedder;
use crate::extractor::{extract_text, is_supported};
use crate::index::InsertOutcome;
use crate::service::RetrievalService;
use crate::IngestError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Expands folders into the supported files beneath them; plain file paths
/// are kept as given so unsupported ones surface as skipped.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|input| {
            if input.is_dir() {
                discover_documents(input)
            } else {
                vec![input.clone()]
            }
        })
        .collect()
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn document_id_for(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub document_id: String,
    pub path: PathBuf,
    pub outcome: InsertOutcome,
}

impl IndexedDocument {
    pub fn chunks(&self) -> usize {
        self.outcome.chunk_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub indexed: Vec<IndexedDocument>,
    pub skipped: Vec<SkippedDocument>,
    claimed: BTreeMap<String, PathBuf>,
}

impl IngestionReport {
    /// Reserves the document id of `path` for this batch.
    ///
    /// Returns `false` and records the path as skipped when an earlier path
    /// already claimed the same id. Paths without a usable file name are let
    /// through so ingesting them reports the real error.
    pub fn claim(&mut self, path: &Path) -> bool {
        let Ok(document_id) = document_id_for(path) else {
            return true;
        };

        if let Some(first) = self.claimed.get(&document_id) {
            let error = IngestError::DuplicateDocumentId {
                first: first.display().to_string(),
                document_id,
            };
            self.record(path.to_path_buf(), Err(error));
            return false;
        }

        self.claimed.insert(document_id, path.to_path_buf());
        true
    }

    pub fn record(&mut self, path: PathBuf, outcome: Result<IndexedDocument, IngestError>) {
        match outcome {
            Ok(document) => self.indexed.push(document),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped document");
                self.skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.indexed.iter().map(IndexedDocument::chunks).sum()
    }
}

impl<E> RetrievalService<E>
where
    E: Embedder,
{
    /// Reads, extracts and ingests one file under its file name.
    pub fn ingest_file(&self, path: &Path) -> Result<IndexedDocument, IngestError> {
        let document_id = document_id_for(path)?;
        let bytes = fs::read(path)?;
        let text = extract_text(&document_id, &bytes)?;
        let outcome = self.index_document(&document_id, &text)?;
        Ok(IndexedDocument {
            document_id,
            path: path.to_path_buf(),
            outcome,
        })
    }

    /// Ingests every path independently; a failing file lands in
    /// `skipped` and the rest still get indexed. The first path to use a
    /// document id wins, later ones with the same file name are skipped.
    pub fn ingest_paths(&self, paths: &[PathBuf]) -> IngestionReport {
        let mut report = IngestionReport::default();
        for path in paths {
            if report.claim(path) {
                report.record(path.clone(), self.ingest_file(path));
            }
        }
        report
    }
}
