use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_retrieval_core::{
    build_chunks, collect_inputs, document_id_for, extract_text, IngestionOptions,
    IngestionReport, RetrievalOptions, RetrievalService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum characters per chunk, overlap included.
    #[arg(long, env = "DOC_RETRIEVAL_CHUNK_MAX_CHARS", default_value = "1000")]
    chunk_max_chars: usize,

    /// Characters carried from the end of one chunk into the next.
    #[arg(long, env = "DOC_RETRIEVAL_CHUNK_OVERLAP_CHARS", default_value = "200")]
    chunk_overlap_chars: usize,

    /// Results scoring below this are dropped.
    #[arg(long, env = "DOC_RETRIEVAL_MIN_SCORE", default_value = "0.0")]
    min_score: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files or folders and return the best matching chunks.
    Search {
        /// Files or folders (searched recursively) to ingest.
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Search query.
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, env = "DOC_RETRIEVAL_TOP_K", default_value = "5")]
        top_k: usize,
        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Ingest files or folders and list the indexed documents.
    Documents {
        /// Files or folders (searched recursively) to ingest.
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Show how one file is split into chunks.
    Chunks {
        /// File to chunk.
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "doc-retrieval boot"
    );

    let ingestion = IngestionOptions {
        chunk_max_chars: cli.chunk_max_chars,
        chunk_overlap_chars: cli.chunk_overlap_chars,
    };

    match cli.command {
        Command::Search {
            input,
            query,
            top_k,
            json,
        } => {
            let retrieval = RetrievalOptions {
                top_k,
                min_score: cli.min_score,
            };
            let service = Arc::new(RetrievalService::new(ingestion, retrieval));
            let report = ingest_concurrently(&service, collect_inputs(&input)).await?;
            report_skipped(&report);

            let results = service.retrieve(&query, None);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            println!("query: {query}");
            if results.is_empty() {
                println!("no relevant context found");
            }
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "[{}] score={:.4} document_id={} chunk={}",
                    rank + 1,
                    result.score,
                    result.document_id,
                    result.chunk.chunk_index
                );
                println!("  chunk_text:\n{}", result.chunk_text());
            }
        }
        Command::Documents { input } => {
            let service = Arc::new(RetrievalService::new(ingestion, RetrievalOptions::default()));
            let report = ingest_concurrently(&service, collect_inputs(&input)).await?;
            report_skipped(&report);

            let stats = service.stats()?;
            println!(
                "total_documents={} total_chunks={}",
                stats.documents, stats.chunks
            );
            for document in service.documents()? {
                println!(
                    "{} chunks={} sha256={} uploaded_at={}",
                    document.document_id,
                    document.chunk_count,
                    document.checksum,
                    document.uploaded_at.to_rfc3339()
                );
            }
        }
        Command::Chunks { input } => {
            let document_id = document_id_for(&input)?;
            let bytes = std::fs::read(&input)?;
            let text = extract_text(&document_id, &bytes)?;

            for chunk in build_chunks(&document_id, &text, &ingestion)? {
                println!(
                    "[{}] chars={}..{} overlap={}",
                    chunk.chunk_index, chunk.start_char, chunk.end_char, chunk.overlap_chars
                );
                println!("{}", chunk.text);
            }
        }
    }

    Ok(())
}

/// Runs one blocking ingest task per file against the shared service, the
/// way an upload handler would for each file in a multi-file request.
///
/// Document ids are claimed up front so a repeated file name is skipped
/// rather than racing the first one; results are recorded in input order.
async fn ingest_concurrently(
    service: &Arc<RetrievalService>,
    paths: Vec<PathBuf>,
) -> anyhow::Result<IngestionReport> {
    let mut report = IngestionReport::default();
    let mut tasks = JoinSet::new();
    for (position, path) in paths.into_iter().enumerate() {
        if !report.claim(&path) {
            continue;
        }
        let service = Arc::clone(service);
        tasks.spawn_blocking(move || {
            let outcome = service.ingest_file(&path);
            (position, path, outcome)
        });
    }

    let mut finished = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        finished.push(joined?);
    }
    finished.sort_by_key(|(position, _, _)| *position);
    for (_, path, outcome) in finished {
        report.record(path, outcome);
    }

    info!(
        documents = report.indexed.len(),
        chunk_count = report.total_chunks(),
        "ingestion finished"
    );
    Ok(report)
}

fn report_skipped(report: &IngestionReport) {
    if report.skipped.is_empty() {
        return;
    }

    warn!(skipped_files = report.skipped.len(), "some files were not indexed");
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
}
