//! # Legal RAG Pipeline Main Driver
//!
//! ## Purpose
//! Command-line entry point for processing extracted law code text into the
//! chunk store, pushing valid chunks into the vector store, and running ad
//! hoc retrieval queries.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, a directory of
//!   extracted `.txt` documents named after their law codes
//! - **Output**: Persisted chunk records, vector store upserts, query results
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Ingest documents through the chunking pipeline
//! 4. Optionally index valid chunks into the vector store
//! 5. Answer retrieval queries against the populated index

use clap::{Arg, ArgAction, Command};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use legal_rag_pipeline::{
    config::Config,
    embedding::{CachingEmbedder, Embedder, RemoteEmbedder},
    errors::{PipelineError, Result},
    indexer::ChunkIndexer,
    law::LawCode,
    pipeline::DocumentPipeline,
    retrieval::{references_summary, Retriever},
    storage::ChunkStore,
    utils::format_duration,
    vector_store::{HttpVectorStore, VectorStore},
    RawDocument,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("legal-rag")
        .version("0.1.0")
        .about("Hierarchical chunking and retrieval pipeline for Azerbaijani legal codes")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("ingest-dir")
                .long("ingest-dir")
                .value_name("DIR")
                .help("Process every extracted .txt law code in the directory"),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .help("Push valid chunks into the vector store after ingestion")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recreate")
                .long("recreate")
                .help("Drop the vector store collection and reprocess everything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("TEXT")
                .help("Run a retrieval query and print the cited sources"),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Run health checks and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let config = Config::from_file(config_path)?;

    init_logging(&config);
    info!("legal-rag starting, configuration from {}", config_path);

    if matches.get_flag("check-health") {
        return run_health_checks(&config).await;
    }

    let recreate = matches.get_flag("recreate");

    if let Some(dir) = matches.get_one::<String>("ingest-dir") {
        run_ingestion(&config, Path::new(dir), matches.get_flag("index"), recreate).await?;
    }

    if let Some(question) = matches.get_one::<String>("query") {
        run_query(&config, question).await?;
    }

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    if config.logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Read the extracted documents in a directory, mapping filenames to codes
fn load_documents(dir: &Path) -> Result<Vec<RawDocument>> {
    let mut documents = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match LawCode::from_filename(&file_name) {
            Some(law_code) => {
                let text = std::fs::read_to_string(&path)?;
                documents.push(RawDocument::new(law_code, text));
            }
            None => warn!(file = %file_name, "no law code mapping for file, skipping"),
        }
    }

    if documents.is_empty() {
        return Err(PipelineError::Config {
            message: format!("no ingestible .txt documents found in {:?}", dir),
        });
    }
    Ok(documents)
}

/// Process a directory of documents into the chunk store, optionally
/// indexing valid chunks into the vector store
async fn run_ingestion(config: &Config, dir: &Path, index: bool, recreate: bool) -> Result<()> {
    let started = Instant::now();
    let documents = load_documents(dir)?;
    info!(documents = documents.len(), "ingestion starting");

    if config.effective_workers() != num_cpus::get() {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_workers())
            .build_global()
            .ok();
    }

    // Cooperative cancellation between documents on Ctrl-C
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, finishing current documents");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    // The pipeline itself is pure CPU work; keep it off the async runtime
    let pipeline_config = config.clone();
    let report = tokio::task::spawn_blocking(move || {
        let pipeline = DocumentPipeline::new(&pipeline_config);
        pipeline.process_batch(&documents, &cancel)
    })
    .await
    .map_err(|e| PipelineError::Internal {
        message: format!("batch task panicked: {}", e),
    })?;

    info!(
        processed = report.stats.documents_processed,
        failed = report.stats.documents_failed,
        chunks = report.stats.chunks_produced,
        invalid = report.stats.invalid_chunks,
        "pipeline finished"
    );

    let store = ChunkStore::open(config.storage.clone())?;
    let mut persisted = Vec::new();
    for document in &report.documents {
        let unchanged = !recreate
            && config.pipeline.skip_unchanged
            && store.document_hash(document.law_code)?.as_deref()
                == Some(document.text_hash.as_str());
        if unchanged {
            info!(law_code = %document.law_code, "document unchanged, skipping");
            continue;
        }
        store.replace_law_chunks(document.law_code, &document.chunks)?;
        store.set_document_hash(document.law_code, &document.text_hash)?;
        persisted.push(document);
    }

    if index {
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(HttpVectorStore::new(config.vector_store.clone()));
        if recreate {
            vector_store.delete_collection().await?;
            info!("vector store collection dropped for rebuild");
        }

        let embedder: Arc<dyn Embedder> = Arc::new(CachingEmbedder::new(
            Arc::new(RemoteEmbedder::new(
                config.embedding.endpoint.clone(),
                config.embedding.clone(),
            )),
            config.embedding.cache_entries,
        ));
        let indexer = ChunkIndexer::new(
            embedder,
            vector_store,
            config.vector_store.upsert_batch_size,
        );

        for document in &persisted {
            let stats = indexer.index_chunks(&document.chunks).await?;
            info!(
                law_code = %document.law_code,
                indexed = stats.indexed,
                skipped_invalid = stats.skipped_invalid,
                "document indexed"
            );
        }
    }

    info!(
        elapsed = %format_duration(started.elapsed()),
        persisted = persisted.len(),
        "ingestion completed"
    );
    Ok(())
}

/// Run one retrieval query and print the cited sources
async fn run_query(config: &Config, question: &str) -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(
        config.embedding.endpoint.clone(),
        config.embedding.clone(),
    ));
    let store: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(config.vector_store.clone()));
    let retriever = Retriever::new(embedder, store, config.retrieval.top_k);

    let sources = retriever.retrieve(question).await?;
    if sources.is_empty() {
        println!("Bu sual üçün uyğun mənbə tapılmadı.");
        return Ok(());
    }

    for (rank, source) in sources.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} {}",
            rank + 1,
            source.relevance_score,
            source.law_name_az,
            source.citation.as_deref().unwrap_or("(maddə göstərilməyib)"),
        );
        if let Some(chapter) = &source.chapter {
            println!("   {}", chapter);
        }
        println!("   {}", source.content);
    }
    println!("\n{}", references_summary(&sources));
    Ok(())
}

/// Run comprehensive health checks
async fn run_health_checks(config: &Config) -> Result<()> {
    info!("running health checks");

    config.validate()?;
    info!("configuration is valid");

    let store = ChunkStore::open(config.storage.clone())?;
    store.health_check()?;
    let stats = store.stats()?;
    info!(chunks = stats.total_chunks, "chunk store is healthy");

    let vector_store = HttpVectorStore::new(config.vector_store.clone());
    match vector_store.health_check().await {
        Ok(()) => info!("vector store is reachable"),
        Err(e) => warn!(error = %e, "vector store is not reachable"),
    }

    info!("health checks finished");
    Ok(())
}
