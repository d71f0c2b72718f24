//! # Azerbaijani Legal RAG Pipeline
//!
//! ## Overview
//! This library converts noisy, hierarchically structured legal PDF text into
//! clean, context-preserving chunks for semantic retrieval, excluding
//! repealed provisions, and maps retrieved chunks back to citable article
//! references.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `pipeline`: per-document chunking workflow (normalize, detect
//!   invalidations, extract structure, build chunks) and the batch runner
//! - `reference`: citation recovery for retrieved chunks
//! - `embedding`: the opaque embedding capability behind a trait
//! - `vector_store`: the opaque vector store boundary with retry/backoff
//! - `indexer`: valid-chunk filtering, batching and upserting
//! - `retrieval`: query-time source assembly for the answer layer
//! - `storage`: local audit store for every produced chunk
//! - `law`: the fixed registry of supported law codes
//! - `config`: configuration management and settings
//! - `errors`: centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Extracted law code text (plain text per document)
//! - **Output**: Chunk records in the audit store; embedded records in the
//!   vector store; cited sources at query time
//!
//! ## Usage
//! ```rust,no_run
//! use legal_rag_pipeline::{Config, DocumentPipeline, LawCode, RawDocument};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let pipeline = DocumentPipeline::new(&config);
//!     let document = RawDocument {
//!         law_code: LawCode::Civil,
//!         text: std::fs::read_to_string("civil_law_code.txt")?,
//!     };
//!     let processed = pipeline.process(&document)?;
//!     println!("produced {} chunks", processed.chunks.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod embedding;
pub mod errors;
pub mod indexer;
pub mod law;
pub mod pipeline;
pub mod reference;
pub mod retrieval;
pub mod storage;
pub mod vector_store;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{PipelineError, Result};
pub use law::LawCode;
pub use pipeline::chunker::{ChunkType, LegalChunk};
pub use pipeline::{BatchReport, BatchStats, DocumentPipeline, ProcessedDocument};
pub use reference::ReferenceExtractor;

/// The full extracted text of one law code. Immutable input to the
/// pipeline; never mutated.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Which supported code this document is
    pub law_code: LawCode,
    /// Plain extracted text (PDF parsing happens upstream)
    pub text: String,
}

impl RawDocument {
    pub fn new(law_code: LawCode, text: impl Into<String>) -> Self {
        Self {
            law_code,
            text: text.into(),
        }
    }
}
