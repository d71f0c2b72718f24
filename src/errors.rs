//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the legal RAG pipeline, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from pipeline stages and external boundaries
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Document, Structure, Configuration, Storage, Embedding, VectorStore
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Per-document fatal errors kept distinct from batch-fatal errors
//! - Recoverability classification driving retry at the collaborator boundary
//! - Structured logging integration

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for the legal RAG pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Zero-length input document. Fatal for that document only.
    #[error("empty document for law code '{law_code}'")]
    EmptyDocument { law_code: String },

    /// A non-empty document with no article-level markers cannot be chunked
    /// meaningfully. Fatal for that document only; callers skip and log.
    #[error("no article markers found in document for law code '{law_code}' ({text_len} chars)")]
    MalformedStructure { law_code: String, text_len: usize },

    /// Unknown or unsupported law code identifier
    #[error("unsupported law code: '{value}'")]
    UnknownLawCode { value: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Chunk store errors
    #[error("chunk store error at {location}: {details}")]
    Storage { location: String, details: String },

    /// Embedding backend errors
    #[error("embedding failed for {text_preview}: {reason}")]
    EmbeddingFailed { text_preview: String, reason: String },

    /// Embedding dimension did not match the configured index dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store request errors
    #[error("vector store error ({operation}): {details}")]
    VectorStore { operation: String, details: String },

    /// Network-level errors talking to external collaborators
    #[error("network error: {details}")]
    Network { details: String },

    /// Batch job was cancelled between documents
    #[error("ingestion cancelled after {documents_done} documents")]
    Cancelled { documents_done: usize },

    /// Serialization/deserialization errors
    #[error("serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal system errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Check if the error is recoverable (worth retrying at the boundary)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Network { .. } | PipelineError::VectorStore { .. }
        )
    }

    /// Whether the error condemns a single document rather than the batch
    pub fn is_document_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyDocument { .. } | PipelineError::MalformedStructure { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::EmptyDocument { .. }
            | PipelineError::MalformedStructure { .. }
            | PipelineError::UnknownLawCode { .. } => "document",
            PipelineError::Config { .. } | PipelineError::ValidationFailed { .. } => {
                "configuration"
            }
            PipelineError::Storage { .. } | PipelineError::SerializationFailed { .. } => "storage",
            PipelineError::EmbeddingFailed { .. } | PipelineError::DimensionMismatch { .. } => {
                "embedding"
            }
            PipelineError::VectorStore { .. } | PipelineError::Network { .. } => "vector_store",
            PipelineError::Cancelled { .. } => "batch",
            PipelineError::Io(_) | PipelineError::Toml(_) | PipelineError::Internal { .. } => {
                "generic"
            }
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Network {
            details: err.to_string(),
        }
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationFailed {
            message: format!("binary serialization error: {}", err),
        }
    }
}

impl From<sled::Error> for PipelineError {
    fn from(err: sled::Error) -> Self {
        PipelineError::Storage {
            location: "sled".to_string(),
            details: err.to_string(),
        }
    }
}
