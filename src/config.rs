//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the legal RAG pipeline, supporting TOML files
//! with environment variable overrides, validation, and typed defaults.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (`LEGAL_RAG_*`)
//! 2. Configuration files
//! 3. Default values
//!
//! ## Usage
//! ```rust,ignore
//! use legal_rag_pipeline::config::Config;
//!
//! let config = Config::from_file("config.toml")?;
//! println!("target chunk size: {}", config.chunking.target_chunk_size);
//! ```

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-document pipeline and batch settings
    pub pipeline: PipelineConfig,
    /// Chunk construction settings
    pub chunking: ChunkingConfig,
    /// Invalidation detection thresholds
    pub invalidation: InvalidationConfig,
    /// Embedding backend settings
    pub embedding: EmbeddingConfig,
    /// Vector store boundary settings
    pub vector_store: VectorStoreConfig,
    /// Local audit store settings
    pub storage: StorageConfig,
    /// Query-time retrieval settings
    pub retrieval: RetrievalConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads for parallel document processing (0 = all cores)
    pub worker_threads: usize,
    /// Skip documents whose normalized text hash is unchanged
    pub skip_unchanged: bool,
}

/// Chunk construction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub target_chunk_size: usize,
    /// Overlap carried into continuation chunks, in characters
    pub chunk_overlap: usize,
    /// Minimum viable chunk size; smaller sibling spans are merged
    pub min_chunk_size: usize,
}

/// Invalidation detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvalidationConfig {
    /// Minimum run length of box-drawing characters treated as a strike
    pub line_run_threshold: usize,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding service endpoint
    pub endpoint: String,
    /// Model identifier handed to the embedding backend
    pub model: String,
    /// Expected embedding dimension
    pub dimension: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum entries held by the in-memory embedding cache
    pub cache_entries: usize,
}

/// Vector store boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// REST endpoint base URL
    pub base_url: String,
    /// Collection name
    pub collection: String,
    /// API key, if the store requires one
    pub api_key: Option<String>,
    /// Records per upsert request
    pub upsert_batch_size: usize,
    /// Retry attempts for transient failures
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds (doubled per attempt)
    pub retry_delay_ms: u64,
}

/// Local audit store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path
    pub db_path: PathBuf,
    /// Enable gzip compression of chunk content
    pub enable_compression: bool,
}

/// Query-time retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of hits retrieved per question
    pub top_k: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| PipelineError::Config {
            message: format!("failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("LEGAL_RAG_VECTOR_STORE_URL") {
            self.vector_store.base_url = url;
        }
        if let Ok(key) = std::env::var("LEGAL_RAG_VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Ok(collection) = std::env::var("LEGAL_RAG_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Ok(db_path) = std::env::var("LEGAL_RAG_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(size) = std::env::var("LEGAL_RAG_CHUNK_SIZE") {
            self.chunking.target_chunk_size =
                size.parse().map_err(|_| PipelineError::Config {
                    message: "invalid number in LEGAL_RAG_CHUNK_SIZE".to_string(),
                })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_chunk_size == 0 {
            return Err(PipelineError::ValidationFailed {
                field: "chunking.target_chunk_size".to_string(),
                reason: "target chunk size must be greater than zero".to_string(),
            });
        }

        if self.chunking.chunk_overlap >= self.chunking.target_chunk_size {
            return Err(PipelineError::ValidationFailed {
                field: "chunking.chunk_overlap".to_string(),
                reason: "overlap must be smaller than the target chunk size".to_string(),
            });
        }

        if self.chunking.min_chunk_size > self.chunking.target_chunk_size {
            return Err(PipelineError::ValidationFailed {
                field: "chunking.min_chunk_size".to_string(),
                reason: "minimum chunk size cannot exceed the target chunk size".to_string(),
            });
        }

        if self.invalidation.line_run_threshold == 0 {
            return Err(PipelineError::ValidationFailed {
                field: "invalidation.line_run_threshold".to_string(),
                reason: "line run threshold must be at least 1".to_string(),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(PipelineError::ValidationFailed {
                field: "embedding.dimension".to_string(),
                reason: "embedding dimension must be greater than zero".to_string(),
            });
        }

        if self.vector_store.upsert_batch_size == 0 {
            return Err(PipelineError::ValidationFailed {
                field: "vector_store.upsert_batch_size".to_string(),
                reason: "upsert batch size must be greater than zero".to_string(),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(PipelineError::ValidationFailed {
                field: "retrieval.top_k".to_string(),
                reason: "top_k must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config {
            message: format!("failed to serialize config to TOML: {}", e),
        })
    }

    /// Effective worker thread count for the batch runner
    pub fn effective_workers(&self) -> usize {
        if self.pipeline.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.pipeline.worker_threads
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            chunking: ChunkingConfig::default(),
            invalidation: InvalidationConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            storage: StorageConfig::default(),
            retrieval: RetrievalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            skip_unchanged: true,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: 800,
            chunk_overlap: 100,
            min_chunk_size: 50,
        }
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            line_run_threshold: 3,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8501".to_string(),
            model: "intfloat/multilingual-e5-large".to_string(),
            dimension: 1024,
            batch_size: 32,
            cache_entries: 10_000,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            collection: "legal_rag".to_string(),
            api_key: None,
            upsert_batch_size: 50,
            retry_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/chunks.db"),
            enable_compression: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.target_chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn rejects_overlap_larger_than_target() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 900;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { ref field, .. }
            if field == "chunking.chunk_overlap"));
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            target_chunk_size = 600

            [vector_store]
            collection = "test"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.target_chunk_size, 600);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.vector_store.collection, "test");
    }

    #[test]
    fn serializes_round_trip() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.chunking.min_chunk_size, config.chunking.min_chunk_size);
    }
}
