//! # Chunk Store Module
//!
//! ## Purpose
//! Local persistent store for every chunk the pipeline produces, valid and
//! invalid alike, so operators can audit what was flagged and why. The live
//! vector index is populated separately and only ever from valid chunks.
//!
//! ## Input/Output Specification
//! - **Input**: Chunk records and per-document fingerprints
//! - **Output**: Persisted records, retrieval by law code, rebuild support
//! - **Storage**: Sled embedded database, bincode-encoded, gzip-compressed
//!
//! Re-processing a law code is a full rebuild: its chunks are deleted before
//! the new set is stored.

use crate::config::StorageConfig;
use crate::errors::{PipelineError, Result};
use crate::law::LawCode;
use crate::pipeline::chunker::LegalChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_chunks: usize,
    pub database_size_bytes: u64,
}

/// Persistent store for produced chunks and document fingerprints
pub struct ChunkStore {
    config: StorageConfig,
    db: Arc<sled::Db>,
    chunks: Arc<sled::Tree>,
    documents: Arc<sled::Tree>,
}

impl ChunkStore {
    /// Open (or create) the store at the configured path
    pub fn open(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(&config.db_path).map_err(|e| PipelineError::Storage {
            location: config.db_path.to_string_lossy().to_string(),
            details: e.to_string(),
        })?;
        let chunks = db.open_tree("chunks")?;
        let documents = db.open_tree("documents")?;

        let store = Self {
            config,
            db: Arc::new(db),
            chunks: Arc::new(chunks),
            documents: Arc::new(documents),
        };

        tracing::info!(chunks = store.chunks.len(), "chunk store opened");
        Ok(store)
    }

    fn chunk_key(law_code: LawCode, id: &uuid::Uuid) -> Vec<u8> {
        format!("{}/{}", law_code.as_str(), id).into_bytes()
    }

    /// Replace a law code's chunks with a freshly produced set
    pub fn replace_law_chunks(&self, law_code: LawCode, chunks: &[LegalChunk]) -> Result<usize> {
        let removed = self.delete_law(law_code)?;
        if removed > 0 {
            tracing::debug!(law_code = %law_code, removed, "cleared previous chunks");
        }

        for chunk in chunks {
            let encoded = bincode::serialize(chunk)?;
            let data = if self.config.enable_compression {
                compress(&encoded)?
            } else {
                encoded
            };
            self.chunks.insert(Self::chunk_key(law_code, &chunk.id), data)?;
        }

        self.db.flush().map_err(|e| PipelineError::Storage {
            location: "flush".to_string(),
            details: e.to_string(),
        })?;

        tracing::info!(law_code = %law_code, stored = chunks.len(), "chunks stored");
        Ok(chunks.len())
    }

    /// All stored chunks for a law code, in key order
    pub fn chunks_for_law(&self, law_code: LawCode) -> Result<Vec<LegalChunk>> {
        let prefix = format!("{}/", law_code.as_str());
        let mut result = Vec::new();

        for entry in self.chunks.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            result.push(self.decode_chunk(&value)?);
        }

        Ok(result)
    }

    /// Delete every chunk belonging to a law code
    pub fn delete_law(&self, law_code: LawCode) -> Result<usize> {
        let prefix = format!("{}/", law_code.as_str());
        let keys: Vec<_> = self
            .chunks
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<std::result::Result<_, _>>()?;

        for key in &keys {
            self.chunks.remove(key)?;
        }
        Ok(keys.len())
    }

    /// Stored fingerprint of a document's normalized text
    pub fn document_hash(&self, law_code: LawCode) -> Result<Option<String>> {
        Ok(self
            .documents
            .get(law_code.as_str().as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).to_string()))
    }

    /// Record a document fingerprint after successful processing
    pub fn set_document_hash(&self, law_code: LawCode, hash: &str) -> Result<()> {
        self.documents
            .insert(law_code.as_str().as_bytes(), hash.as_bytes())?;
        Ok(())
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_chunks: self.chunks.len(),
            database_size_bytes: self.db.size_on_disk().map_err(|e| PipelineError::Storage {
                location: "size_on_disk".to_string(),
                details: e.to_string(),
            })?,
        })
    }

    /// Health check: exercise a write/read/delete round trip
    pub fn health_check(&self) -> Result<()> {
        let key = b"__health_check";
        self.chunks.insert(key, b"ok")?;
        let read = self.chunks.get(key)?;
        self.chunks.remove(key)?;

        if read.is_none() {
            return Err(PipelineError::Storage {
                location: self.config.db_path.to_string_lossy().to_string(),
                details: "health check value not found".to_string(),
            });
        }
        Ok(())
    }

    fn decode_chunk(&self, data: &[u8]) -> Result<LegalChunk> {
        let decoded = if self.config.enable_compression {
            decompress(data)?
        } else {
            data.to_vec()
        };
        Ok(bincode::deserialize(&decoded)?)
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).map_err(|e| PipelineError::Storage {
        location: "compress".to_string(),
        details: e.to_string(),
    })?;
    encoder.finish().map_err(|e| PipelineError::Storage {
        location: "compress".to_string(),
        details: e.to_string(),
    })
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PipelineError::Storage {
            location: "decompress".to_string(),
            details: e.to_string(),
        })?;
    Ok(decompressed)
}
