//! # Chunk Indexing Module
//!
//! ## Purpose
//! Pushes produced chunks into the vector store: filters out invalidated
//! chunks, embeds content in batches, and upserts records with stable ids.
//!
//! ## Input/Output Specification
//! - **Input**: Chunk records from the pipeline
//! - **Output**: Upserted vector records; indexing statistics
//!
//! Invalid chunks are dropped here, at the persistence boundary, never
//! inside the pipeline; the pipeline output stays fully auditable while the
//! live index only ever sees provisions still in force.

use crate::embedding::Embedder;
use crate::errors::{PipelineError, Result};
use crate::pipeline::chunker::LegalChunk;
use crate::utils::TextUtils;
use crate::vector_store::{VectorRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Indexing statistics for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub indexed: usize,
    pub skipped_invalid: usize,
    pub batches: usize,
}

/// Embeds and upserts chunks into the vector store
pub struct ChunkIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl ChunkIndexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size,
        }
    }

    /// Index every valid chunk. Invalid chunks are counted and skipped.
    pub async fn index_chunks(&self, chunks: &[LegalChunk]) -> Result<IndexStats> {
        let mut stats = IndexStats::default();

        let live: Vec<&LegalChunk> = chunks
            .iter()
            .filter(|chunk| {
                if chunk.is_valid {
                    true
                } else {
                    stats.skipped_invalid += 1;
                    false
                }
            })
            .collect();

        if live.is_empty() {
            tracing::info!(
                skipped_invalid = stats.skipped_invalid,
                "no valid chunks to index"
            );
            return Ok(stats);
        }

        for batch in live.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(PipelineError::EmbeddingFailed {
                    text_preview: TextUtils::truncate(&texts[0], 40),
                    reason: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorRecord {
                    id: chunk.id.to_string(),
                    content: chunk.content.clone(),
                    embedding,
                    metadata: chunk.metadata.clone(),
                })
                .collect();

            self.store.upsert(&records).await?;
            stats.indexed += records.len();
            stats.batches += 1;
            tracing::debug!(batch = stats.batches, records = records.len(), "batch upserted");
        }

        tracing::info!(
            indexed = stats.indexed,
            skipped_invalid = stats.skipped_invalid,
            batches = stats.batches,
            "indexing completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, InvalidationConfig};
    use crate::law::LawCode;
    use crate::pipeline::chunker::ChunkBuilder;
    use crate::pipeline::invalidation::InvalidationScanner;
    use crate::pipeline::normalize::TextNormalizer;
    use crate::pipeline::structure::StructureExtractor;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0_f32; 3]).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        upserted: Mutex<Vec<VectorRecord>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
            self.upserted.lock().extend_from_slice(records);
            Ok(())
        }

        async fn query(&self, _embedding: &[f32], _k: usize) -> Result<Vec<crate::vector_store::ScoredHit>> {
            Ok(Vec::new())
        }

        async fn delete_collection(&self) -> Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn chunks_for(text: &str) -> Vec<LegalChunk> {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(text);
        let spans = InvalidationScanner::new(&InvalidationConfig::default()).scan(&normalized);
        let tree = StructureExtractor::new()
            .extract(&normalized, LawCode::Family)
            .unwrap();
        ChunkBuilder::new(ChunkingConfig::default()).build(&tree, &normalized, &spans, LawCode::Family)
    }

    #[tokio::test]
    async fn invalid_chunks_are_filtered_at_the_boundary() {
        let chunks = chunks_for(
            "Maddə 1. Qüvvədə olan maddənin mətni burada.\n\nMaddə 2. [ləğv edilib]",
        );
        assert_eq!(chunks.len(), 2);

        let store = Arc::new(RecordingStore::default());
        let indexer = ChunkIndexer::new(Arc::new(StubEmbedder), store.clone(), 10);
        let stats = indexer.index_chunks(&chunks).await.unwrap();

        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.skipped_invalid, 1);
        let upserted = store.upserted.lock();
        assert_eq!(upserted.len(), 1);
        assert!(upserted[0].content.contains("Qüvvədə olan"));
    }

    #[tokio::test]
    async fn all_invalid_input_yields_zero_indexed_without_error() {
        let chunks = chunks_for("Maddə 1. [ləğv edilib]");
        let store = Arc::new(RecordingStore::default());
        let indexer = ChunkIndexer::new(Arc::new(StubEmbedder), store.clone(), 10);
        let stats = indexer.index_chunks(&chunks).await.unwrap();
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.skipped_invalid, 1);
        assert!(store.upserted.lock().is_empty());
    }

    #[tokio::test]
    async fn batching_respects_batch_size() {
        let text = (1..=5)
            .map(|i| format!("Maddə {}. Maddənin mətni burada yerləşir.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunks_for(&text);
        assert_eq!(chunks.len(), 5);

        let store = Arc::new(RecordingStore::default());
        let indexer = ChunkIndexer::new(Arc::new(StubEmbedder), store.clone(), 2);
        let stats = indexer.index_chunks(&chunks).await.unwrap();
        assert_eq!(stats.indexed, 5);
        assert_eq!(stats.batches, 3);
    }
}
