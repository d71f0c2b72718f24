//! # Embedding Module
//!
//! ## Purpose
//! The opaque `embed(text) -> vector` capability, injected into indexing and
//! retrieval rather than reached as ambient global state.
//!
//! ## Input/Output Specification
//! - **Input**: Batches of chunk or query text
//! - **Output**: Dense vectors of the configured dimension
//!
//! ## Key Features
//! - `Embedder` trait so backends stay swappable and testable
//! - HTTP-backed implementation for a remote embedding service
//! - Content-hash-keyed in-memory cache wrapper

use crate::config::EmbeddingConfig;
use crate::errors::{PipelineError, Result};
use crate::utils::TextUtils;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque embedding capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output vector dimension
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| PipelineError::EmbeddingFailed {
            text_preview: TextUtils::truncate(text, 40),
            reason: "backend returned no vectors".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by a remote embedding service speaking a plain
/// JSON `POST /embed` protocol
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    config: EmbeddingConfig,
}

impl RemoteEmbedder {
    pub fn new(endpoint: impl Into<String>, config: EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            config,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let request = EmbedRequest {
                model: &self.config.model,
                texts: batch,
            };
            let response = self
                .client
                .post(format!("{}/embed", self.endpoint))
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PipelineError::EmbeddingFailed {
                    text_preview: TextUtils::truncate(&batch[0], 40),
                    reason: format!("embedding service returned {}", response.status()),
                });
            }

            let parsed: EmbedResponse = response.json().await?;
            if parsed.embeddings.len() != batch.len() {
                return Err(PipelineError::EmbeddingFailed {
                    text_preview: TextUtils::truncate(&batch[0], 40),
                    reason: format!(
                        "expected {} vectors, got {}",
                        batch.len(),
                        parsed.embeddings.len()
                    ),
                });
            }
            for vector in &parsed.embeddings {
                if vector.len() != self.config.dimension {
                    return Err(PipelineError::DimensionMismatch {
                        expected: self.config.dimension,
                        actual: vector.len(),
                    });
                }
            }
            vectors.extend(parsed.embeddings);
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Content-hash-keyed cache wrapped around any embedder. Re-ingestion runs
/// embed mostly unchanged text; the cache keeps those calls local.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: DashMap<String, Vec<f32>>,
    max_entries: usize,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_entries: usize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            max_entries,
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| TextUtils::text_hash(t)).collect();

        let mut results: Vec<Option<Vec<f32>>> = keys
            .iter()
            .map(|key| self.cache.get(key).map(|entry| entry.value().clone()))
            .collect();

        let misses: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.inner.embed_batch(&miss_texts).await?;

            for (&index, vector) in misses.iter().zip(vectors.into_iter()) {
                if self.cache.len() < self.max_entries {
                    self.cache.insert(keys[index].clone(), vector.clone());
                }
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts backend calls; embeds every text as a constant vector
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.5_f32; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn cache_avoids_repeat_backend_calls() {
        let backend = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachingEmbedder::new(backend.clone(), 100);

        let texts = vec!["Maddə 1".to_string(), "Maddə 2".to_string()];
        cached.embed_batch(&texts).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

        // Second call is fully served from cache
        let vectors = cached.embed_batch(&texts).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(vectors.len(), 2);
        assert_eq!(cached.cache_size(), 2);
    }

    #[tokio::test]
    async fn cache_handles_partial_hits() {
        let backend = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachingEmbedder::new(backend.clone(), 100);

        cached.embed_batch(&["a".to_string()]).await.unwrap();
        let vectors = cached
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_embed_delegates_to_batch() {
        let backend = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let vector = backend.embed("sorğu mətni").await.unwrap();
        assert_eq!(vector.len(), 4);
    }
}
