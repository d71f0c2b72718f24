//! # Vector Store Module
//!
//! ## Purpose
//! The opaque vector store boundary: an `upsert`/`query` trait plus an HTTP
//! implementation for a remote collection-based store.
//!
//! ## Input/Output Specification
//! - **Input**: `(id, content, embedding, metadata)` records; query vectors
//! - **Output**: Ranked hits with distances
//!
//! ## Key Features
//! - Stable record ids make re-upserts idempotent
//! - Transient failures (timeouts, 429, 5xx) retried with exponential
//!   backoff; client errors surface immediately
//! - The retry lives here at the collaborator boundary, never in the core
//!   pipeline

use crate::config::VectorStoreConfig;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One record persisted to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

/// One ranked hit returned by a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// Cosine distance; smaller is closer
    pub distance: f32,
}

/// Opaque vector store capability
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Nearest neighbors for a query vector
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredHit>>;

    /// Drop the whole collection (full rebuild)
    async fn delete_collection(&self) -> Result<()>;

    /// Cheap connectivity probe
    async fn health_check(&self) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    records: &'a [VectorRecord],
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    embedding: &'a [f32],
    k: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    hits: Vec<ScoredHit>,
}

/// HTTP client for a remote collection-based vector store
pub struct HttpVectorStore {
    client: reqwest::Client,
    config: VectorStoreConfig,
}

impl HttpVectorStore {
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/collections/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.collection
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    /// Send a request with exponential backoff on recoverable failures.
    /// The factory builds a fresh request per attempt.
    async fn send_with_retry(
        &self,
        operation: &str,
        accept_not_found: bool,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut attempt = 0u32;

        loop {
            let error = match build().send().await {
                Ok(response) => {
                    if accept_not_found && response.status().as_u16() == 404 {
                        return Ok(response);
                    }
                    match Self::check_status(operation, response.status()) {
                        Ok(()) => return Ok(response),
                        Err(e) => e,
                    }
                }
                Err(e) => e.into(),
            };

            if error.is_recoverable() && attempt < self.config.retry_attempts {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    error = %error,
                    "retrying vector store operation"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            } else {
                return Err(error);
            }
        }
    }

    fn check_status(operation: &str, status: reqwest::StatusCode) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PipelineError::VectorStore {
                operation: operation.to_string(),
                details: format!("transient status {}", status),
            });
        }
        Err(PipelineError::Internal {
            message: format!("vector store '{}' rejected request: {}", operation, status),
        })
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let url = format!("{}/upsert", self.collection_url());
        self.send_with_retry("upsert", false, || {
            self.request(self.client.post(&url))
                .json(&UpsertRequest { records })
        })
        .await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredHit>> {
        let url = format!("{}/query", self.collection_url());
        let response = self
            .send_with_retry("query", false, || {
                self.request(self.client.post(&url))
                    .json(&QueryRequest { embedding, k })
            })
            .await?;
        let parsed: QueryResponse = response.json().await?;
        Ok(parsed.hits)
    }

    async fn delete_collection(&self) -> Result<()> {
        let url = self.collection_url();
        self.send_with_retry("delete_collection", true, || {
            self.request(self.client.delete(&url))
        })
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .request(self.client.get(self.collection_url()))
            .send()
            .await?;
        Self::check_status("health_check", response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> VectorStoreConfig {
        VectorStoreConfig {
            base_url,
            collection: "legal_rag".to_string(),
            api_key: Some("test-key".to_string()),
            upsert_batch_size: 50,
            retry_attempts: 2,
            retry_delay_ms: 1,
        }
    }

    fn record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            content: "Maddə 1. Mətn.".to_string(),
            embedding: vec![0.1, 0.2],
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_posts_records_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/legal_rag/upsert"))
            .and(body_partial_json(serde_json::json!({
                "records": [{"id": "chunk-1"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(config(server.uri()));
        store.upsert(&[record("chunk-1")]).await.unwrap();
    }

    #[tokio::test]
    async fn query_parses_ranked_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/legal_rag/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hits": [
                    {"id": "a", "content": "Maddə 3. Mətn", "metadata": {"law_code": "civil"}, "distance": 0.12},
                    {"id": "b", "content": "Maddə 4. Mətn", "metadata": {}, "distance": 0.4}
                ]
            })))
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(config(server.uri()));
        let hits = store.query(&[0.1, 0.2], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].metadata.get("law_code").unwrap(), "civil");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/legal_rag/upsert"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/legal_rag/upsert"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(config(server.uri()));
        store.upsert(&[record("chunk-1")]).await.unwrap();
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/legal_rag/upsert"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(config(server.uri()));
        let err = store.upsert(&[record("chunk-1")]).await.unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn missing_collection_delete_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/collections/legal_rag"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(config(server.uri()));
        store.delete_collection().await.unwrap();
    }
}
