//! # Retrieval Module
//!
//! ## Purpose
//! Query-time assembly: embeds the question, queries the vector store, and
//! maps every hit to a citable source for the answer layer.
//!
//! ## Input/Output Specification
//! - **Input**: Natural-language question
//! - **Output**: Ranked sources with citation, content, law code and chapter
//!
//! An absent citation degrades gracefully: the source still carries its law
//! code and chapter, and the summary line reports that no article reference
//! was found. An article number is never fabricated.

use crate::embedding::Embedder;
use crate::errors::Result;
use crate::reference::ReferenceExtractor;
use crate::vector_store::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One retrieved source prepared for answer assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSource {
    /// Canonical citation, e.g. "Maddə 127.1", when one could be recovered
    pub citation: Option<String>,
    pub content: String,
    pub law_code: String,
    pub law_name_az: String,
    pub chapter: Option<String>,
    /// `1 - distance`; larger is more relevant
    pub relevance_score: f32,
}

/// Semantic retriever over the vector store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reference: ReferenceExtractor,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            reference: ReferenceExtractor::new(),
            top_k,
        }
    }

    /// Retrieve the top sources for a question, most relevant first
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedSource>> {
        let embedding = self.embedder.embed(question).await?;
        let hits = self.store.query(&embedding, self.top_k).await?;

        let mut sources: Vec<RetrievedSource> = hits
            .into_iter()
            .map(|hit| {
                let citation = self.reference.extract(&hit.content, &hit.metadata);
                RetrievedSource {
                    citation,
                    law_code: hit
                        .metadata
                        .get("law_code")
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    law_name_az: hit.metadata.get("law_name_az").cloned().unwrap_or_default(),
                    chapter: hit.metadata.get("chapter").cloned(),
                    relevance_score: 1.0 - hit.distance,
                    content: hit.content,
                }
            })
            .collect();

        sources.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            question = %crate::utils::TextUtils::truncate(question, 60),
            sources = sources.len(),
            cited = sources.iter().filter(|s| s.citation.is_some()).count(),
            "retrieval completed"
        );

        Ok(sources)
    }
}

/// Deduplicated references line for the answer footer
pub fn references_summary(sources: &[RetrievedSource]) -> String {
    let mut refs: Vec<String> = sources
        .iter()
        .filter_map(|s| {
            s.citation
                .as_ref()
                .map(|citation| format!("{} - {}", s.law_name_az, citation))
        })
        .collect();
    refs.sort();
    refs.dedup();

    if refs.is_empty() {
        "Maddə referansları tapılmadı".to_string()
    } else {
        format!("İstifadə olunan mənbələr: {}", refs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{ScoredHit, VectorRecord};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0_f32; 2]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct FixedStore {
        hits: Vec<ScoredHit>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _embedding: &[f32], _k: usize) -> Result<Vec<ScoredHit>> {
            Ok(self.hits.clone())
        }

        async fn delete_collection(&self) -> Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn hit(content: &str, metadata: &[(&str, &str)], distance: f32) -> ScoredHit {
        ScoredHit {
            id: "x".to_string(),
            content: content.to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            distance,
        }
    }

    #[tokio::test]
    async fn maps_hits_to_cited_sources_in_relevance_order() {
        let store = FixedStore {
            hits: vec![
                hit(
                    "Nikah yaşına çatmış şəxslər arasında bağlanır.",
                    &[
                        ("law_code", "family"),
                        ("law_name_az", "Ailə Məcəlləsi"),
                        ("article_reference", "Maddə 10"),
                        ("chapter", "Fəsil III"),
                    ],
                    0.4,
                ),
                hit(
                    "Maddə 155.2 əmək müqaviləsinin şərtlərini müəyyən edir.",
                    &[("law_code", "labor"), ("law_name_az", "Əmək Məcəlləsi")],
                    0.1,
                ),
            ],
        };
        let retriever = Retriever::new(Arc::new(StubEmbedder), Arc::new(store), 5);
        let sources = retriever.retrieve("əmək müqaviləsi").await.unwrap();

        assert_eq!(sources.len(), 2);
        // Closest hit first
        assert_eq!(sources[0].law_code, "labor");
        assert_eq!(sources[0].citation.as_deref(), Some("Maddə 155.2"));
        assert_eq!(sources[1].citation.as_deref(), Some("Maddə 10"));
        assert_eq!(sources[1].chapter.as_deref(), Some("Fəsil III"));
        assert!(sources[0].relevance_score > sources[1].relevance_score);
    }

    #[tokio::test]
    async fn uncitable_hit_keeps_law_code_without_fabricating() {
        let store = FixedStore {
            hits: vec![hit(
                "Ümumi müddəalar haqqında mətn.",
                &[("law_code", "civil"), ("law_name_az", "Mülki Məcəllə")],
                0.2,
            )],
        };
        let retriever = Retriever::new(Arc::new(StubEmbedder), Arc::new(store), 5);
        let sources = retriever.retrieve("sual").await.unwrap();
        assert_eq!(sources[0].citation, None);
        assert_eq!(sources[0].law_code, "civil");
        assert_eq!(references_summary(&sources), "Maddə referansları tapılmadı");
    }

    #[test]
    fn summary_deduplicates_references() {
        let source = |citation: &str| RetrievedSource {
            citation: Some(citation.to_string()),
            content: String::new(),
            law_code: "family".to_string(),
            law_name_az: "Ailə Məcəlləsi".to_string(),
            chapter: None,
            relevance_score: 0.9,
        };
        let sources = vec![source("Maddə 10"), source("Maddə 10"), source("Maddə 11")];
        assert_eq!(
            references_summary(&sources),
            "İstifadə olunan mənbələr: Ailə Məcəlləsi - Maddə 10, Ailə Məcəlləsi - Maddə 11"
        );
    }
}
