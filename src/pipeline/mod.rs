//! # Document Pipeline Module
//!
//! ## Purpose
//! Orchestrates the per-document chunking workflow: normalize text, scan for
//! invalidated provisions, extract the structural tree, and build chunks.
//!
//! ## Input/Output Specification
//! - **Input**: Raw extracted document text plus its law code
//! - **Output**: Chunk records with validity flags and per-document stats
//! - **Workflow**: Normalize → Detect invalidations → Extract structure → Build chunks
//!
//! ## Key Features
//! - Pure, synchronous, re-entrant per-document processing (no I/O inside)
//! - Embarrassingly parallel batch runner over documents via rayon
//! - Per-document failures skip the document, never the batch
//! - Cooperative cancellation between documents, never mid-document

pub mod chunker;
pub mod invalidation;
pub mod normalize;
pub mod patterns;
pub mod structure;

use crate::config::Config;
use crate::errors::Result;
use crate::utils::{TextUtils, Timer};
use crate::RawDocument;
use chunker::{ChunkBuilder, LegalChunk};
use invalidation::InvalidationScanner;
use normalize::TextNormalizer;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use structure::StructureExtractor;

pub use chunker::ChunkType;
pub use invalidation::{InvalidationReason, InvalidationSpan};
pub use patterns::StructureLevel;
pub use structure::{StructuralNode, StructureTree};

/// One document's pipeline output
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub law_code: crate::law::LawCode,
    /// Normalized text the chunk offsets point into
    pub normalized_text: String,
    /// Fingerprint of the normalized text, for change detection
    pub text_hash: String,
    pub chunks: Vec<LegalChunk>,
    /// Count of invalidation spans detected
    pub invalidation_count: usize,
    /// Structural numbering warnings, in document order
    pub warnings: Vec<String>,
}

impl ProcessedDocument {
    /// Chunks eligible for the live index
    pub fn valid_chunks(&self) -> impl Iterator<Item = &LegalChunk> {
        self.chunks.iter().filter(|c| c.is_valid)
    }
}

/// Aggregated statistics for one batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub documents_skipped: usize,
    pub chunks_produced: usize,
    pub invalid_chunks: usize,
    pub total_words: usize,
    /// Start time of the run
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// End time of the run
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Result of a batch run: outputs plus stats
#[derive(Debug)]
pub struct BatchReport {
    /// Ephemeral id of this run, for log correlation
    pub job_id: uuid::Uuid,
    pub documents: Vec<ProcessedDocument>,
    pub stats: BatchStats,
}

/// The per-document chunking pipeline. Stages share nothing mutable; the
/// whole struct is freely shared across worker threads.
pub struct DocumentPipeline {
    normalizer: TextNormalizer,
    scanner: InvalidationScanner,
    extractor: StructureExtractor,
    builder: ChunkBuilder,
}

impl DocumentPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            scanner: InvalidationScanner::new(&config.invalidation),
            extractor: StructureExtractor::new(),
            builder: ChunkBuilder::new(config.chunking.clone()),
        }
    }

    /// Run the full pipeline on one document. Pure and synchronous; fails
    /// only for empty or structurally unusable documents.
    pub fn process(&self, document: &RawDocument) -> Result<ProcessedDocument> {
        let timer = Timer::new(format!("process:{}", document.law_code));

        let normalized = self.normalizer.normalize(&document.text);
        let spans = self.scanner.scan(&normalized);
        let tree = self.extractor.extract(&normalized, document.law_code)?;
        let chunks = self
            .builder
            .build(&tree, &normalized, &spans, document.law_code);
        let warnings: Vec<String> = tree.warnings().iter().map(|w| w.to_string()).collect();

        let elapsed = timer.stop();
        tracing::info!(
            law_code = %document.law_code,
            chunks = chunks.len(),
            invalidations = spans.len(),
            warnings = warnings.len(),
            elapsed_ms = elapsed,
            "document processed"
        );

        Ok(ProcessedDocument {
            law_code: document.law_code,
            text_hash: TextUtils::text_hash(&normalized),
            invalidation_count: spans.len(),
            chunks,
            warnings,
            normalized_text: normalized,
        })
    }

    /// Process documents in parallel. A document that fails is logged and
    /// skipped; cancellation is honored between documents.
    pub fn process_batch(&self, documents: &[RawDocument], cancel: &AtomicBool) -> BatchReport {
        let job_id = uuid::Uuid::new_v4();
        tracing::info!(%job_id, documents = documents.len(), "batch starting");

        let stats = Mutex::new(BatchStats {
            start_time: Some(chrono::Utc::now()),
            ..BatchStats::default()
        });

        let mut outputs: Vec<(usize, ProcessedDocument)> = documents
            .par_iter()
            .enumerate()
            .filter_map(|(index, document)| {
                if cancel.load(Ordering::Relaxed) {
                    stats.lock().documents_skipped += 1;
                    return None;
                }
                match self.process(document) {
                    Ok(processed) => {
                        let mut s = stats.lock();
                        s.documents_processed += 1;
                        s.chunks_produced += processed.chunks.len();
                        s.invalid_chunks +=
                            processed.chunks.iter().filter(|c| !c.is_valid).count();
                        s.total_words += TextUtils::word_count(&processed.normalized_text);
                        Some((index, processed))
                    }
                    Err(e) => {
                        tracing::warn!(
                            law_code = %document.law_code,
                            error = %e,
                            category = e.category(),
                            "skipping document"
                        );
                        stats.lock().documents_failed += 1;
                        None
                    }
                }
            })
            .collect();

        // Restore document order lost to parallel scheduling
        outputs.sort_by_key(|(index, _)| *index);

        let mut stats = stats.into_inner();
        stats.end_time = Some(chrono::Utc::now());

        BatchReport {
            job_id,
            documents: outputs.into_iter().map(|(_, doc)| doc).collect(),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::law::LawCode;

    fn pipeline() -> DocumentPipeline {
        DocumentPipeline::new(&Config::default())
    }

    fn doc(law_code: LawCode, text: &str) -> RawDocument {
        RawDocument {
            law_code,
            text: text.to_string(),
        }
    }

    #[test]
    fn processes_spaced_text_end_to_end() {
        let out = pipeline()
            .process(&doc(
                LawCode::Civil,
                "M a d d ə 12. Mülkiyyət hüququnun əldə edilməsi qaydaları.",
            ))
            .unwrap();
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.chunks[0].article.as_deref(), Some("Maddə 12"));
        assert!(out.chunks[0].is_valid);
    }

    #[test]
    fn invalidation_round_trip_flips_only_the_marked_article() {
        let clean = "Maddə 10. Birinci maddənin tam mətni burada davam edir.\n\n\
            Maddə 11. İkinci maddənin tam mətni burada davam edir.";
        let pipeline = pipeline();
        let before = pipeline.process(&doc(LawCode::Labor, clean)).unwrap();
        assert!(before.chunks.iter().all(|c| c.is_valid));

        let marked = clean.replace(
            "İkinci maddənin tam mətni",
            "İkinci maddənin tam mətni [ləğv edilib]",
        );
        let after = pipeline.process(&doc(LawCode::Labor, &marked)).unwrap();
        let flipped: Vec<_> = after.chunks.iter().filter(|c| !c.is_valid).collect();
        assert_eq!(flipped.len(), 1);
        assert_eq!(flipped[0].article.as_deref(), Some("Maddə 11"));
        // The sibling keeps its validity and its id
        let stable_before = before
            .chunks
            .iter()
            .find(|c| c.article.as_deref() == Some("Maddə 10"))
            .unwrap();
        let stable_after = after
            .chunks
            .iter()
            .find(|c| c.article.as_deref() == Some("Maddə 10"))
            .unwrap();
        assert!(stable_after.is_valid);
        assert_eq!(stable_before.id, stable_after.id);
    }

    #[test]
    fn batch_skips_malformed_documents_without_aborting() {
        let documents = vec![
            doc(LawCode::Civil, "Maddə 1. Qüvvədə olan maddənin mətni."),
            doc(LawCode::Family, "Fəsil I Başlıq var, maddə yoxdur"),
            doc(LawCode::Labor, ""),
            doc(LawCode::Water, "Maddə 2. Digər qüvvədə olan maddənin mətni."),
        ];
        let report = pipeline().process_batch(&documents, &AtomicBool::new(false));
        assert_eq!(report.stats.documents_processed, 2);
        assert_eq!(report.stats.documents_failed, 2);
        assert_eq!(report.documents.len(), 2);
        // Order is preserved despite parallel execution
        assert_eq!(report.documents[0].law_code, LawCode::Civil);
        assert_eq!(report.documents[1].law_code, LawCode::Water);
    }

    #[test]
    fn cancelled_batch_processes_nothing() {
        let documents = vec![doc(LawCode::Civil, "Maddə 1. Mətn burada.")];
        let cancel = AtomicBool::new(true);
        let report = pipeline().process_batch(&documents, &cancel);
        assert_eq!(report.stats.documents_processed, 0);
        assert_eq!(report.stats.documents_skipped, 1);
    }

    #[test]
    fn text_hash_is_stable_for_equivalent_inputs() {
        let pipeline = pipeline();
        let a = pipeline
            .process(&doc(LawCode::Civil, "Maddə 1.  Mətn   artıq boşluqla."))
            .unwrap();
        let b = pipeline
            .process(&doc(LawCode::Civil, "Maddə 1. Mətn artıq boşluqla."))
            .unwrap();
        assert_eq!(a.text_hash, b.text_hash);
    }
}
