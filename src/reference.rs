//! # Reference Extraction Module
//!
//! ## Purpose
//! Recovers a canonical citation string ("Maddə N") for a retrieved chunk,
//! so answers can attribute their sources to a specific article.
//!
//! ## Input/Output Specification
//! - **Input**: Chunk content and its metadata mapping
//! - **Output**: Citation string, or `None` when no article can be named
//!
//! ## Order of precedence
//! 1. `article_reference` metadata, returned verbatim
//! 2. `article_number` metadata, formatted as `Maddə N`
//! 3. First article-marker match in the content head, using the same
//!    pattern table as structure extraction
//! 4. Absent — callers cite the law code and chapter only, never a
//!    fabricated article number

use crate::pipeline::patterns::compile_article_markers;
use regex::Regex;
use std::collections::BTreeMap;

/// How many characters of chunk content are scanned for an article marker
const CONTENT_HEAD_CHARS: usize = 200;

/// Reference extractor with the shared article-marker patterns precompiled
pub struct ReferenceExtractor {
    article_patterns: Vec<Regex>,
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceExtractor {
    pub fn new() -> Self {
        Self {
            article_patterns: compile_article_markers(),
        }
    }

    /// Extract a citation for one retrieved chunk
    pub fn extract(
        &self,
        content: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Option<String> {
        if let Some(reference) = metadata.get("article_reference") {
            if !reference.is_empty() {
                return Some(reference.clone());
            }
        }

        if let Some(number) = metadata.get("article_number") {
            if !number.is_empty() {
                return Some(format!("Maddə {}", number));
            }
        }

        self.scan_content(content)
    }

    /// First article marker in the content head, in document order
    fn scan_content(&self, content: &str) -> Option<String> {
        let head_end = content
            .char_indices()
            .nth(CONTENT_HEAD_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(content.len());
        let head = &content[..head_end];

        self.article_patterns
            .iter()
            .filter_map(|regex| {
                let caps = regex.captures(head)?;
                let number = caps.name("num")?;
                Some((number.start(), number.as_str().to_string()))
            })
            .min_by_key(|(start, _)| *start)
            .map(|(_, number)| format!("Maddə {}", number))
    }
}
