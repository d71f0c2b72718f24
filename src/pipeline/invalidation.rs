//! # Invalidation Detection Module
//!
//! ## Purpose
//! Flags text spans that represent repealed or struck-through legal
//! provisions, so the chunk builder can mark the affected chunks invalid.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized document text
//! - **Output**: Invalidation spans (offset range + rule + matched text)
//!
//! ## Detection Rules (applied independently, spans unioned)
//! 1. Combining strikethrough codepoints adjacent to word characters
//! 2. Explicit repeal phrases, expanded to the enclosing sentence
//! 3. Runs of box-drawing characters adjacent to text, expanded to the clause
//!
//! Spans may overlap and are not merged here; a chunk is invalid if it
//! intersects any span. When a sentence cannot be bounded before document
//! end, the span extends to document end: over-flagging repealed text is the
//! cheaper failure compared to citing a repealed article.

use crate::config::InvalidationConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Combining strikethrough and overlay codepoints seen in extracted PDFs
pub(crate) const STRIKE_CHARS: &[char] = &[
    '\u{0335}', '\u{0336}', '\u{0337}', '\u{0338}', '\u{0353}', '\u{0354}', '\u{0488}', '\u{0489}',
];

/// Explicit repeal phrases used in Azerbaijani legal publications
const REPEAL_PHRASES: &[&str] = &[
    r"\[ləğv edilib\]",
    r"\[mətn ləğv edilib\]",
    r"\(ləğv edilib\)",
    r"ləğv olunub",
    r"qüvvədən düşüb",
    r"qüvvədən düşmüşdür",
    r"qüvvədən çıxarılıb",
];

/// Which detection rule produced a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Combining strikethrough codepoints over word characters
    StruckText,
    /// Explicit repeal phrase
    RepealPhrase,
    /// Pseudo-graphic strike rendered as box-drawing characters
    LineRun,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::StruckText => "struck_text",
            InvalidationReason::RepealPhrase => "repeal_phrase",
            InvalidationReason::LineRun => "line_run",
        }
    }
}

/// A detected invalid region of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationSpan {
    /// Byte offset range into the normalized text
    pub start: usize,
    pub end: usize,
    pub reason: InvalidationReason,
    /// The text that triggered the rule
    pub matched: String,
}

impl InvalidationSpan {
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Invalidation scanner with precompiled rule patterns
pub struct InvalidationScanner {
    phrases: Vec<Regex>,
    line_run: Regex,
}

impl InvalidationScanner {
    pub fn new(config: &InvalidationConfig) -> Self {
        let phrases = REPEAL_PHRASES
            .iter()
            .map(|p| Regex::new(p).expect("repeal phrase patterns are valid"))
            .collect();
        let line_run = Regex::new(&format!("[─━═]{{{},}}", config.line_run_threshold))
            .expect("line run pattern is valid");

        Self { phrases, line_run }
    }

    /// Scan the text with every rule and return the union of spans,
    /// in document order. Pure; never fails.
    pub fn scan(&self, text: &str) -> Vec<InvalidationSpan> {
        let mut spans = Vec::new();
        self.scan_struck_words(text, &mut spans);
        self.scan_repeal_phrases(text, &mut spans);
        self.scan_line_runs(text, &mut spans);
        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }

    /// Rule 1: a combining strike codepoint marks the enclosing word
    fn scan_struck_words(&self, text: &str, spans: &mut Vec<InvalidationSpan>) {
        let mut last_end = 0usize;
        for (idx, ch) in text.char_indices() {
            if !STRIKE_CHARS.contains(&ch) || idx < last_end {
                continue;
            }
            let (start, end) = enclosing_word(text, idx);
            if start == end {
                continue;
            }
            spans.push(InvalidationSpan {
                start,
                end,
                reason: InvalidationReason::StruckText,
                matched: text[start..end].to_string(),
            });
            last_end = end;
        }
    }

    /// Rule 2: a repeal phrase marks the enclosing sentence
    fn scan_repeal_phrases(&self, text: &str, spans: &mut Vec<InvalidationSpan>) {
        for regex in &self.phrases {
            for m in regex.find_iter(text) {
                let (start, end) = enclosing_sentence(text, m.start(), m.end());
                spans.push(InvalidationSpan {
                    start,
                    end,
                    reason: InvalidationReason::RepealPhrase,
                    matched: m.as_str().to_string(),
                });
            }
        }
    }

    /// Rule 3: a box-drawing run adjacent to text marks the adjacent clause
    fn scan_line_runs(&self, text: &str, spans: &mut Vec<InvalidationSpan>) {
        for m in self.line_run.find_iter(text) {
            if !adjacent_to_text(text, m.start(), m.end()) {
                continue;
            }
            let (start, end) = enclosing_sentence(text, m.start(), m.end());
            spans.push(InvalidationSpan {
                start,
                end,
                reason: InvalidationReason::LineRun,
                matched: m.as_str().to_string(),
            });
        }
    }
}

/// Expand around `idx` to the enclosing run of word characters and
/// combining marks
fn enclosing_word(text: &str, idx: usize) -> (usize, usize) {
    let is_word = |c: char| c.is_alphanumeric() || STRIKE_CHARS.contains(&c);

    let start = text[..idx]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(idx);

    let end = text[idx..]
        .char_indices()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map(|(i, c)| idx + i + c.len_utf8())
        .unwrap_or(idx);

    (start, end)
}

/// Expand a hit to the enclosing sentence, bounded by sentence-terminal
/// punctuation or a paragraph boundary. An unbounded forward search extends
/// to document end.
fn enclosing_sentence(text: &str, hit_start: usize, hit_end: usize) -> (usize, usize) {
    let terminal = |c: char| matches!(c, '.' | '!' | '?');

    let start = text[..hit_start]
        .char_indices()
        .rev()
        .find(|&(i, c)| terminal(c) || text[i..].starts_with("\n\n"))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    let end = text[hit_end..]
        .char_indices()
        .find(|&(i, c)| terminal(c) || text[hit_end + i..].starts_with("\n\n"))
        .map(|(i, c)| {
            let abs = hit_end + i;
            if terminal(c) {
                abs + c.len_utf8()
            } else {
                abs
            }
        })
        .unwrap_or(text.len());

    (start, end)
}

/// Whether a line run touches structural text: a word character directly
/// before or after the run, allowing intervening spaces within the same line
fn adjacent_to_text(text: &str, run_start: usize, run_end: usize) -> bool {
    let before = text[..run_start]
        .chars()
        .rev()
        .find(|c| !matches!(c, ' ' | '\t'));
    let after = text[run_end..].chars().find(|c| !matches!(c, ' ' | '\t'));

    before.map(|c| c.is_alphanumeric()).unwrap_or(false)
        || after.map(|c| c.is_alphanumeric()).unwrap_or(false)
}
