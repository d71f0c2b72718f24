//! # Structural Marker Patterns
//!
//! ## Purpose
//! The ordered marker table shared by structure extraction and reference
//! extraction. Each entry pairs a regex with the hierarchy level it opens and
//! a tie-break priority used when two patterns match at the same offset.
//!
//! Azerbaijani capital İ (U+0130) and dotless ı (U+0131) do not survive
//! ASCII-style case folding, so the patterns spell out both cases explicitly
//! instead of relying on `(?i)`.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Hierarchy levels of a legal code document, coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureLevel {
    /// Fəsil
    Chapter,
    /// Bölmə / Hissə
    Section,
    /// Maddə
    Article,
    /// Dotted article suffix, e.g. 127.1, 127.1.1
    SubArticle,
}

impl StructureLevel {
    /// Nesting rank; a level-N marker closes all open nodes at rank >= N
    pub fn rank(&self) -> u8 {
        match self {
            StructureLevel::Chapter => 1,
            StructureLevel::Section => 2,
            StructureLevel::Article => 3,
            StructureLevel::SubArticle => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureLevel::Chapter => "chapter",
            StructureLevel::Section => "section",
            StructureLevel::Article => "article",
            StructureLevel::SubArticle => "sub_article",
        }
    }
}

/// When a marker interpretation is admissible, relative to the currently
/// open article. A sub-article cannot open before its parent article has;
/// conversely a bare enumerated number inside an open article is paragraph
/// numbering, not a new article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admissibility {
    Always,
    RequiresOpenArticle,
    RequiresNoOpenArticle,
}

/// One row of the marker table
#[derive(Debug, Clone, Copy)]
pub struct MarkerSpec {
    pub level: StructureLevel,
    /// Pattern with an optional `num` capture for the marker's number
    pub pattern: &'static str,
    /// Lower wins when two markers match at the same offset
    pub priority: u8,
    pub admissibility: Admissibility,
}

/// Ordered marker table. Keyword markers outrank suffix forms, which outrank
/// bare-number forms; the dotted sub-article form sits between them so that
/// `127.1. Text` is read as a sub-article whenever an article is open.
pub const MARKERS: &[MarkerSpec] = &[
    // Chapter: Fəsil
    MarkerSpec {
        level: StructureLevel::Chapter,
        pattern: r"[Ff][əƏ][Ss][iİ][Ll]\s+(?P<num>[IVXLCDM]+)\b",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    MarkerSpec {
        level: StructureLevel::Chapter,
        pattern: r"[Ff][əƏ][Ss][iİ][Ll]\s+(?P<num>\d+)\b",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    MarkerSpec {
        level: StructureLevel::Chapter,
        pattern: r"(?P<num>\d+)\s*[-–—]\s*[Cc][iüıə]\s+[Ff][əƏ][Ss][iİ][Ll]",
        priority: 1,
        admissibility: Admissibility::Always,
    },
    // Section: Bölmə / Bölüm / Hissə
    MarkerSpec {
        level: StructureLevel::Section,
        pattern: r"[Bb][öÖ][Ll][mM][əƏ]\s+(?P<num>[IVXLCDM]+|\d+)\b",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    MarkerSpec {
        level: StructureLevel::Section,
        pattern: r"[Bb][öÖ][Ll][üÜ][Mm]\s+(?P<num>[IVXLCDM]+|\d+)\b",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    MarkerSpec {
        level: StructureLevel::Section,
        pattern: r"[Hh][iİ][Ss][Ss][əƏ]\s+(?P<num>[IVXLCDM]+|\d+)\b",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    // Article: Maddə
    MarkerSpec {
        level: StructureLevel::Article,
        pattern: r"[Mm][aA][Dd][Dd][əƏeE]\s+(?P<num>\d+(?:\.\d+)*)",
        priority: 0,
        admissibility: Admissibility::Always,
    },
    MarkerSpec {
        level: StructureLevel::Article,
        pattern: r"(?P<num>\d+(?:\.\d+)*)\s*[-–—]\s*[Cc][iüıə]\s+[Mm][aA][Dd][Dd][əƏeE]",
        priority: 1,
        admissibility: Admissibility::Always,
    },
    // Sub-article: dotted number at a segment start, e.g. "127.1." / "127.1.1."
    MarkerSpec {
        level: StructureLevel::SubArticle,
        pattern: r"(?P<num>\d+(?:\.\d+)+)[.)]?\s",
        priority: 2,
        admissibility: Admissibility::RequiresOpenArticle,
    },
    // Bare enumerated article forms, e.g. "45. Müqavilə ..." / "45) Müqavilə ..."
    MarkerSpec {
        level: StructureLevel::Article,
        pattern: r"(?P<num>\d+)[.)]\s*[A-ZÇƏĞİÖŞÜ]",
        priority: 3,
        admissibility: Admissibility::RequiresNoOpenArticle,
    },
    // Clause keyword: Bənd
    MarkerSpec {
        level: StructureLevel::Article,
        pattern: r"[Bb][əƏ][Nn][Dd]\s+(?P<num>\d+(?:\.\d+)*)",
        priority: 4,
        admissibility: Admissibility::RequiresNoOpenArticle,
    },
];

/// Compile the marker table, preserving order
pub fn compile_markers() -> Vec<(MarkerSpec, Regex)> {
    MARKERS
        .iter()
        .map(|spec| {
            let regex = Regex::new(spec.pattern).expect("marker table patterns are valid");
            (*spec, regex)
        })
        .collect()
}

/// Compile only the article-level number-bearing patterns, for reference
/// extraction over chunk content
pub fn compile_article_markers() -> Vec<Regex> {
    MARKERS
        .iter()
        .filter(|spec| {
            matches!(
                spec.level,
                StructureLevel::Article | StructureLevel::SubArticle
            )
        })
        .map(|spec| Regex::new(spec.pattern).expect("marker table patterns are valid"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_table_compiles() {
        assert_eq!(compile_markers().len(), MARKERS.len());
    }

    #[test]
    fn keyword_article_matches_both_cases() {
        let markers = compile_markers();
        let (_, regex) = markers
            .iter()
            .find(|(spec, _)| spec.level == StructureLevel::Article && spec.priority == 0)
            .unwrap();
        for text in ["Maddə 127", "MADDƏ 127", "Madde 45.1"] {
            let caps = regex.captures(text).unwrap();
            assert!(caps.name("num").is_some(), "no number in {:?}", text);
        }
    }

    #[test]
    fn sub_article_requires_dotted_number() {
        let markers = compile_markers();
        let (_, regex) = markers
            .iter()
            .find(|(spec, _)| spec.level == StructureLevel::SubArticle)
            .unwrap();
        assert!(regex.is_match("127.1. Vərəsəlik"));
        assert!(regex.is_match("127.1.1 mülkiyyət"));
        assert!(!regex.is_match("127. Vərəsəlik"));
    }

    #[test]
    fn chapter_matches_roman_and_suffix_forms() {
        let markers = compile_markers();
        let chapter: Vec<_> = markers
            .iter()
            .filter(|(spec, _)| spec.level == StructureLevel::Chapter)
            .collect();
        assert!(chapter.iter().any(|(_, r)| r.is_match("Fəsil VII")));
        assert!(chapter.iter().any(|(_, r)| r.is_match("FƏSİL 12")));
        assert!(chapter.iter().any(|(_, r)| r.is_match("5-ci fəsil")));
    }
}
