//! # Text Normalization Module
//!
//! ## Purpose
//! Repairs extraction artifacts in legal PDF text before any pattern matching
//! runs: character-spaced structure keywords, mixed-script confusables, and
//! irregular whitespace.
//!
//! ## Input/Output Specification
//! - **Input**: Raw extracted document text
//! - **Output**: Normalized text, stable under re-normalization
//!
//! ## Key Features
//! - Spaced keyword repair for the structure-marker registry ("M a d d ə")
//! - Unicode NFC normalization and Cyrillic homoglyph folding
//! - Whitespace collapse preserving paragraph boundaries
//!
//! Combining strikethrough codepoints are deliberately left in place here;
//! the invalidation scanner needs to see them. The chunk builder strips them
//! from emitted content.

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Spaced forms of the structure keywords the extractor depends on.
/// Upper and lower case are listed separately; Azerbaijani İ/ı do not
/// round-trip through case folding.
const SPACED_KEYWORDS: &[(&str, &str)] = &[
    (r"M\s+a\s+d\s+d\s+ə", "Maddə"),
    (r"M\s+A\s+D\s+D\s+Ə", "MADDƏ"),
    (r"F\s+ə\s+s\s+i\s+l", "Fəsil"),
    (r"F\s+Ə\s+S\s+İ\s+L", "FƏSİL"),
    (r"B\s+ə\s+n\s+d", "Bənd"),
    (r"B\s+Ə\s+N\s+D", "BƏND"),
    (r"H\s+i\s+s\s+s\s+ə", "Hissə"),
    (r"H\s+İ\s+S\s+S\s+Ə", "HİSSƏ"),
    (r"B\s+ö\s+l\s+m\s+ə", "Bölmə"),
    (r"B\s+Ö\s+L\s+M\s+Ə", "BÖLMƏ"),
    (r"B\s+ö\s+l\s+ü\s+m", "Bölüm"),
    (r"B\s+Ö\s+L\s+Ü\s+M", "BÖLÜM"),
];

/// Cyrillic homoglyphs of the Azerbaijani Latin alphabet, mapped to the
/// canonical Latin codepoint so the marker patterns match script-consistently
const CONFUSABLES: &[(char, char)] = &[
    ('\u{0430}', 'a'), // а
    ('\u{0410}', 'A'), // А
    ('\u{0435}', 'e'), // е
    ('\u{0415}', 'E'), // Е
    ('\u{043E}', 'o'), // о
    ('\u{041E}', 'O'), // О
    ('\u{0441}', 'c'), // с
    ('\u{0421}', 'C'), // С
    ('\u{0445}', 'x'), // х
    ('\u{0425}', 'X'), // Х
    ('\u{04D9}', 'ə'), // ә
    ('\u{04D8}', 'Ə'), // Ә
    ('\u{0456}', 'i'), // і
    ('\u{0406}', 'I'), // І
    ('\u{0458}', 'j'), // ј
    ('\u{04BB}', 'h'), // һ
    ('\u{04BA}', 'H'), // Һ
    ('\u{04E9}', 'ö'), // ө
    ('\u{04E8}', 'Ö'), // Ө
    ('\u{04AF}', 'ü'), // ү
    ('\u{04AE}', 'Ü'), // Ү
    ('\u{0493}', 'ğ'), // ғ
    ('\u{0492}', 'Ğ'), // Ғ
    ('\u{041C}', 'M'), // М
    ('\u{0412}', 'B'), // В
    ('\u{041D}', 'H'), // Н
    ('\u{0420}', 'P'), // Р
    ('\u{0422}', 'T'), // Т
    ('\u{041A}', 'K'), // К
];

/// Text normalizer with precompiled repair patterns
pub struct TextNormalizer {
    spaced_keywords: Vec<(Regex, &'static str)>,
    whitespace: Regex,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        let spaced_keywords = SPACED_KEYWORDS
            .iter()
            .map(|(pattern, replacement)| {
                let regex = Regex::new(pattern).expect("spaced keyword patterns are valid");
                (regex, *replacement)
            })
            .collect();

        Self {
            spaced_keywords,
            whitespace: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    /// Normalize extracted text. Pure and total: unmatched patterns are left
    /// unchanged, and `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, raw: &str) -> String {
        let text: String = raw.nfc().collect();
        let text = self.fold_confusables(&text);
        let text = self.fix_spaced_keywords(&text);
        let text = self.collapse_whitespace(&text);
        text.trim().to_string()
    }

    fn fold_confusables(&self, text: &str) -> String {
        text.chars()
            .map(|c| {
                CONFUSABLES
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| *to)
                    .unwrap_or(c)
            })
            .collect()
    }

    fn fix_spaced_keywords(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, replacement) in &self.spaced_keywords {
            result = regex.replace_all(&result, *replacement).into_owned();
        }
        result
    }

    /// Whitespace runs become a single space; runs containing two or more
    /// newlines become exactly one paragraph boundary (`"\n\n"`)
    fn collapse_whitespace(&self, text: &str) -> String {
        self.whitespace
            .replace_all(text, |caps: &Captures| {
                let run = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                if run.matches('\n').count() >= 2 {
                    "\n\n"
                } else {
                    " "
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new()
    }

    #[test]
    fn repairs_spaced_article_keyword() {
        let n = normalizer();
        assert_eq!(n.normalize("M a d d ə 12."), "Maddə 12.");
        assert_eq!(n.normalize("F Ə S İ L VII"), "FƏSİL VII");
    }

    #[test]
    fn folds_cyrillic_homoglyphs() {
        let n = normalizer();
        // "Mаddә" with Cyrillic а and ә
        let mixed = "M\u{0430}dd\u{04D9} 5";
        assert_eq!(n.normalize(mixed), "Maddə 5");
    }

    #[test]
    fn collapses_whitespace_but_keeps_paragraphs() {
        let n = normalizer();
        let text = "Maddə 1.  Mülkiyyət\thüququ\nvə s.\n\n\nMaddə 2. Davamı";
        assert_eq!(
            n.normalize(text),
            "Maddə 1. Mülkiyyət hüququ və s.\n\nMaddə 2. Davamı"
        );
    }

    #[test]
    fn preserves_combining_strikethrough() {
        let n = normalizer();
        let struck = "l\u{0336}ə\u{0336}ğ\u{0336}v";
        assert_eq!(n.normalize(struck), struck);
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = normalizer();
        let samples = [
            "M a d d ə 12.  Mülki hüquq\n\nmətni",
            "Fəsil II\nMaddə 3. Qanun",
            "  boş   sətirlər \n\n\n  və   artıq  boşluq  ",
            "M\u{0430}dd\u{04D9} 7. Qarışıq əlifba",
        ];
        for sample in samples {
            let once = n.normalize(sample);
            assert_eq!(n.normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize("   \n\n  "), "");
    }
}
