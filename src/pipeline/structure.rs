//! # Structure Extraction Module
//!
//! ## Purpose
//! Parses chapter/section/article/sub-article markers out of normalized text
//! and builds the tree of structural boundaries the chunk builder walks.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized document text plus its law code
//! - **Output**: `StructureTree` — an arena of nodes with owned child lists
//!   and index-based parent back-references
//! - **Errors**: `EmptyDocument`, `MalformedStructure` (no articles found)
//!
//! ## Algorithm
//! Single left-to-right scan over the ordered marker table. A level-N match
//! closes every open node at level >= N and nests under the nearest open node
//! at level < N. Matches starting inside an accepted marker's own text are
//! discarded. At equal offsets the admissibility rules and table priority
//! decide: a sub-article cannot open before its article, and a bare
//! enumerated number inside an open article stays plain paragraph numbering.
//! Non-monotonic numbering is recorded as a node warning, never an error;
//! legal renumbering and amendments make strict monotonicity unreliable.

use crate::errors::{PipelineError, Result};
use crate::law::LawCode;
use crate::pipeline::patterns::{compile_markers, Admissibility, MarkerSpec, StructureLevel};
use regex::Regex;

/// Index of a node within its tree's arena
pub type NodeId = usize;

/// One level of the legal hierarchy. The root node spans the whole document
/// and carries no level.
#[derive(Debug, Clone)]
pub struct StructuralNode {
    /// `None` for the document root
    pub level: Option<StructureLevel>,
    /// Matched marker text, e.g. "Maddə 127"
    pub label: String,
    /// Parsed marker number, e.g. "127" or "127.1" or "VII"
    pub number: Option<String>,
    /// Byte offset range into the normalized text
    pub start: usize,
    pub end: usize,
    /// Lookup-only back-reference; never used for traversal during building
    pub parent: Option<NodeId>,
    /// Owned, ordered children
    pub children: Vec<NodeId>,
    /// Non-fatal annotations (numbering anomalies)
    pub warnings: Vec<String>,
}

/// Structural tree of one document
#[derive(Debug, Clone)]
pub struct StructureTree {
    nodes: Vec<StructuralNode>,
}

impl StructureTree {
    pub fn root(&self) -> &StructuralNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &StructuralNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in document order (arena insertion order)
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        1..self.nodes.len()
    }

    /// Article node ids in document order
    pub fn articles(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|&id| self.nodes[id].level == Some(StructureLevel::Article))
            .collect()
    }

    /// Nearest enclosing ancestor at the given level, if any
    pub fn ancestor_label(&self, id: NodeId, level: StructureLevel) -> Option<&str> {
        let mut current = self.nodes[id].parent;
        while let Some(pid) = current {
            let node = &self.nodes[pid];
            if node.level == Some(level) {
                return Some(node.label.as_str());
            }
            current = node.parent;
        }
        None
    }

    /// All warnings attached to any node, in document order
    pub fn warnings(&self) -> Vec<&str> {
        self.ids()
            .flat_map(|id| self.nodes[id].warnings.iter().map(String::as_str))
            .collect()
    }
}

/// A single accepted marker match during the scan
#[derive(Debug, Clone)]
struct Marker {
    start: usize,
    end: usize,
    level: StructureLevel,
    priority: u8,
    admissibility: Admissibility,
    label: String,
    number: Option<String>,
    table_index: usize,
}

/// Structure extractor with the precompiled marker table
pub struct StructureExtractor {
    markers: Vec<(MarkerSpec, Regex)>,
}

impl Default for StructureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureExtractor {
    pub fn new() -> Self {
        Self {
            markers: compile_markers(),
        }
    }

    /// Extract the structural tree for one document
    pub fn extract(&self, text: &str, law_code: LawCode) -> Result<StructureTree> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument {
                law_code: law_code.to_string(),
            });
        }

        let candidates = self.collect_candidates(text);
        let tree = self.build_tree(text, candidates);

        if tree.articles().is_empty() {
            return Err(PipelineError::MalformedStructure {
                law_code: law_code.to_string(),
                text_len: text.len(),
            });
        }

        tracing::debug!(
            law_code = %law_code,
            nodes = tree.len(),
            articles = tree.articles().len(),
            warnings = tree.warnings().len(),
            "structure extracted"
        );

        Ok(tree)
    }

    /// Find every marker match, sorted by offset then table priority
    fn collect_candidates(&self, text: &str) -> Vec<Marker> {
        let mut candidates = Vec::new();

        for (table_index, (spec, regex)) in self.markers.iter().enumerate() {
            for caps in regex.captures_iter(text) {
                let m = caps.get(0).expect("group 0 always present");
                let number = caps.name("num").map(|n| n.as_str().to_string());
                let label = marker_label(spec, m.as_str(), number.as_deref());
                candidates.push(Marker {
                    start: m.start(),
                    end: m.end(),
                    level: spec.level,
                    priority: spec.priority,
                    admissibility: spec.admissibility,
                    label,
                    number,
                    table_index,
                });
            }
        }

        candidates.sort_by_key(|c| (c.start, c.priority, c.table_index));
        candidates
    }

    /// Fold the candidate sequence into the arena tree
    fn build_tree(&self, text: &str, candidates: Vec<Marker>) -> StructureTree {
        let mut nodes = vec![StructuralNode {
            level: None,
            label: String::new(),
            number: None,
            start: 0,
            end: text.len(),
            parent: None,
            children: Vec::new(),
            warnings: Vec::new(),
        }];
        let mut stack: Vec<NodeId> = vec![0];
        let mut last_accepted_end = 0usize;
        let mut last_article_number: Option<u64> = None;

        for candidate in candidates {
            // Discard matches inside an accepted marker's own text
            if candidate.start < last_accepted_end {
                continue;
            }
            if !self.admissible(&candidate, &nodes, &stack) {
                continue;
            }

            let rank = candidate.level.rank();
            while let Some(&top) = stack.last() {
                let top_rank = nodes[top].level.map(|l| l.rank()).unwrap_or(0);
                if top_rank >= rank {
                    nodes[top].end = candidate.start;
                    stack.pop();
                } else {
                    break;
                }
            }

            let parent = *stack.last().expect("root never closes");
            let mut warnings = Vec::new();
            self.check_numbering(
                &candidate,
                &nodes,
                parent,
                &mut last_article_number,
                &mut warnings,
            );

            let id = nodes.len();
            nodes.push(StructuralNode {
                level: Some(candidate.level),
                label: candidate.label.clone(),
                number: candidate.number.clone(),
                start: candidate.start,
                end: text.len(),
                parent: Some(parent),
                children: Vec::new(),
                warnings,
            });
            nodes[parent].children.push(id);
            stack.push(id);
            last_accepted_end = candidate.end;
        }

        StructureTree { nodes }
    }

    /// Admissibility relative to the currently open article
    fn admissible(&self, candidate: &Marker, nodes: &[StructuralNode], stack: &[NodeId]) -> bool {
        let article_open = stack
            .iter()
            .any(|&id| nodes[id].level == Some(StructureLevel::Article));
        match candidate.admissibility {
            Admissibility::Always => true,
            Admissibility::RequiresOpenArticle => article_open,
            Admissibility::RequiresNoOpenArticle => !article_open,
        }
    }

    /// Numbering validation: monotonicity for articles, prefix consistency
    /// for sub-articles. Anomalies become warnings, never failures.
    fn check_numbering(
        &self,
        candidate: &Marker,
        nodes: &[StructuralNode],
        parent: NodeId,
        last_article_number: &mut Option<u64>,
        warnings: &mut Vec<String>,
    ) {
        let Some(number) = candidate.number.as_deref() else {
            return;
        };

        match candidate.level {
            StructureLevel::Article => {
                let primary = number.split('.').next().and_then(|n| n.parse::<u64>().ok());
                if let Some(new) = primary {
                    if let Some(last) = *last_article_number {
                        if new <= last {
                            warnings.push(format!(
                                "non-monotonic article numbering: {} after {}",
                                new, last
                            ));
                        }
                    }
                    *last_article_number = Some(new);
                }
            }
            StructureLevel::SubArticle => {
                let parent_node = &nodes[parent];
                if parent_node.level == Some(StructureLevel::Article) {
                    if let Some(parent_num) = parent_node.number.as_deref() {
                        let parent_primary = parent_num.split('.').next().unwrap_or(parent_num);
                        if number.split('.').next() != Some(parent_primary) {
                            warnings.push(format!(
                                "sub-article {} does not extend article {}",
                                number, parent_num
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Human-facing marker label. Keyword forms keep the matched text; numeric
/// forms reduce to their number so trailing heading letters are not captured.
fn marker_label(spec: &MarkerSpec, matched: &str, number: Option<&str>) -> String {
    match (spec.level, spec.priority) {
        (StructureLevel::SubArticle, _) => number.unwrap_or(matched).to_string(),
        (StructureLevel::Article, 3) => format!("{}.", number.unwrap_or(matched)),
        _ => matched.trim().to_string(),
    }
}
