//! Recursive paragraph splitting for plain text.
//!
//! At each depth the parser looks for the marker sequence of that depth's
//! family (`(a)`, `(b)`, …), splits the text at each hit, and recurses into
//! the pieces with the next family. Markers inside citation phrases
//! (`see paragraph (b)`) are never split points.

use std::ops::Range;

use eregs_core::citations::internal_citations;
use eregs_core::markers::{MarkerType, next_marker, paren};
use eregs_core::{Label, Node, NodeType};

/// Regtext nesting for text without emphasis information.
pub const TEXT_LEVELS: [MarkerType; 4] = [
    MarkerType::Lower,
    MarkerType::Ints,
    MarkerType::Roman,
    MarkerType::Upper,
];

pub struct ParagraphParser<'a> {
    text: &'a str,
    excluded: Vec<Range<usize>>,
    levels: &'a [MarkerType],
    node_type: NodeType,
}

impl<'a> ParagraphParser<'a> {
    /// Parser over `text`; `context` resolves the citations whose markers
    /// must not be treated as paragraph starts.
    pub fn new(text: &'a str, context: &Label) -> Self {
        let excluded = internal_citations(text, context)
            .into_iter()
            .map(|c| c.start..c.end)
            .collect();
        Self {
            text,
            excluded,
            levels: &TEXT_LEVELS,
            node_type: NodeType::Regtext,
        }
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    /// Split the whole text below `label`: the text ahead of the first
    /// marker and the paragraph nodes.
    pub fn parse(&self, label: &[String]) -> (String, Vec<Node>) {
        let (intro, children) = self.split(0..self.text.len(), 0, label);
        (self.text[intro].trim().to_string(), children)
    }

    fn split(&self, range: Range<usize>, depth: usize, label: &[String]) -> (Range<usize>, Vec<Node>) {
        let Some(&family) = self.levels.get(depth) else {
            return (range, Vec::new());
        };
        let mut starts: Vec<(&str, usize)> = Vec::new();
        let mut pos = range.start;
        for marker in family.sequence() {
            match self.best_start(marker, depth, pos, range.end) {
                Some(at) => {
                    starts.push((marker, at));
                    pos = at + paren(marker).len();
                }
                None => break,
            }
        }
        let Some(&(_, first)) = starts.first() else {
            return (range, Vec::new());
        };

        let children = starts
            .iter()
            .enumerate()
            .map(|(i, &(marker, at))| {
                let end = starts.get(i + 1).map_or(range.end, |&(_, next)| next);
                let mut child_label = label.to_vec();
                child_label.push(marker.to_string());
                let (own, grandchildren) = self.split(at..end, depth + 1, &child_label);
                Node::new(self.text[own].trim(), child_label, self.node_type)
                    .with_children(grandchildren)
            })
            .collect();
        (range.start..first, children)
    }

    /// Valid split points for `marker` between `from` and `to`.
    fn candidates(&self, marker: &str, from: usize, to: usize) -> Vec<usize> {
        let needle = paren(marker);
        let hay = &self.text[from..to];
        hay.match_indices(&needle)
            .map(|(i, _)| from + i)
            .filter(|&at| self.is_split_point(at))
            .collect()
    }

    fn is_split_point(&self, at: usize) -> bool {
        let preceded_ok = self.text[..at]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == '\u{2014}' || c == ':');
        preceded_ok && !self.excluded.iter().any(|r| r.contains(&at))
    }

    /// Where `marker` really starts at `depth`.
    ///
    /// When the same marker also belongs to a deeper family (`(i)` is both
    /// lower alpha and roman), a hit followed by that family's successor
    /// (`(ii)`) is a subparagraph, not the sibling being looked for.
    fn best_start(&self, marker: &str, depth: usize, from: usize, to: usize) -> Option<usize> {
        let found = self.candidates(marker, from, to);
        let successors: Vec<&str> = self.levels[depth + 1..]
            .iter()
            .filter_map(|deeper| next_marker(*deeper, marker))
            .collect();
        if successors.is_empty() {
            return found.first().copied();
        }
        found.iter().enumerate().find_map(|(i, &at)| {
            let seg_end = found.get(i + 1).copied().unwrap_or(to);
            let hazard = successors
                .iter()
                .any(|s| !self.candidates(s, at, seg_end).is_empty());
            (!hazard).then_some(at)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> (String, Vec<Node>) {
        let label = vec!["100".to_string(), "1".to_string()];
        ParagraphParser::new(text, &Label::section("100", "1")).parse(&label)
    }

    #[test]
    fn nested_markers() {
        let (intro, children) = parse("Intro. (a) aa (1) oneone (2) twotwo (b) bb");
        assert_eq!(intro, "Intro.");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "(a) aa");
        assert_eq!(children[0].child_labels(), vec!["100-1-a-1", "100-1-a-2"]);
        assert_eq!(children[0].children[1].text, "(2) twotwo");
        assert_eq!(children[1].text, "(b) bb");
    }

    #[test]
    fn cited_markers_do_not_split() {
        let (_, children) = parse("(a) See paragraph (b) of this section. (b) Real.");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "(a) See paragraph (b) of this section.");
    }

    #[test]
    fn roman_under_h_is_not_lower_i() {
        let text = "(a) a (b) b (c) c (d) d (e) e (f) f (g) g (h) h (1) one (i) r1 (ii) r2";
        let (_, children) = parse(text);
        assert_eq!(children.len(), 8);
        let one = &children[7].children[0];
        assert_eq!(one.child_labels(), vec!["100-1-h-1-i", "100-1-h-1-ii"]);
    }

    #[test]
    fn lower_i_after_h() {
        let text = "(a) a (b) b (c) c (d) d (e) e (f) f (g) g (h) h (i) i (j) j";
        let (_, children) = parse(text);
        assert_eq!(children.len(), 10);
        assert!(children[7].children.is_empty());
    }

    #[test]
    fn markers_must_follow_whitespace() {
        let (_, children) = parse("(a) value f(b) inside (b) real");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "(a) value f(b) inside");
    }

    #[test]
    fn no_markers_means_no_children() {
        let (intro, children) = parse("Just some text.");
        assert_eq!(intro, "Just some text.");
        assert!(children.is_empty());
    }
}
