//! Links from regulation text to its interpretations.

use std::collections::BTreeMap;

use eregs_core::citations::interp_header_labels;
use eregs_core::{INTERP, Node};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{Layer, to_values};

#[derive(Debug, Serialize)]
struct Reference<'a> {
    reference: &'a str,
}

/// Regulation label id → interpretation label ids.
#[derive(Debug, Default)]
pub struct Interpretations {
    lookup: BTreeMap<String, Vec<String>>,
}

fn has_content(node: &Node) -> bool {
    !node.text.trim().is_empty() || !node.children.is_empty()
}

impl Interpretations {
    fn link(&mut self, regulation: String, interp: String) {
        let targets = self.lookup.entry(regulation).or_default();
        if !targets.contains(&interp) {
            targets.push(interp);
        }
    }
}

impl Layer for Interpretations {
    fn name(&self) -> &'static str {
        "interpretations"
    }

    fn pre_process(&mut self, tree: &Node) {
        let headers = tree.walk(&mut |n: &Node| {
            let idx = n.label.iter().position(|s| s == INTERP)?;
            // Interps of the whole part are the supplement itself.
            (idx > 1 && has_content(n)).then(|| (n.label.clone(), n.title.clone()))
        });
        for (label, title) in headers {
            let id = label.join("-");
            if label.last().is_some_and(|s| s == INTERP) {
                self.link(label[..label.len() - 1].join("-"), id.clone());
            }
            let (Some(part), Some(title)) = (label.first(), title) else {
                continue;
            };
            for mut label in interp_header_labels(&title, part) {
                label.comment = false;
                label.comment_levels.clear();
                if label.section.is_some() || label.appendix.is_some() {
                    self.link(label.label_id(), id.clone());
                }
            }
        }
        debug!(links = self.lookup.len(), "indexed interpretations");
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        if node.is_interp() {
            return None;
        }
        let targets = self.lookup.get(&node.label_id())?;
        to_values(targets.iter().map(|t| Reference { reference: t }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{label, regulation};
    use eregs_core::NodeType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn direct_label_matches() {
        let out = Interpretations::default().build(&regulation());
        assert_eq!(out["100-3"], vec![json!({"reference": "100-3-Interp"})]);
        assert_eq!(out["100-3-a"], vec![json!({"reference": "100-3-a-Interp"})]);
        assert!(!out.contains_key("100"));
        assert!(!out.contains_key("100-2"));
    }

    #[test]
    fn header_naming_two_paragraphs() {
        let tree = Node::regtext("", &["100"]).with_children(vec![
            Node::regtext("", &["100", "5"]).with_children(vec![
                Node::regtext("(a) A.", &["100", "5", "a"]),
                Node::regtext("(b) B.", &["100", "5", "b"]),
            ]),
            Node::new("", label("100-Interp"), NodeType::Interp).with_children(vec![
                Node::new("", label("100-5-Interp"), NodeType::Interp)
                    .with_title("Section 100.5—Timing")
                    .with_children(vec![
                        Node::new("", label("100-5-a_b-Interp"), NodeType::Interp)
                            .with_title("Paragraphs 5(a) and 5(b)")
                            .with_children(vec![Node::new(
                                "1. Both apply.",
                                label("100-5-a_b-Interp-1"),
                                NodeType::Interp,
                            )]),
                    ]),
            ]),
        ]);
        let out = Interpretations::default().build(&tree);
        assert_eq!(out["100-5-a"], vec![json!({"reference": "100-5-a_b-Interp"})]);
        assert_eq!(out["100-5-b"], vec![json!({"reference": "100-5-a_b-Interp"})]);
    }

    #[test]
    fn empty_interpretations_are_not_linked() {
        let tree = Node::regtext("", &["100"]).with_children(vec![
            Node::regtext("(a) A.", &["100", "6", "a"]),
            Node::new("", label("100-6-a-Interp"), NodeType::Interp),
        ]);
        assert!(Interpretations::default().build(&tree).is_empty());
    }
}
