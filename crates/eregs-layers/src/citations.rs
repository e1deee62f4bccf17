//! Internal and external citation layers over the citation grammar.

use std::collections::BTreeSet;

use eregs_core::citations::{ActCitation, CitationType, char_offset, external_citations};
use eregs_core::{Label, Node, internal_citations};
use serde::Serialize;
use serde_json::Value;

use crate::{Layer, to_values};

fn char_span(text: &str, (start, end): (usize, usize)) -> (usize, usize) {
    (char_offset(text, start), char_offset(text, end))
}

#[derive(Debug, Serialize)]
struct Internal {
    offsets: Vec<(usize, usize)>,
    citation: Vec<String>,
}

/// Citations to other parts of the regulation. With verification on,
/// only citations whose target exists in the tree are kept.
#[derive(Debug)]
pub struct InternalCitations {
    verify: bool,
    known: BTreeSet<String>,
}

impl Default for InternalCitations {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InternalCitations {
    pub fn new(verify: bool) -> Self {
        Self {
            verify,
            known: BTreeSet::new(),
        }
    }
}

impl Layer for InternalCitations {
    fn name(&self) -> &'static str {
        "internal-citations"
    }

    fn pre_process(&mut self, tree: &Node) {
        self.known = tree.label_ids().into_iter().collect();
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        if node.text.is_empty() {
            return None;
        }
        let context = Label::from_node_label(&node.label);
        let found = internal_citations(&node.text, &context)
            .into_iter()
            .map(|c| Internal {
                offsets: vec![char_span(&node.text, (c.start, c.end))],
                citation: c.label.to_list(),
            })
            .filter(|c| !self.verify || self.known.contains(&c.citation.join("-")));
        to_values(found)
    }
}

#[derive(Debug, Serialize)]
struct External {
    offsets: Vec<(usize, usize)>,
    citation: Vec<String>,
    citation_type: CitationType,
}

/// Citations to the CFR, the U.S. Code, public laws, the Statutes at
/// Large, and the Act the regulation implements.
#[derive(Debug, Default)]
pub struct ExternalCitations {
    act: Option<ActCitation>,
}

impl ExternalCitations {
    pub fn new(act: Option<ActCitation>) -> Self {
        Self { act }
    }
}

impl Layer for ExternalCitations {
    fn name(&self) -> &'static str {
        "external-citations"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let text = &node.text;
        let found = external_citations(text, self.act.as_ref())
            .into_iter()
            .map(|c| External {
                offsets: c.offsets.into_iter().map(|o| char_span(text, o)).collect(),
                citation: c.citation,
                citation_type: c.citation_type,
            });
        to_values(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::regulation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn internal_citations_are_verified() {
        let out = InternalCitations::default().build(&regulation());
        assert_eq!(
            out["100-3-b"],
            vec![json!({"offsets": [[18, 26]], "citation": ["100", "2", "a"]})]
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn unverified_keeps_missing_targets() {
        let node = Node::regtext("See § 100.9(c).", &["100", "3", "a"]);
        let tree = Node::regtext("", &["100"]).with_children(vec![node]);
        assert!(InternalCitations::default().build(&tree).is_empty());
        let out = InternalCitations::new(false).build(&tree);
        assert_eq!(out["100-3-a"][0]["citation"], json!(["100", "9", "c"]));
    }

    #[test]
    fn external_citations_in_characters() {
        let out = ExternalCitations::default().build(&regulation());
        assert_eq!(
            out["100-3-b"],
            vec![json!({
                "offsets": [[31, 42]],
                "citation": ["12", "CFR", "1026"],
                "citation_type": "CFR",
            })]
        );
    }

    #[test]
    fn the_act_needs_a_citation() {
        let node = Node::regtext("Section 5 of the Act applies.", &["100", "4", "a"]);
        assert_eq!(ExternalCitations::default().process(&node), None);
        let layer = ExternalCitations::new(Some(ActCitation {
            title: "15".into(),
            section: "1693".into(),
        }));
        let out = layer.process(&node).unwrap();
        assert_eq!(out[0]["citation_type"], json!("THE_ACT"));
        assert_eq!(out[0]["citation"], json!(["15", "U.S.C.", "1693", "5"]));
    }
}
