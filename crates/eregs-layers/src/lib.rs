//! Layers: annotations keyed by node label, computed from a finished tree.
//!
//! A layer may look at the whole tree once ([`Layer::pre_process`]) and is
//! then asked about each node in turn. Layers never change the tree.

pub mod citations;
pub mod formatting;
pub mod graphics;
pub mod interpretations;
pub mod key_terms;
pub mod meta;
pub mod paragraph_markers;
pub mod sxs;
pub mod terms;
pub mod toc;

use std::collections::BTreeMap;

use eregs_core::Node;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub use citations::{ExternalCitations, InternalCitations};
pub use formatting::Formatting;
pub use graphics::Graphics;
pub use interpretations::Interpretations;
pub use key_terms::KeyTerms;
pub use meta::Meta;
pub use paragraph_markers::ParagraphMarkers;
pub use sxs::SectionBySection;
pub use terms::Terms;
pub use toc::TableOfContents;

/// label id → annotations.
pub type LayerOutput = BTreeMap<String, Vec<Value>>;

pub trait Layer {
    /// Name used in output paths (`layer/{name}/...`).
    fn name(&self) -> &'static str;

    fn pre_process(&mut self, _tree: &Node) {}

    /// Annotations for one node, or `None` for nothing.
    fn process(&self, node: &Node) -> Option<Vec<Value>>;

    /// Walk the tree and collect every node's annotations.
    fn build(&mut self, tree: &Node) -> LayerOutput {
        self.pre_process(tree);
        let mut out = LayerOutput::new();
        collect(self, tree, &mut out);
        debug!(layer = self.name(), labels = out.len(), "built layer");
        out
    }
}

pub(crate) fn collect<L: Layer + ?Sized>(layer: &L, node: &Node, out: &mut LayerOutput) {
    if let Some(annotations) = layer.process(node)
        && !annotations.is_empty()
    {
        out.insert(node.label_id(), annotations);
    }
    for child in &node.children {
        collect(layer, child, out);
    }
}

/// Serialise typed annotations, dropping any that fail to serialise.
pub(crate) fn to_values<T: Serialize>(items: impl IntoIterator<Item = T>) -> Option<Vec<Value>> {
    let values: Vec<Value> = items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect();
    (!values.is_empty()).then_some(values)
}

/// Occurrence indices (`0` for the first) used by inline layers.
pub(crate) fn occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    (0..haystack.matches(needle).count()).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use eregs_core::{Node, NodeType};

    pub fn label(id: &str) -> Vec<String> {
        id.split('-').map(str::to_string).collect()
    }

    /// A small part with one definitions section, a substantive section,
    /// and interpretations for the latter.
    pub fn regulation() -> Node {
        Node::regtext("", &["100"])
            .with_title("PART 100—WIDGET DISCLOSURES (REGULATION W)")
            .with_children(vec![
                Node::new("", label("100-Subpart"), NodeType::Emptypart).with_children(vec![
                    Node::regtext("", &["100", "2"])
                        .with_title("§ 100.2 Definitions.")
                        .with_children(vec![
                            Node::regtext(
                                "(a) “Widget” means a small gadget.",
                                &["100", "2", "a"],
                            ),
                            Node::regtext(
                                "(b) “Widget dealer” means a person selling widgets.",
                                &["100", "2", "b"],
                            ),
                        ]),
                    Node::regtext("", &["100", "3"])
                        .with_title("§ 100.3 Disclosures.")
                        .with_children(vec![
                            Node::regtext(
                                "(a) A widget dealer must disclose each widget's price.",
                                &["100", "3", "a"],
                            )
                            .with_tagged_text(
                                "(a) A widget dealer must disclose each widget's price.",
                            ),
                            Node::regtext(
                                "(b) Timing. See § 100.2(a) and 12 CFR 1026.",
                                &["100", "3", "b"],
                            )
                            .with_tagged_text(
                                r#"(b) <E T="03">Timing.</E> See § 100.2(a) and 12 CFR 1026."#,
                            ),
                        ]),
                ]),
                Node::new("", label("100-Interp"), NodeType::Interp)
                    .with_title("Supplement I to Part 100")
                    .with_children(vec![
                        Node::new("", label("100-3-Interp"), NodeType::Interp)
                            .with_title("Section 100.3—Disclosures")
                            .with_children(vec![Node::new(
                                "",
                                label("100-3-a-Interp"),
                                NodeType::Interp,
                            )
                            .with_title("3(a) General")
                            .with_children(vec![Node::new(
                                "1. A widget dealer includes brokers.",
                                label("100-3-a-Interp-1"),
                                NodeType::Interp,
                            )])]),
                    ]),
            ])
    }
}
