//! Table of contents for nodes whose children are all titled.

use eregs_core::{Node, NodeType};
use serde::Serialize;
use serde_json::Value;

use crate::{Layer, to_values};

#[derive(Debug, Serialize)]
struct Entry<'a> {
    index: &'a [String],
    title: &'a str,
}

#[derive(Debug, Default)]
pub struct TableOfContents;

/// Children as a reader sees them: an untitled subpart wrapper is
/// transparent and contributes its own children.
fn entries(node: &Node) -> Vec<&Node> {
    node.children
        .iter()
        .flat_map(|child| {
            if child.node_type == NodeType::Emptypart {
                child.children.iter().collect::<Vec<_>>()
            } else {
                vec![child]
            }
        })
        .collect()
}

impl Layer for TableOfContents {
    fn name(&self) -> &'static str {
        "toc"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let children = entries(node);
        if children.is_empty() || children.iter().any(|c| c.title.is_none()) {
            return None;
        }
        to_values(children.into_iter().map(|c| Entry {
            index: &c.label,
            title: c.title.as_deref().unwrap_or_default(),
        }))
    }
}
