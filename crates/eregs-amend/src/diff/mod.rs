//! Structural and textual differences between two regulation versions.
//!
//! Identical subtrees are skipped by digest. A deleted child's children
//! are held back as possible moves: if a newly added sibling turns out to
//! contain a node with the same label, the pair is compared instead of
//! being reported as a delete plus an add. Child order is not tracked.

pub mod text;

use std::collections::{BTreeMap, HashMap};

use eregs_core::{FrozenNode, NodeType};
use serde::{Deserialize, Serialize};

pub use text::{Opcode, opcodes};

/// What an added node looked like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedNode {
    pub text: String,
    pub title: Option<String>,
    pub label: Vec<String>,
    pub node_type: NodeType,
    pub tagged_text: Option<String>,
    pub child_labels: Vec<String>,
}

impl From<&FrozenNode> for AddedNode {
    fn from(node: &FrozenNode) -> Self {
        Self {
            text: node.text().to_string(),
            title: node.title().map(str::to_string),
            label: node.label().to_vec(),
            node_type: node.node_type(),
            tagged_text: node.tagged_text().map(str::to_string),
            child_labels: node.child_labels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Change {
    Added {
        node: AddedNode,
    },
    Deleted,
    Modified {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Vec<Opcode>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<Vec<Opcode>>,
    },
}

pub type Diff = Vec<(String, Change)>;

/// Every change between `lhs` and `rhs`, keyed by label id.
pub fn changes_between(lhs: &FrozenNode, rhs: &FrozenNode) -> Diff {
    let mut out = Vec::new();
    compare(lhs, rhs, &mut out);
    out
}

fn local_changes(lhs: &FrozenNode, rhs: &FrozenNode) -> Option<Change> {
    let text = (lhs.text() != rhs.text()).then(|| opcodes(lhs.text(), rhs.text()));
    let title = (lhs.title() != rhs.title())
        .then(|| opcodes(lhs.title().unwrap_or_default(), rhs.title().unwrap_or_default()));
    (text.is_some() || title.is_some()).then_some(Change::Modified { text, title })
}

fn compare(lhs: &FrozenNode, rhs: &FrozenNode, out: &mut Diff) {
    if lhs == rhs {
        return;
    }
    if let Some(change) = local_changes(lhs, rhs) {
        out.push((rhs.label_id(), change));
    }

    let old: HashMap<String, &FrozenNode> =
        lhs.children().iter().map(|c| (c.label_id(), c)).collect();
    let new: HashMap<String, &FrozenNode> =
        rhs.children().iter().map(|c| (c.label_id(), c)).collect();
    let mut possibly_moved: BTreeMap<String, FrozenNode> = BTreeMap::new();

    for child in lhs.children() {
        let id = child.label_id();
        if new.contains_key(&id) {
            continue;
        }
        out.push((id, Change::Deleted));
        for grandchild in child.children() {
            possibly_moved.insert(grandchild.label_id(), grandchild.clone());
        }
    }

    for child in rhs.children() {
        let id = child.label_id();
        if old.contains_key(&id) {
            continue;
        }
        out.push((id, Change::Added { node: child.into() }));
        for grandchild in child.children() {
            match possibly_moved.remove(&grandchild.label_id()) {
                Some(previous) => compare(&previous, grandchild, out),
                None => add_subtree(grandchild, out),
            }
        }
    }

    for (_, orphan) in possibly_moved {
        delete_subtree(&orphan, out);
    }

    for child in lhs.children() {
        if let Some(counterpart) = new.get(&child.label_id()) {
            compare(child, counterpart, out);
        }
    }
}

fn add_subtree(node: &FrozenNode, out: &mut Diff) {
    out.push((node.label_id(), Change::Added { node: node.into() }));
    for child in node.children() {
        add_subtree(child, out);
    }
}

fn delete_subtree(node: &FrozenNode, out: &mut Diff) {
    out.push((node.label_id(), Change::Deleted));
    for child in node.children() {
        delete_subtree(child, out);
    }
}
