//! The canonical regulation tree.
//!
//! A [`Node`] owns its text, its label path, and its ordered children. Label
//! identity is the `-`-joined path (`"1005-7-b-2"`); parsers guarantee it is
//! unique within one version of a regulation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Label segment marking subpart grouping (`["1005", "Subpart", "A"]`).
pub const SUBPART: &str = "Subpart";
/// Label segment marking interpretation nodes (`["1005", "7", "Interp"]`).
pub const INTERP: &str = "Interp";
/// Label segment used inside some appendix paths.
pub const APPENDIX: &str = "Appendix";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Regtext,
    Appendix,
    Interp,
    Subpart,
    Emptypart,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Regtext => "regtext",
            NodeType::Appendix => "appendix",
            NodeType::Interp => "interp",
            NodeType::Subpart => "subpart",
            NodeType::Emptypart => "emptypart",
        }
    }
}

/// A regulation element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Text of this node only; children are excluded.
    pub text: String,
    #[serde(default)]
    pub children: Vec<Node>,
    pub label: Vec<String>,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Text with `<E T="03">` emphasis preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged_text: Option<String>,
    /// The XML fragment this node was parsed from, when structure matters
    /// downstream (tables).
    #[serde(skip)]
    pub source_xml: Option<String>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.label == other.label
            && self.node_type == other.node_type
            && self.title == other.title
            && self.tagged_text == other.tagged_text
            && self.children == other.children
    }
}

impl Eq for Node {}

impl Node {
    pub fn new(text: impl Into<String>, label: Vec<String>, node_type: NodeType) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
            label,
            node_type,
            title: None,
            tagged_text: None,
            source_xml: None,
        }
    }

    /// Regtext node from `&str` label segments. Mostly a test convenience.
    pub fn regtext(text: impl Into<String>, label: &[&str]) -> Self {
        Self::new(
            text,
            label.iter().map(|s| s.to_string()).collect(),
            NodeType::Regtext,
        )
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_tagged_text(mut self, tagged: impl Into<String>) -> Self {
        self.tagged_text = Some(tagged.into());
        self
    }

    pub fn with_source_xml(mut self, xml: impl Into<String>) -> Self {
        self.source_xml = Some(xml.into());
        self
    }

    pub fn label_id(&self) -> String {
        self.label.join("-")
    }

    pub fn part(&self) -> Option<&str> {
        self.label.first().map(String::as_str)
    }

    /// Last label segment, i.e. this node's own marker.
    pub fn marker(&self) -> Option<&str> {
        self.label.last().map(String::as_str)
    }

    pub fn is_interp(&self) -> bool {
        self.node_type == NodeType::Interp || self.label.iter().any(|s| s == INTERP)
    }

    pub fn is_section(&self) -> bool {
        self.node_type == NodeType::Regtext
            && self.label.len() == 2
            && self.label[1].chars().all(|c| c.is_ascii_digit())
    }

    pub fn is_subpart(&self) -> bool {
        matches!(self.node_type, NodeType::Subpart | NodeType::Emptypart)
    }

    pub fn child_labels(&self) -> Vec<String> {
        self.children.iter().map(Node::label_id).collect()
    }

    /// Pre-order walk, collecting every `Some` the callback returns.
    pub fn walk<T>(&self, f: &mut impl FnMut(&Node) -> Option<T>) -> Vec<T> {
        let mut out = Vec::new();
        self.walk_into(f, &mut out);
        out
    }

    fn walk_into<T>(&self, f: &mut impl FnMut(&Node) -> Option<T>, out: &mut Vec<T>) {
        if let Some(v) = f(self) {
            out.push(v);
        }
        for child in &self.children {
            child.walk_into(f, out);
        }
    }

    /// Pre-order mutable visit.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// First node in pre-order whose label id matches.
    pub fn find(&self, label_id: &str) -> Option<&Node> {
        if self.label_id() == label_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(label_id))
    }

    pub fn find_mut(&mut self, label_id: &str) -> Option<&mut Node> {
        if self.label_id() == label_id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(label_id))
    }

    /// Label id of the parent of the node with `label_id`, if present.
    pub fn parent_of(&self, label_id: &str) -> Option<&Node> {
        if self.children.iter().any(|c| c.label_id() == label_id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.parent_of(label_id))
    }

    pub fn parent_of_mut(&mut self, label_id: &str) -> Option<&mut Node> {
        if self.children.iter().any(|c| c.label_id() == label_id) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.parent_of_mut(label_id))
    }

    /// Every label id in the subtree, pre-order.
    pub fn label_ids(&self) -> Vec<String> {
        self.walk(&mut |n| Some(n.label_id()))
    }

    /// Concatenate the text of this node and all descendants in document order.
    pub fn join_text(&self) -> String {
        self.walk(&mut |n| Some(n.text.clone())).concat()
    }

    /// Replace a leading label prefix throughout the subtree.
    pub fn relabel(&mut self, old_prefix: &[String], new_prefix: &[String]) {
        self.visit_mut(&mut |n| {
            if n.label.starts_with(old_prefix) {
                let rest = n.label.split_off(old_prefix.len());
                n.label = new_prefix.iter().cloned().chain(rest).collect();
            }
        });
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Label ids that occur more than once in the subtree.
    pub fn duplicate_labels(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for id in self.label_ids() {
            if !seen.insert(id.clone()) && !dupes.contains(&id) {
                dupes.push(id);
            }
        }
        dupes
    }

    /// Children whose label is not an extension of their parent's, once
    /// pivot segments are set aside.
    pub fn prefix_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_prefix_violations(&mut out);
        out
    }

    fn collect_prefix_violations(&self, out: &mut Vec<String>) {
        let parent = significant_segments(&self.label);
        for child in &self.children {
            let own = significant_segments(&child.label);
            if !own.starts_with(&parent) {
                out.push(child.label_id());
            }
            child.collect_prefix_violations(out);
        }
    }
}

/// Label segments with pivots removed: `Subpart` and its letter, `Interp`,
/// and synthetic `pN`/`hN` placeholders.
fn significant_segments(label: &[String]) -> Vec<&str> {
    let mut out = Vec::with_capacity(label.len());
    let mut skip_next = false;
    for seg in label {
        if skip_next {
            skip_next = false;
            continue;
        }
        if seg == SUBPART {
            skip_next = true;
            continue;
        }
        if seg == INTERP || is_synthetic(seg) {
            continue;
        }
        out.push(seg.as_str());
    }
    out
}

/// `p3`, `h12` and friends: labels invented for unmarked paragraphs and headers.
pub fn is_synthetic(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some('p' | 'h'))
        && segment.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

/// Build trees out of a flat list of nodes by label-prefix relationships.
///
/// The nodes with the shortest labels become roots; every other node is
/// placed beneath the root whose label it extends. Children already attached
/// to a node are kept ahead of those found in the list.
pub fn treeify(nodes: Vec<Node>) -> Vec<Node> {
    let Some(min_len) = nodes.iter().map(|n| n.label.len()).min() else {
        return Vec::new();
    };
    let (roots, rest): (Vec<Node>, Vec<Node>) =
        nodes.into_iter().partition(|n| n.label.len() == min_len);

    let mut rest = rest;
    roots
        .into_iter()
        .map(|mut root| {
            let (mine, others): (Vec<Node>, Vec<Node>) = std::mem::take(&mut rest)
                .into_iter()
                .partition(|n| n.label.starts_with(&root.label));
            rest = others;
            for child in treeify(mine) {
                if !root.children.iter().any(|c| c.label == child.label) {
                    root.children.push(child);
                }
            }
            root
        })
        .collect()
}
