//! Immutable, content-hashed tree snapshots.
//!
//! Every [`FrozenNode`] carries a SHA-256 digest over its own fields and its
//! children's digests, so equality of whole subtrees is a digest compare.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::node::{Node, NodeType};

#[derive(Clone)]
pub struct FrozenNode {
    inner: Arc<Inner>,
}

struct Inner {
    text: String,
    title: Option<String>,
    tagged_text: Option<String>,
    label: Vec<String>,
    node_type: NodeType,
    children: Vec<FrozenNode>,
    digest: [u8; 32],
}

impl FrozenNode {
    pub fn new(
        text: String,
        title: Option<String>,
        tagged_text: Option<String>,
        label: Vec<String>,
        node_type: NodeType,
        children: Vec<FrozenNode>,
    ) -> Self {
        let digest = compute_digest(&text, &title, &tagged_text, &label, node_type, &children);
        Self {
            inner: Arc::new(Inner {
                text,
                title,
                tagged_text,
                label,
                node_type,
                children,
                digest,
            }),
        }
    }

    pub fn from_node(node: &Node) -> Self {
        let children = node.children.iter().map(FrozenNode::from_node).collect();
        Self::new(
            node.text.clone(),
            node.title.clone(),
            node.tagged_text.clone(),
            node.label.clone(),
            node.node_type,
            children,
        )
    }

    /// Thaw back into a mutable tree.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(self.text(), self.label().to_vec(), self.node_type());
        node.title = self.inner.title.clone();
        node.tagged_text = self.inner.tagged_text.clone();
        node.children = self.children().iter().map(FrozenNode::to_node).collect();
        node
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    pub fn title(&self) -> Option<&str> {
        self.inner.title.as_deref()
    }

    pub fn tagged_text(&self) -> Option<&str> {
        self.inner.tagged_text.as_deref()
    }

    pub fn label(&self) -> &[String] {
        &self.inner.label
    }

    pub fn label_id(&self) -> String {
        self.inner.label.join("-")
    }

    pub fn node_type(&self) -> NodeType {
        self.inner.node_type
    }

    pub fn children(&self) -> &[FrozenNode] {
        &self.inner.children
    }

    pub fn child_labels(&self) -> Vec<String> {
        self.children().iter().map(FrozenNode::label_id).collect()
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.inner.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.inner.digest)
    }

    /// Same content at this node, ignoring children.
    pub fn same_local_content(&self, other: &FrozenNode) -> bool {
        self.text() == other.text()
            && self.title() == other.title()
            && self.label() == other.label()
            && self.node_type() == other.node_type()
    }
}

fn compute_digest(
    text: &str,
    title: &Option<String>,
    tagged_text: &Option<String>,
    label: &[String],
    node_type: NodeType,
    children: &[FrozenNode],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    // Length-prefix each field so ("ab","c") and ("a","bc") differ.
    let mut field = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };
    field(text.as_bytes());
    field(title.as_deref().unwrap_or("\u{0}").as_bytes());
    field(tagged_text.as_deref().unwrap_or("\u{0}").as_bytes());
    for segment in label {
        field(segment.as_bytes());
    }
    field(node_type.as_str().as_bytes());
    for child in children {
        field(child.digest().as_slice());
    }
    hasher.finalize().into()
}

impl PartialEq for FrozenNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.digest == other.inner.digest
    }
}

impl Eq for FrozenNode {}

impl Hash for FrozenNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.digest.hash(state);
    }
}

impl fmt::Debug for FrozenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenNode")
            .field("label", &self.label_id())
            .field("text", &self.text())
            .field("children", &self.children().len())
            .finish()
    }
}

impl From<&Node> for FrozenNode {
    fn from(node: &Node) -> Self {
        FrozenNode::from_node(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tree(leaf_text: &str) -> Node {
        Node::regtext("", &["1", "2"]).with_children(vec![
            Node::regtext("(a) First", &["1", "2", "a"]),
            Node::regtext(leaf_text, &["1", "2", "b"]),
        ])
    }

    #[test]
    fn equal_trees_are_equal() {
        assert_eq!(
            FrozenNode::from_node(&tree("(b) Second")),
            FrozenNode::from_node(&tree("(b) Second"))
        );
    }

    #[test]
    fn deep_change_changes_root_digest() {
        let a = FrozenNode::from_node(&tree("(b) Second"));
        let b = FrozenNode::from_node(&tree("(b) Changed"));
        assert_ne!(a, b);
        assert_eq!(a.children()[0], b.children()[0]);
        assert_ne!(a.children()[1], b.children()[1]);
    }

    #[test]
    fn title_none_differs_from_empty_title() {
        let plain = FrozenNode::from_node(&Node::regtext("x", &["1"]));
        let titled = FrozenNode::from_node(&Node::regtext("x", &["1"]).with_title(""));
        assert_ne!(plain, titled);
    }

    #[test]
    fn hash_set_dedupes_by_value() {
        let mut set = HashSet::new();
        set.insert(FrozenNode::from_node(&tree("(b) Second")));
        set.insert(FrozenNode::from_node(&tree("(b) Second")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn thaw_round_trip() {
        let original = tree("(b) Second").with_title("Title");
        let thawed = FrozenNode::from_node(&original).to_node();
        assert_eq!(thawed, original);
    }

    #[test]
    fn digest_hex_is_lowercase_and_decodes_back() {
        let frozen = FrozenNode::from_node(&tree("x"));
        let hex = frozen.digest_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(hex::decode(&hex).unwrap(), frozen.digest().to_vec());
    }
}
