//! The mutable working copy amendments are applied to.

use std::cmp::Ordering;

use eregs_core::sort_key::{SegmentFamily, compare_segments, sibling_family};
use eregs_core::{INTERP, Node, SUBPART};
use eregs_parse::Field;
use tracing::{debug, warn};

fn id(label: &[String]) -> String {
    label.join("-")
}

fn is_section_label(label: &[String]) -> bool {
    label.len() == 2 && label[1].starts_with(|c: char| c.is_ascii_digit())
}

fn is_subpart_label(label: &[String]) -> bool {
    label.get(1).is_some_and(|s| s == SUBPART)
}

/// Order two sibling labels by their last segment.
fn sibling_order(a: &[String], b: &[String], family_of: &[&str]) -> Ordering {
    let family = sibling_family(family_of.iter().copied());
    match (a.last(), b.last()) {
        (Some(x), Some(y)) => compare_segments(x, y, family),
        _ => Ordering::Equal,
    }
}

/// Replace a leading `(old)` marker in `text` with `(new)`.
fn rewrite_marker(text: &str, old: &str, new: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix(&format!("({old})"))?;
    Some(format!("({new}){rest}"))
}

/// A regulation being amended. Owns its tree outright; nothing else sees
/// it until [`RegulationTree::into_node`].
#[derive(Debug, Clone)]
pub struct RegulationTree {
    root: Node,
}

impl RegulationTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_node(self) -> Node {
        self.root
    }

    pub fn contains(&self, label: &[String]) -> bool {
        self.root.find(&id(label)).is_some()
    }

    /// Detach the subtree at `label`.
    pub fn delete(&mut self, label: &[String]) -> Option<Node> {
        let label_id = id(label);
        let parent = self.root.parent_of_mut(&label_id)?;
        let idx = parent.children.iter().position(|c| c.label_id() == label_id)?;
        Some(parent.children.remove(idx))
    }

    /// Empty the node at `label`, leaving a `[Reserved]` placeholder.
    pub fn reserve(&mut self, label: &[String]) -> bool {
        let Some(node) = self.root.find_mut(&id(label)) else {
            return false;
        };
        node.children.clear();
        node.tagged_text = None;
        if is_section_label(label) {
            node.text = String::new();
            node.title = Some(format!("§ {}.{} [Reserved]", label[0], label[1]));
        } else if label.len() > 2 && !node.is_interp() && !is_subpart_label(label) {
            node.text = format!("({}) [Reserved]", label[label.len() - 1]);
        } else {
            node.text = "[Reserved]".to_string();
        }
        true
    }

    /// Swap in `node` at `label`, or only one of its fields.
    pub fn replace(&mut self, label: &[String], mut node: Node, field: Option<Field>) -> bool {
        let Some(existing) = self.root.find_mut(&id(label)) else {
            return false;
        };
        match field {
            Some(Field::Title | Field::Heading) => existing.title = node.title,
            Some(Field::Text) => {
                existing.text = node.text;
                existing.tagged_text = node.tagged_text;
            }
            None => {
                if node.label != label {
                    let old = node.label.clone();
                    node.relabel(&old, label);
                }
                *existing = node;
            }
        }
        true
    }

    /// Insert `node` where its label says it belongs. An existing node with
    /// the same label is replaced.
    pub fn add(&mut self, node: Node) -> bool {
        let label = node.label.clone();
        if self.contains(&label) {
            debug!(label = %id(&label), "added node already present, replacing");
            return self.replace(&label, node, None);
        }
        if label.len() < 2 {
            return false;
        }

        if is_subpart_label(&label) {
            let at = self.subpart_position(&label);
            self.root.children.insert(at, node);
            return true;
        }
        if is_section_label(&label) {
            let root = &mut self.root;
            let holder = Self::subpart_for_section(root, &label);
            let siblings = match holder {
                Some(idx) => &mut root.children[idx].children,
                None => &mut root.children,
            };
            insert_sorted(siblings, node);
            return true;
        }
        if label.len() == 2 && label[1] != INTERP {
            let at = self
                .root
                .children
                .iter()
                .position(|c| {
                    c.is_interp()
                        || (c.node_type == node.node_type
                            && sibling_order(&c.label, &label, &[]) == Ordering::Greater)
                })
                .unwrap_or(self.root.children.len());
            self.root.children.insert(at, node);
            return true;
        }
        if label == [label[0].clone(), INTERP.to_string()] {
            self.root.children.push(node);
            return true;
        }

        let Some(parent_id) = self.parent_for(&label) else {
            warn!(label = %id(&label), "no parent for added node");
            return false;
        };
        match self.root.find_mut(&parent_id) {
            Some(parent) => {
                insert_sorted(&mut parent.children, node);
                true
            }
            None => false,
        }
    }

    /// Move the subtree at `from` to `to`, relabelling it. A subpart
    /// destination moves the node into that subpart unchanged.
    pub fn move_to(&mut self, from: &[String], to: &[String]) -> bool {
        match self.detach_for_move(from, to) {
            Some(node) => self.place_moved(node, to),
            None => false,
        }
    }

    /// Whether a move to `to` would land on an existing node rather than
    /// into a subpart.
    pub fn destination_taken(&self, to: &[String]) -> bool {
        !is_subpart_label(to) && self.contains(to)
    }

    /// First half of a move: detach the subtree at `from` and relabel it
    /// for `to`, with its paragraph marker rewritten. Nothing is inserted,
    /// so several moves can detach before any of them lands.
    pub fn detach_for_move(&mut self, from: &[String], to: &[String]) -> Option<Node> {
        let mut node = self.delete(from)?;
        if is_subpart_label(to) && !is_subpart_label(from) {
            return Some(node);
        }
        node.relabel(from, to);
        if let (Some(old), Some(new)) = (from.last(), to.last()) {
            if let Some(text) = rewrite_marker(&node.text, old, new) {
                node.text = text;
            }
            if let Some(tagged) = node.tagged_text.as_deref()
                && let Some(text) = rewrite_marker(tagged, old, new)
            {
                node.tagged_text = Some(text);
            }
        }
        Some(node)
    }

    /// Second half of a move: insert a detached node at `to`.
    pub fn place_moved(&mut self, node: Node, to: &[String]) -> bool {
        if is_subpart_label(to) && !is_subpart_label(&node.label) {
            let to_id = id(to);
            return match self.root.children.iter_mut().find(|c| c.label_id() == to_id) {
                Some(subpart) => {
                    insert_sorted(&mut subpart.children, node);
                    true
                }
                None => {
                    warn!(label = %to_id, "destination subpart missing");
                    self.add(node)
                }
            };
        }
        self.add(node)
    }

    /// Nearest existing ancestor for a nested label.
    fn parent_for(&self, label: &[String]) -> Option<String> {
        if let Some(pos) = label.iter().position(|s| s == INTERP)
            && pos == label.len() - 1
        {
            // [part, 7, b, Interp] hangs under [part, 7, Interp], then [part, Interp].
            for cut in (1..pos).rev() {
                let mut candidate = label[..cut].to_vec();
                candidate.push(INTERP.to_string());
                if self.contains(&candidate) {
                    return Some(id(&candidate));
                }
            }
            return None;
        }
        (1..label.len())
            .rev()
            .map(|cut| &label[..cut])
            .find(|prefix| self.contains(prefix))
            .map(id)
    }

    /// Index of the subpart holding the closest preceding section.
    fn subpart_for_section(root: &Node, label: &[String]) -> Option<usize> {
        let mut best: Option<(usize, &str)> = None;
        let mut first = None;
        for (idx, child) in root.children.iter().enumerate() {
            if !child.is_subpart() {
                continue;
            }
            first.get_or_insert(idx);
            for section in &child.children {
                let Some(number) = section.label.get(1) else { continue };
                if compare_segments(number, &label[1], SegmentFamily::Alpha) == Ordering::Less
                    && best.is_none_or(|(_, b)| {
                        compare_segments(number, b, SegmentFamily::Alpha) == Ordering::Greater
                    })
                {
                    best = Some((idx, number));
                }
            }
        }
        best.map(|(idx, _)| idx).or(first)
    }

    fn subpart_position(&self, label: &[String]) -> usize {
        let children = &self.root.children;
        let subparts: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_subpart())
            .map(|(i, _)| i)
            .collect();
        for &i in &subparts {
            if children[i].label.len() > 2
                && label.len() > 2
                && children[i].label[2] > label[2]
            {
                return i;
            }
        }
        subparts.last().map_or(0, |&i| i + 1)
    }
}

/// Insert keeping siblings in marker order.
fn insert_sorted(siblings: &mut Vec<Node>, node: Node) {
    let markers: Vec<&str> = siblings
        .iter()
        .filter_map(Node::marker)
        .chain(node.marker())
        .collect();
    let at = siblings
        .iter()
        .position(|s| sibling_order(&s.label, &node.label, &markers) == Ordering::Greater)
        .unwrap_or(siblings.len());
    siblings.insert(at, node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use eregs_core::NodeType;
    use pretty_assertions::assert_eq;

    fn label(id: &str) -> Vec<String> {
        id.split('-').map(str::to_string).collect()
    }

    fn tree() -> RegulationTree {
        RegulationTree::new(Node::regtext("", &["1005"]).with_children(vec![
            Node::new("", label("1005-Subpart-A"), NodeType::Subpart).with_children(vec![
                Node::regtext("", &["1005", "1"]).with_children(vec![
                    Node::regtext("(a) A.", &["1005", "1", "a"]),
                    Node::regtext("(c) C.", &["1005", "1", "c"]),
                ]),
                Node::regtext("", &["1005", "3"]),
            ]),
            Node::new("", label("1005-Subpart-C"), NodeType::Subpart)
                .with_children(vec![Node::regtext("", &["1005", "30"])]),
            Node::new("", label("1005-A"), NodeType::Appendix),
            Node::new("", label("1005-Interp"), NodeType::Interp),
        ]))
    }

    #[test]
    fn added_paragraph_lands_in_order() {
        let mut t = tree();
        assert!(t.add(Node::regtext("(b) B.", &["1005", "1", "b"])));
        assert_eq!(
            t.root().find("1005-1").unwrap().child_labels(),
            vec!["1005-1-a", "1005-1-b", "1005-1-c"]
        );
    }

    #[test]
    fn added_section_joins_preceding_subpart() {
        let mut t = tree();
        t.add(Node::regtext("", &["1005", "2"]));
        t.add(Node::regtext("", &["1005", "31"]));
        assert_eq!(
            t.root().find("1005-Subpart-A").unwrap().child_labels(),
            vec!["1005-1", "1005-2", "1005-3"]
        );
        assert_eq!(
            t.root().find("1005-Subpart-C").unwrap().child_labels(),
            vec!["1005-30", "1005-31"]
        );
    }

    #[test]
    fn added_subpart_takes_letter_position() {
        let mut t = tree();
        t.add(Node::new("", label("1005-Subpart-B"), NodeType::Subpart));
        assert_eq!(
            t.root().child_labels(),
            vec![
                "1005-Subpart-A",
                "1005-Subpart-B",
                "1005-Subpart-C",
                "1005-A",
                "1005-Interp"
            ]
        );
    }

    #[test]
    fn reserve_and_move() {
        let mut t = tree();
        assert!(t.reserve(&label("1005-3")));
        assert_eq!(
            t.root().find("1005-3").unwrap().title.as_deref(),
            Some("§ 1005.3 [Reserved]")
        );

        assert!(t.move_to(&label("1005-1-c"), &label("1005-1-d")));
        let moved = t.root().find("1005-1-d").unwrap();
        assert_eq!(moved.text, "(d) C.");
        assert!(!t.contains(&label("1005-1-c")));
    }

    #[test]
    fn move_into_another_subpart() {
        let mut t = tree();
        assert!(t.move_to(&label("1005-3"), &label("1005-Subpart-C")));
        assert_eq!(
            t.root().find("1005-Subpart-C").unwrap().child_labels(),
            vec!["1005-3", "1005-30"]
        );
    }

    #[test]
    fn interp_nodes_find_their_parent() {
        let mut t = tree();
        t.add(Node::new("", label("1005-1-Interp"), NodeType::Interp));
        t.add(Node::new("", label("1005-1-a-Interp"), NodeType::Interp));
        t.add(Node::new("1. Comment.", label("1005-1-a-Interp-1"), NodeType::Interp));
        let interp = t.root().find("1005-1-Interp").unwrap();
        assert_eq!(interp.child_labels(), vec!["1005-1-a-Interp"]);
        assert_eq!(
            interp.children[0].child_labels(),
            vec!["1005-1-a-Interp-1"]
        );
    }
}
