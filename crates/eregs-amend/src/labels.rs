//! Label checks against the prior tree.

use eregs_core::markers::PARAGRAPH_LEVELS;
use eregs_core::node::is_synthetic;
use eregs_core::{INTERP, Node, SUBPART};
use tracing::{debug, warn};

fn starts_with_digit(segment: &str) -> bool {
    segment.starts_with(|c: char| c.is_ascii_digit())
}

/// Whether a regtext label is structurally impossible: a non-numeric part,
/// or a paragraph marker that cannot occur at its depth (`1005-7-iv`).
/// Appendix, subpart and interpretation labels are not checked.
pub fn bad_label(label: &[String]) -> bool {
    if label.iter().any(|s| s == INTERP || s == SUBPART) {
        return false;
    }
    let Some(section) = label.get(1) else {
        return false;
    };
    if !starts_with_digit(section) {
        return false;
    }
    if !label[0].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    label[2..].iter().enumerate().any(|(depth, segment)| {
        !is_synthetic(segment)
            && PARAGRAPH_LEVELS
                .get(depth)
                .is_none_or(|kind| kind.index_of(segment).is_none())
    })
}

/// A childless node elsewhere in the same section whose last segment
/// matches `label`'s, when exactly one exists. Used when an amendment
/// names a label the prior tree lacks because that tree mis-nested it.
pub fn find_candidate(tree: &Node, label: &[String]) -> Option<Vec<String>> {
    let last = label.last()?;
    let scope = if label.len() > 2 {
        tree.find(&label[..2].join("-")).unwrap_or(tree)
    } else {
        tree
    };
    let mut hits = scope.walk(&mut |n| {
        (n.children.is_empty() && n.marker() == Some(last.as_str()) && n.label != label)
            .then(|| n.label.clone())
    });
    match hits.len() {
        1 => {
            debug!(label = %label.join("-"), candidate = %hits[0].join("-"), "candidate match");
            hits.pop()
        }
        n => {
            warn!(label = %label.join("-"), candidates = n, "no unique candidate");
            None
        }
    }
}
