//! Track one node across versions.

use eregs_core::Node;
use serde::Serialize;

/// The node as it stood in one version; `None` text means it was absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sighting {
    pub version: String,
    pub text: Option<String>,
    pub title: Option<String>,
}

/// Versions (in order) where the node's text or title differs from the
/// version before. The first version is reported whenever the node is
/// present in it.
pub fn watch_node(label_id: &str, versions: &[(String, Node)]) -> Vec<Sighting> {
    let mut out = Vec::new();
    let mut previous: Option<(Option<String>, Option<String>)> = None;
    for (version, tree) in versions {
        let current = match tree.find(label_id) {
            Some(node) => (Some(node.text.clone()), node.title.clone()),
            None => (None, None),
        };
        let changed = match &previous {
            Some(prev) => *prev != current,
            None => current.0.is_some(),
        };
        if changed {
            out.push(Sighting {
                version: version.clone(),
                text: current.0.clone(),
                title: current.1.clone(),
            });
        }
        previous = Some(current);
    }
    out
}
