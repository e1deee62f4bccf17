//! Where each paragraph's own marker sits in its text.

use eregs_core::Node;
use serde::Serialize;
use serde_json::Value;

use crate::{Layer, to_values};

#[derive(Debug, Serialize)]
struct Marker {
    text: String,
    locations: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct ParagraphMarkers;

/// The marker as printed: `(a)` in regulation text, `1.` in
/// interpretations.
fn printed(node: &Node) -> Option<String> {
    let marker = node.marker()?;
    if node.is_interp() {
        return marker
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
            .then(|| format!("{marker}."));
    }
    (node.label.len() > 2).then(|| format!("({marker})"))
}

impl Layer for ParagraphMarkers {
    fn name(&self) -> &'static str {
        "paragraph-markers"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let marker = printed(node)?;
        node.text.trim_start().starts_with(&marker).then(|| {
            to_values([Marker {
                text: marker,
                locations: vec![0],
            }])
        })?
    }
}
