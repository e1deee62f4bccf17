//! Section-by-section analysis from a notice's supplementary information.
//!
//! The analysis lives under an `HD` reading "Section-by-Section Analysis"
//! inside `SUPLINF`. Each deeper heading starts a node; the labels it
//! discusses are read from the heading the same way interpretation
//! headers are read.

use eregs_core::citations::interp_header_labels;
use roxmltree::Node as XmlNode;
use serde::{Deserialize, Serialize};

use crate::xml::text_of;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SxsNode {
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub children: Vec<SxsNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl SxsNode {
    /// This node and every descendant, depth first.
    pub fn walk(&self) -> Vec<&SxsNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// `HD1` is 1, `HD2` is 2; anything unlabelled is treated as the shallowest.
fn header_level(hd: XmlNode<'_, '_>) -> usize {
    hd.attribute("SOURCE")
        .and_then(|s| s.strip_prefix("HD"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn labels_for(title: &str, part: &str) -> Vec<String> {
    interp_header_labels(title, part)
        .into_iter()
        .map(|mut label| {
            label.comment = false;
            label.comment_levels.clear();
            label.label_id()
        })
        .collect()
}

/// Build the analysis tree. `start_page` is the page the notice begins on;
/// `PRTPAGE` markers advance it.
pub fn parse_sxs(root: XmlNode<'_, '_>, part: &str, start_page: Option<u32>) -> Vec<SxsNode> {
    let Some(suplinf) = root.descendants().find(|n| n.has_tag_name("SUPLINF")) else {
        return Vec::new();
    };

    let mut page = start_page;
    let mut base: Option<usize> = None;
    // (level, node) pairs for open headings, outermost first.
    let mut stack: Vec<(usize, SxsNode)> = Vec::new();
    let mut roots: Vec<SxsNode> = Vec::new();

    fn close_to(level: usize, stack: &mut Vec<(usize, SxsNode)>, roots: &mut Vec<SxsNode>) {
        while stack.last().is_some_and(|(l, _)| *l >= level) {
            let Some((_, node)) = stack.pop() else { break };
            match stack.last_mut() {
                Some((_, parent)) => parent.children.push(node),
                None => roots.push(node),
            }
        }
    }

    for el in suplinf.descendants().filter(|n| n.is_element()) {
        match el.tag_name().name() {
            "PRTPAGE" => {
                if let Some(p) = el.attribute("P").and_then(|p| p.parse().ok()) {
                    page = Some(p);
                }
            }
            "HD" => {
                let title = text_of(el);
                let level = header_level(el);
                match base {
                    None => {
                        if title.to_lowercase().contains("section-by-section analysis") {
                            base = Some(level);
                        }
                    }
                    Some(b) if level <= b => {
                        close_to(0, &mut stack, &mut roots);
                        return roots;
                    }
                    Some(_) => {
                        close_to(level, &mut stack, &mut roots);
                        let labels = labels_for(&title, part);
                        stack.push((
                            level,
                            SxsNode {
                                title,
                                labels,
                                page,
                                ..SxsNode::default()
                            },
                        ));
                    }
                }
            }
            "P" | "FP" if base.is_some() => {
                if let Some((_, node)) = stack.last_mut() {
                    let text = text_of(el);
                    if !text.is_empty() {
                        node.paragraphs.push(text);
                    }
                }
            }
            _ => {}
        }
    }

    close_to(0, &mut stack, &mut roots);
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;
    use pretty_assertions::assert_eq;

    const SUPLINF: &str = r#"<RULE><SUPLINF>
        <HD SOURCE="HD1">I. Background</HD>
        <P>History.</P>
        <HD SOURCE="HD1">V. Section-by-Section Analysis</HD>
        <HD SOURCE="HD2">Section 1005.2 Definitions</HD>
        <P>General remarks.</P>
        <HD SOURCE="HD3">2(b) Account</HD>
        <P>Account remarks.</P>
        <PRTPAGE P="50245"/>
        <P>More on accounts.</P>
        <HD SOURCE="HD3">2(c) Business Day</HD>
        <P>Day remarks.</P>
        <HD SOURCE="HD2">Appendix A</HD>
        <P>Forms.</P>
        <HD SOURCE="HD1">VI. Regulatory Analysis</HD>
        <P>Not analysis.</P>
        </SUPLINF></RULE>"#;

    #[test]
    fn analysis_tree() {
        let doc = parse_document(SUPLINF).unwrap();
        let sxs = parse_sxs(doc.root_element(), "1005", Some(50244));
        assert_eq!(sxs.len(), 2);

        let definitions = &sxs[0];
        assert_eq!(definitions.labels, vec!["1005-2"]);
        assert_eq!(definitions.paragraphs, vec!["General remarks."]);
        assert_eq!(definitions.page, Some(50244));
        assert_eq!(definitions.children.len(), 2);
        assert_eq!(definitions.children[0].labels, vec!["1005-2-b"]);
        assert_eq!(definitions.children[0].paragraphs.len(), 2);
        assert_eq!(definitions.children[1].page, Some(50245));

        assert_eq!(sxs[1].labels, vec!["1005-A"]);
        assert_eq!(sxs[1].paragraphs, vec!["Forms."]);
    }

    #[test]
    fn no_analysis() {
        let doc = parse_document("<RULE><SUPLINF><HD>Background</HD></SUPLINF></RULE>").unwrap();
        assert!(parse_sxs(doc.root_element(), "1005", None).is_empty());
    }
}
