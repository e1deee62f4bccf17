//! Appendices in XML.
//!
//! `HD` elements delimit the appendix: `A-1` style headers become numbered
//! children, other headers synthetic `hN` children nested by their
//! `SOURCE` level. Marked paragraphs under a header are nested with the
//! depth solver; unmarked ones become `pN`.

use std::sync::LazyLock;

use eregs_core::{MarkerToken, Node, NodeType, Settings};
use regex::Regex;
use roxmltree::{Document, Node as XmlNode};
use tracing::debug;

use super::paragraph::{Unit, assign_depths, build_nodes, split_tagged};
use super::tables::TableData;
use super::{source_of, tagged_text_of, text_of};

static APPENDIX_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)appendix\s+([A-Z]{1,2})\b").expect("static regex")
});

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{1,2})-(\d+)\b").expect("static regex"));

/// Appendix letter from a heading such as `Appendix A to Part 1005—…`.
pub fn appendix_letter(heading: &str) -> Option<String> {
    APPENDIX_TITLE.captures(heading).map(|c| c[1].to_uppercase())
}

fn header_level(hd: XmlNode<'_, '_>) -> usize {
    match hd.attribute("SOURCE") {
        Some("HD2") => 2,
        Some("HD3") => 3,
        Some("HD4") => 4,
        _ => 1,
    }
}

struct Section {
    node: Node,
    level: usize,
    units: Vec<Unit>,
}

/// Build `[part, letter]` from an `<APPENDIX>` element.
pub fn parse_appendix(
    doc: &Document<'_>,
    appendix: XmlNode<'_, '_>,
    part: &str,
    settings: &Settings,
) -> Option<Node> {
    let mut headers = appendix.children().filter(|c| c.has_tag_name("HD"));
    let heading = headers.next().map(text_of)?;
    let letter = appendix_letter(&heading)?;
    let label = vec![part.to_string(), letter.clone()];
    let ignored = settings.ignored_subheader_labels(part, &letter);

    let mut root = Section {
        node: Node::new("", label.clone(), NodeType::Appendix).with_title(heading.as_str()),
        level: 0,
        units: Vec::new(),
    };
    let mut open: Vec<Section> = Vec::new();
    let mut generic = 0;
    let mut skipped_title = false;

    for child in appendix.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "HD" if !skipped_title => skipped_title = true,
            "HD" => {
                let title = text_of(child);
                let (segment, level) = match NUMBERED.captures(&title) {
                    Some(c) if c[1] == letter => (c[2].to_string(), 1),
                    _ => {
                        generic += 1;
                        (format!("h{generic}"), header_level(child))
                    }
                };
                let mut child_label = label.clone();
                child_label.push(segment);
                if ignored.contains(&child_label.join("-")) {
                    debug!(label = %child_label.join("-"), "ignoring appendix subheader");
                    current(&mut root, &mut open)
                        .units
                        .push(Unit::markerless(tagged_text_of(child)));
                    continue;
                }
                while open.last().is_some_and(|s| s.level >= level) {
                    close(&mut root, &mut open);
                }
                let parent_label = open.last().map_or(&label, |s| &s.node.label);
                let mut nested = parent_label.clone();
                nested.push(child_label.pop().unwrap_or_default());
                open.push(Section {
                    node: Node::new("", nested, NodeType::Appendix).with_title(title),
                    level,
                    units: Vec::new(),
                });
            }
            "P" | "FP" => {
                let units = split_tagged(&tagged_text_of(child));
                current(&mut root, &mut open).units.extend(units);
            }
            "GPOTABLE" => {
                let table = TableData::from_node(child);
                let unit = Unit::markerless(table.to_markdown()).with_source_xml(source_of(doc, child));
                current(&mut root, &mut open).units.push(unit);
            }
            "GPH" => {
                if let Some(gid) = child.children().find(|c| c.has_tag_name("GID")) {
                    let unit = Unit::markerless(format!("![]({})", text_of(gid)));
                    current(&mut root, &mut open).units.push(unit);
                }
            }
            "STARS" => current(&mut root, &mut open).units.push(Unit::stars()),
            _ => {}
        }
    }
    while !open.is_empty() {
        close(&mut root, &mut open);
    }
    Some(finish(root))
}

fn current<'a>(root: &'a mut Section, open: &'a mut [Section]) -> &'a mut Section {
    match open.last_mut() {
        Some(section) => section,
        None => root,
    }
}

fn close(root: &mut Section, open: &mut Vec<Section>) {
    if let Some(section) = open.pop() {
        let node = finish(section);
        current(root, open).node.children.push(node);
    }
}

/// Turn a header's pending units into its text and paragraph children.
fn finish(section: Section) -> Node {
    let Section { mut node, units, .. } = section;
    let mut units = units.into_iter().peekable();
    let mut intro: Vec<String> = Vec::new();
    while let Some(unit) =
        units.next_if(|u| u.token == MarkerToken::Markerless && u.source_xml.is_none())
    {
        intro.push(unit.text);
    }
    let rest: Vec<Unit> = units.collect();
    if !intro.is_empty() {
        node.text = intro.join("\n");
    }
    if !rest.is_empty() {
        let depths = assign_depths(&rest, None);
        let mut paragraphs = build_nodes(rest, &depths, &node.label, NodeType::Appendix);
        // Header children were closed first; paragraphs precede them.
        paragraphs.append(&mut node.children);
        node.children = paragraphs;
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str, settings: &Settings) -> Node {
        let doc = parse_document(xml).unwrap();
        parse_appendix(&doc, doc.root_element(), "1005", settings).unwrap()
    }

    #[test]
    fn numbered_and_generic_headers() {
        let xml = r#"<APPENDIX>
<HD SOURCE="HED">Appendix A to Part 1005—Model Clauses</HD>
<P>Use of the forms is optional.</P>
<HD SOURCE="HD1">A-1—Initial Disclosures</HD>
<P>(a) Liability. Text.</P>
<P>(b) Errors. Text.</P>
<HD SOURCE="HD1">Instructions</HD>
<HD SOURCE="HD2">Filling In</HD>
<P>Complete every field.</P>
</APPENDIX>"#;
        let node = parse(xml, &Settings::default());
        assert_eq!(node.label_id(), "1005-A");
        assert_eq!(node.text, "Use of the forms is optional.");
        assert_eq!(node.child_labels(), vec!["1005-A-1", "1005-A-h1"]);
        assert_eq!(node.children[0].child_labels(), vec!["1005-A-1-a", "1005-A-1-b"]);
        let h1 = &node.children[1];
        assert_eq!(h1.child_labels(), vec!["1005-A-h1-h2"]);
        assert_eq!(h1.children[0].text, "Complete every field.");
        assert!(node.duplicate_labels().is_empty());
    }

    #[test]
    fn ignored_subheaders_become_text() {
        let xml = r#"<APPENDIX>
<HD SOURCE="HED">Appendix B to Part 1005—Notes</HD>
<HD SOURCE="HD1">General</HD>
<P>Some text.</P>
</APPENDIX>"#;
        let settings = Settings::from_json(
            r#"{"APPENDIX_IGNORE_SUBHEADER_LABEL": {"1005": {"B": ["1005-B-h1"]}}}"#,
        )
        .unwrap();
        let node = parse(xml, &settings);
        assert!(node.children.is_empty());
        assert_eq!(node.text, "General\nSome text.");
    }

    #[test]
    fn graphics_and_letters() {
        assert_eq!(appendix_letter("Appendix C to Part 1005").as_deref(), Some("C"));
        let xml = r#"<APPENDIX>
<HD SOURCE="HED">Appendix C to Part 1005—Forms</HD>
<P>(a) Form.</P>
<GPH><GID>EC01</GID></GPH>
</APPENDIX>"#;
        let node = parse(xml, &Settings::default());
        let a = &node.children[0];
        assert_eq!(a.child_labels(), vec!["1005-C-a-p1"]);
        assert_eq!(a.children[0].text, "![](EC01)");
    }
}
