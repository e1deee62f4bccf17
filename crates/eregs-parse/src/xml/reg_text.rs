//! Regulation trees from `<PART>` and `<REGTEXT>` XML.

use std::sync::LazyLock;

use eregs_core::{MarkerToken, Node, NodeType, SUBPART, Settings};
use regex::Regex;
use roxmltree::{Document, Node as XmlNode};
use tracing::{debug, warn};

use super::appendices::parse_appendix;
use super::interpretations::{is_supplement, parse_supplement};
use super::paragraph::{Unit, assign_depths, build_nodes, split_tagged};
use super::tables::TableData;
use super::{child_named, parse_document, source_of, tagged_text_of, text_of};
use crate::ParseError;

static SECTNO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+[a-z]?)").expect("static regex"));
static PART_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpart\s+(\d+)").expect("static regex"));
static SUBPART_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsubpart\s+([A-Z]{1,2})\b").expect("static regex"));

/// Elements whose children are walked as if they were the container's own.
const TRANSPARENT: [&str; 2] = ["SUBJGRP", "REGTEXT"];

/// `(part, section)` from a `SECTNO` such as `§ 1005.7` or `§§ 1005.3-1005.5`.
pub fn sectno_label(sectno: &str) -> Option<(String, String)> {
    SECTNO
        .captures(sectno)
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Parse a whole regulation from eCFR or notice XML.
pub fn parse_regulation_xml(xml: &str, settings: &Settings) -> Result<Node, ParseError> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();
    let container = if root.has_tag_name("PART") || root.has_tag_name("REGTEXT") {
        root
    } else {
        root.descendants()
            .find(|n| n.has_tag_name("PART"))
            .or_else(|| root.descendants().find(|n| n.has_tag_name("REGTEXT")))
            .ok_or_else(|| ParseError::MissingElement("PART".into()))?
    };
    build_part(&doc, container, settings)
}

fn detect_part(container: XmlNode<'_, '_>) -> Option<String> {
    if let Some(part) = container.attribute("PART") {
        return Some(part.to_string());
    }
    if let Some(hd) = child_named(container, "HD")
        && let Some(caps) = PART_HEADING.captures(&text_of(hd))
    {
        return Some(caps[1].to_string());
    }
    container
        .descendants()
        .find(|n| n.has_tag_name("SECTNO"))
        .and_then(|n| sectno_label(&text_of(n)))
        .map(|(part, _)| part)
}

/// Child elements with transparent wrappers flattened.
fn structural_children<'a, 'input>(node: XmlNode<'a, 'input>) -> Vec<XmlNode<'a, 'input>> {
    let mut out = Vec::new();
    for child in node.children().filter(|c| c.is_element()) {
        if TRANSPARENT.contains(&child.tag_name().name()) {
            out.extend(structural_children(child));
        } else {
            out.push(child);
        }
    }
    out
}

/// Build the `[part]` root from a `PART` or `REGTEXT` element.
pub fn build_part(
    doc: &Document<'_>,
    container: XmlNode<'_, '_>,
    settings: &Settings,
) -> Result<Node, ParseError> {
    let part = detect_part(container).ok_or_else(|| ParseError::MissingElement("PART".into()))?;
    let mut root = Node::new("", vec![part.clone()], NodeType::Regtext);
    if let Some(hd) = child_named(container, "HD") {
        root.title = Some(text_of(hd));
    }

    let mut loose_at: Option<usize> = None;
    let mut loose: Vec<Node> = Vec::new();
    let mut interp: Option<Node> = None;
    let mut appendices: Vec<Node> = Vec::new();

    for child in structural_children(container) {
        match child.tag_name().name() {
            "SECTION" => {
                loose_at.get_or_insert(root.children.len());
                loose.push(parse_section(doc, child, &part, settings)?);
            }
            "SUBPART" => root.children.push(parse_subpart(doc, child, &part, settings)?),
            "APPENDIX" if is_supplement(child) => interp = Some(parse_supplement(child, &part)),
            "APPENDIX" => match parse_appendix(doc, child, &part, settings) {
                Some(node) => appendices.push(node),
                None => warn!(part = %part, "appendix without a recognisable heading, skipped"),
            },
            _ => {}
        }
    }

    if let Some(at) = loose_at {
        let label = vec![part.clone(), SUBPART.to_string()];
        let emptypart = Node::new("", label, NodeType::Emptypart).with_children(loose);
        root.children.insert(at, emptypart);
    }
    if root.children.is_empty() {
        return Err(ParseError::MissingElement("SECTION".into()));
    }
    root.children.extend(appendices);
    root.children.extend(interp);

    debug!(part = %part, children = root.children.len(), "parsed regulation xml");
    Ok(root)
}

/// Parse one `<SUBPART>` into `[part, Subpart, letter]` with its sections.
pub fn parse_subpart(
    doc: &Document<'_>,
    subpart: XmlNode<'_, '_>,
    part: &str,
    settings: &Settings,
) -> Result<Node, ParseError> {
    let heading = child_named(subpart, "HD").map(text_of);
    let letter = heading
        .as_deref()
        .and_then(|h| SUBPART_HEADING.captures(h))
        .map(|c| c[1].to_string());
    let mut label = vec![part.to_string(), SUBPART.to_string()];
    let node_type = match letter {
        Some(letter) => {
            label.push(letter);
            NodeType::Subpart
        }
        None => NodeType::Emptypart,
    };
    let sections = structural_children(subpart)
        .into_iter()
        .filter(|c| c.has_tag_name("SECTION"))
        .map(|s| parse_section(doc, s, part, settings))
        .collect::<Result<Vec<_>, _>>()?;
    let mut node = Node::new("", label, node_type).with_children(sections);
    node.title = heading;
    Ok(node)
}

/// Marker units for the content of a section-like element.
pub fn section_units(doc: &Document<'_>, section: XmlNode<'_, '_>) -> Vec<Unit> {
    let mut units = Vec::new();
    for child in section.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "P" | "FP" => units.extend(split_tagged(&tagged_text_of(child))),
            "STARS" => units.push(Unit::stars()),
            "GPOTABLE" => {
                let table = TableData::from_node(child);
                units.push(Unit::markerless(table.to_markdown()).with_source_xml(source_of(doc, child)));
            }
            "GPH" => {
                if let Some(gid) = child_named(child, "GID") {
                    units.push(Unit::markerless(format!("![]({})", text_of(gid))));
                }
            }
            "EXTRACT" | "NOTE" => {
                let lines: Vec<String> = child
                    .children()
                    .filter(|c| c.is_element())
                    .map(tagged_text_of)
                    .filter(|t| !t.is_empty())
                    .collect();
                if !lines.is_empty() {
                    units.push(Unit::markerless(lines.join("\n")));
                }
            }
            _ => {}
        }
    }
    units
}

/// Parse one `<SECTION>` into `[part, section]` with its paragraphs.
pub fn parse_section(
    doc: &Document<'_>,
    section: XmlNode<'_, '_>,
    part: &str,
    settings: &Settings,
) -> Result<Node, ParseError> {
    let sectno = child_named(section, "SECTNO")
        .map(text_of)
        .ok_or_else(|| ParseError::MissingElement("SECTNO".into()))?;
    let (sect_part, number) =
        sectno_label(&sectno).ok_or_else(|| ParseError::MissingElement("SECTNO".into()))?;
    if sect_part != part {
        debug!(expected = %part, found = %sect_part, "section numbered under another part");
    }
    let label = vec![part.to_string(), number];
    let title = match child_named(section, "SUBJECT").map(text_of) {
        Some(subject) if !subject.is_empty() => format!("{sectno} {subject}"),
        _ => sectno.clone(),
    };

    let mut units = section_units(doc, section);
    let has_markers = units
        .iter()
        .any(|u| matches!(u.token, MarkerToken::Plain(_) | MarkerToken::Emphasized(_)));
    let intro_len = if has_markers || units.len() == 1 {
        units
            .iter()
            .take_while(|u| u.token == MarkerToken::Markerless && u.source_xml.is_none())
            .count()
    } else {
        0
    };
    let intro: Vec<Unit> = units.drain(..intro_len).collect();

    let mut node = Node::new(
        intro.iter().map(|u| u.text.as_str()).collect::<Vec<_>>().join("\n"),
        label.clone(),
        NodeType::Regtext,
    )
    .with_title(title);
    if !intro.is_empty() {
        node.tagged_text = Some(
            intro
                .iter()
                .map(|u| u.tagged_text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    if !units.is_empty() {
        let manual = settings.hierarchy_for(part, &label.join("-"));
        let depths = assign_depths(&units, manual);
        node.children = build_nodes(units, &depths, &label, NodeType::Regtext);
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PART_XML: &str = r#"<PART>
<HD SOURCE="HED">PART 1005—ELECTRONIC FUND TRANSFERS (REGULATION E)</HD>
<SUBPART>
<HD SOURCE="HED">Subpart A—General</HD>
<SECTION>
<SECTNO>§ 1005.1</SECTNO>
<SUBJECT>Authority and purpose.</SUBJECT>
<P>(a) <E T="03">Authority.</E> The regulation is issued under the Act.</P>
<P>(b) <E T="03">Purpose.</E> This part carries out the Act.</P>
</SECTION>
<SECTION>
<SECTNO>§ 1005.2</SECTNO>
<SUBJECT>Definitions.</SUBJECT>
<P>For purposes of this part, the following definitions apply:</P>
<P>(a)(1) <E T="03">Access device</E> means a card.</P>
<P>(2) An access device becomes accepted when used.</P>
<P>(b) <E T="03">Account</E> means a demand deposit account.</P>
<GPH><GID>ER01</GID></GPH>
</SECTION>
</SUBPART>
<APPENDIX>
<HD SOURCE="HED">Appendix A to Part 1005—Model Disclosure Clauses</HD>
<HD SOURCE="HD1">A-1—Consumer Liability</HD>
<P>(a) Text.</P>
</APPENDIX>
<APPENDIX>
<HD SOURCE="HED">Supplement I to Part 1005—Official Interpretations</HD>
<HD SOURCE="HD1">Section 1005.2—Definitions</HD>
<P>1. <E T="03">Scope.</E> Covers cards.</P>
</APPENDIX>
</PART>"#;

    #[test]
    fn whole_part() {
        let tree = parse_regulation_xml(PART_XML, &Settings::default()).unwrap();
        assert_eq!(tree.label_id(), "1005");
        assert_eq!(
            tree.title.as_deref(),
            Some("PART 1005—ELECTRONIC FUND TRANSFERS (REGULATION E)")
        );
        assert_eq!(
            tree.child_labels(),
            vec!["1005-Subpart-A", "1005-A", "1005-Interp"]
        );
        let subpart = &tree.children[0];
        assert_eq!(subpart.node_type, NodeType::Subpart);
        assert_eq!(subpart.child_labels(), vec!["1005-1", "1005-2"]);

        let s1 = &subpart.children[0];
        assert_eq!(s1.title.as_deref(), Some("§ 1005.1 Authority and purpose."));
        assert_eq!(s1.child_labels(), vec!["1005-1-a", "1005-1-b"]);
        assert_eq!(
            s1.children[0].tagged_text.as_deref(),
            Some(r#"(a) <E T="03">Authority.</E> The regulation is issued under the Act."#)
        );

        assert!(tree.duplicate_labels().is_empty());
        assert!(tree.prefix_violations().is_empty());
    }

    #[test]
    fn intro_text_and_combined_markers() {
        let tree = parse_regulation_xml(PART_XML, &Settings::default()).unwrap();
        let s2 = tree.find("1005-2").unwrap();
        assert_eq!(s2.text, "For purposes of this part, the following definitions apply:");
        assert_eq!(s2.child_labels(), vec!["1005-2-a", "1005-2-b"]);
        let a = &s2.children[0];
        assert_eq!(a.text, "(a)");
        assert_eq!(a.child_labels(), vec!["1005-2-a-1", "1005-2-a-2"]);
        let b = &s2.children[1];
        assert_eq!(b.child_labels(), vec!["1005-2-b-p1"]);
        assert_eq!(b.children[0].text, "![](ER01)");
    }

    #[test]
    fn loose_sections_get_an_empty_subpart() {
        let xml = r#"<REGTEXT PART="100" TITLE="12">
<SECTION><SECTNO>§ 100.1</SECTNO><SUBJECT>Scope.</SUBJECT><P>This part applies.</P></SECTION>
</REGTEXT>"#;
        let tree = parse_regulation_xml(xml, &Settings::default()).unwrap();
        assert_eq!(tree.child_labels(), vec!["100-Subpart"]);
        assert_eq!(tree.children[0].node_type, NodeType::Emptypart);
        assert_eq!(tree.find("100-1").unwrap().text, "This part applies.");
    }

    #[test]
    fn manual_hierarchy_is_used() {
        let xml = r#"<REGTEXT PART="100">
<SECTION><SECTNO>§ 100.1</SECTNO><SUBJECT>Scope.</SUBJECT>
<P>(a) One.</P><P>(i) Nested by configuration.</P>
</SECTION>
</REGTEXT>"#;
        let settings =
            Settings::from_json(r#"{"PARAGRAPH_HIERARCHY": {"100": {"100-1": [0, 1]}}}"#).unwrap();
        let tree = parse_regulation_xml(xml, &settings).unwrap();
        assert_eq!(
            tree.find("100-1-a").unwrap().child_labels(),
            vec!["100-1-a-i"]
        );
    }

    #[test]
    fn sectno_ranges_take_the_first() {
        assert_eq!(
            sectno_label("§§ 1005.3-1005.5"),
            Some(("1005".to_string(), "3".to_string()))
        );
        assert_eq!(sectno_label("§ 1005.10a"), Some(("1005".into(), "10a".into())));
    }

    #[test]
    fn missing_sections() {
        let err = parse_regulation_xml("<PART><HD>PART 7</HD></PART>", &Settings::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingElement(tag) if tag == "SECTION"));
    }
}
