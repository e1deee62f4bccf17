//! Federal Register XML parsing.
//!
//! Regulation text arrives as `<PART>` (eCFR) or `<REGTEXT>` (notices)
//! documents. Inline emphasis is kept in `tagged_text` as `<E T="03">…</E>`;
//! plain `text` is derived from it by dropping tags, so the two never
//! disagree.

pub mod appendices;
pub mod interpretations;
pub mod macros;
pub mod paragraph;
pub mod reg_text;
pub mod tables;

use std::sync::LazyLock;

use regex::Regex;
use roxmltree::{Document, Node as XmlNode, ParsingOptions};

use crate::ParseError;

pub use reg_text::{parse_regulation_xml, parse_section};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Parse with DTDs allowed; FR documents sometimes carry one.
pub fn parse_document(xml: &str) -> Result<Document<'_>, ParseError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(xml, options)?)
}

/// Collapse whitespace runs and trim.
pub fn normalize_space(text: &str) -> String {
    SPACES.replace_all(text.trim(), " ").into_owned()
}

/// Drop every tag, keeping text content.
pub fn strip_tags(tagged: &str) -> String {
    normalize_space(&TAG.replace_all(tagged, ""))
}

/// Text of `node` and its descendants with whitespace normalised.
pub fn text_of(node: XmlNode<'_, '_>) -> String {
    let raw: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    normalize_space(&raw)
}

/// Content of `node` with `<E>` emphasis preserved and other markup
/// flattened. Footnote references are dropped.
pub fn tagged_text_of(node: XmlNode<'_, '_>) -> String {
    let mut out = String::new();
    push_tagged(node, &mut out);
    normalize_space(&out)
}

fn push_tagged(node: XmlNode<'_, '_>, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
            continue;
        }
        if !child.is_element() {
            continue;
        }
        match child.tag_name().name() {
            "E" => {
                let kind = child.attribute("T").unwrap_or("03");
                out.push_str(&format!("<E T=\"{kind}\">"));
                push_tagged(child, out);
                out.push_str("</E>");
            }
            "FTREF" => {}
            _ => push_tagged(child, out),
        }
    }
}

/// Raw source of `node` as it appears in the document.
pub fn source_of<'a>(doc: &'a Document<'_>, node: XmlNode<'_, '_>) -> &'a str {
    &doc.input_text()[node.range()]
}

/// First child element named `tag`.
pub fn child_named<'a, 'input>(
    node: XmlNode<'a, 'input>,
    tag: &str,
) -> Option<XmlNode<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_text_keeps_emphasis() {
        let doc = parse_document(r#"<P>(a) <E T="03">Definition.</E> A  term<FTREF/> here.</P>"#)
            .unwrap();
        let p = doc.root_element();
        assert_eq!(tagged_text_of(p), r#"(a) <E T="03">Definition.</E> A term here."#);
        assert_eq!(text_of(p), "(a) Definition. A term here.");
        assert_eq!(strip_tags(&tagged_text_of(p)), text_of(p));
    }

    #[test]
    fn source_slice() {
        let xml = "<ROOT><GPH><GID>ER01</GID></GPH></ROOT>";
        let doc = parse_document(xml).unwrap();
        let gph = child_named(doc.root_element(), "GPH").unwrap();
        assert_eq!(source_of(&doc, gph), "<GPH><GID>ER01</GID></GPH>");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(parse_document("<P>"), Err(ParseError::Xml(_))));
    }
}
