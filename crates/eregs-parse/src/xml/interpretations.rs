//! Supplement I in XML.
//!
//! Every `HD` and `P` is one logical line, so the supplement is flattened
//! into lines and handed to the plain-text interpretation parser. Header
//! elements that do not name a regulation label fall through as text.

use eregs_core::Node;
use roxmltree::Node as XmlNode;

use super::text_of;
use crate::text::interp::parse_interpretations;

/// Whether an `<APPENDIX>` element holds the interpretations supplement.
pub fn is_supplement(appendix: XmlNode<'_, '_>) -> bool {
    appendix
        .children()
        .find(|c| c.has_tag_name("HD"))
        .map(text_of)
        .is_some_and(|t| t.to_lowercase().starts_with("supplement i"))
}

/// Build `[part, Interp]` from the supplement element.
pub fn parse_supplement(appendix: XmlNode<'_, '_>, part: &str) -> Node {
    let mut elements = appendix
        .children()
        .filter(|c| c.has_tag_name("HD") || c.has_tag_name("P") || c.has_tag_name("FP"));
    let heading = elements.next().map(text_of).unwrap_or_default();
    let body: Vec<String> = elements.map(text_of).collect();
    parse_interpretations(part, &heading, &body.join("\n"))
}
