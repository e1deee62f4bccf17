//! Plain-text regulation parser.
//!
//! The text is carved into regulation text, appendices, and the
//! interpretations supplement by landmark search, then each piece is
//! parsed on its own. Without subpart headers, every section is placed
//! under an unnamed `[part, Subpart]` node.

pub mod appendix;
pub mod interp;
pub mod landmarks;
pub mod paragraphs;

use eregs_core::{Label, Node, NodeType, SUBPART};
use tracing::debug;

use crate::ParseError;
use landmarks::{Landmark, with_bodies};
use paragraphs::ParagraphParser;

/// Parse a whole regulation. `part` overrides part detection.
pub fn parse_regulation_text(text: &str, part: Option<&str>) -> Result<Node, ParseError> {
    let part = match part {
        Some(p) => p.to_string(),
        None => landmarks::detect_part(text)
            .ok_or_else(|| ParseError::landmark(0, "no CFR part citation found"))?,
    };

    let supplement = landmarks::supplement_header(text);
    let appendices = landmarks::appendix_headers(text, &part);
    let regtext_end = appendices
        .first()
        .map(|a| a.header.start)
        .into_iter()
        .chain(supplement.as_ref().map(|s| s.start))
        .min()
        .unwrap_or(text.len());
    let regtext = &text[..regtext_end];

    let sections = landmarks::section_headers(regtext, &part);
    if sections.is_empty() {
        return Err(ParseError::landmark(0, format!("no § {part}.N headers")));
    }

    let title = landmarks::part_title(regtext, &part);
    let mut root = Node::new("", vec![part.clone()], NodeType::Regtext);
    if let Some(title) = title {
        root.title = Some(title);
    }
    root.children = subparts(regtext, &part, &sections);

    let appendix_end = supplement.as_ref().map_or(text.len(), |s| s.start);
    for (mark, body) in with_bodies(&appendices, appendix_end) {
        let heading = &text[mark.header.clone()];
        root.children.push(appendix::parse_appendix(&part, &mark.id, heading, &text[body]));
    }

    if let Some(header) = supplement {
        let heading = &text[header.clone()];
        root.children
            .push(interp::parse_interpretations(&part, heading, &text[header.end..]));
    }

    debug!(part = %part, sections = sections.len(), appendices = appendices.len(), "parsed regulation text");
    Ok(root)
}

fn subparts(regtext: &str, part: &str, sections: &[Landmark]) -> Vec<Node> {
    let headers = landmarks::subpart_headers(regtext);
    if headers.is_empty() {
        let label = vec![part.to_string(), SUBPART.to_string()];
        let children = with_bodies(sections, regtext.len())
            .into_iter()
            .map(|(mark, body)| section(regtext, part, &mark, body))
            .collect();
        return vec![Node::new("", label, NodeType::Emptypart).with_children(children)];
    }

    with_bodies(&headers, regtext.len())
        .into_iter()
        .map(|(sub, range)| {
            let inside: Vec<Landmark> = sections
                .iter()
                .filter(|s| range.contains(&s.header.start))
                .cloned()
                .collect();
            let children = with_bodies(&inside, range.end)
                .into_iter()
                .map(|(mark, body)| section(regtext, part, &mark, body))
                .collect();
            let label = vec![part.to_string(), SUBPART.to_string(), sub.id.clone()];
            Node::new("", label, NodeType::Subpart)
                .with_title(regtext[sub.header.clone()].trim())
                .with_children(children)
        })
        .collect()
}

fn section(text: &str, part: &str, mark: &Landmark, body: std::ops::Range<usize>) -> Node {
    let body = &text[body];
    let label = vec![part.to_string(), mark.id.clone()];
    let (intro, children) =
        ParagraphParser::new(body, &Label::section(part, &mark.id)).parse(&label);
    Node::new(intro, label, NodeType::Regtext)
        .with_title(text[mark.header.clone()].trim())
        .with_children(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_section_with_markers() {
        let tree = parse_regulation_text("§ 100.1 T.\n(a) aa (1) oneone (2) twotwo (b) bb", Some("100"))
            .unwrap();
        assert_eq!(tree.label_id(), "100");
        let subpart = &tree.children[0];
        assert_eq!(subpart.label_id(), "100-Subpart");
        assert_eq!(subpart.node_type, NodeType::Emptypart);
        let section = &subpart.children[0];
        assert_eq!(section.label_id(), "100-1");
        assert_eq!(section.title.as_deref(), Some("§ 100.1 T."));
        assert_eq!(section.child_labels(), vec!["100-1-a", "100-1-b"]);
        let a = &section.children[0];
        assert_eq!(a.child_labels(), vec!["100-1-a-1", "100-1-a-2"]);
        assert_eq!(a.children[0].text, "(1) oneone");
        assert_eq!(a.children[1].text, "(2) twotwo");
        assert_eq!(section.children[1].text, "(b) bb");
    }

    #[test]
    fn detects_part_and_subparts() {
        let text = "PART 200—SAMPLE RULES\n\
Subpart A—General\n\
§ 200.1 Purpose.\n\
(a) One. (b) Two.\n\
§ 200.2 Scope.\n\
This applies.\n\
Subpart B—Specific\n\
§ 200.10 Rule.\n\
(a) Only.\n";
        let tree = parse_regulation_text(text, None).unwrap();
        assert_eq!(tree.label_id(), "200");
        assert_eq!(tree.title.as_deref(), Some("PART 200—SAMPLE RULES"));
        assert_eq!(
            tree.child_labels(),
            vec!["200-Subpart-A", "200-Subpart-B"]
        );
        assert_eq!(tree.children[0].child_labels(), vec!["200-1", "200-2"]);
        assert_eq!(tree.children[0].children[1].text, "This applies.");
        assert_eq!(tree.children[1].child_labels(), vec!["200-10"]);
    }

    #[test]
    fn appendices_and_supplement() {
        let text = "§ 300.1 Scope.\n\
(a) Text.\n\
Appendix A to Part 300—Forms\n\
A-1 Model Form\n\
Fill this in.\n\
Supplement I to Part 300—Official Interpretations\n\
Section 300.1—Scope\n\
1. Coverage. Covered.\n";
        let tree = parse_regulation_text(text, Some("300")).unwrap();
        assert_eq!(
            tree.child_labels(),
            vec!["300-Subpart", "300-A", "300-Interp"]
        );
        assert_eq!(tree.children[1].child_labels(), vec!["300-A-1"]);
        assert_eq!(
            tree.children[2].children[0].child_labels(),
            vec!["300-1-Interp-1"]
        );
        assert!(tree.duplicate_labels().is_empty());
    }

    #[test]
    fn missing_sections_is_an_error() {
        let err = parse_regulation_text("nothing to see", Some("100")).unwrap_err();
        assert!(matches!(err, ParseError::Landmark { offset: 0, .. }));
    }
}
