//! Appendices in plain text.
//!
//! An appendix is split either by numbered section headers (`A-1 Model
//! Form`), which become `[part, A, 1]`, or, failing that, by title-case
//! heading lines, which become synthetic `[part, A, hN]` children.

use std::sync::LazyLock;

use eregs_core::{Node, NodeType};
use regex::Regex;

static NUMBERED_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Z]{1,2})-(\d+)\b[^\n]*").expect("static regex")
});

const MAX_HEADING_LEN: usize = 100;

/// Build the appendix node for `letter` from its heading line and body.
pub fn parse_appendix(part: &str, letter: &str, heading: &str, body: &str) -> Node {
    let label = vec![part.to_string(), letter.to_string()];
    let numbered: Vec<_> = NUMBERED_HEADER
        .captures_iter(body)
        .filter(|c| &c[1] == letter)
        .filter_map(|c| Some((c.get(0)?, c[2].to_string())))
        .collect();

    let (intro, children) = if numbered.is_empty() {
        generic_children(&label, body)
    } else {
        let intro = body[..numbered[0].0.start()].trim().to_string();
        let children = numbered
            .iter()
            .enumerate()
            .map(|(i, (m, number))| {
                let end = numbered.get(i + 1).map_or(body.len(), |(n, _)| n.start());
                let mut child_label = label.clone();
                child_label.push(number.clone());
                Node::new(body[m.end()..end].trim(), child_label, NodeType::Appendix)
                    .with_title(m.as_str().trim())
            })
            .collect();
        (intro, children)
    };

    Node::new(intro, label, NodeType::Appendix)
        .with_title(heading.trim())
        .with_children(children)
}

/// Short line, no terminal period, every significant word capitalised.
pub fn is_title_case(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.len() > MAX_HEADING_LEN || line.ends_with('.') {
        return false;
    }
    const MINOR: [&str; 9] = ["a", "an", "and", "for", "in", "of", "on", "the", "to"];
    let mut words = line.split_whitespace().peekable();
    let starts_upper = words
        .peek()
        .and_then(|w| w.chars().next())
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
    starts_upper
        && words.all(|w| {
            MINOR.contains(&w)
                || w.chars()
                    .next()
                    .is_some_and(|c| !c.is_alphabetic() || c.is_uppercase())
        })
}

fn generic_children(label: &[String], body: &str) -> (String, Vec<Node>) {
    let mut intro = String::new();
    let mut children: Vec<Node> = Vec::new();
    for line in body.lines() {
        if is_title_case(line) {
            let mut child_label = label.to_vec();
            child_label.push(format!("h{}", children.len() + 1));
            children.push(Node::new("", child_label, NodeType::Appendix).with_title(line.trim()));
            continue;
        }
        let target = match children.last_mut() {
            Some(child) => &mut child.text,
            None => &mut intro,
        };
        if !line.trim().is_empty() {
            if !target.is_empty() {
                target.push('\n');
            }
            target.push_str(line.trim());
        }
    }
    (intro, children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_sections() {
        let body = "Intro text.\nA-1 Model Clause\nUse this clause.\nA-2 Other Clause\nAnd this.";
        let node = parse_appendix("100", "A", "Appendix A to Part 100—Model Forms", body);
        assert_eq!(node.text, "Intro text.");
        assert_eq!(node.child_labels(), vec!["100-A-1", "100-A-2"]);
        assert_eq!(node.children[0].title.as_deref(), Some("A-1 Model Clause"));
        assert_eq!(node.children[1].text, "And this.");
        assert_eq!(node.node_type, NodeType::Appendix);
    }

    #[test]
    fn generic_headings() {
        let body = "Overview text.\nScope of Coverage\nThe rule applies broadly.\nMore text here.\nEffective Dates\nSoon.";
        let node = parse_appendix("100", "B", "Appendix B to Part 100—Notes", body);
        assert_eq!(node.text, "Overview text.");
        assert_eq!(node.child_labels(), vec!["100-B-h1", "100-B-h2"]);
        assert_eq!(node.children[0].text, "The rule applies broadly.\nMore text here.");
        assert_eq!(node.children[1].title.as_deref(), Some("Effective Dates"));
    }

    #[test]
    fn title_case_detection() {
        assert!(is_title_case("Scope of the Rule"));
        assert!(is_title_case("1. General Instructions"));
        assert!(!is_title_case("The rule applies broadly."));
        assert!(!is_title_case("scope of coverage"));
        assert!(!is_title_case(""));
    }
}
