//! Supplement I (official interpretations) in plain text.
//!
//! Header lines (`Section 100.1—Scope`, `1(a) Coverage`, `Appendix A`)
//! partition the supplement. Inside each partition, numbered comments
//! (`1.`), their roman sub-comments (`i.`), and upper-alpha items (`A.`)
//! nest in that order.

use std::sync::LazyLock;

use eregs_core::citations::interp_header_labels;
use eregs_core::{INTERP, Node, NodeType};
use regex::Regex;

static COMMENT_MARKERS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^\s*(\d+)\.\s").expect("static regex"),
        Regex::new(r"^\s*([ivxl]+)\.\s").expect("static regex"),
        Regex::new(r"^\s*([A-Z])\.\s").expect("static regex"),
    ]
});

const MAX_HEADER_LEN: usize = 120;

/// Build `[part, Interp]` from the supplement heading and body.
pub fn parse_interpretations(part: &str, heading: &str, body: &str) -> Node {
    let root_label = vec![part.to_string(), INTERP.to_string()];
    let mut root = Node::new("", root_label, NodeType::Interp).with_title(heading.trim());

    let mut preamble: Vec<&str> = Vec::new();
    let mut headers: Vec<(Node, Vec<&str>)> = Vec::new();
    for line in body.lines() {
        if let Some(label) = header_label(line, part) {
            let node = Node::new("", label, NodeType::Interp).with_title(line.trim());
            headers.push((node, Vec::new()));
            continue;
        }
        match headers.last_mut() {
            Some((_, lines)) => lines.push(line),
            None => preamble.push(line),
        }
    }
    root.text = join_lines(&preamble);

    // Nest headers: each goes under the closest open header whose
    // regulation label it extends.
    let mut open: Vec<Node> = Vec::new();
    for (mut node, lines) in headers {
        let (text, children) = comments(&node.label, &lines);
        node.text = text;
        node.children = children;
        let prefix = regulation_prefix(&node.label).to_vec();
        while let Some(top) = open.last() {
            let own = regulation_prefix(&top.label);
            if own.len() < prefix.len() && prefix.starts_with(own) {
                break;
            }
            close(&mut open, &mut root.children);
        }
        open.push(node);
    }
    while !open.is_empty() {
        close(&mut open, &mut root.children);
    }
    root
}

/// Interpretation label for a header line, if `line` is one.
fn header_label(line: &str, part: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty()
        || line.len() > MAX_HEADER_LEN
        || line.ends_with('.')
        || COMMENT_MARKERS.iter().any(|re| re.is_match(line))
    {
        return None;
    }
    interp_header_labels(line, part)
        .first()
        .map(|label| label.to_list())
}

fn regulation_prefix(label: &[String]) -> &[String] {
    let end = label.iter().position(|s| s == INTERP).unwrap_or(label.len());
    &label[..end]
}

/// Split partition lines into the header's own text and comment nodes.
fn comments(label: &[String], lines: &[&str]) -> (String, Vec<Node>) {
    let mut own: Vec<&str> = Vec::new();
    // Open comments; the stack depth is the level of the top comment + 1.
    let mut open: Vec<Node> = Vec::new();
    let mut done: Vec<Node> = Vec::new();

    for line in lines {
        let hit = COMMENT_MARKERS
            .iter()
            .enumerate()
            .find_map(|(level, re)| re.captures(line).map(|c| (level, c[1].to_string())));
        // A marker can only open a level directly below an open comment.
        let Some((level, marker)) = hit.filter(|(level, _)| *level <= open.len()) else {
            match open.last_mut() {
                Some(node) => append_line(&mut node.text, line),
                None => own.push(line),
            }
            continue;
        };
        while open.len() > level {
            close(&mut open, &mut done);
        }
        let mut child_label = match open.last() {
            Some(parent) => parent.label.clone(),
            None => label.to_vec(),
        };
        child_label.push(marker);
        open.push(Node::new(line.trim(), child_label, NodeType::Interp));
    }
    while !open.is_empty() {
        close(&mut open, &mut done);
    }
    (join_lines(&own), done)
}

/// Pop the top node and attach it to the one below, or to `done`.
fn close(open: &mut Vec<Node>, done: &mut Vec<Node>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => done.push(node),
        }
    }
}

fn append_line(text: &mut String, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    for line in lines {
        append_line(&mut out, line);
    }
    out
}
