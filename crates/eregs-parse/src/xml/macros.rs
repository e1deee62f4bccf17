//! XML macros: configured replacements applied before parsing.
//!
//! Each macro pairs a path expression with replacement XML. Supported
//! paths are a small XPath subset: `/A/B` child steps, `//A` descendant
//! steps, and one predicate per step, either a 1-based position `[2]` or
//! an attribute test `[@PART="1005"]`.

use std::sync::LazyLock;

use regex::Regex;
use roxmltree::Node as XmlNode;
use tracing::debug;

use super::parse_document;
use crate::ParseError;

static STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z_][\w.-]*)(?:\[(?:(\d+)|@([\w.-]+)=["']([^"']*)["'])\])?$"#)
        .expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Attribute(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    name: String,
    predicate: Option<Predicate>,
}

fn parse_path(path: &str) -> Result<Vec<Step>, ParseError> {
    let bad = || ParseError::landmark(0, format!("unsupported macro path {path:?}"));
    let mut steps = Vec::new();
    let mut rest = path.trim();
    while !rest.is_empty() {
        let descendant = rest.starts_with("//");
        rest = rest.strip_prefix("//").or_else(|| rest.strip_prefix('/')).ok_or_else(bad)?;
        let end = rest.find('/').unwrap_or(rest.len());
        let caps = STEP.captures(&rest[..end]).ok_or_else(bad)?;
        let predicate = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(n), _, _) => Some(Predicate::Position(n.as_str().parse().map_err(|_| bad())?)),
            (None, Some(attr), Some(value)) => Some(Predicate::Attribute(
                attr.as_str().to_string(),
                value.as_str().to_string(),
            )),
            _ => None,
        };
        steps.push(Step {
            descendant,
            name: caps[1].to_string(),
            predicate,
        });
        rest = &rest[end..];
    }
    if steps.is_empty() {
        return Err(bad());
    }
    Ok(steps)
}

fn select<'a, 'input>(context: XmlNode<'a, 'input>, step: &Step) -> Vec<XmlNode<'a, 'input>> {
    let named = |n: &XmlNode<'a, 'input>| n.is_element() && n.tag_name().name() == step.name;
    let mut found: Vec<XmlNode<'a, 'input>> = if step.descendant {
        context.descendants().skip(1).filter(named).collect()
    } else {
        context.children().filter(named).collect()
    };
    match &step.predicate {
        None => {}
        Some(Predicate::Attribute(attr, value)) => {
            found.retain(|n| n.attribute(attr.as_str()) == Some(value.as_str()));
        }
        Some(Predicate::Position(pos)) => {
            // Position counts among same-named siblings.
            found.retain(|n| {
                n.prev_siblings()
                    .filter(|s| s != n && s.is_element() && s.tag_name().name() == step.name)
                    .count()
                    + 1
                    == *pos
            });
        }
    }
    found
}

/// Byte ranges of every node matched by `path`.
fn matches(xml: &str, path: &str) -> Result<Vec<std::ops::Range<usize>>, ParseError> {
    let steps = parse_path(path)?;
    let doc = parse_document(xml)?;
    let mut current = vec![doc.root()];
    for step in &steps {
        let mut next: Vec<XmlNode<'_, '_>> = Vec::new();
        for node in &current {
            for hit in select(*node, step) {
                if !next.contains(&hit) {
                    next.push(hit);
                }
            }
        }
        current = next;
    }
    Ok(current.iter().map(|n| n.range()).collect())
}

/// Apply `(path, replacement)` macros in order, re-parsing between them.
pub fn apply_macros(xml: &str, macros: &[(String, String)]) -> Result<String, ParseError> {
    let mut out = xml.to_string();
    for (path, replacement) in macros {
        let mut ranges = matches(&out, path)?;
        if ranges.is_empty() {
            debug!(path = %path, "macro matched nothing");
            continue;
        }
        // Outermost matches only, replaced back to front.
        ranges.sort_by_key(|r| r.start);
        let mut kept: Vec<std::ops::Range<usize>> = Vec::new();
        for r in ranges {
            if kept.last().is_none_or(|k| r.start >= k.end) {
                kept.push(r);
            }
        }
        for r in kept.into_iter().rev() {
            out.replace_range(r, replacement);
        }
        debug!(path = %path, "applied macro");
    }
    Ok(out)
}
