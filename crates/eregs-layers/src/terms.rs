//! Defined terms and where they are used.
//!
//! Definitions are found in paragraphs under a "definitions" heading
//! (smart-quoted terms), or anywhere as `the term “X” means` and
//! `<E T="03">X</E> means`. A definition applies to its scope: the part
//! unless the paragraph or one of its ancestors says "for purposes of this
//! subpart|section|paragraph". Interpretations share the scope of the
//! regulation text they interpret.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::LazyLock;

use eregs_core::citations::char_offset;
use eregs_core::{INTERP, Node, Settings};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{Layer, LayerOutput, to_values};

static SMART_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"“([^”]+)”").expect("static regex"));
static THE_TERM_MEANS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bthe\s+terms?\s+“([^”]+)”\s+(?:means|refers\s+to)\b")
        .expect("static regex")
});
static EMPHASIS_MEANS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<E T="03">([^<]+)</E>\s*(?:means|refers\s+to)\b"#).expect("static regex")
});
static SCOPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpurposes\s+of\s+this\s+(part|subpart|section|paragraph)\b")
        .expect("static regex")
});
static NEGATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[^.;]*\bdoes\s+not\s+include\b").expect("static regex"));

/// One definition: the term, the paragraph defining it, and where in that
/// paragraph's text the term is written (bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub term: String,
    pub label: String,
    pub span: Range<usize>,
    /// Label prefixes this definition applies to.
    pub scope: Vec<Vec<String>>,
}

impl Definition {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.term, self.label)
    }

    fn applies_to(&self, reg_label: &[String]) -> Option<usize> {
        self.scope
            .iter()
            .filter(|prefix| reg_label.starts_with(prefix.as_slice()))
            .map(Vec::len)
            .max()
    }
}

fn normalize_term(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':'))
        .trim()
        .to_lowercase()
}

fn phrase_matcher(phrase: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .ok()
}

fn mentions_definitions(node: &Node) -> bool {
    node.title
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains("definition"))
        || node.text.to_lowercase().contains("definition")
}

/// The regulation-text half of a label, dropping anything from `Interp` on.
fn regulation_prefix(label: &[String]) -> &[String] {
    let end = label.iter().position(|s| s == INTERP).unwrap_or(label.len());
    &label[..end]
}

fn scope_for(node: &Node, ancestors: &[&Node], subpart: Option<&Node>) -> Vec<Vec<String>> {
    let part = node.label.iter().take(1).cloned().collect::<Vec<_>>();
    let nearest = std::iter::once(node)
        .chain(ancestors.iter().rev().copied())
        .find_map(|n| SCOPE.captures(&n.text).map(|c| c[1].to_lowercase()));
    let reg = regulation_prefix(&node.label);
    match nearest.as_deref() {
        Some("paragraph") => vec![reg.to_vec()],
        Some("section") if reg.len() >= 2 => vec![reg[..2].to_vec()],
        Some("subpart") => match subpart {
            Some(subpart) => subpart
                .children
                .iter()
                .filter(|c| c.is_section())
                .map(|c| c.label.clone())
                .collect(),
            None => vec![part],
        },
        _ => vec![part],
    }
}

fn definitions_in(
    node: &Node,
    in_definitions: bool,
    included: &[String],
) -> Vec<(String, Range<usize>)> {
    let text = &node.text;
    let mut out: Vec<(String, Range<usize>)> = Vec::new();
    let mut push = |term: String, span: Range<usize>| {
        if !term.is_empty() && !out.iter().any(|(t, _)| *t == term) {
            out.push((term, span));
        }
    };

    if in_definitions {
        for caps in SMART_QUOTED.captures_iter(text) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            if NEGATIVE.is_match(&text[whole.end..]) {
                continue;
            }
            push(normalize_term(&caps[1]), whole);
        }
        for phrase in included {
            if let Some(m) = phrase_matcher(phrase).and_then(|re| re.find(text)) {
                push(normalize_term(phrase), m.range());
            }
        }
    } else {
        for caps in THE_TERM_MEANS.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push(normalize_term(m.as_str()), m.range());
            }
        }
    }

    if let Some(tagged) = node.tagged_text.as_deref() {
        for caps in EMPHASIS_MEANS.captures_iter(tagged) {
            let term = caps[1].trim();
            if let Some(start) = text.find(term) {
                push(normalize_term(term), start..start + term.len());
            }
        }
    }
    out
}

fn scan<'a>(
    node: &'a Node,
    ancestors: &mut Vec<&'a Node>,
    subpart: Option<&'a Node>,
    in_definitions: bool,
    included: &[String],
    found: &mut Vec<Definition>,
) {
    if !node.is_interp() && !node.text.is_empty() {
        for (term, span) in definitions_in(node, in_definitions, included) {
            found.push(Definition {
                term,
                label: node.label_id(),
                span,
                scope: scope_for(node, ancestors, subpart),
            });
        }
    }

    let subpart = if node.is_subpart() { Some(node) } else { subpart };
    let in_definitions = in_definitions || mentions_definitions(node);
    ancestors.push(node);
    for child in &node.children {
        scan(child, ancestors, subpart, in_definitions, included, found);
    }
    ancestors.pop();
}

/// Every definition in `tree`. `included` phrases count as defined
/// wherever they appear in a definitions context.
pub fn find_definitions(tree: &Node, included: &[String]) -> Vec<Definition> {
    let mut found = Vec::new();
    scan(tree, &mut Vec::new(), None, false, included, &mut found);
    found
}

/// Lower-cased terms defined anywhere in `tree`.
pub fn defined_terms(tree: &Node) -> BTreeSet<String> {
    find_definitions(tree, &[]).into_iter().map(|d| d.term).collect()
}

#[derive(Debug, Serialize)]
struct Usage {
    offsets: Vec<(usize, usize)>,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Serialize)]
struct Referenced {
    term: String,
    reference: String,
    position: (usize, usize),
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[derive(Debug, Default)]
pub struct Terms {
    ignored: Vec<String>,
    included: Vec<String>,
    definitions: Vec<Definition>,
    /// Defining paragraph text, for reporting character positions.
    defining_text: BTreeMap<String, String>,
}

impl Terms {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ignored: settings.ignore_definitions_in.clone(),
            included: settings.include_definitions_in.clone(),
            ..Self::default()
        }
    }

    fn matcher(term: &str) -> Option<Regex> {
        RegexBuilder::new(&format!(r"\b{}(?:s|es)?\b", regex::escape(term)))
            .case_insensitive(true)
            .build()
            .ok()
    }

    /// The narrowest applicable definition of each term, longest first.
    fn applicable(&self, node: &Node) -> Vec<&Definition> {
        let reg = regulation_prefix(&node.label);
        let mut best: BTreeMap<&str, (usize, &Definition)> = BTreeMap::new();
        for def in &self.definitions {
            let Some(width) = def.applies_to(reg) else {
                continue;
            };
            let entry = best.entry(def.term.as_str()).or_insert((width, def));
            if width > entry.0 {
                *entry = (width, def);
            }
        }
        let mut out: Vec<&Definition> = best.into_values().map(|(_, d)| d).collect();
        out.sort_by(|a, b| b.term.len().cmp(&a.term.len()).then(a.term.cmp(&b.term)));
        out
    }
}

impl Layer for Terms {
    fn name(&self) -> &'static str {
        "terms"
    }

    fn pre_process(&mut self, tree: &Node) {
        self.definitions = find_definitions(tree, &self.included);
        let labels: BTreeSet<&str> = self.definitions.iter().map(|d| d.label.as_str()).collect();
        self.defining_text = tree
            .walk(&mut |n: &Node| {
                let id = n.label_id();
                labels.contains(id.as_str()).then(|| (id, n.text.clone()))
            })
            .into_iter()
            .collect();
        debug!(definitions = self.definitions.len(), "collected definitions");
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let text = &node.text;
        if text.is_empty() {
            return None;
        }
        let label = node.label_id();

        let mut taken: Vec<Range<usize>> = self
            .ignored
            .iter()
            .filter_map(|phrase| phrase_matcher(phrase))
            .flat_map(|re| re.find_iter(text).map(|m| m.range()).collect::<Vec<_>>())
            .collect();
        taken.extend(
            self.definitions
                .iter()
                .filter(|d| d.label == label)
                .map(|d| d.span.clone()),
        );

        let mut usages: Vec<(usize, Usage)> = Vec::new();
        for def in self.applicable(node) {
            let Some(matcher) = Self::matcher(&def.term) else {
                continue;
            };
            let mut offsets = Vec::new();
            let mut first = None;
            for m in matcher.find_iter(text) {
                let span = m.range();
                if taken.iter().any(|t| overlaps(t, &span)) {
                    continue;
                }
                first.get_or_insert(span.start);
                offsets.push((char_offset(text, span.start), char_offset(text, span.end)));
                taken.push(span);
            }
            if let Some(first) = first {
                usages.push((
                    first,
                    Usage {
                        offsets,
                        reference: def.reference(),
                    },
                ));
            }
        }
        usages.sort_by_key(|(first, _)| *first);
        to_values(usages.into_iter().map(|(_, usage)| usage))
    }

    /// Adds a `referenced` entry listing every definition and where its
    /// term is written.
    fn build(&mut self, tree: &Node) -> LayerOutput {
        self.pre_process(tree);
        let mut out = LayerOutput::new();
        crate::collect(&*self, tree, &mut out);
        let referenced = self.definitions.iter().map(|d| {
            let text = self.defining_text.get(&d.label).map_or("", String::as_str);
            Referenced {
                term: d.term.clone(),
                reference: d.label.clone(),
                position: (char_offset(text, d.span.start), char_offset(text, d.span.end)),
            }
        });
        if let Some(referenced) = to_values(referenced) {
            out.insert("referenced".to_string(), referenced);
        }
        debug!(layer = self.name(), labels = out.len(), "built layer");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{label, regulation};
    use eregs_core::NodeType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn definitions_under_a_definitions_heading() {
        let found = find_definitions(&regulation(), &[]);
        let terms: Vec<(&str, &str)> = found
            .iter()
            .map(|d| (d.term.as_str(), d.label.as_str()))
            .collect();
        assert_eq!(terms, vec![("widget", "100-2-a"), ("widget dealer", "100-2-b")]);
        assert_eq!(found[0].scope, vec![vec!["100".to_string()]]);
    }

    #[test]
    fn longer_terms_win_and_plurals_link() {
        let out = Terms::default().build(&regulation());
        assert_eq!(
            out["100-3-a"],
            vec![
                json!({"offsets": [[6, 19]], "ref": "widget dealer:100-2-b"}),
                json!({"offsets": [[39, 45]], "ref": "widget:100-2-a"}),
            ]
        );
        assert_eq!(
            out["100-2-b"],
            vec![json!({"offsets": [[43, 50]], "ref": "widget:100-2-a"})]
        );
        assert!(!out.contains_key("100-2-a"));
    }

    #[test]
    fn interpretations_share_the_part_scope() {
        let out = Terms::default().build(&regulation());
        assert_eq!(
            out["100-3-a-Interp-1"],
            vec![json!({"offsets": [[5, 18]], "ref": "widget dealer:100-2-b"})]
        );
    }

    #[test]
    fn referenced_lists_each_definition() {
        let out = Terms::default().build(&regulation());
        assert_eq!(
            out["referenced"][0],
            json!({"term": "widget", "reference": "100-2-a", "position": [4, 12]})
        );
    }

    #[test]
    fn section_scope_and_negative_definitions() {
        let tree = Node::regtext("", &["100"]).with_children(vec![
            Node::regtext("For purposes of this section:", &["100", "4"])
                .with_title("§ 100.4 Definitions.")
                .with_children(vec![
                    Node::regtext("(a) “Gizmo” means a device.", &["100", "4", "a"]),
                    Node::regtext("(b) “Doohickey” does not include a gizmo.", &["100", "4", "b"]),
                ]),
            Node::regtext("(a) Gizmo rules. A doohickey.", &["100", "5", "a"]),
        ]);
        let found = find_definitions(&tree, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scope, vec![vec!["100".to_string(), "4".to_string()]]);

        let out = Terms::default().build(&tree);
        assert!(!out.contains_key("100-5-a"));
        assert_eq!(
            out["100-4-b"],
            vec![json!({"offsets": [[35, 40]], "ref": "gizmo:100-4-a"})]
        );
    }

    #[test]
    fn emphasised_term_means_outside_definitions() {
        let node = Node::regtext("(c) Account means an asset account.", &["100", "6", "c"])
            .with_tagged_text(r#"(c) <E T="03">Account</E> means an asset account."#);
        let tree = Node::regtext("", &["100"]).with_children(vec![
            node,
            Node::new("1. Each account is separate.", label("100-6-c-Interp-1"), NodeType::Interp),
        ]);
        let out = Terms::default().build(&tree);
        assert_eq!(
            out["100-6-c"],
            vec![json!({"offsets": [[27, 34]], "ref": "account:100-6-c"})]
        );
        assert_eq!(
            out["100-6-c-Interp-1"],
            vec![json!({"offsets": [[8, 15]], "ref": "account:100-6-c"})]
        );
    }

    #[test]
    fn ignored_phrases_are_never_linked() {
        let settings = Settings {
            ignore_definitions_in: vec!["widget dealer".to_string()],
            ..Settings::default()
        };
        let out = Terms::new(&settings).build(&regulation());
        assert_eq!(
            out["100-3-a"],
            vec![json!({"offsets": [[39, 45]], "ref": "widget:100-2-a"})]
        );
    }
}
