//! Italicised lead-in phrases ("keyterms") at the start of paragraphs.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use eregs_core::Node;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::terms::defined_terms;
use crate::{Layer, to_values};

static KEYTERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:\([A-Za-z0-9]+\)\s*|<E T="03">\([A-Za-z0-9]+\)</E>\s*|\d+\.\s*)*<E T="03">([^<]+)</E>"#,
    )
    .expect("static regex")
});

#[derive(Debug, Serialize)]
struct KeyTerm<'a> {
    key_term: &'a str,
    locations: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct KeyTerms {
    defined: BTreeSet<String>,
}

fn bare(term: &str) -> String {
    term.trim()
        .trim_end_matches(|c: char| c == '.' || c == ':')
        .trim()
        .to_lowercase()
}

impl KeyTerms {
    fn keyterm<'a>(&self, tagged: &'a str) -> Option<&'a str> {
        let term = KEYTERM.captures(tagged)?.get(1)?.as_str().trim();
        if term.is_empty() || term.starts_with("See") || self.defined.contains(&bare(term)) {
            return None;
        }
        Some(term)
    }
}

impl Layer for KeyTerms {
    fn name(&self) -> &'static str {
        "keyterms"
    }

    fn pre_process(&mut self, tree: &Node) {
        self.defined = defined_terms(tree);
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let term = self.keyterm(node.tagged_text.as_deref()?)?;
        to_values([KeyTerm {
            key_term: term,
            locations: vec![0],
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::regulation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn leading_emphasis_after_marker() {
        let out = KeyTerms::default().build(&regulation());
        assert_eq!(
            out["100-3-b"],
            vec![json!({"key_term": "Timing.", "locations": [0]})]
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn see_also_and_defined_terms_are_skipped() {
        let mut layer = KeyTerms::default();
        let see = Node::regtext("(c) See also § 100.2.", &["100", "3", "c"])
            .with_tagged_text(r#"(c) <E T="03">See also</E> § 100.2."#);
        assert_eq!(layer.process(&see), None);

        layer.pre_process(&regulation());
        let defined = Node::regtext("(d) Widget dealer. Must register.", &["100", "3", "d"])
            .with_tagged_text(r#"(d) <E T="03">Widget dealer.</E> Must register."#);
        assert_eq!(layer.process(&defined), None);
    }

    #[test]
    fn emphasis_later_in_the_text_is_not_a_keyterm() {
        let node = Node::regtext("(e) Dealers must file Form W.", &["100", "3", "e"])
            .with_tagged_text(r#"(e) Dealers must file <E T="03">Form W</E>."#);
        assert_eq!(KeyTerms::default().process(&node), None);
    }

    #[test]
    fn italic_marker_before_keyterm() {
        let node = Node::regtext("(1) Scope. Text.", &["100", "3", "b", "1"])
            .with_tagged_text(r#"<E T="03">(1)</E> <E T="03">Scope.</E> Text."#);
        assert_eq!(
            KeyTerms::default().process(&node),
            Some(vec![json!({"key_term": "Scope.", "locations": [0]})])
        );
    }
}
