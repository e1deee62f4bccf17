//! Rendering hints: tables, fenced blocks, sub- and superscripts, and
//! fill-in dash lines.

use std::sync::LazyLock;

use eregs_core::Node;
use eregs_parse::xml::tables::TableData;
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::{Layer, occurrences};

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([a-zA-Z0-9_-]*)\n(.*?)\n```").expect("static regex"));
static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9]+)_\{([^}]+)\}").expect("static regex"));
static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9]+)\^\{([^}]+)\}").expect("static regex"));
static DASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(.*?)_{5,}\s*$").expect("static regex"));

#[derive(Debug, Default)]
pub struct Formatting;

/// One annotation per distinct matched string, with every occurrence of
/// that string as its locations.
fn annotate(
    text: &str,
    re: &Regex,
    data: impl Fn(&Captures<'_>) -> (&'static str, Value),
) -> Vec<Value> {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0).map(|m| m.as_str()) else {
            continue;
        };
        if seen.contains(&whole) {
            continue;
        }
        seen.push(whole);
        let (key, value) = data(&caps);
        let mut annotation = Map::new();
        annotation.insert("text".into(), json!(whole));
        annotation.insert("locations".into(), json!(occurrences(text, whole)));
        annotation.insert(key.into(), value);
        out.push(Value::Object(annotation));
    }
    out
}

fn table(node: &Node) -> Option<Value> {
    let xml = node.source_xml.as_deref()?;
    if !xml.contains("GPOTABLE") {
        return None;
    }
    match TableData::from_xml(xml) {
        Ok(data) => Some(json!({
            "text": node.text,
            "locations": [0],
            "table_data": data,
        })),
        Err(e) => {
            warn!(label = %node.label_id(), error = %e, "unreadable table");
            None
        }
    }
}

impl Layer for Formatting {
    fn name(&self) -> &'static str {
        "formatting"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let text = &node.text;
        let mut out: Vec<Value> = table(node).into_iter().collect();

        out.extend(annotate(text, &FENCE, |c| {
            let lines: Vec<&str> = c[2].split('\n').collect();
            ("fence_data", json!({"type": &c[1], "lines": lines}))
        }));
        out.extend(annotate(text, &SUBSCRIPT, |c| {
            ("subscript_data", json!({"variable": &c[1], "subscript": &c[2]}))
        }));
        out.extend(annotate(text, &SUPERSCRIPT, |c| {
            ("superscript_data", json!({"variable": &c[1], "superscript": &c[2]}))
        }));
        out.extend(annotate(text, &DASHES, |c| {
            ("dash_data", json!({"text": c[1].trim_end()}))
        }));

        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(text: &str) -> Node {
        Node::regtext(text, &["100", "4", "a"])
    }

    #[test]
    fn subscripts_group_repeats() {
        let out = Formatting.process(&node("Let a_{1} plus a_{1} exceed b_{max}.")).unwrap();
        assert_eq!(
            out,
            vec![
                json!({"text": "a_{1}", "locations": [0, 1], "subscript_data": {"variable": "a", "subscript": "1"}}),
                json!({"text": "b_{max}", "locations": [0], "subscript_data": {"variable": "b", "subscript": "max"}}),
            ]
        );
    }

    #[test]
    fn superscripts() {
        let out = Formatting.process(&node("Area is x^{2}.")).unwrap();
        assert_eq!(
            out,
            vec![json!({"text": "x^{2}", "locations": [0], "superscript_data": {"variable": "x", "superscript": "2"}})]
        );
    }

    #[test]
    fn fenced_block() {
        let out = Formatting
            .process(&node("Form:\n```note\nName\nDate\n```"))
            .unwrap();
        assert_eq!(out[0]["fence_data"], json!({"type": "note", "lines": ["Name", "Date"]}));
        assert_eq!(out[0]["locations"], json!([0]));
    }

    #[test]
    fn dash_line() {
        let out = Formatting.process(&node("Signature__________")).unwrap();
        assert_eq!(
            out,
            vec![json!({"text": "Signature__________", "locations": [0], "dash_data": {"text": "Signature"}})]
        );
        assert_eq!(Formatting.process(&node("a__b")), None);
    }

    #[test]
    fn table_from_source_xml() {
        let xml = r#"<GPOTABLE COLS="2"><BOXHD><CHED H="1">Fee</CHED><CHED H="1">Amount</CHED></BOXHD><ROW><ENT>Filing</ENT><ENT>$5</ENT></ROW></GPOTABLE>"#;
        let table = node("|Fee|Amount|\n|---|---|\n|Filing|$5|").with_source_xml(xml);
        let out = Formatting.process(&table).unwrap();
        assert_eq!(out[0]["locations"], json!([0]));
        assert_eq!(out[0]["table_data"]["rows"], json!([["Filing", "$5"]]));
        assert_eq!(out[0]["table_data"]["header"][0][0]["text"], json!("Fee"));
    }
}
