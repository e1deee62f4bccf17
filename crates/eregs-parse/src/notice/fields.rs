//! Front-matter fields of a rule document.

use std::sync::LazyLock;

use regex::Regex;
use roxmltree::Node as XmlNode;

use crate::xml::text_of;

static FRDOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FR\s+Doc\.?\s*([\w-]+)").expect("static regex"));
static RIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RIN\s+([\dA-Z]{4}-[\dA-Z]{2,4})").expect("static regex"));
static DOCKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[?\s*(.*?)\s*\]?$").expect("static regex"));
static CFR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+CFR\s+Parts?\s+([\d,\sand]+)").expect("static regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

fn first<'a, 'input>(root: XmlNode<'a, 'input>, tag: &str) -> Option<XmlNode<'a, 'input>> {
    root.descendants().find(|n| n.has_tag_name(tag))
}

/// `P` children of the first `tag` element, joined by blank lines.
fn paragraphs(root: XmlNode<'_, '_>, tag: &str) -> Option<String> {
    let el = first(root, tag)?;
    let text: Vec<String> = el
        .children()
        .filter(|c| c.has_tag_name("P") || c.has_tag_name("FP"))
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    (!text.is_empty()).then(|| text.join("\n\n"))
}

pub fn document_number(root: XmlNode<'_, '_>) -> Option<String> {
    let frdoc = text_of(first(root, "FRDOC")?);
    FRDOC.captures(&frdoc).map(|c| c[1].to_string())
}

pub fn docket(root: XmlNode<'_, '_>) -> Option<String> {
    let raw = text_of(first(root, "DEPDOC")?);
    DOCKET
        .captures(&raw)
        .map(|c| c[1].to_string())
        .filter(|d| !d.is_empty())
}

pub fn regulation_id_numbers(root: XmlNode<'_, '_>) -> Vec<String> {
    let mut rins: Vec<String> = Vec::new();
    for rin in root.descendants().filter(|n| n.has_tag_name("RIN")) {
        for caps in RIN.captures_iter(&text_of(rin)) {
            if !rins.iter().any(|r| r == &caps[1]) {
                rins.push(caps[1].to_string());
            }
        }
    }
    rins
}

pub fn agency(root: XmlNode<'_, '_>) -> Option<String> {
    first(root, "AGENCY").map(text_of).filter(|a| !a.is_empty())
}

pub fn action(root: XmlNode<'_, '_>) -> Option<String> {
    paragraphs(root, "ACT")
}

pub fn summary(root: XmlNode<'_, '_>) -> Option<String> {
    paragraphs(root, "SUM")
}

pub fn contact(root: XmlNode<'_, '_>) -> Option<String> {
    paragraphs(root, "FURINF")
}

/// Text of `DATES`, falling back to `EFFDATE`.
pub fn dates_text(root: XmlNode<'_, '_>) -> Option<String> {
    paragraphs(root, "DATES").or_else(|| paragraphs(root, "EFFDATE"))
}

/// CFR title and parts from `<CFR>12 CFR Parts 1005 and 1010</CFR>`.
pub fn cfr(root: XmlNode<'_, '_>) -> Option<(u32, Vec<String>)> {
    let raw = text_of(first(root, "CFR")?);
    let caps = CFR.captures(&raw)?;
    let title = caps[1].parse().ok()?;
    let parts = NUMBER
        .find_iter(&caps[2])
        .map(|m| m.as_str().to_string())
        .collect();
    Some((title, parts))
}
