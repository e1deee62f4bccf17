//! `<P>` elements to marker units, and marker units to a paragraph tree.
//!
//! One `<P>` can hold several paragraphs: `(a)(1) Text` opens two, and a
//! keyterm or dash may be followed by a collapsed child marker
//! (`(a) <E T="03">Scope.</E> (1) Text`, `(a) Terms—(1) Text`).

use std::sync::LazyLock;

use eregs_core::depth::{self, MarkerToken};
use eregs_core::markers::MarkerType;
use eregs_core::node::is_synthetic;
use eregs_core::{Node, NodeType};
use regex::Regex;
use tracing::warn;

use super::strip_tags;

static LEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(<E T="03">)?\(([A-Za-z0-9]{1,5})\)(</E>)?"#).expect("static regex")
});

static COLLAPSED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\x{2014}|</E>)\s*((<E T="03">)?\(([A-Za-z0-9]{1,5})\)(</E>)?)\s"#)
        .expect("static regex")
});

static STARS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\*\s*){3,}$").expect("static regex"));

static TRAILING_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\s*){3,}$").expect("static regex"));

/// One paragraph-to-be: its marker token and content.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub token: MarkerToken,
    pub text: String,
    pub tagged_text: String,
    pub title: Option<String>,
    pub source_xml: Option<String>,
}

impl Unit {
    pub fn new(token: MarkerToken, tagged: impl Into<String>) -> Self {
        let tagged_text = tagged.into().trim().to_string();
        Self {
            token,
            text: strip_tags(&tagged_text),
            tagged_text,
            title: None,
            source_xml: None,
        }
    }

    pub fn markerless(tagged: impl Into<String>) -> Self {
        Self::new(MarkerToken::Markerless, tagged)
    }

    pub fn stars() -> Self {
        Self::new(MarkerToken::Stars, "")
    }

    fn inline_stars() -> Self {
        Self::new(MarkerToken::InlineStars, "")
    }

    pub fn with_source_xml(mut self, xml: impl Into<String>) -> Self {
        self.source_xml = Some(xml.into());
        self
    }

    /// Units that become nodes; stars only steer depth.
    fn is_node(&self) -> bool {
        !self.token.is_stars()
    }
}

fn marker_token(emphasized: bool, marker: &str) -> MarkerToken {
    if emphasized {
        MarkerToken::Emphasized(marker.to_string())
    } else {
        MarkerToken::Plain(marker.to_string())
    }
}

/// Whether a collapsed marker may open a child level: only the first
/// index of some family qualifies.
fn opens_level(marker: &str) -> bool {
    [MarkerType::Ints, MarkerType::Roman, MarkerType::Upper, MarkerType::Lower]
        .iter()
        .any(|t| t.index_of(marker) == Some(0))
}

/// Split one paragraph's tagged text into units.
pub fn split_tagged(tagged: &str) -> Vec<Unit> {
    let tagged = tagged.trim();
    if STARS_ONLY.is_match(&strip_tags(tagged)) {
        return vec![Unit::stars()];
    }

    let mut units = Vec::new();
    let mut rest = tagged;
    while let Some(caps) = LEADING_MARKER.captures(rest) {
        let whole = caps.get(0).map_or(0, |m| m.end());
        let emphasized = caps.get(1).is_some() && caps.get(3).is_some();
        let token = marker_token(emphasized, &caps[2]);
        let after = &rest[whole..];
        if LEADING_MARKER.is_match(after) && after.starts_with(['(', '<']) {
            units.push(Unit::new(token, &rest[..whole]));
            rest = after;
            continue;
        }
        units.push(Unit::new(token, rest));
        break;
    }
    if units.is_empty() {
        units.push(Unit::markerless(tagged));
    }

    split_collapsed(&mut units);

    if let Some(last) = units.last()
        && !matches!(last.token, MarkerToken::Markerless)
        && TRAILING_STARS.is_match(&last.text)
    {
        units.push(Unit::inline_stars());
    }
    units
}

fn split_collapsed(units: &mut Vec<Unit>) {
    let Some(last) = units.pop() else { return };
    let mut current = last;
    loop {
        let hit = COLLAPSED_MARKER.captures(&current.tagged_text).and_then(|caps| {
            let marker = caps.get(1)?;
            let emphasized = caps.get(2).is_some() && caps.get(4).is_some();
            opens_level(&caps[3]).then(|| (marker.start(), marker_token(emphasized, &caps[3])))
        });
        let Some((at, token)) = hit else { break };
        if matches!(current.token, MarkerToken::Markerless) {
            break;
        }
        let tail = current.tagged_text[at..].to_string();
        let head = current.tagged_text[..at].to_string();
        let mut parent = Unit::new(current.token.clone(), head);
        parent.title = current.title.take();
        units.push(parent);
        current = Unit::new(token, tail);
    }
    units.push(current);
}

/// Depth per unit: the configured hierarchy when it fits, else the solver.
pub fn assign_depths(units: &[Unit], manual: Option<&[usize]>) -> Vec<usize> {
    if let Some(manual) = manual {
        let nodes = units.iter().filter(|u| u.is_node()).count();
        if manual.len() == nodes {
            let mut it = manual.iter();
            let mut last = 0;
            return units
                .iter()
                .map(|u| {
                    if u.is_node() {
                        last = it.next().copied().unwrap_or(last);
                    }
                    last
                })
                .collect();
        }
        warn!(
            configured = manual.len(),
            found = nodes,
            "paragraph hierarchy does not match paragraph count, solving instead"
        );
    }

    let tokens: Vec<MarkerToken> = units.iter().map(|u| u.token.clone()).collect();
    match depth::solve(&tokens) {
        Some(solution) => solution.depths(),
        None => {
            warn!(
                markers = ?tokens.iter().map(MarkerToken::text).collect::<Vec<_>>(),
                "no consistent paragraph depths, flattening"
            );
            vec![0; units.len()]
        }
    }
}

/// Nest units below `parent` using `depths`. Markerless paragraphs get
/// `pN` labels counted per parent.
pub fn build_nodes(
    units: Vec<Unit>,
    depths: &[usize],
    parent: &[String],
    node_type: NodeType,
) -> Vec<Node> {
    let mut done: Vec<Node> = Vec::new();
    let mut open: Vec<(usize, Node)> = Vec::new();

    for (unit, &depth) in units.into_iter().zip(depths) {
        if !unit.is_node() {
            continue;
        }
        while open.last().is_some_and(|(d, _)| *d >= depth) {
            close(&mut open, &mut done);
        }
        let mut label = match open.last() {
            Some((_, node)) => node.label.clone(),
            None => parent.to_vec(),
        };
        let segment = match &unit.token {
            MarkerToken::Markerless => {
                let siblings = match open.last() {
                    Some((_, node)) => &node.children,
                    None => &done,
                };
                let n = siblings
                    .iter()
                    .filter(|n| n.marker().is_some_and(|m| m.starts_with('p') && is_synthetic(m)))
                    .count();
                format!("p{}", n + 1)
            }
            token => token.text().to_string(),
        };
        label.push(segment);

        let mut node = Node::new(unit.text, label, node_type).with_tagged_text(unit.tagged_text);
        node.title = unit.title;
        node.source_xml = unit.source_xml;
        open.push((depth, node));
    }
    while !open.is_empty() {
        close(&mut open, &mut done);
    }
    done
}

fn close(open: &mut Vec<(usize, Node)>, done: &mut Vec<Node>) {
    if let Some((_, node)) = open.pop() {
        match open.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => done.push(node),
        }
    }
}
