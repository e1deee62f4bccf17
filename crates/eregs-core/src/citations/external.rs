//! Citations to material outside the regulation: other CFR titles, the
//! U.S. Code, public laws, the Statutes at Large, and the enabling Act.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CitationType {
    Cfr,
    Usc,
    PublicLaw,
    StatutesAtLarge,
    TheAct,
}

/// The Act a regulation implements, as `title U.S.C. section`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActCitation {
    pub title: String,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCitation {
    /// Byte ranges of each occurrence.
    pub offsets: Vec<(usize, usize)>,
    pub citation: Vec<String>,
    pub citation_type: CitationType,
}

static CFR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s+CFR\s+(?:[Pp]arts?\s+)?(\d+)(?:\.(\d+))?").expect("static regex")
});
static USC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s+U\.?\s?S\.?\s?C\.?\s+(?:§+\s*)?(\d+[a-z]*(?:-\d+)?)")
        .expect("static regex")
});
static PUBLIC_LAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bPub(?:lic|\.)\s+L(?:aw|\.)\s+(?:No\.\s+)?(\d+)[-\u{2013}](\d+)")
        .expect("static regex")
});
static STATUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s+Stat\.\s+(\d+)").expect("static regex"));
static THE_ACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b[Ss]ection\s+(\d+[a-z]*)(?:\([A-Za-z0-9]+\))*\s+of\s+)?\bthe\s+Act\b")
        .expect("static regex")
});

/// Find external citations in `text`. References to "the Act" are only
/// reported when `act` is known.
pub fn external_citations(text: &str, act: Option<&ActCitation>) -> Vec<ExternalCitation> {
    let mut found: Vec<ExternalCitation> = Vec::new();

    for caps in CFR.captures_iter(text) {
        let mut citation = vec![caps[1].to_string(), "CFR".to_string(), caps[2].to_string()];
        if let Some(section) = caps.get(3) {
            citation.push(section.as_str().to_string());
        }
        record(&mut found, CitationType::Cfr, citation, caps.get(0));
    }
    for caps in USC.captures_iter(text) {
        let citation = vec![caps[1].to_string(), "U.S.C.".to_string(), caps[2].to_string()];
        record(&mut found, CitationType::Usc, citation, caps.get(0));
    }
    for caps in PUBLIC_LAW.captures_iter(text) {
        let citation = vec![caps[1].to_string(), caps[2].to_string()];
        record(&mut found, CitationType::PublicLaw, citation, caps.get(0));
    }
    for caps in STATUTES.captures_iter(text) {
        let citation = vec![caps[1].to_string(), "Stat.".to_string(), caps[2].to_string()];
        record(&mut found, CitationType::StatutesAtLarge, citation, caps.get(0));
    }
    if let Some(act) = act {
        for caps in THE_ACT.captures_iter(text) {
            let mut citation = vec![act.title.clone(), "U.S.C.".to_string(), act.section.clone()];
            if let Some(section) = caps.get(1) {
                citation.push(section.as_str().to_string());
            }
            record(&mut found, CitationType::TheAct, citation, caps.get(0));
        }
    }

    found.sort_by_key(|c| c.offsets.first().copied());
    found
}

/// Group repeated citations of the same target into one entry.
fn record(
    found: &mut Vec<ExternalCitation>,
    citation_type: CitationType,
    citation: Vec<String>,
    span: Option<regex::Match<'_>>,
) {
    let Some(span) = span else { return };
    let range = (span.start(), span.end());
    match found
        .iter_mut()
        .find(|c| c.citation_type == citation_type && c.citation == citation)
    {
        Some(existing) => existing.offsets.push(range),
        None => found.push(ExternalCitation {
            offsets: vec![range],
            citation,
            citation_type,
        }),
    }
}
