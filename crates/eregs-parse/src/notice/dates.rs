//! Dates in notice prose.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::ParseError;

static PROSE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),\s*(\d{4})\b",
    )
    .expect("static regex")
});

/// `;`, or a `.` followed by whitespace and a capital. Abbreviations such
/// as `U.S.C. 553` stay inside their sentence.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";|\.\s+\p{Lu}").expect("static regex"));

pub const EFFECTIVE: &str = "effective";
pub const COMMENTS: &str = "comments";
pub const OTHER: &str = "other";

/// `2012-08-20`, as the FR API reports dates.
pub fn parse_iso(raw: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ParseError::Date(raw.to_string()))
}

/// `March 3, 2003`.
pub fn parse_prose(raw: &str) -> Option<NaiveDate> {
    let caps = PROSE_DATE.captures(raw)?;
    let text = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&text, "%B %d %Y").ok()
}

/// Every prose date in `text` with its byte span.
pub fn find_dates(text: &str) -> Vec<(std::ops::Range<usize>, NaiveDate)> {
    PROSE_DATE
        .find_iter(text)
        .filter_map(|m| parse_prose(m.as_str()).map(|d| (m.range(), d)))
        .collect()
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // Both `.` and `;` are one byte.
        let end = m.start() + 1;
        out.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Dates grouped by what their sentence says about them.
pub fn classify(text: &str) -> BTreeMap<String, Vec<NaiveDate>> {
    let mut out: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
    for sentence in sentences(text) {
        let lower = sentence.to_lowercase();
        let kind = if lower.contains("effective") {
            EFFECTIVE
        } else if lower.contains("comment") {
            COMMENTS
        } else {
            OTHER
        };
        for (_, date) in find_dates(sentence) {
            let dates = out.entry(kind.to_string()).or_default();
            if !dates.contains(&date) {
                dates.push(date);
            }
        }
    }
    out
}
