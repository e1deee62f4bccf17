//! Locating structural landmarks in plain regulation text.
//!
//! Every finder returns byte offsets into the text it was given. Section
//! headers are only accepted at the start of a line and never inside a
//! citation phrase that began earlier (`paragraph (b) of\n§ 100.2`).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use eregs_core::citations::internal_citations;
use eregs_core::Label;
use regex::Regex;

static PART_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\.\d+\b").expect("static regex"));
static PART_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*PART[ \t]+(\d+)[ \t]*[-\u{2013}\u{2014}]+[ \t]*(.*)$")
        .expect("static regex")
});
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*§[ \t]*(\d+)\.(\d+[a-z]?)\b[^\n]*").expect("static regex")
});
static SUBPART_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Subpart[ \t]+([A-Z])\b[^\n]*").expect("static regex")
});
static APPENDIX_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Appendix[ \t]+([A-Z]{1,2})[ \t]+to[ \t]+Part[ \t]+(\d+)\b[^\n]*")
        .expect("static regex")
});
static SUPPLEMENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:Supplement[ \t]+I[ \t]+to[ \t]+Part[ \t]+\d+|Official[ \t]+(?:Staff[ \t]+)?Commentary[ \t]+on)\b[^\n]*",
    )
    .expect("static regex")
});

/// A heading line and the text that follows it up to the next landmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmark {
    /// Byte range of the heading line.
    pub header: Range<usize>,
    /// Captured identifier: section number, subpart or appendix letter.
    pub id: String,
}

/// The CFR part most often cited as `NNN.MM` in the text.
pub fn detect_part(text: &str) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for caps in PART_SECTION.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let entry = counts.entry(m.as_str()).or_insert((0, m.start()));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(part, _)| part.to_string())
}

/// `PART 1005—ELECTRONIC FUND TRANSFERS (REGULATION E)` → the whole line.
pub fn part_title(text: &str, part: &str) -> Option<String> {
    PART_HEADER
        .captures_iter(text)
        .find(|c| &c[1] == part)
        .map(|c| c[0].trim().to_string())
}

/// Section header lines for `part`, in order.
pub fn section_headers(text: &str, part: &str) -> Vec<Landmark> {
    let context = Label {
        part: Some(part.to_string()),
        ..Label::default()
    };
    let citations: Vec<Range<usize>> = internal_citations(text, &context)
        .into_iter()
        .map(|c| c.full_start..c.full_end)
        .collect();

    SECTION_HEADER
        .captures_iter(text)
        .filter(|c| &c[1] == part)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let number = c.get(1)?;
            // A header continues no citation phrase that started before it.
            let inside = citations
                .iter()
                .any(|r| r.start < number.start() && number.start() < r.end && r.start < whole.start());
            (!inside).then(|| Landmark {
                header: whole.start()..whole.end(),
                id: c[2].to_string(),
            })
        })
        .collect()
}

pub fn subpart_headers(text: &str) -> Vec<Landmark> {
    simple(&SUBPART_HEADER, text)
}

/// `Appendix X to Part P` headers belonging to `part`.
pub fn appendix_headers(text: &str, part: &str) -> Vec<Landmark> {
    APPENDIX_HEADER
        .captures_iter(text)
        .filter(|c| &c[2] == part)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some(Landmark {
                header: whole.start()..whole.end(),
                id: c[1].to_string(),
            })
        })
        .collect()
}

/// Start of the interpretations supplement, if any.
pub fn supplement_header(text: &str) -> Option<Range<usize>> {
    SUPPLEMENT_HEADER.find(text).map(|m| m.start()..m.end())
}

fn simple(re: &Regex, text: &str) -> Vec<Landmark> {
    re.captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some(Landmark {
                header: whole.start()..whole.end(),
                id: c[1].to_string(),
            })
        })
        .collect()
}

/// Pair each landmark with its body: the text after its header line up to
/// the next landmark or `end`.
pub fn with_bodies(marks: &[Landmark], end: usize) -> Vec<(Landmark, Range<usize>)> {
    marks
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let stop = marks.get(i + 1).map_or(end, |n| n.header.start);
            (m.clone(), m.header.end.min(stop)..stop)
        })
        .collect()
}
