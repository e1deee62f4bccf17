//! Labels named by interpretation headers.
//!
//! Supplement I headers say which regulation text they interpret:
//! `Section 1005.7—Scope`, `7(b) Notice`, `Paragraphs 7(b) and 7(c)`,
//! `Appendix A`, `Appendices G and H`, `Comment 7(b)-1`. Each header maps
//! to one or more interpretation labels.

use std::sync::LazyLock;

use regex::Regex;

use crate::label::Label;

static SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Section|§)\s*(\d+)\.(\d+[a-z]?)\b").expect("static regex")
});
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(\d+)\.)?\b(\d+[a-z]?)((?:\([A-Za-z0-9]{1,5}\))+)").expect("static regex")
});
static PARAGRAPH_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Paragraphs?\s+)?(?:\d+\.)?\d+[a-z]?\(").expect("static regex")
});
static APPENDIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Appendix|Appendices)\s+([A-Z]{1,2})\b((?:\s*(?:,|and|or)\s*[A-Z]{1,2}\b)*)")
        .expect("static regex")
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*Comments?\s+(?:(\d+)\.)?(\d+[a-z]?)((?:\([A-Za-z0-9]{1,5}\))*)-(\d+)(?:\.([a-z0-9]+))?",
    )
    .expect("static regex")
});
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Za-z0-9]{1,5})\)").expect("static regex"));
static LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,2})\b").expect("static regex"));

fn markers(group: &str) -> Vec<String> {
    MARKER
        .captures_iter(group)
        .map(|c| c[1].to_string())
        .collect()
}

fn interp(mut label: Label) -> Label {
    label.comment = true;
    label
}

/// Interpretation labels for a header `title` within `part`. Empty when the
/// header names nothing recognisable.
pub fn interp_header_labels(title: &str, part: &str) -> Vec<Label> {
    if let Some(caps) = COMMENT.captures(title) {
        let section = &caps[2];
        let mut label = Label::section(part, section).with_paragraphs_at(0, &markers(&caps[3]));
        label.comment = true;
        label.comment_levels.push(caps[4].to_string());
        if let Some(sub) = caps.get(5) {
            label.comment_levels.push(sub.as_str().to_string());
        }
        return vec![label];
    }

    if let Some(caps) = SECTION.captures(title) {
        let part = caps.get(1).map_or(part, |m| m.as_str());
        return vec![interp(Label::section(part, &caps[2]))];
    }

    if let Some(caps) = APPENDIX.captures(title) {
        let mut labels = vec![interp(Label::appendix(part, &caps[1]))];
        if let Some(rest) = caps.get(2) {
            labels.extend(
                LETTER
                    .captures_iter(rest.as_str())
                    .map(|c| interp(Label::appendix(part, &c[1]))),
            );
        }
        return labels;
    }

    if PARAGRAPH_LEAD.is_match(title) {
        let plural = title.trim_start().starts_with("Paragraphs");
        let mut labels = Vec::new();
        for caps in PARAGRAPH.captures_iter(title) {
            let label_part = caps.get(1).map_or(part, |m| m.as_str());
            let label = Label::section(label_part, &caps[2]).with_paragraphs_at(0, &markers(&caps[3]));
            labels.push(interp(label));
            if !plural {
                break;
            }
        }
        return labels;
    }

    Vec::new()
}
