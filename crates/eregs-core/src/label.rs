//! Structured citation labels.
//!
//! A [`Label`] is what the citation grammar produces: a part plus either a
//! section or an appendix (optionally with an appendix section), up to six
//! paragraph levels, and optionally interpretation comment coordinates.
//! [`Label::to_list`] linearises it into the same segment list nodes use.

use serde::{Deserialize, Serialize};

use crate::node::INTERP;

pub const MAX_PARAGRAPHS: usize = 6;
pub const MAX_COMMENT_LEVELS: usize = 3;

/// Which of the three label layouts is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Schema {
    /// `{part, section, p1..p6}`
    Regtext,
    /// `{part, appendix, p1..p6}`
    Appendix,
    /// `{part, appendix, appendix_section, p1..p6}`
    AppendixSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub part: Option<String>,
    pub section: Option<String>,
    pub appendix: Option<String>,
    pub appendix_section: Option<String>,
    pub paragraphs: Vec<String>,
    /// Set when the citation points into the interpretations.
    pub comment: bool,
    pub comment_levels: Vec<String>,
}

impl Label {
    pub fn section(part: &str, section: &str) -> Self {
        Self {
            part: Some(part.to_string()),
            section: Some(section.to_string()),
            ..Self::default()
        }
    }

    pub fn appendix(part: &str, appendix: &str) -> Self {
        Self {
            part: Some(part.to_string()),
            appendix: Some(appendix.to_string()),
            ..Self::default()
        }
    }

    /// Recover a label from a node label path. Interpretation paths keep
    /// their comment levels; synthetic segments are carried as paragraphs.
    pub fn from_node_label(label: &[String]) -> Self {
        let mut out = Label::default();
        let (reg, comment) = match label.iter().position(|s| s == INTERP) {
            Some(idx) => (&label[..idx], Some(&label[idx + 1..])),
            None => (label, None),
        };
        let mut iter = reg.iter();
        out.part = iter.next().cloned();
        if let Some(second) = iter.next() {
            if second.chars().all(|c| c.is_ascii_digit()) {
                out.section = Some(second.clone());
            } else {
                out.appendix = Some(second.clone());
            }
        }
        out.paragraphs = iter.cloned().collect();
        if out.appendix.is_some()
            && let Some(first) = out.paragraphs.first()
            && first.chars().all(|c| c.is_ascii_digit())
        {
            out.appendix_section = Some(out.paragraphs.remove(0));
        }
        if let Some(levels) = comment {
            out.comment = true;
            out.comment_levels = levels.to_vec();
        }
        out
    }

    pub fn schema(&self) -> Schema {
        match (&self.appendix, &self.appendix_section) {
            (Some(_), Some(_)) => Schema::AppendixSection,
            (Some(_), None) => Schema::Appendix,
            _ => Schema::Regtext,
        }
    }

    /// Copy with paragraphs truncated to `level` and `markers` appended.
    pub fn with_paragraphs_at(&self, level: usize, markers: &[String]) -> Self {
        let mut out = self.clone();
        out.paragraphs.truncate(level);
        out.paragraphs.extend(markers.iter().cloned());
        out.paragraphs.truncate(MAX_PARAGRAPHS);
        out.comment = false;
        out.comment_levels.clear();
        out
    }

    pub fn with_section(&self, section: &str) -> Self {
        Self {
            part: self.part.clone(),
            section: Some(section.to_string()),
            ..Self::default()
        }
    }

    /// Linearise into node label segments:
    /// `part, section|appendix[, appendix_section], p.. [, Interp, c..]`.
    pub fn to_list(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(part) = &self.part {
            out.push(part.clone());
        }
        match self.schema() {
            Schema::Regtext => {
                if let Some(section) = &self.section {
                    out.push(section.clone());
                }
            }
            Schema::Appendix => out.extend(self.appendix.clone()),
            Schema::AppendixSection => {
                out.extend(self.appendix.clone());
                out.extend(self.appendix_section.clone());
            }
        }
        out.extend(self.paragraphs.iter().cloned());
        if self.comment {
            out.push(INTERP.to_string());
            out.extend(self.comment_levels.iter().cloned());
        }
        out
    }

    pub fn label_id(&self) -> String {
        self.to_list().join("-")
    }

    /// Paragraph depth of the deepest set level.
    pub fn depth(&self) -> usize {
        self.paragraphs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn regtext_to_list() {
        let label = Label::section("1005", "7").with_paragraphs_at(0, &segs(&["b", "1"]));
        assert_eq!(label.to_list(), segs(&["1005", "7", "b", "1"]));
        assert_eq!(label.schema(), Schema::Regtext);
    }

    #[test]
    fn appendix_section_schema() {
        let mut label = Label::appendix("1005", "A");
        label.appendix_section = Some("5".into());
        label.paragraphs = segs(&["r"]);
        assert_eq!(label.schema(), Schema::AppendixSection);
        assert_eq!(label.label_id(), "1005-A-5-r");
    }

    #[test]
    fn comment_coordinates_follow_interp() {
        let mut label = Label::section("1005", "3").with_paragraphs_at(0, &segs(&["b", "1"]));
        label.comment = true;
        label.comment_levels = segs(&["1", "v"]);
        assert_eq!(label.label_id(), "1005-3-b-1-Interp-1-v");
    }

    #[test]
    fn with_paragraphs_truncates_deeper_levels() {
        let label = Label::section("1005", "7").with_paragraphs_at(0, &segs(&["b", "1", "i"]));
        let sibling = label.with_paragraphs_at(1, &segs(&["2"]));
        assert_eq!(sibling.label_id(), "1005-7-b-2");
    }

    #[test]
    fn from_node_label_round_trips() {
        for id in [
            "1005-7-b-1",
            "1005-A",
            "1005-A-5-r",
            "1005-3-b-1-Interp-1-v",
        ] {
            let list: Vec<String> = id.split('-').map(String::from).collect();
            assert_eq!(Label::from_node_label(&list).label_id(), id);
        }
    }
}
