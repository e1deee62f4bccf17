//! Section-by-section analyses that discuss each label.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use eregs_core::Node;
use eregs_parse::Notice;
use serde::Serialize;
use serde_json::Value;

use crate::{Layer, to_values};

#[derive(Debug, Clone, Serialize)]
struct Analysis {
    /// `[document_number, label_id]`
    reference: (String, String),
    #[serde(skip_serializing_if = "Option::is_none")]
    publication_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fr_volume: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fr_page: Option<u32>,
}

/// Analyses from every notice up to and including the version being
/// built, oldest first.
#[derive(Debug, Default)]
pub struct SectionBySection {
    by_label: BTreeMap<String, Vec<Analysis>>,
}

impl SectionBySection {
    pub fn new(notices: &[Notice]) -> Self {
        let mut ordered: Vec<&Notice> = notices.iter().collect();
        ordered.sort_by_key(|n| n.publication_date);

        let mut by_label: BTreeMap<String, Vec<Analysis>> = BTreeMap::new();
        for notice in ordered {
            for sxs in notice.section_by_section.iter().flat_map(|s| s.walk()) {
                if sxs.paragraphs.is_empty() {
                    continue;
                }
                for label in &sxs.labels {
                    let entries = by_label.entry(label.clone()).or_default();
                    if entries.iter().any(|a| a.reference.0 == notice.document_number) {
                        continue;
                    }
                    entries.push(Analysis {
                        reference: (notice.document_number.clone(), label.clone()),
                        publication_date: notice.publication_date,
                        fr_volume: notice.fr_volume,
                        fr_page: sxs.page,
                    });
                }
            }
        }
        Self { by_label }
    }
}

impl Layer for SectionBySection {
    fn name(&self) -> &'static str {
        "analyses"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        to_values(self.by_label.get(&node.label_id())?.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::regulation;
    use eregs_parse::notice::sxs::SxsNode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sxs(title: &str, labels: &[&str], page: u32, children: Vec<SxsNode>) -> SxsNode {
        SxsNode {
            title: title.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            paragraphs: vec!["Discussion.".to_string()],
            children,
            page: Some(page),
        }
    }

    fn notice(doc: &str, date: (i32, u32, u32), analyses: Vec<SxsNode>) -> Notice {
        Notice {
            document_number: doc.to_string(),
            publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            fr_volume: Some(89),
            section_by_section: analyses,
            ..Notice::default()
        }
    }

    #[test]
    fn analyses_attach_to_their_labels() {
        let later = notice(
            "2024-00200",
            (2024, 6, 1),
            vec![sxs("Section 100.3", &["100-3"], 500, vec![])],
        );
        let earlier = notice(
            "2024-00100",
            (2024, 1, 5),
            vec![sxs(
                "Section 100.3",
                &["100-3"],
                120,
                vec![sxs("3(a) General", &["100-3-a"], 121, vec![])],
            )],
        );
        let out = SectionBySection::new(&[later, earlier]).build(&regulation());

        assert_eq!(
            out["100-3"],
            vec![
                json!({
                    "reference": ["2024-00100", "100-3"],
                    "publication_date": "2024-01-05",
                    "fr_volume": 89,
                    "fr_page": 120,
                }),
                json!({
                    "reference": ["2024-00200", "100-3"],
                    "publication_date": "2024-06-01",
                    "fr_volume": 89,
                    "fr_page": 500,
                }),
            ]
        );
        assert_eq!(out["100-3-a"][0]["fr_page"], json!(121));
        assert!(!out.contains_key("100-2"));
    }

    #[test]
    fn headings_without_discussion_are_skipped() {
        let mut empty = sxs("Section 100.2", &["100-2"], 10, vec![]);
        empty.paragraphs.clear();
        let layer = SectionBySection::new(&[notice("2024-00300", (2024, 2, 1), vec![empty])]);
        assert!(layer.by_label.is_empty());
    }
}
