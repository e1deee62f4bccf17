//! Which notices produce which versions.
//!
//! Notices apply in (effective date, publication date) order. The notice
//! the user names is the baseline: the regulation text as given is its
//! version. Later notices are grouped by effective date, each group
//! producing one version named after its last notice. Notices sharing the
//! baseline's effective date apply on top of it as the first group.

use chrono::NaiveDate;
use eregs_parse::Notice;
use serde::{Deserialize, Serialize};

use crate::BuildError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGroup {
    pub effective_on: Option<NaiveDate>,
    pub document_numbers: Vec<String>,
}

impl VersionGroup {
    /// The version id: the last notice applied.
    pub fn version(&self) -> &str {
        self.document_numbers
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub baseline: String,
    pub groups: Vec<VersionGroup>,
}

impl Plan {
    /// Every version id, baseline first.
    pub fn versions(&self) -> Vec<String> {
        std::iter::once(self.baseline.clone())
            .chain(self.groups.iter().map(|g| g.version().to_string()))
            .collect()
    }
}

fn sorted(notices: &[Notice]) -> Vec<&Notice> {
    let mut out: Vec<&Notice> = notices.iter().collect();
    out.sort_by(|a, b| {
        (a.effective_on, a.publication_date).cmp(&(b.effective_on, b.publication_date))
    });
    out
}

fn group<'a>(notices: impl IntoIterator<Item = &'a Notice>) -> Vec<VersionGroup> {
    let mut groups: Vec<VersionGroup> = Vec::new();
    for notice in notices {
        match groups.last_mut() {
            Some(last) if last.effective_on == notice.effective_on => {
                last.document_numbers.push(notice.document_number.clone());
            }
            _ => groups.push(VersionGroup {
                effective_on: notice.effective_on,
                document_numbers: vec![notice.document_number.clone()],
            }),
        }
    }
    groups
}

/// All notices grouped by effective date, in application order.
pub fn notice_order(notices: &[Notice]) -> Vec<VersionGroup> {
    group(sorted(notices))
}

/// Versions to build starting from `baseline`. Notices effective before
/// the baseline are already reflected in its text and are skipped.
pub fn plan(notices: &[Notice], baseline: &str) -> Result<Plan, BuildError> {
    let ordered = sorted(notices);
    let position = ordered
        .iter()
        .position(|n| n.document_number == baseline)
        .ok_or_else(|| BuildError::MissingNotice(baseline.to_string()))?;
    let effective = ordered[position].effective_on;

    let same_day = ordered
        .iter()
        .enumerate()
        .filter(|(i, n)| *i != position && n.effective_on == effective)
        .map(|(_, n)| *n);
    let later = ordered[position + 1..]
        .iter()
        .filter(|n| n.effective_on != effective)
        .copied();

    Ok(Plan {
        baseline: baseline.to_string(),
        groups: group(same_day.chain(later)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn notice(doc: &str, effective: (u32, u32), published: (u32, u32)) -> Notice {
        Notice {
            document_number: doc.to_string(),
            effective_on: NaiveDate::from_ymd_opt(2024, effective.0, effective.1),
            publication_date: NaiveDate::from_ymd_opt(2024, published.0, published.1),
            ..Notice::default()
        }
    }

    fn notices() -> Vec<Notice> {
        vec![
            notice("d", (6, 1), (3, 1)),
            notice("a", (2, 1), (1, 1)),
            notice("c", (4, 1), (2, 10)),
            notice("b", (4, 1), (2, 1)),
            notice("e", (6, 1), (4, 1)),
        ]
    }

    #[test]
    fn groups_by_effective_date() {
        let groups = notice_order(&notices());
        let docs: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.document_numbers.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(docs, vec![vec!["a"], vec!["b", "c"], vec!["d", "e"]]);
        assert_eq!(groups[1].version(), "c");
    }

    #[test]
    fn plan_starts_after_the_baseline() {
        let plan = plan(&notices(), "a").unwrap();
        assert_eq!(plan.versions(), vec!["a", "c", "e"]);
    }

    #[test]
    fn same_day_notices_apply_to_the_baseline() {
        let plan = plan(&notices(), "c").unwrap();
        assert_eq!(plan.groups[0].document_numbers, vec!["b"]);
        assert_eq!(plan.versions(), vec!["c", "b", "e"]);
    }

    #[test]
    fn unknown_baseline_is_fatal() {
        assert!(matches!(
            plan(&notices(), "zzz"),
            Err(BuildError::MissingNotice(doc)) if doc == "zzz"
        ));
    }
}
