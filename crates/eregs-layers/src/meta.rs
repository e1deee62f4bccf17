//! Regulation-wide facts, attached to the root only.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use eregs_core::{Node, Settings};
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::Layer;

static PART_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*PART\s+\d+\s*[—–-]+\s*(.+?)(?:\s*\(REGULATION\s+([A-Z]+)\))?\s*$")
        .expect("static regex")
});

#[derive(Debug)]
pub struct Meta {
    cfr_title: u32,
    cfr_title_text: Option<String>,
    effective_date: Option<NaiveDate>,
    extra: BTreeMap<String, Value>,
}

impl Meta {
    /// `effective_date` is that of the notice whose version is being built.
    pub fn new(settings: &Settings, cfr_title: u32, effective_date: Option<NaiveDate>) -> Self {
        Self {
            cfr_title,
            cfr_title_text: settings.cfr_title(cfr_title as usize).map(str::to_string),
            effective_date,
            extra: settings.meta.clone(),
        }
    }
}

/// Statutory name and regulation letter from a part heading such as
/// `PART 1005—ELECTRONIC FUND TRANSFERS (REGULATION E)`.
pub fn parse_part_title(title: &str) -> Option<(String, Option<String>)> {
    let caps = PART_TITLE.captures(title)?;
    Some((caps[1].trim().to_string(), caps.get(2).map(|m| m.as_str().to_string())))
}

impl Layer for Meta {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        if node.label.len() != 1 {
            return None;
        }
        let mut out = Map::new();
        out.insert("cfr_title_number".into(), json!(self.cfr_title));
        if let Some(text) = &self.cfr_title_text {
            out.insert("cfr_title_text".into(), json!(text));
        }
        if let Some(date) = self.effective_date {
            out.insert("effective_date".into(), json!(date.format("%Y-%m-%d").to_string()));
        }
        if let Some((name, letter)) = node.title.as_deref().and_then(parse_part_title) {
            out.insert("statutory_name".into(), json!(name));
            if let Some(letter) = letter {
                out.insert("reg_letter".into(), json!(letter));
            }
        }
        for (key, value) in &self.extra {
            out.insert(key.clone(), value.clone());
        }
        Some(vec![Value::Object(out)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::regulation;
    use pretty_assertions::assert_eq;

    #[test]
    fn part_titles() {
        assert_eq!(
            parse_part_title("PART 1005—ELECTRONIC FUND TRANSFERS (REGULATION E)"),
            Some(("ELECTRONIC FUND TRANSFERS".into(), Some("E".into())))
        );
        assert_eq!(
            parse_part_title("PART 4 - GENERAL PROVISIONS"),
            Some(("GENERAL PROVISIONS".into(), None))
        );
        assert_eq!(parse_part_title("Subpart A"), None);
    }

    #[test]
    fn root_only_with_settings_extras() {
        let mut settings = Settings::default();
        settings.meta.insert("contact".into(), json!("info@example.gov"));
        let mut layer = Meta::new(&settings, 12, NaiveDate::from_ymd_opt(2024, 3, 1));
        let out = layer.build(&regulation());

        assert_eq!(out.len(), 1);
        assert_eq!(
            out["100"],
            vec![json!({
                "cfr_title_number": 12,
                "cfr_title_text": "Banks and Banking",
                "effective_date": "2024-03-01",
                "statutory_name": "WIDGET DISCLOSURES",
                "reg_letter": "W",
                "contact": "info@example.gov",
            })]
        );
    }
}
