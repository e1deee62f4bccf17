//! Federal Register notices.
//!
//! A [`Notice`] starts from the FR API record, optionally patched by
//! per-document overrides, and is then filled in from the rule's XML:
//! front matter, dates, delays, the section-by-section analysis, and the
//! amendments compiled from every `AMDPAR`.

pub mod addresses;
pub mod amdpar;
pub mod dates;
pub mod delays;
pub mod fields;
pub mod sxs;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use eregs_core::Node;
use roxmltree::Node as XmlNode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::ParseError;
use crate::xml::{parse_document, text_of};
use addresses::Addresses;
use amdpar::{Action, Amendment, Field, parse_amdpar};
use delays::Delay;
use sxs::SxsNode;

/// One entry in a notice's change map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<String>>,
    /// Set when the label was corrected by fuzzy matching against the
    /// prior tree.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub candidate: bool,
}

impl ChangeRecord {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            node: None,
            field: None,
            destination: None,
            candidate: false,
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.node = Some(node);
        self
    }
}

/// label id → changes, in application order.
pub type ChangeMap = BTreeMap<String, Vec<ChangeRecord>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub document_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfr_title: Option<u32>,
    #[serde(default)]
    pub cfr_parts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr_volume: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr_citation: Option<String>,
    /// Where the full-text XML lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regulation_id_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Addresses>,
    /// Dates grouped as effective, comments, or other.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dates: BTreeMap<String, Vec<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delays: Vec<Delay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section_by_section: Vec<SxsNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amendments: Vec<Amendment>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: ChangeMap,
    /// API fields carried through untouched (`type`, `html_url`, pages).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CfrReference {
    title: Option<u32>,
    part: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiDocument {
    document_number: String,
    #[serde(default)]
    effective_on: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default, alias = "fr_volume")]
    volume: Option<u32>,
    #[serde(default)]
    citation: Option<String>,
    #[serde(default)]
    full_text_xml_url: Option<String>,
    #[serde(default)]
    start_page: Option<u32>,
    #[serde(default)]
    end_page: Option<u32>,
    #[serde(default)]
    cfr_references: Vec<CfrReference>,
    #[serde(default)]
    regulation_id_numbers: Vec<String>,
}

const META_FIELDS: [&str; 4] = ["type", "html_url", "start_page", "end_page"];

fn optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ParseError> {
    raw.filter(|d| !d.is_empty())
        .map(dates::parse_iso)
        .transpose()
}

/// Shallow-merge `overrides` over an API record.
pub fn apply_overrides(record: &mut Value, overrides: &Map<String, Value>) {
    if let Value::Object(fields) = record {
        for (key, value) in overrides {
            fields.insert(key.clone(), value.clone());
        }
    }
}

/// Every `REGTEXT` block in document order.
pub fn regtext_blocks<'a, 'input>(root: XmlNode<'a, 'input>) -> Vec<XmlNode<'a, 'input>> {
    root.descendants()
        .filter(|n| n.has_tag_name("REGTEXT"))
        .collect()
}

impl Notice {
    /// Build from one FR API document record.
    pub fn from_api(record: &Value) -> Result<Self, ParseError> {
        let api: ApiDocument = serde_json::from_value(record.clone())?;
        let mut cfr_parts: Vec<String> = Vec::new();
        for reference in &api.cfr_references {
            let part = match &reference.part {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            if !cfr_parts.contains(&part) {
                cfr_parts.push(part);
            }
        }

        let meta = META_FIELDS
            .iter()
            .filter_map(|key| {
                record
                    .get(*key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect();

        Ok(Self {
            fr_citation: api.citation.or_else(|| {
                api.volume
                    .zip(api.start_page)
                    .map(|(v, p)| format!("{v} FR {p}"))
            }),
            document_number: api.document_number,
            cfr_title: api.cfr_references.iter().find_map(|r| r.title),
            cfr_parts,
            publication_date: optional_date(api.publication_date.as_deref())?,
            effective_on: optional_date(api.effective_on.as_deref())?,
            fr_volume: api.volume,
            fr_url: api.full_text_xml_url,
            start_page: api.start_page,
            end_page: api.end_page,
            regulation_id_numbers: api.regulation_id_numbers,
            meta,
            ..Self::default()
        })
    }

    /// First CFR part the notice touches.
    pub fn part(&self) -> Option<&str> {
        self.cfr_parts.first().map(String::as_str)
    }

    /// Fill in everything the rule's XML carries. Values already set from
    /// the API are kept.
    pub fn read_xml(&mut self, xml: &str) -> Result<(), ParseError> {
        let doc = parse_document(xml)?;
        let root = doc.root_element();

        if self.document_number.is_empty()
            && let Some(number) = fields::document_number(root)
        {
            self.document_number = number;
        }
        if let Some((title, parts)) = fields::cfr(root) {
            self.cfr_title.get_or_insert(title);
            for part in parts {
                if !self.cfr_parts.contains(&part) {
                    self.cfr_parts.push(part);
                }
            }
        }
        for rin in fields::regulation_id_numbers(root) {
            if !self.regulation_id_numbers.contains(&rin) {
                self.regulation_id_numbers.push(rin);
            }
        }
        self.agency = self.agency.take().or_else(|| fields::agency(root));
        self.action = self.action.take().or_else(|| fields::action(root));
        self.summary = self.summary.take().or_else(|| fields::summary(root));
        self.contact = self.contact.take().or_else(|| fields::contact(root));
        self.docket = self.docket.take().or_else(|| fields::docket(root));
        if let Some(add) = root.descendants().find(|n| n.has_tag_name("ADD")) {
            self.addresses = addresses::parse_addresses(add);
        }

        if let Some(text) = fields::dates_text(root) {
            self.dates = dates::classify(&text);
            self.delays = delays::delays_in(&text);
            if self.effective_on.is_none() {
                self.effective_on = self
                    .dates
                    .get(dates::EFFECTIVE)
                    .and_then(|d| d.first().copied());
            }
        }

        let part = self.part().unwrap_or_default().to_string();
        self.section_by_section = sxs::parse_sxs(root, &part, self.start_page);
        self.amendments = amendments_in(root, &part);

        debug!(
            document = %self.document_number,
            amendments = self.amendments.len(),
            sxs = self.section_by_section.len(),
            "read notice xml"
        );
        Ok(())
    }

    /// Whether this notice's citation range covers `volume FR page`.
    pub fn covers(&self, volume: u32, page: u32) -> bool {
        if self.fr_volume != Some(volume) {
            return false;
        }
        match (self.start_page, self.end_page) {
            (Some(start), Some(end)) => (start..=end).contains(&page),
            (Some(start), None) => start == page,
            _ => false,
        }
    }
}

/// Amendments from every `AMDPAR`, tagged with the index of the `REGTEXT`
/// block holding their content.
pub fn amendments_in(root: XmlNode<'_, '_>, default_part: &str) -> Vec<Amendment> {
    let mut out = Vec::new();
    for (block, regtext) in regtext_blocks(root).into_iter().enumerate() {
        let part = regtext.attribute("PART").unwrap_or(default_part);
        for amdpar in regtext.children().filter(|c| c.has_tag_name("AMDPAR")) {
            for mut amendment in parse_amdpar(&text_of(amdpar), part) {
                amendment.block = block;
                out.push(amendment);
            }
        }
    }
    out
}

/// Push effective dates of earlier notices forward wherever a later
/// notice delays them. Notices are visited in publication order so the
/// latest delay wins.
pub fn apply_delays(notices: &mut [Notice]) {
    let mut order: Vec<usize> = (0..notices.len()).collect();
    order.sort_by_key(|&i| notices[i].publication_date);

    for &i in &order {
        let delays = notices[i].delays.clone();
        let published = notices[i].publication_date;
        for delay in delays {
            for (j, target) in notices.iter_mut().enumerate() {
                if j == i || !target.covers(delay.fr_volume, delay.fr_page) {
                    continue;
                }
                if published.is_some() && target.publication_date > published {
                    continue;
                }
                info!(
                    document = %target.document_number,
                    until = %delay.until,
                    "effective date delayed"
                );
                target.effective_on = Some(delay.until);
            }
        }
    }
}
