//! Pipeline configuration.
//!
//! Loaded once from a JSON file and passed by reference to the parsers,
//! layers and builder. Keys are the upper-case option names used by the
//! settings file; every field has a default so an empty object is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

pub const DEFAULT_IMAGE_URL: &str =
    "https://s3.amazonaws.com/images.federalregister.gov/%s/original.gif";

const CFR_TITLE_NAMES: [&str; 50] = [
    "General Provisions",
    "Grants and Agreements",
    "The President",
    "Accounts",
    "Administrative Personnel",
    "Domestic Security",
    "Agriculture",
    "Aliens and Nationality",
    "Animals and Animal Products",
    "Energy",
    "Federal Elections",
    "Banks and Banking",
    "Business Credit and Assistance",
    "Aeronautics and Space",
    "Commerce and Foreign Trade",
    "Commercial Practices",
    "Commodity and Securities Exchanges",
    "Conservation of Power and Water Resources",
    "Customs Duties",
    "Employees' Benefits",
    "Food and Drugs",
    "Foreign Relations",
    "Highways",
    "Housing and Urban Development",
    "Indians",
    "Internal Revenue",
    "Alcohol, Tobacco Products and Firearms",
    "Judicial Administration",
    "Labor",
    "Mineral Resources",
    "Money and Finance: Treasury",
    "National Defense",
    "Navigation and Navigable Waters",
    "Education",
    "[Reserved]",
    "Parks, Forests, and Public Property",
    "Patents, Trademarks, and Copyrights",
    "Pensions, Bonuses, and Veterans' Relief",
    "Postal Service",
    "Protection of Environment",
    "Public Contracts and Property Management",
    "Public Health",
    "Public Lands: Interior",
    "Emergency Management and Assistance",
    "Public Welfare",
    "Shipping",
    "Telecommunication",
    "Federal Acquisition Regulations System",
    "Transportation",
    "Wildlife and Fisheries",
];

fn default_cfr_titles() -> Vec<Option<String>> {
    std::iter::once(None)
        .chain(CFR_TITLE_NAMES.iter().map(|t| Some(t.to_string())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Settings {
    /// Base URL of the regulations API versions are read from and written to.
    pub api_base: String,
    pub output_dir: PathBuf,
    pub git_output_dir: PathBuf,
    /// Title number → title name; index 0 is unused.
    pub cfr_titles: Vec<Option<String>>,
    /// Image URL template; `%s` is replaced with the graphic id.
    pub default_image_url: String,
    pub ignore_definitions_in: Vec<String>,
    pub include_definitions_in: Vec<String>,
    pub macros_sources: Vec<PathBuf>,
    pub overrides_sources: Vec<PathBuf>,
    pub regpatches_sources: Vec<PathBuf>,
    /// Directories searched for `{document_number}.xml`.
    pub local_xml_paths: Vec<PathBuf>,
    /// part → appendix letter → header labels to discard.
    pub appendix_ignore_subheader_label: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// part → section label id → depth per paragraph.
    pub paragraph_hierarchy: BTreeMap<String, BTreeMap<String, Vec<usize>>>,
    pub reissuances: Vec<String>,
    /// document number → fields merged over the API record.
    pub fr_notice_overrides: BTreeMap<String, serde_json::Map<String, Value>>,
    pub meta: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            output_dir: PathBuf::new(),
            git_output_dir: PathBuf::new(),
            cfr_titles: default_cfr_titles(),
            default_image_url: DEFAULT_IMAGE_URL.to_string(),
            ignore_definitions_in: Vec::new(),
            include_definitions_in: Vec::new(),
            macros_sources: Vec::new(),
            overrides_sources: Vec::new(),
            regpatches_sources: Vec::new(),
            local_xml_paths: Vec::new(),
            appendix_ignore_subheader_label: BTreeMap::new(),
            paragraph_hierarchy: BTreeMap::new(),
            reissuances: Vec::new(),
            fr_notice_overrides: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn cfr_title(&self, number: usize) -> Option<&str> {
        self.cfr_titles.get(number)?.as_deref()
    }

    pub fn image_url(&self, gid: &str) -> String {
        self.default_image_url.replacen("%s", gid, 1)
    }

    /// Manual paragraph depths for one section, when configured.
    pub fn hierarchy_for(&self, part: &str, section_label: &str) -> Option<&[usize]> {
        self.paragraph_hierarchy
            .get(part)?
            .get(section_label)
            .map(Vec::as_slice)
    }

    pub fn ignored_subheader_labels(&self, part: &str, appendix: &str) -> &[String] {
        self.appendix_ignore_subheader_label
            .get(part)
            .and_then(|m| m.get(appendix))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_reissuance(&self, document_number: &str) -> bool {
        self.reissuances.iter().any(|d| d == document_number)
    }
}
