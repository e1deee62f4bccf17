//! Explicit registries loaded from the JSON files settings point at.
//!
//! - macros: `[[xpath, replacement_xml], ...]`
//! - image overrides: `{"GID": "url", ...}`
//! - regpatches: `{"document_number": {"label": [change, ...]}}`
//!
//! Later files win for overrides; macros and patches accumulate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eregs_core::Settings;
use eregs_parse::ChangeMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::BuildError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registries {
    pub macros: Vec<(String, String)>,
    pub image_overrides: BTreeMap<String, String>,
    pub regpatches: BTreeMap<String, ChangeMap>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BuildError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| BuildError::Registry {
        path: path.to_path_buf(),
        source,
    })
}

impl Registries {
    pub fn load(settings: &Settings) -> Result<Self, BuildError> {
        let mut out = Self::default();
        for path in &settings.macros_sources {
            let macros: Vec<(String, String)> = read_json(path)?;
            out.macros.extend(macros);
        }
        for path in &settings.overrides_sources {
            let overrides: BTreeMap<String, String> = read_json(path)?;
            out.image_overrides.extend(overrides);
        }
        for path in &settings.regpatches_sources {
            let patches: BTreeMap<String, ChangeMap> = read_json(path)?;
            for (document, changes) in patches {
                let merged = out.regpatches.entry(document).or_default();
                for (label, records) in changes {
                    merged.entry(label).or_default().extend(records);
                }
            }
        }
        debug!(
            macros = out.macros.len(),
            overrides = out.image_overrides.len(),
            patched_notices = out.regpatches.len(),
            "loaded registries"
        );
        Ok(out)
    }

    /// Merge this notice's patches into `changes`.
    pub fn patch(&self, document_number: &str, changes: &mut ChangeMap) {
        if let Some(patches) = self.regpatches.get(document_number) {
            for (label, records) in patches {
                changes
                    .entry(label.clone())
                    .or_default()
                    .extend(records.iter().cloned());
            }
        }
    }
}

/// `{document_number}.xml` from the first local directory holding it.
pub fn local_xml(settings: &Settings, document_number: &str) -> Option<PathBuf> {
    settings
        .local_xml_paths
        .iter()
        .map(|dir| dir.join(format!("{document_number}.xml")))
        .find(|p| p.is_file())
}
