//! Turning FR API records into parsed notices.
//!
//! Each record gets its `FR_NOTICE_OVERRIDES` merged in first. The rule's
//! XML is read from a local directory when one holds it and fetched
//! otherwise, then run through the macros before it is parsed.

use eregs_core::Settings;
use eregs_parse::{Notice, apply_delays, apply_macros};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::BuildError;
use crate::registries::{Registries, local_xml};
use crate::source::NoticeSource;

/// A notice together with the (macro-processed) XML it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedNotice {
    pub notice: Notice,
    #[serde(default)]
    pub xml: Option<String>,
}

async fn xml_for(
    source: &dyn NoticeSource,
    settings: &Settings,
    notice: &Notice,
) -> Result<Option<String>, BuildError> {
    if let Some(path) = local_xml(settings, &notice.document_number) {
        debug!(document = %notice.document_number, path = %path.display(), "local xml");
        let xml = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BuildError::Io { path, source })?;
        return Ok(Some(xml));
    }
    match &notice.fr_url {
        Some(url) => Ok(Some(source.fetch_xml(url).await?)),
        None => {
            warn!(document = %notice.document_number, "notice has no xml");
            Ok(None)
        }
    }
}

/// Fetch, override, and parse every final rule for a part, with delays
/// applied to effective dates.
pub async fn prepare_notices(
    source: &dyn NoticeSource,
    settings: &Settings,
    registries: &Registries,
    cfr_title: u32,
    cfr_part: &str,
) -> Result<Vec<PreparedNotice>, BuildError> {
    let records = source.fetch_notices(cfr_title, cfr_part).await?;
    let mut notices = Vec::with_capacity(records.len());
    let mut xmls = Vec::with_capacity(records.len());

    for mut record in records {
        let document_number = record
            .get("document_number")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(overrides) = document_number
            .as_deref()
            .and_then(|doc| settings.fr_notice_overrides.get(doc))
        {
            eregs_parse::notice::apply_overrides(&mut record, overrides);
        }

        let mut notice = Notice::from_api(&record)?;
        let xml = match xml_for(source, settings, &notice).await? {
            Some(raw) => {
                let xml = apply_macros(&raw, &registries.macros)?;
                notice.read_xml(&xml)?;
                Some(xml)
            }
            None => None,
        };
        notices.push(notice);
        xmls.push(xml);
    }

    apply_delays(&mut notices);
    info!(cfr_title, cfr_part, count = notices.len(), "prepared notices");
    Ok(notices
        .into_iter()
        .zip(xmls)
        .map(|(notice, xml)| PreparedNotice { notice, xml })
        .collect())
}
