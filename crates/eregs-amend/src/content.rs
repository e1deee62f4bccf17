//! Change records from a notice's amendments and the new content its
//! `REGTEXT` blocks carry.

use eregs_core::{INTERP, Node, SUBPART, Settings};
use eregs_parse::notice::regtext_blocks;
use eregs_parse::text::interp::parse_interpretations;
use eregs_parse::xml::appendices::{appendix_letter, parse_appendix};
use eregs_parse::xml::reg_text::{parse_section, parse_subpart, sectno_label};
use eregs_parse::xml::{child_named, parse_document, text_of};
use eregs_parse::{Action, Amendment, ChangeMap, ChangeRecord};
use roxmltree::{Document, Node as XmlNode};
use tracing::{debug, warn};

use crate::AmendError;
use crate::labels::{bad_label, find_candidate};

/// The node at `label` as the block states it, if the block has it.
pub fn content_for(
    doc: &Document<'_>,
    block: XmlNode<'_, '_>,
    label: &[String],
    settings: &Settings,
) -> Result<Option<Node>, AmendError> {
    let Some(part) = label.first() else {
        return Ok(None);
    };
    let label_id = label.join("-");

    if label.iter().any(|s| s == INTERP) {
        let lines: Vec<String> = block
            .children()
            .filter(|c| c.has_tag_name("HD") || c.has_tag_name("P") || c.has_tag_name("FP"))
            .map(text_of)
            .collect();
        let (heading, body) = match lines.split_first() {
            Some((first, rest)) if first.to_lowercase().starts_with("supplement i") => {
                (first.as_str(), rest)
            }
            _ => ("", lines.as_slice()),
        };
        let interp = parse_interpretations(part, heading, &body.join("\n"));
        return Ok(interp.find(&label_id).cloned());
    }

    let Some(second) = label.get(1) else {
        return Ok(None);
    };

    if second == SUBPART {
        for subpart in block.descendants().filter(|n| n.has_tag_name("SUBPART")) {
            let node = parse_subpart(doc, subpart, part, settings)?;
            if let Some(found) = node.find(&label_id) {
                return Ok(Some(found.clone()));
            }
        }
        return Ok(None);
    }

    if second.starts_with(|c: char| c.is_ascii_digit()) {
        for section in block.descendants().filter(|n| n.has_tag_name("SECTION")) {
            let named = child_named(section, "SECTNO")
                .and_then(|s| sectno_label(&text_of(s)))
                .is_some_and(|(p, s)| &p == part && &s == second);
            if !named {
                continue;
            }
            let node = parse_section(doc, section, part, settings)?;
            return Ok(node.find(&label_id).cloned());
        }
        return Ok(None);
    }

    for appendix in block.descendants().filter(|n| n.has_tag_name("APPENDIX")) {
        let letter = child_named(appendix, "HD").and_then(|hd| appendix_letter(&text_of(hd)));
        if letter.as_deref() != Some(second.as_str()) {
            continue;
        }
        if let Some(node) = parse_appendix(doc, appendix, part, settings) {
            return Ok(node.find(&label_id).cloned());
        }
    }
    Ok(None)
}

/// Turn parsed amendments into a change map against `prior`.
///
/// New content for `PUT` and `POST` is read from the amendment's `REGTEXT`
/// block. Labels the prior tree lacks are reconciled with
/// [`find_candidate`]; anything still unresolved is logged and skipped.
pub fn build_changes(
    prior: &Node,
    notice_xml: &str,
    amendments: &[Amendment],
    settings: &Settings,
) -> Result<ChangeMap, AmendError> {
    let doc = parse_document(notice_xml)?;
    let blocks = regtext_blocks(doc.root_element());
    let mut changes = ChangeMap::new();

    for amendment in amendments {
        let label_id = amendment.label_id();
        if bad_label(&amendment.label) {
            warn!(label = %label_id, "impossible label, amendment dropped");
            continue;
        }

        let mut record = ChangeRecord::new(amendment.action);
        record.field = amendment.field;
        record.destination = amendment.destination.clone();

        if matches!(amendment.action, Action::Put | Action::Post) {
            let Some(block) = blocks.get(amendment.block) else {
                warn!(label = %label_id, block = amendment.block, "amendment block missing");
                continue;
            };
            match content_for(&doc, *block, &amendment.label, settings)? {
                Some(node) => record.node = Some(node),
                None => {
                    warn!(label = %label_id, "no content for amendment");
                    continue;
                }
            }
        }

        let needs_existing = amendment.action != Action::Post;
        if needs_existing && prior.find(&label_id).is_none() {
            if find_candidate(prior, &amendment.label).is_none() {
                warn!(label = %label_id, action = ?amendment.action, "unresolved amendment skipped");
                continue;
            }
            record.candidate = true;
        }

        debug!(label = %label_id, action = ?amendment.action, "change");
        changes.entry(label_id).or_default().push(record);
    }
    Ok(changes)
}
