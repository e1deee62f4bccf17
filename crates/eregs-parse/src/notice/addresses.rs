//! The `ADDRESSES` block: how to submit comments.

use std::sync::LazyLock;

use regex::Regex;
use roxmltree::Node as XmlNode;
use serde::{Deserialize, Serialize};

use crate::xml::{strip_tags, tagged_text_of};

static METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[•\-\s]*<E T="\d+">\s*([^<:]+?):?\s*</E>:?\s*(.*)$"#).expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub label: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<Method>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,
}

/// Parse an `ADD` element. `None` when it holds no paragraphs.
pub fn parse_addresses(add: XmlNode<'_, '_>) -> Option<Addresses> {
    let mut out = Addresses::default();
    let mut in_instructions = false;

    for p in add.children().filter(|c| c.has_tag_name("P")) {
        let tagged = tagged_text_of(p);
        if tagged.is_empty() {
            continue;
        }
        if let Some(caps) = METHOD.captures(&tagged) {
            let label = caps[1].trim().to_string();
            let content = strip_tags(&caps[2]);
            if label.eq_ignore_ascii_case("instructions") {
                in_instructions = true;
                if !content.is_empty() {
                    out.instructions.push(content);
                }
            } else {
                in_instructions = false;
                out.methods.push(Method { label, content });
            }
            continue;
        }

        let text = strip_tags(&tagged);
        if in_instructions {
            out.instructions.push(text);
        } else if out.intro.is_none() && out.methods.is_empty() {
            out.intro = Some(text);
        } else {
            out.instructions.push(text);
        }
    }

    (out != Addresses::default()).then_some(out)
}
