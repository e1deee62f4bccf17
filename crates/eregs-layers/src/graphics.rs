//! Inline images written as `![alt](GID)`.
//!
//! URLs come from the override registry when it names the graphic, and
//! from the configured template otherwise. Thumbnails are only linked for
//! graphics the caller has confirmed exist; this layer does no I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use eregs_core::{Node, Settings};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::{Layer, occurrences, to_values};

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([A-Za-z0-9._-]+)\)").expect("static regex"));

#[derive(Debug, Serialize)]
struct Graphic {
    alt: String,
    text: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb_url: Option<String>,
    locations: Vec<usize>,
}

/// Graphic ids referenced anywhere in `tree`, for probing thumbnails.
pub fn gids_in(tree: &Node) -> BTreeSet<String> {
    tree.walk(&mut |n: &Node| {
        Some(
            IMAGE
                .captures_iter(&n.text)
                .map(|c| c[2].to_string())
                .collect::<Vec<_>>(),
        )
    })
    .into_iter()
    .flatten()
    .collect()
}

/// `…/x.gif` → `…/x.thumb.gif`; a URL without an extension gets `.thumb`.
pub fn thumbnail_url(url: &str) -> String {
    let name_start = url.rfind('/').map_or(0, |i| i + 1);
    match url[name_start..].rfind('.') {
        Some(dot) => {
            let dot = name_start + dot;
            format!("{}.thumb{}", &url[..dot], &url[dot..])
        }
        None => format!("{url}.thumb"),
    }
}

#[derive(Debug, Default)]
pub struct Graphics {
    template: String,
    overrides: BTreeMap<String, String>,
    thumbnails: BTreeSet<String>,
}

impl Graphics {
    /// `thumbnails` holds the graphic ids whose thumbnail is known to exist.
    pub fn new(
        settings: &Settings,
        overrides: BTreeMap<String, String>,
        thumbnails: BTreeSet<String>,
    ) -> Self {
        Self {
            template: settings.default_image_url.clone(),
            overrides,
            thumbnails,
        }
    }

    pub fn url_for(&self, gid: &str) -> String {
        self.overrides
            .get(gid)
            .cloned()
            .unwrap_or_else(|| self.template.replacen("%s", gid, 1))
    }
}

impl Layer for Graphics {
    fn name(&self) -> &'static str {
        "graphics"
    }

    fn process(&self, node: &Node) -> Option<Vec<Value>> {
        let text = &node.text;
        let mut seen = BTreeSet::new();
        let graphics = IMAGE
            .captures_iter(text)
            .filter(|c| seen.insert(c[0].to_string()))
            .map(|c| {
                let gid = &c[2];
                let url = self.url_for(gid);
                Graphic {
                    alt: c[1].to_string(),
                    text: c[0].to_string(),
                    thumb_url: self.thumbnails.contains(gid).then(|| thumbnail_url(&url)),
                    url,
                    locations: occurrences(text, &c[0]),
                }
            })
            .collect::<Vec<_>>();
        to_values(graphics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(text: &str) -> Node {
        Node::regtext(text, &["100", "A", "1"])
    }

    #[test]
    fn template_and_override_urls() {
        let overrides = BTreeMap::from([("ER02".to_string(), "https://img.example/er02.png".to_string())]);
        let layer = Graphics::new(&Settings::default(), overrides, BTreeSet::new());
        let out = layer
            .process(&node("![Chart](ER01) and ![Form](ER02) and ![Chart](ER01)"))
            .unwrap();
        assert_eq!(
            out,
            vec![
                json!({
                    "alt": "Chart",
                    "text": "![Chart](ER01)",
                    "url": "https://s3.amazonaws.com/images.federalregister.gov/ER01/original.gif",
                    "locations": [0, 1],
                }),
                json!({
                    "alt": "Form",
                    "text": "![Form](ER02)",
                    "url": "https://img.example/er02.png",
                    "locations": [0],
                }),
            ]
        );
    }

    #[test]
    fn thumbnails_only_when_confirmed() {
        let layer = Graphics::new(
            &Settings::default(),
            BTreeMap::new(),
            BTreeSet::from(["ER01".to_string()]),
        );
        let out = layer.process(&node("![Chart](ER01)")).unwrap();
        assert_eq!(
            out[0]["thumb_url"],
            json!("https://s3.amazonaws.com/images.federalregister.gov/ER01/original.thumb.gif")
        );
        assert!(layer.process(&node("![Other](ER09)")).unwrap()[0].get("thumb_url").is_none());
    }

    #[test]
    fn thumbnail_names() {
        assert_eq!(thumbnail_url("https://x.test/a/b.png"), "https://x.test/a/b.thumb.png");
        assert_eq!(thumbnail_url("https://x.test/a/b"), "https://x.test/a/b.thumb");
    }

    #[test]
    fn collects_gids() {
        let tree = node("![A](G1)").with_children(vec![node("![B](G2) ![A](G1)")]);
        assert_eq!(
            gids_in(&tree),
            BTreeSet::from(["G1".to_string(), "G2".to_string()])
        );
    }
}
