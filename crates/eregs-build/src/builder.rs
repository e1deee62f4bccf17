//! The regulation build: parse, compile each version, emit layers and diffs.
//!
//! Every output is computed before the first one is written, so a failure
//! anywhere leaves the output untouched. Stage results go through the
//! checkpointer so an interrupted run can pick up where it stopped.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use eregs_amend::{build_changes, changes_between, compile};
use eregs_core::citations::ActCitation;
use eregs_core::{FrozenNode, Node, Settings};
use eregs_layers::graphics::{gids_in, thumbnail_url};
use eregs_layers::{
    ExternalCitations, Formatting, Graphics, InternalCitations, Interpretations, KeyTerms, Layer,
    Meta, ParagraphMarkers, SectionBySection, TableOfContents, Terms,
};
use eregs_parse::{ChangeMap, Notice, parse_regulation_text, parse_regulation_xml};
use eregs_store::{Checkpointer, Writer};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::BuildError;
use crate::notices::{PreparedNotice, prepare_notices};
use crate::order::{Plan, plan};
use crate::registries::Registries;
use crate::source::NoticeSource;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub cfr_title: u32,
    /// The act the regulation implements, for external citations.
    pub act: Option<ActCitation>,
    pub generate_diffs: bool,
}

/// One compiled version of the regulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: String,
    pub effective_on: Option<NaiveDate>,
    pub tree: Node,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub part: String,
    pub versions: Vec<String>,
    pub written: usize,
}

/// Parse a regulation given either as eCFR XML or as plain text.
pub fn parse_regulation(source: &str, settings: &Settings) -> Result<Node, BuildError> {
    if source.trim_start().starts_with('<') {
        Ok(parse_regulation_xml(source, settings)?)
    } else {
        Ok(parse_regulation_text(source, None)?)
    }
}

pub struct Builder<'a> {
    settings: &'a Settings,
    registries: Registries,
    source: &'a dyn NoticeSource,
    writer: &'a dyn Writer,
    checkpointer: Checkpointer,
    forced: BTreeSet<String>,
}

impl<'a> Builder<'a> {
    pub fn new(
        settings: &'a Settings,
        registries: Registries,
        source: &'a dyn NoticeSource,
        writer: &'a dyn Writer,
        checkpointer: Checkpointer,
    ) -> Self {
        Self {
            settings,
            registries,
            source,
            writer,
            checkpointer,
            forced: BTreeSet::new(),
        }
    }

    /// Recompute these stages even when a checkpoint holds them. A stage
    /// is named by its tag (`regulation`, `notices-1005`,
    /// `version-2013-10604`) or by the tag's first word, so `version`
    /// forces every version.
    pub fn force_stages(mut self, stages: impl IntoIterator<Item = String>) -> Self {
        self.forced.extend(stages);
        self
    }

    fn is_forced(&self, tag: &str) -> bool {
        self.forced.contains(tag)
            || tag
                .split_once('-')
                .is_some_and(|(stage, _)| self.forced.contains(stage))
    }

    async fn notices(
        &mut self,
        cfr_title: u32,
        part: &str,
    ) -> Result<Vec<PreparedNotice>, BuildError> {
        let tag = format!("notices-{part}");
        let force = self.is_forced(&tag);
        let key = self.checkpointer.next_with(&tag, force);
        if let Some(stored) = self.checkpointer.load(&key).await {
            return Ok(stored);
        }
        let prepared =
            prepare_notices(self.source, self.settings, &self.registries, cfr_title, part).await?;
        self.checkpointer.save(&key, &prepared).await?;
        Ok(prepared)
    }

    /// Every version from the baseline on, along with the notices behind
    /// them. Each notice's `changes` are filled in as it is applied.
    pub async fn versions(
        &mut self,
        regulation: &str,
        baseline: &str,
        cfr_title: u32,
    ) -> Result<(Vec<PreparedNotice>, Plan, Vec<Version>), BuildError> {
        let settings = self.settings;
        let force = self.is_forced("regulation");
        let tree: Node = self
            .checkpointer
            .checkpoint("regulation", force, || parse_regulation(regulation, settings))
            .await?;
        let part = tree.part().ok_or(BuildError::NoPart)?.to_string();

        let mut prepared = self.notices(cfr_title, &part).await?;
        let notices: Vec<Notice> = prepared.iter().map(|p| p.notice.clone()).collect();
        let plan = plan(&notices, baseline)?;

        let effective = |doc: &str| {
            notices
                .iter()
                .find(|n| n.document_number == doc)
                .and_then(|n| n.effective_on)
        };
        let mut versions = vec![Version {
            id: plan.baseline.clone(),
            effective_on: effective(&plan.baseline),
            tree,
        }];

        for group in &plan.groups {
            let prior = versions
                .last()
                .map(|v| v.tree.clone())
                .ok_or(BuildError::NoPart)?;
            let steps = group
                .document_numbers
                .iter()
                .map(|doc| {
                    let notice = prepared.iter().find(|p| p.notice.document_number == *doc);
                    (doc.clone(), notice.cloned())
                })
                .collect::<Vec<_>>();
            let tag = format!("version-{}", group.version());
            let force = self.is_forced(&tag);
            let registries = &self.registries;
            let (tree, changes): (Node, Vec<(String, ChangeMap)>) = self
                .checkpointer
                .checkpoint(&tag, force, || apply_group(settings, registries, prior, &steps))
                .await?;

            for (doc, change_map) in changes {
                if let Some(p) = prepared.iter_mut().find(|p| p.notice.document_number == doc) {
                    p.notice.changes = change_map;
                }
            }
            info!(version = group.version(), notices = group.document_numbers.len(), "compiled version");
            versions.push(Version {
                id: group.version().to_string(),
                effective_on: group.effective_on,
                tree,
            });
        }
        Ok((prepared, plan, versions))
    }

    /// Graphic ids whose thumbnail answers a HEAD probe.
    async fn thumbnails(&self, versions: &[Version]) -> BTreeSet<String> {
        let gids: BTreeSet<String> = versions.iter().flat_map(|v| gids_in(&v.tree)).collect();
        let probes = gids.into_iter().map(move |gid| async move {
            let url = self
                .registries
                .image_overrides
                .get(&gid)
                .cloned()
                .unwrap_or_else(|| self.settings.image_url(&gid));
            let found = self.source.head_ok(&thumbnail_url(&url)).await;
            found.then_some(gid)
        });
        join_all(probes).await.into_iter().flatten().collect()
    }

    fn layers(
        &self,
        version: &Version,
        options: &BuildOptions,
        analysed: &[Notice],
        thumbnails: &BTreeSet<String>,
    ) -> Vec<Box<dyn Layer>> {
        vec![
            Box::new(ExternalCitations::new(options.act.clone())) as Box<dyn Layer>,
            Box::new(InternalCitations::default()),
            Box::new(Terms::new(self.settings)),
            Box::new(ParagraphMarkers),
            Box::new(Meta::new(self.settings, options.cfr_title, version.effective_on)),
            Box::new(Graphics::new(
                self.settings,
                self.registries.image_overrides.clone(),
                thumbnails.clone(),
            )),
            Box::new(KeyTerms::default()),
            Box::new(Formatting),
            Box::new(TableOfContents),
            Box::new(Interpretations::default()),
            Box::new(SectionBySection::new(analysed)),
        ]
    }

    /// Build every version after `baseline`, then write notices, versions,
    /// layers, and (optionally) diffs.
    pub async fn build_from(
        &mut self,
        regulation: &str,
        baseline: &str,
        options: &BuildOptions,
    ) -> Result<BuildSummary, BuildError> {
        let (prepared, plan, versions) = self.versions(regulation, baseline, options.cfr_title).await?;
        let part = versions
            .first()
            .and_then(|v| v.tree.part())
            .ok_or(BuildError::NoPart)?
            .to_string();
        let thumbnails = self.thumbnails(&versions).await;

        let mut outputs: Vec<(String, Value)> = Vec::new();
        let applied: BTreeSet<&str> = plan
            .groups
            .iter()
            .flat_map(|g| g.document_numbers.iter().map(String::as_str))
            .chain(std::iter::once(plan.baseline.as_str()))
            .collect();
        for p in prepared.iter().filter(|p| applied.contains(p.notice.document_number.as_str())) {
            outputs.push((
                format!("notice/{}", p.notice.document_number),
                serde_json::to_value(&p.notice)?,
            ));
        }

        let all_notices: Vec<Notice> = prepared.iter().map(|p| p.notice.clone()).collect();
        for version in &versions {
            outputs.push((
                format!("regulation/{part}/{}", version.id),
                serde_json::to_value(&version.tree)?,
            ));
            let analysed: Vec<Notice> = all_notices
                .iter()
                .filter(|n| n.effective_on <= version.effective_on)
                .cloned()
                .collect();
            for mut layer in self.layers(version, options, &analysed, &thumbnails) {
                let output = layer.build(&version.tree);
                outputs.push((
                    format!("layer/{}/{part}/{}", layer.name(), version.id),
                    serde_json::to_value(&output)?,
                ));
            }
        }

        if options.generate_diffs {
            let frozen: Vec<(&str, FrozenNode)> = versions
                .iter()
                .map(|v| (v.id.as_str(), FrozenNode::from_node(&v.tree)))
                .collect();
            for (id, tree) in &frozen {
                debug!(version = %id, digest = %tree.digest_hex(), "frozen");
            }
            for (lhs_id, lhs) in &frozen {
                for (rhs_id, rhs) in &frozen {
                    if lhs_id == rhs_id {
                        continue;
                    }
                    let diff = changes_between(lhs, rhs);
                    debug!(lhs = %lhs_id, rhs = %rhs_id, changes = diff.len(), "diff");
                    outputs.push((
                        format!("diff/{part}/{lhs_id}/{rhs_id}"),
                        serde_json::to_value(&diff)?,
                    ));
                }
            }
        }

        for (path, value) in &outputs {
            self.writer.write(path, value).await?;
        }
        info!(part = %part, versions = versions.len(), written = outputs.len(), "build complete");
        Ok(BuildSummary {
            part,
            versions: versions.into_iter().map(|v| v.id).collect(),
            written: outputs.len(),
        })
    }
}

/// Apply each notice of one effective-date group in turn.
fn apply_group(
    settings: &Settings,
    registries: &Registries,
    mut tree: Node,
    steps: &[(String, Option<PreparedNotice>)],
) -> Result<(Node, Vec<(String, ChangeMap)>), BuildError> {
    let mut applied = Vec::new();
    for (doc, prepared) in steps {
        let Some(PreparedNotice {
            notice,
            xml: Some(xml),
        }) = prepared
        else {
            warn!(document = %doc, "no xml for notice, nothing applied");
            continue;
        };
        if settings.is_reissuance(doc) {
            info!(document = %doc, "reissuance, parsing whole regulation");
            tree = parse_regulation_xml(xml, settings)?;
            applied.push((doc.clone(), ChangeMap::new()));
            continue;
        }
        let mut changes = build_changes(&tree, xml, &notice.amendments, settings)?;
        registries.patch(doc, &mut changes);
        tree = compile(&tree, &changes);
        applied.push((doc.clone(), changes));
    }
    Ok((tree, applied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use eregs_store::MemoryWriter;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use serde_json::json;
    use tempfile::TempDir;

    const REGULATION: &str = "PART 200—SAMPLE RULES (REGULATION S)\n\
Subpart A—General\n\
§ 200.1 Purpose.\n\
(a) One. (b) Two.\n";

    const AMENDING: &str = r#"<RULE>
<REGTEXT PART="200" TITLE="12">
  <AMDPAR>1. In § 200.1, revise paragraph (b) to read as follows:</AMDPAR>
  <SECTION>
    <SECTNO>§ 200.1</SECTNO>
    <SUBJECT>Purpose.</SUBJECT>
    <STARS/>
    <P>(b) Revised.</P>
  </SECTION>
</REGTEXT>
</RULE>"#;

    fn source() -> FakeSource {
        FakeSource {
            records: vec![
                json!({
                    "document_number": "2024-001",
                    "effective_on": "2024-01-01",
                    "publication_date": "2023-11-01",
                    "cfr_references": [{"title": 12, "part": 200}],
                }),
                json!({
                    "document_number": "2024-002",
                    "effective_on": "2024-03-01",
                    "publication_date": "2024-02-01",
                    "full_text_xml_url": "http://fr.test/2024-002.xml",
                    "cfr_references": [{"title": 12, "part": 200}],
                }),
            ],
            xml: BTreeMap::from([("http://fr.test/2024-002.xml".to_string(), AMENDING.to_string())]),
            ..FakeSource::default()
        }
    }

    fn options(generate_diffs: bool) -> BuildOptions {
        BuildOptions {
            cfr_title: 12,
            act: None,
            generate_diffs,
        }
    }

    #[tokio::test]
    async fn builds_versions_layers_and_diffs() {
        let settings = Settings::default();
        let source = source();
        let writer = MemoryWriter::new();
        let mut builder = Builder::new(
            &settings,
            Registries::default(),
            &source,
            &writer,
            Checkpointer::disabled(),
        );
        let summary = builder
            .build_from(REGULATION, "2024-001", &options(true))
            .await
            .unwrap();
        assert_eq!(summary.part, "200");
        assert_eq!(summary.versions, vec!["2024-001", "2024-002"]);

        let paths = writer.paths();
        for expected in [
            "notice/2024-001",
            "notice/2024-002",
            "regulation/200/2024-001",
            "regulation/200/2024-002",
            "layer/terms/200/2024-002",
            "layer/meta/200/2024-001",
            "diff/200/2024-001/2024-002",
            "diff/200/2024-002/2024-001",
        ] {
            assert!(paths.contains(&expected.to_string()), "missing {expected}");
        }
        // 2 notices + 2 versions + 11 layers per version + 2 diffs
        assert_eq!(summary.written, 28);
        assert_eq!(paths.len(), 28);

        let v2: Node = serde_json::from_value(writer.get("regulation/200/2024-002").unwrap()).unwrap();
        assert_eq!(v2.find("200-1-b").unwrap().text, "(b) Revised.");
        let v1: Node = serde_json::from_value(writer.get("regulation/200/2024-001").unwrap()).unwrap();
        assert_eq!(v1.find("200-1-b").unwrap().text, "(b) Two.");

        let notice = writer.get("notice/2024-002").unwrap();
        assert!(notice["changes"].get("200-1-b").is_some());

        let meta = writer.get("layer/meta/200/2024-002").unwrap();
        assert_eq!(meta["200"][0]["effective_date"], json!("2024-03-01"));
    }

    #[tokio::test]
    async fn missing_baseline_writes_nothing() {
        let settings = Settings::default();
        let source = source();
        let writer = MemoryWriter::new();
        let mut builder = Builder::new(
            &settings,
            Registries::default(),
            &source,
            &writer,
            Checkpointer::disabled(),
        );
        let err = builder
            .build_from(REGULATION, "2099-999", &options(false))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingNotice(doc) if doc == "2099-999"));
        assert!(writer.paths().is_empty());
    }

    #[tokio::test]
    async fn checkpoints_are_reused() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::default();
        let writer = MemoryWriter::new();

        let first_source = source();
        let mut first = Builder::new(
            &settings,
            Registries::default(),
            &first_source,
            &writer,
            Checkpointer::new(Some(tmp.path().to_path_buf())).unwrap(),
        );
        first.build_from(REGULATION, "2024-001", &options(false)).await.unwrap();
        assert!(tmp.path().join("001-regulation.json").exists());
        assert!(tmp.path().join("002-notices-200.json").exists());
        assert!(tmp.path().join("003-version-2024-002.json").exists());

        // Nothing left to fetch: the second run must come from checkpoints.
        let empty = FakeSource::default();
        let mut second = Builder::new(
            &settings,
            Registries::default(),
            &empty,
            &writer,
            Checkpointer::new(Some(tmp.path().to_path_buf())).unwrap(),
        );
        let summary = second
            .build_from(REGULATION, "2024-001", &options(false))
            .await
            .unwrap();
        assert_eq!(summary.versions, vec!["2024-001", "2024-002"]);
    }

    #[tokio::test]
    async fn forced_stages_ignore_their_checkpoints() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::default();
        let source = source();
        let checkpointer = || Checkpointer::new(Some(tmp.path().to_path_buf())).unwrap();
        let text_of_b = |writer: &MemoryWriter| {
            let tree: Node =
                serde_json::from_value(writer.get("regulation/200/2024-002").unwrap()).unwrap();
            tree.find("200-1-b").unwrap().text.clone()
        };

        let writer = MemoryWriter::new();
        let mut first = Builder::new(&settings, Registries::default(), &source, &writer, checkpointer());
        first.build_from(REGULATION, "2024-001", &options(false)).await.unwrap();

        let stored = tmp.path().join("003-version-2024-002.json");
        let raw = std::fs::read_to_string(&stored).unwrap();
        std::fs::write(&stored, raw.replace("(b) Revised.", "(b) Stale.")).unwrap();

        let writer = MemoryWriter::new();
        let mut cached = Builder::new(&settings, Registries::default(), &source, &writer, checkpointer());
        cached.build_from(REGULATION, "2024-001", &options(false)).await.unwrap();
        assert_eq!(text_of_b(&writer), "(b) Stale.");

        let writer = MemoryWriter::new();
        let mut forced = Builder::new(&settings, Registries::default(), &source, &writer, checkpointer())
            .force_stages(["version".to_string()]);
        forced.build_from(REGULATION, "2024-001", &options(false)).await.unwrap();
        assert_eq!(text_of_b(&writer), "(b) Revised.");

        // Forcing the notices stage against an empty source loses the baseline.
        let empty = FakeSource::default();
        let writer = MemoryWriter::new();
        let mut refetch = Builder::new(&settings, Registries::default(), &empty, &writer, checkpointer())
            .force_stages(["notices-200".to_string()]);
        let err = refetch
            .build_from(REGULATION, "2024-001", &options(false))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingNotice(_)));
    }

    #[tokio::test]
    async fn probes_thumbnails_once_per_graphic() {
        let settings = Settings::default();
        let source = FakeSource {
            existing: [
                "https://s3.amazonaws.com/images.federalregister.gov/G1/original.thumb.gif".to_string(),
            ]
            .into(),
            ..FakeSource::default()
        };
        let writer = MemoryWriter::new();
        let builder = Builder::new(
            &settings,
            Registries::default(),
            &source,
            &writer,
            Checkpointer::disabled(),
        );
        let version = |text: &str| Version {
            id: "v".into(),
            effective_on: None,
            tree: Node::regtext(text, &["200"]),
        };
        let found = builder
            .thumbnails(&[version("![A](G1) ![B](G2)"), version("![A](G1)")])
            .await;
        assert_eq!(found, BTreeSet::from(["G1".to_string()]));
    }

    #[tokio::test]
    async fn reissuance_replaces_the_tree() {
        let reissue = r#"<RULE><REGTEXT PART="200" TITLE="12">
  <AMDPAR>1. Part 200 is revised to read as follows:</AMDPAR>
  <PART>
    <HD SOURCE="HED">PART 200—SAMPLE RULES</HD>
    <SECTION>
      <SECTNO>§ 200.5</SECTNO>
      <SUBJECT>Fresh.</SUBJECT>
      <P>(a) Fresh start.</P>
    </SECTION>
  </PART>
</REGTEXT></RULE>"#;
        let mut source = source();
        source
            .xml
            .insert("http://fr.test/2024-002.xml".to_string(), reissue.to_string());
        let settings = Settings {
            reissuances: vec!["2024-002".to_string()],
            ..Settings::default()
        };
        let writer = MemoryWriter::new();
        let mut builder = Builder::new(
            &settings,
            Registries::default(),
            &source,
            &writer,
            Checkpointer::disabled(),
        );
        builder.build_from(REGULATION, "2024-001", &options(false)).await.unwrap();
        let v2: Node = serde_json::from_value(writer.get("regulation/200/2024-002").unwrap()).unwrap();
        assert!(v2.find("200-5").is_some());
        assert!(v2.find("200-1").is_none());
    }
}
