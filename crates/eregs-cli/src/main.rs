//! `eregs`: build regulation versions, layers, and diffs from the Federal
//! Register.
//!
//! Exit codes: 0 on success, 2 on bad arguments, 1 on any other failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use eregs_build::{BuildOptions, Builder, Registries, notice_order, prepare_notices, watch_node};
use eregs_core::Settings;
use eregs_core::citations::ActCitation;
use eregs_store::{Checkpointer, FsWriter, MemoryWriter, Writer};
use eregs_sync::federal_register::DEFAULT_BASE_URL;
use eregs_sync::{ApiWriter, FederalRegisterClient};
use tracing::info;

#[derive(Parser)]
#[command(name = "eregs", about = "Regulation version builder", version)]
struct Cli {
    /// Settings file (JSON, upper-case option names)
    #[arg(long, global = true, env = "EREGS_SETTINGS")]
    settings: Option<PathBuf>,

    /// Federal Register API root
    #[arg(long, global = true, env = "EREGS_FR_API", default_value = DEFAULT_BASE_URL)]
    fr_api: String,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every version from a baseline notice onward
    BuildFrom {
        /// Regulation text or eCFR XML as of the baseline notice
        regulation: PathBuf,
        /// CFR title number
        title: u32,
        /// Document number of the baseline notice
        notice_doc: String,
        /// Title of the act the regulation implements
        act_title: String,
        /// Section of that act
        act_section: String,
        /// Also write diffs between every pair of versions
        #[arg(long)]
        generate_diffs: bool,
        /// Directory for stage checkpoints
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        /// Recompute a checkpointed stage (`regulation`, `notices`,
        /// `version`, or one tag such as `version-2013-10604`)
        #[arg(long = "force-stage", value_name = "TAG")]
        force_stages: Vec<String>,
    },
    /// Print the order notices apply in, grouped by effective date
    NoticeOrder {
        /// CFR title number
        title: u32,
        /// CFR part
        part: String,
    },
    /// Report every version where one node's text or title changes
    WatchNode {
        /// Label id, e.g. 1005-7-b
        label: String,
        regulation: PathBuf,
        title: u32,
        notice_doc: String,
    },
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::from_path(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn read_regulation(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Publish to the regulations API when one is configured, to disk otherwise.
fn output_writer(settings: &Settings) -> Box<dyn Writer> {
    if !settings.api_base.is_empty() {
        Box::new(ApiWriter::new(settings.api_base.clone()))
    } else if settings.output_dir.as_os_str().is_empty() {
        Box::new(FsWriter::new("."))
    } else {
        Box::new(FsWriter::new(settings.output_dir.clone()))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;
    let registries = Registries::load(&settings).context("loading registries")?;
    let client = FederalRegisterClient::new(cli.fr_api);

    match cli.command {
        Command::BuildFrom {
            regulation,
            title,
            notice_doc,
            act_title,
            act_section,
            generate_diffs,
            checkpoint_dir,
            force_stages,
        } => {
            let text = read_regulation(&regulation)?;
            let writer = output_writer(&settings);
            let checkpointer = Checkpointer::new(checkpoint_dir).context("checkpoint directory")?;
            let mut builder =
                Builder::new(&settings, registries, &client, writer.as_ref(), checkpointer)
                    .force_stages(force_stages);
            let options = BuildOptions {
                cfr_title: title,
                act: Some(ActCitation {
                    title: act_title,
                    section: act_section,
                }),
                generate_diffs,
            };
            let summary = builder
                .build_from(&text, &notice_doc, &options)
                .await
                .with_context(|| format!("building from {notice_doc}"))?;
            info!(
                part = %summary.part,
                versions = summary.versions.len(),
                written = summary.written,
                "done"
            );
        }
        Command::NoticeOrder { title, part } => {
            let prepared = prepare_notices(&client, &settings, &registries, title, &part)
                .await
                .with_context(|| format!("fetching notices for {title} CFR {part}"))?;
            let notices: Vec<_> = prepared.into_iter().map(|p| p.notice).collect();
            let order = notice_order(&notices);
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Command::WatchNode {
            label,
            regulation,
            title,
            notice_doc,
        } => {
            let text = read_regulation(&regulation)?;
            let scratch = MemoryWriter::new();
            let mut builder = Builder::new(
                &settings,
                registries,
                &client,
                &scratch,
                Checkpointer::disabled(),
            );
            let (_, _, versions) = builder
                .versions(&text, &notice_doc, title)
                .await
                .with_context(|| format!("building from {notice_doc}"))?;
            let versions: Vec<(String, _)> =
                versions.into_iter().map(|v| (v.id, v.tree)).collect();
            let sightings = watch_node(&label, &versions);
            if sightings.is_empty() {
                println!("{label}: never present");
            }
            for sighting in sightings {
                match sighting.text {
                    Some(text) => println!("{}: {text}", sighting.version),
                    None => println!("{}: removed", sighting.version),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    info!("eregs v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_from_arguments() {
        let cli = Cli::try_parse_from([
            "eregs",
            "build-from",
            "reg.txt",
            "12",
            "2011-31725",
            "15",
            "1693",
            "--generate-diffs",
            "--checkpoint-dir",
            "/tmp/cp",
            "--force-stage",
            "notices",
            "--force-stage",
            "version-2012-1728",
        ])
        .unwrap();
        match cli.command {
            Command::BuildFrom {
                title,
                notice_doc,
                act_section,
                generate_diffs,
                checkpoint_dir,
                force_stages,
                ..
            } => {
                assert_eq!(title, 12);
                assert_eq!(notice_doc, "2011-31725");
                assert_eq!(act_section, "1693");
                assert!(generate_diffs);
                assert_eq!(checkpoint_dir, Some(PathBuf::from("/tmp/cp")));
                assert_eq!(force_stages, vec!["notices", "version-2012-1728"]);
            }
            _ => panic!("expected build-from"),
        }
    }

    #[test]
    fn no_stage_is_forced_by_default() {
        let cli =
            Cli::try_parse_from(["eregs", "build-from", "reg.txt", "12", "2011-31725", "15", "1693"])
                .unwrap();
        match cli.command {
            Command::BuildFrom { force_stages, .. } => assert!(force_stages.is_empty()),
            _ => panic!("expected build-from"),
        }
    }

    #[test]
    fn missing_arguments_are_usage_errors() {
        let err = Cli::try_parse_from(["eregs", "build-from", "reg.txt", "12"]).err();
        assert_eq!(err.map(|e| e.exit_code()), Some(2));
        let err = Cli::try_parse_from(["eregs", "notice-order", "twelve", "1005"]).err();
        assert_eq!(err.map(|e| e.exit_code()), Some(2));
    }
}
