//! `gd`: command-line front end for the glyphdrift engine.
//!
//! # Responsibility
//! - Map subcommands onto core service operations over one SQLite file.
//! - Print every result as pretty JSON on stdout.

#![forbid(unsafe_code)]

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glyphdrift_core::{
    document_service, evolution_service, init_from_config, init_logging, open_db,
    open_db_in_memory, remix_service, AtomLevel, BranchMode, ComposeRequest, EngineConfig,
    EventStep, MergeStrategy, RemixSide, RemixStrategy,
};
use log::info;
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "gd: branching text evolution with deterministic replay",
    long_about = None
)]
struct Cli {
    /// SQLite database file. Without it an in-memory database is used.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON engine config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a document and atomize it.
    Ingest(IngestArgs),
    /// Apply one event, or a chain of events, as new branches.
    Evolve(EvolveArgs),
    /// Replay a branch from its root document.
    Replay(ReplayArgs),
    /// Show a branch with its lineage events.
    Timeline(BranchArg),
    /// Merge two branches into a new branch.
    Merge(MergeArgs),
    /// Recombine two documents or branches.
    Remix(RemixArgs),
    /// Show a stored remix artifact with its provenance links.
    Artifact(ArtifactArg),
    /// Print the event graph of a branch lineage.
    Graph(BranchArg),
    /// Write a replay checkpoint at a branch tip.
    Checkpoint(BranchArg),
    /// Delete a branch; its children become lineage roots.
    Delete(BranchArg),
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long)]
    title: String,
    /// Inline text.
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    /// UTF-8 text file.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Rebuild atoms even when the same text is already stored.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct EvolveArgs {
    #[arg(long)]
    parent: Option<Uuid>,
    #[arg(long)]
    document: Option<Uuid>,
    #[arg(long, required_unless_present = "chain")]
    event_type: Option<String>,
    /// JSON payload object.
    #[arg(long, default_value = "{}")]
    payload: String,
    /// JSON array of `{event_type, event_payload}` applied as one chain.
    #[arg(long, conflicts_with = "event_type")]
    chain: Option<String>,
    #[arg(long, default_value = "public", value_parser = parse_mode)]
    mode: BranchMode,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    branch: Uuid,
    /// Replay every event from the root document.
    #[arg(long)]
    no_checkpoints: bool,
}

#[derive(Args, Debug)]
struct BranchArg {
    branch: Uuid,
}

#[derive(Args, Debug)]
struct ArtifactArg {
    artifact: Uuid,
}

#[derive(Args, Debug)]
struct MergeArgs {
    left: Uuid,
    right: Uuid,
    #[arg(long, default_value = "interleave", value_parser = parse_merge_strategy)]
    strategy: MergeStrategy,
    #[arg(long, default_value = "public", value_parser = parse_mode)]
    mode: BranchMode,
}

#[derive(Args, Debug)]
struct RemixArgs {
    #[arg(long)]
    source_document: Option<Uuid>,
    #[arg(long)]
    source_branch: Option<Uuid>,
    #[arg(long)]
    target_document: Option<Uuid>,
    #[arg(long)]
    target_branch: Option<Uuid>,
    #[arg(long, default_value = "interleave", value_parser = parse_remix_strategy)]
    strategy: RemixStrategy,
    #[arg(long, default_value_t = 0)]
    seed: i64,
    /// Atom level to draw from; repeatable.
    #[arg(long = "level", value_parser = parse_level)]
    levels: Vec<AtomLevel>,
    #[arg(long)]
    create_branch: bool,
    #[arg(long)]
    persist: bool,
    #[arg(long, default_value = "public", value_parser = parse_mode)]
    mode: BranchMode,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => EngineConfig::default(),
    };
    match &cli.log_dir {
        Some(dir) => init_logging(&config.log_level, dir).map_err(|err| anyhow!(err))?,
        None => {
            init_from_config(&config).map_err(|err| anyhow!(err))?;
        }
    }

    let conn = match &cli.db {
        Some(path) => open_db(path)
            .with_context(|| format!("failed to open database `{}`", path.display()))?,
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };
    info!("event=cli_command module=cli status=start command={}", command_name(&cli.command));

    let output = match cli.command {
        Commands::Ingest(args) => {
            let text = match (args.text, args.file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read `{}`", path.display()))?,
                (None, None) => bail!("ingest needs --text or --file"),
            };
            to_json(&document_service(&conn).ingest_text(args.title, text, args.force)?)?
        }
        Commands::Evolve(args) => {
            let engine = evolution_service(&conn, config);
            match (args.chain, args.event_type) {
                (Some(chain), _) => {
                    let events: Vec<EventStep> =
                        serde_json::from_str(&chain).context("--chain must be a JSON array")?;
                    to_json(&engine.multi_evolve(args.parent, args.document, &events, args.mode)?)?
                }
                (None, Some(event_type)) => {
                    let payload: Value = serde_json::from_str(&args.payload)
                        .context("--payload must be JSON")?;
                    to_json(&engine.evolve_branch(
                        args.parent,
                        args.document,
                        &event_type,
                        &payload,
                        args.mode,
                    )?)?
                }
                (None, None) => bail!("evolve needs --event-type or --chain"),
            }
        }
        Commands::Replay(args) => to_json(
            &evolution_service(&conn, config).replay_branch(args.branch, !args.no_checkpoints)?,
        )?,
        Commands::Timeline(args) => {
            to_json(&evolution_service(&conn, config).get_timeline(args.branch)?)?
        }
        Commands::Merge(args) => to_json(&evolution_service(&conn, config).merge_branches(
            args.left,
            args.right,
            args.strategy,
            args.mode,
        )?)?,
        Commands::Remix(args) => {
            let request = ComposeRequest {
                source: RemixSide {
                    document_id: args.source_document,
                    branch_id: args.source_branch,
                },
                target: RemixSide {
                    document_id: args.target_document,
                    branch_id: args.target_branch,
                },
                strategy: args.strategy,
                seed: args.seed,
                atom_levels: args.levels,
                create_branch: args.create_branch,
                persist_artifact: args.persist,
                mode: args.mode,
            };
            to_json(&remix_service(&conn, config).compose(&request)?)?
        }
        Commands::Artifact(args) => {
            to_json(&remix_service(&conn, config).get_artifact(args.artifact)?)?
        }
        Commands::Graph(args) => {
            to_json(&evolution_service(&conn, config).get_visualization(args.branch)?)?
        }
        Commands::Checkpoint(args) => {
            to_json(&evolution_service(&conn, config).create_checkpoint(args.branch)?)?
        }
        Commands::Delete(args) => {
            evolution_service(&conn, config).delete_branch(args.branch)?;
            to_json(&serde_json::json!({ "deleted_branch_id": args.branch }))?
        }
    };

    println!("{output}");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to encode output")
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Ingest(_) => "ingest",
        Commands::Evolve(_) => "evolve",
        Commands::Replay(_) => "replay",
        Commands::Timeline(_) => "timeline",
        Commands::Merge(_) => "merge",
        Commands::Remix(_) => "remix",
        Commands::Artifact(_) => "artifact",
        Commands::Graph(_) => "graph",
        Commands::Checkpoint(_) => "checkpoint",
        Commands::Delete(_) => "delete",
    }
}

fn parse_mode(value: &str) -> Result<BranchMode, String> {
    BranchMode::parse(value).ok_or_else(|| format!("unknown mode `{value}`; expected public|raw"))
}

fn parse_merge_strategy(value: &str) -> Result<MergeStrategy, String> {
    MergeStrategy::parse(value).ok_or_else(|| {
        format!("unknown merge strategy `{value}`; expected left_wins|right_wins|interleave")
    })
}

fn parse_remix_strategy(value: &str) -> Result<RemixStrategy, String> {
    RemixStrategy::parse(value).ok_or_else(|| {
        format!(
            "unknown remix strategy `{value}`; expected interleave|thematic_blend|temporal_layer|glyph_collide"
        )
    })
}

fn parse_level(value: &str) -> Result<AtomLevel, String> {
    AtomLevel::parse(value).ok_or_else(|| format!("unknown atom level `{value}`"))
}
