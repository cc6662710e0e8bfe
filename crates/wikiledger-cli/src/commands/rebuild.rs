//! Rebuild command
//!
//! Usage: wikiledger rebuild --format-version <V> --config <TOML> (--dry-run | --write)

use clap::Args;
use std::path::{Path, PathBuf};
use wikiledger_core::{ProjectionConfig, RunMode};
use wikiledger_engine::{apply_engine_command, EngineCommand, EngineCommandResult};

#[derive(Debug, Args)]
pub struct RebuildArgs {
    /// Format version to project
    #[arg(long)]
    pub format_version: String,

    /// Projection configuration (TOML)
    #[arg(long)]
    pub config: PathBuf,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub write: bool,
}

pub fn execute(args: RebuildArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mode = RunMode::from_flags(args.dry_run, args.write)?;
    let config = ProjectionConfig::from_file(&args.config)?;
    let mut conn = wikiledger_store::db::open_ledger(db)?;

    let cmd = EngineCommand::Rebuild {
        format_version: args.format_version,
        config,
        mode,
    };
    let report = match apply_engine_command(cmd, &mut conn)? {
        EngineCommandResult::Rebuild(report) => report,
        other => return Err(format!("unexpected engine result: {:?}", other).into()),
    };

    let s = report.summary;
    if mode.is_write() {
        println!("Rebuild applied:");
    } else {
        println!("Dry run (nothing written):");
    }
    println!("  created_definitions: {}", s.created_definitions);
    println!("  updated_definitions: {}", s.updated_definitions);
    println!("  created_levels: {}", s.created_levels);
    println!("  deleted_levels: {}", s.deleted_levels);
    println!("  skipped_levels: {}", s.skipped_levels);
    println!("  skipped_revisions: {}", s.skipped_revisions);

    if report.is_clean() {
        return Ok(());
    }
    println!("Failures:");
    for failure in &report.failures {
        println!(
            "  {} ({}): {}",
            failure.entity, failure.entity_type, failure.error
        );
    }
    Err(format!("{} entities failed to project", report.failures.len()).into())
}
