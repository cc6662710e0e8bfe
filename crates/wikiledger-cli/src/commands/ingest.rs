//! Ingest command
//!
//! Usage: wikiledger ingest <BATCH> (--dry-run | --write)

use clap::Args;
use std::path::{Path, PathBuf};
use wikiledger_core::RunMode;
use wikiledger_engine::commands::ingest::read_batch_file;
use wikiledger_engine::{apply_engine_command, EngineCommand, EngineCommandResult};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Scraper batch file (JSON)
    pub batch: PathBuf,

    /// Classify without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Apply the classification
    #[arg(long)]
    pub write: bool,
}

pub fn execute(args: IngestArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mode = RunMode::from_flags(args.dry_run, args.write)?;
    let batch = read_batch_file(&args.batch)?;
    let mut conn = wikiledger_store::db::open_ledger(db)?;

    let outcome = match apply_engine_command(EngineCommand::Ingest { batch, mode }, &mut conn)? {
        EngineCommandResult::Ingest(outcome) => outcome,
        other => return Err(format!("unexpected engine result: {:?}", other).into()),
    };

    let summary = outcome.summary;
    if mode.is_write() {
        println!("Ingest applied:");
    } else {
        println!("Dry run (nothing written):");
    }
    println!("  run_id: {}", outcome.run_id);
    println!("  added: {}", summary.added);
    println!("  changed: {}", summary.changed);
    println!("  unchanged: {}", summary.unchanged);
    println!("  deprecated: {}", summary.deprecated);
    println!("  skipped: {}", summary.skipped);
    Ok(())
}
