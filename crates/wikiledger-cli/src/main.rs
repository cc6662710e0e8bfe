//! wikiledger CLI
//!
//! Command-line interface for the wiki revision ledger

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wikiledger_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "wikiledger")]
#[command(about = "wikiledger - Revision ledger for scraped wiki tables", long_about = None)]
struct Cli {
    /// Ledger database path
    #[arg(long, global = true, default_value = ".wikiledger/store.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Diff a scraped row batch against the ledger
    Ingest(commands::ingest::IngestArgs),
    /// Rebuild the structured projection of a format version
    Rebuild(commands::rebuild::RebuildArgs),
    /// Show the revision selected for one entity
    Select(commands::select::SelectArgs),
    /// Show every revision of one entity
    History(commands::history::HistoryArgs),
    /// Record a manual revision
    Override(commands::manual_override::OverrideArgs),
}

fn main() {
    let cli = Cli::parse();
    logging_facility::init(Profile::from_env());

    let result = match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, &cli.db),
        Commands::Rebuild(args) => commands::rebuild::execute(args, &cli.db),
        Commands::Select(args) => commands::select::execute(args, &cli.db),
        Commands::History(args) => commands::history::execute(args, &cli.db),
        Commands::Override(args) => commands::manual_override::execute(args, &cli.db),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
