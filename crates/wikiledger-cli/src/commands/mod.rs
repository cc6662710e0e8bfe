//! Subcommand implementations; each parses its arguments and delegates to the engine.

pub mod history;
pub mod ingest;
pub mod manual_override;
pub mod rebuild;
pub mod select;

use clap::Args;
use wikiledger_core::Scope;

/// Scope flags shared by the entity-level subcommands
#[derive(Debug, Args)]
pub struct ScopeArgs {
    /// Source location of the table
    #[arg(long)]
    pub source: String,

    /// Section of the page
    #[arg(long)]
    pub section: String,

    /// Table format version
    #[arg(long)]
    pub format_version: String,
}

impl ScopeArgs {
    pub fn to_scope(&self) -> Scope {
        Scope::new(&self.source, &self.section, &self.format_version)
    }
}

/// Parse a `KEY=VALUE` argument
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.trim().is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}
