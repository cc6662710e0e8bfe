//! Override command
//!
//! Usage: wikiledger override --source <S> --section <X> --format-version <V>
//!        --name <NAME> --field <KEY=VALUE>...

use clap::Args;
use std::collections::BTreeMap;
use std::path::Path;
use wikiledger_engine::{apply_engine_command, EngineCommand, EngineCommandResult};

use super::{parse_key_val, ScopeArgs};

#[derive(Debug, Args)]
pub struct OverrideArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Entity name as it appears in the table
    #[arg(long)]
    pub name: String,

    /// Field value, repeatable
    #[arg(long = "field", value_parser = parse_key_val, required = true)]
    pub fields: Vec<(String, String)>,
}

pub fn execute(args: OverrideArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = wikiledger_store::db::open_ledger(db)?;
    let cmd = EngineCommand::RecordManual {
        scope: args.scope.to_scope(),
        name: args.name,
        fields: args.fields.into_iter().collect::<BTreeMap<_, _>>(),
    };

    match apply_engine_command(cmd, &mut conn)? {
        EngineCommandResult::RecordManual(revision) => {
            println!("Manual revision recorded:");
            println!("  revision_id: {}", revision.id);
            println!("  entity_id: {}", revision.entity_id);
            println!("  content_hash: {}", revision.content_hash);
            Ok(())
        }
        other => Err(format!("unexpected engine result: {:?}", other).into()),
    }
}
