//! History command
//!
//! Usage: wikiledger history --source <S> --section <X> --format-version <V> --entity <E>

use clap::Args;
use std::path::Path;
use wikiledger_engine::{apply_engine_query, EngineQuery, EngineQueryResult};

use super::ScopeArgs;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[arg(long)]
    pub entity: String,
}

pub fn execute(args: HistoryArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let conn = wikiledger_store::db::open_ledger(db)?;
    let query = EngineQuery::History {
        scope: args.scope.to_scope(),
        entity_id: args.entity,
    };

    match apply_engine_query(query, &conn)? {
        EngineQueryResult::History(revisions) => {
            println!("{}", serde_json::to_string_pretty(&revisions)?);
            Ok(())
        }
        other => Err(format!("unexpected engine result: {:?}", other).into()),
    }
}
