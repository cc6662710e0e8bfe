//! Select command
//!
//! Usage: wikiledger select --source <S> --section <X> --format-version <V> --entity <E>
//!        [--as-of <RFC3339> | --manual] [--pin <ENTITY=REVISION>]...

use chrono::{DateTime, Utc};
use clap::Args;
use std::path::Path;
use wikiledger_core::{RevisionId, SelectionMode, SelectionPolicy};
use wikiledger_engine::{apply_engine_query, EngineQuery, EngineQueryResult};

use super::{parse_key_val, ScopeArgs};

#[derive(Debug, Args)]
pub struct SelectArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Entity id
    #[arg(long)]
    pub entity: String,

    /// Newest revision that existed at this instant (RFC 3339)
    #[arg(long, conflicts_with = "manual")]
    pub as_of: Option<String>,

    /// Newest manual revision
    #[arg(long)]
    pub manual: bool,

    /// Pin an entity to a revision id
    #[arg(long = "pin", value_parser = parse_key_val)]
    pub pins: Vec<(String, String)>,
}

fn policy(args: &SelectArgs) -> Result<SelectionPolicy, Box<dyn std::error::Error>> {
    let mode = match (&args.as_of, args.manual) {
        (Some(at), _) => SelectionMode::AsOf(DateTime::parse_from_rfc3339(at)?.with_timezone(&Utc)),
        (None, true) => SelectionMode::Manual,
        (None, false) => SelectionMode::Latest,
    };
    let mut policy = SelectionPolicy::new(mode);
    for (entity, revision) in &args.pins {
        let id: RevisionId = revision
            .parse()
            .map_err(|_| format!("invalid revision id in pin '{}={}'", entity, revision))?;
        policy = policy.with_pin(entity.clone(), id);
    }
    Ok(policy)
}

pub fn execute(args: SelectArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let query = EngineQuery::Select {
        scope: args.scope.to_scope(),
        entity_id: args.entity.clone(),
        policy: policy(&args)?,
    };
    let conn = wikiledger_store::db::open_ledger(db)?;

    match apply_engine_query(query, &conn)? {
        EngineQueryResult::Select(Some(revision)) => {
            println!("{}", serde_json::to_string_pretty(&revision)?);
            Ok(())
        }
        EngineQueryResult::Select(None) => {
            Err(format!("no revision selected for {}", args.entity).into())
        }
        other => Err(format!("unexpected engine result: {:?}", other).into()),
    }
}
