//! Ledger schema migrations, compiled into the binary

/// One forward-only schema step
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Ledger migrations in application order: revisions, run ledger, projection.
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_revisions",
            sql: include_str!("../../migrations/001_revisions.sql"),
        },
        Migration {
            id: "002_ingest_runs",
            sql: include_str!("../../migrations/002_ingest_runs.sql"),
        },
        Migration {
            id: "003_projection",
            sql: include_str!("../../migrations/003_projection.sql"),
        },
    ]
}
