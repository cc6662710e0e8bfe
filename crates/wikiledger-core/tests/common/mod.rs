use chrono::{DateTime, Duration, TimeZone, Utc};
use wikiledger_core::{MemoryStore, ProjectionStore, RawRow, RowBatch, Scope};

/// Fixed base instant so timestamps compare deterministically
#[allow(dead_code)]
pub fn t(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
}

#[allow(dead_code)]
pub fn perks_scope() -> Scope {
    Scope::new("wiki/Perks", "perks", "v1")
}

/// Perk table batch from (name, effect) pairs
#[allow(dead_code)]
pub fn perks_batch(rows: &[(&str, &str)]) -> RowBatch {
    RowBatch::new(
        perks_scope(),
        rows.iter()
            .map(|(name, effect)| RawRow::from_pairs([("Name", *name), ("Effect", *effect)]))
            .collect(),
    )
}

#[allow(dead_code)]
pub type Snapshot = Vec<(String, String, String, Vec<(u32, String, f64, Option<f64>, i64)>)>;

/// Projection content without surrogate ids
#[allow(dead_code)]
pub fn snapshot(store: &MemoryStore) -> Snapshot {
    let mut out = Vec::new();
    for def in store.entity_definitions().unwrap() {
        for param in store.parameter_definitions(def.id).unwrap() {
            let levels = store
                .parameter_levels(param.id)
                .unwrap()
                .into_iter()
                .map(|l| (l.level, l.raw_value, l.value, l.cost, l.source_revision_id))
                .collect();
            out.push((def.slug.clone(), def.name.clone(), param.key, levels));
        }
    }
    out
}
