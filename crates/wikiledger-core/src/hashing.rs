//! Content hashing of normalized field maps
//!
//! The digest is SHA-256 over the compact JSON of the map with keys in
//! lexicographic order, hex-encoded. It depends only on the entries.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Length of a hex-encoded content hash
pub const CONTENT_HASH_LEN: usize = 64;

/// Fingerprint a field map independently of its insertion order.
pub fn content_hash<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let canonical: BTreeMap<&str, &str> = fields
        .into_iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let json = canonical_json(&canonical);
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_json(map: &BTreeMap<&str, &str>) -> String {
    // BTreeMap<&str, &str> serialization cannot fail
    serde_json::to_string(map).unwrap_or_default()
}
