//! Hashing - SHA-256 fingerprints for render plans and jobs
//!
//! Same card, same template, same engine: same job hash. Re-rendering can be
//! skipped when the stored job hash matches.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::card::CardLayout;

pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

/// JSON with object keys sorted at every depth, no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&sorted(value))
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Hash of a finished plan. Callers blank out volatile fields (ids,
/// timestamps, the hash itself) before hashing.
pub fn compute_plan_hash<T: Serialize>(plan: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(plan)?.as_bytes()))
}

/// job_hash = sha256(template_id:template_version:canonical_card:engine_version)
pub fn compute_job_hash(
    card: &CardLayout,
    template_id: &str,
    template_version: &str,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let combined = format!(
        "{}:{}:{}:{}",
        template_id,
        template_version,
        canonical_json(card)?,
        engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted_nested() {
        let obj = json!({"z": 1, "a": {"y": [{"k": 1, "b": 2}], "c": null}});
        assert_eq!(canonical_json(&obj).unwrap(), r#"{"a":{"c":null,"y":[{"b":2,"k":1}]},"z":1}"#);
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_job_hash_tracks_inputs() {
        let card = CardLayout::new("Grizzly Bears").with_cost("{1}{G}");
        let h1 = compute_job_hash(&card, "classic", "1.0.0", "1.0.0").unwrap();
        assert_eq!(h1, compute_job_hash(&card, "classic", "1.0.0", "1.0.0").unwrap());
        assert_ne!(h1, compute_job_hash(&card, "classic", "1.0.1", "1.0.0").unwrap());

        let other = card.clone().with_oracle("Trample");
        assert_ne!(h1, compute_job_hash(&other, "classic", "1.0.0", "1.0.0").unwrap());
    }
}
