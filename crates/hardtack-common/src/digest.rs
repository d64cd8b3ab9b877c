//! Content digests over canonical JSON

use hardtack_core::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of raw bytes
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Rebuild a JSON value with every object's keys in sorted order
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().cloned().collect::<Vec<_>>();
            keys.sort();
            let mut ordered = Map::new();
            for key in keys {
                if let Some(v) = map.get(&key) {
                    ordered.insert(key, canonicalize(v));
                }
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        _ => value.clone(),
    }
}

/// Serialize any value to compact canonical JSON (sorted keys, no whitespace)
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&canonicalize(&value))
        .map_err(|e| Error::Internal(format!("canonical serialization failed: {}", e)))
}

/// Hex SHA-256 of the canonical JSON form of a value
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String> {
    Ok(sha256_hex(canonical_string(value)?.as_bytes()))
}
