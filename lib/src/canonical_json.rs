// Copyright 2026 The Branchstore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Canonical JSON encoding and SHA-256 hashing (`SPEC_FULL.md` §4.3).
//!
//! Canonical form sorts object keys recursively at every level up to depth
//! 3; deeper nesting is a hard error rather than a silent truncation
//! (`SPEC_FULL.md` §9's "recursive-descent comparators with depth cap" note).
//! Arrays keep their original element order.

use sha2::Digest as _;
use sha2::Sha256;
use thiserror::Error;

use crate::entity::MAX_PAYLOAD_DEPTH;
use crate::error::ErrorCategory;

#[derive(Debug, Error)]
pub enum CanonicalJsonError {
    #[error("value nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },
}

impl CanonicalJsonError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Serializes `value` as canonical JSON: object keys sorted recursively,
/// depth capped at [`MAX_PAYLOAD_DEPTH`] below `value` itself (so `value`
/// can be an entity's `{id, parentId, type, payload}` wrapper one level
/// above the payload's own depth cap).
pub fn to_canonical_json(value: &serde_json::Value) -> Result<String, CanonicalJsonError> {
    let mut out = String::new();
    write_canonical(value, 0, MAX_PAYLOAD_DEPTH + 1, &mut out)?;
    Ok(out)
}

fn write_canonical(
    value: &serde_json::Value,
    depth: usize,
    max_depth: usize,
    out: &mut String,
) -> Result<(), CanonicalJsonError> {
    match value {
        serde_json::Value::Object(map) => {
            if depth >= max_depth {
                return Err(CanonicalJsonError::DepthExceeded { max: max_depth });
            }
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap());
                out.push(':');
                write_canonical(&map[*key], depth + 1, max_depth, out)?;
            }
            out.push('}');
            Ok(())
        }
        serde_json::Value::Array(items) => {
            if depth >= max_depth {
                return Err(CanonicalJsonError::DepthExceeded { max: max_depth });
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, depth + 1, max_depth, out)?;
            }
            out.push(']');
            Ok(())
        }
        _ => {
            out.push_str(&value.to_string());
            Ok(())
        }
    }
}

/// SHA-256 of `value`'s canonical JSON form, as a lowercase hex string.
pub fn hash_value(value: &serde_json::Value) -> Result<String, CanonicalJsonError> {
    let canonical = to_canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

/// SHA-256 of `entity_data_hash || concat(child hashes)`, used for every
/// hash-tree node's composite hash (`SPEC_FULL.md` §4.3).
pub fn hash_composite<'a>(entity_data_hash: &str, child_hashes: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity_data_hash.as_bytes());
    for child in child_hashes {
        hasher.update(child.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted_regardless_of_insertion_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(to_canonical_json(&a).unwrap(), to_canonical_json(&b).unwrap());
        assert_eq!(to_canonical_json(&a).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn arrays_preserve_order() {
        let v = serde_json::json!({"a": [3, 1, 2]});
        assert_eq!(to_canonical_json(&v).unwrap(), r#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn hash_changes_with_any_field_change() {
        let a = serde_json::json!({"name": "x"});
        let b = serde_json::json!({"name": "y"});
        assert_ne!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn depth_beyond_cap_is_an_error() {
        // wrapper(0) -> payload(1) -> a(2) -> b(3) -> c(4): exceeds cap of 4 levels below wrapper
        let v = serde_json::json!({"payload": {"a": {"b": {"c": {"d": 1}}}}});
        assert!(to_canonical_json(&v).is_err());
    }
}
