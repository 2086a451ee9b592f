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

//! Entities: typed, immutably-identified records with an opaque payload,
//! plus the process-start type registry that makes round-trip
//! (de)serialization possible without a source-language type system (see
//! `SPEC_FULL.md` §9).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Payload field values form a forest of depth at most [`MAX_PAYLOAD_DEPTH`];
/// a bare scalar sits at depth 1, a map-of-maps at depth 3 is the deepest
/// legal shape.
pub const MAX_PAYLOAD_DEPTH: usize = 3;

/// An entity's identity. Free-form, caller-assigned, immutable for the
/// lifetime of the live entity (I1 in `SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An entity's payload: a mapping from field name to scalar or nested
/// mapping, depth-capped (`SPEC_FULL.md` §3, §9).
pub type Payload = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity type {0:?} is not registered")]
    UnknownType(String),
    #[error("payload nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },
    #[error("entity type name must be a non-empty string")]
    InvalidTypeName,
}

impl EntityError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Returns the nesting depth of a JSON value, where a scalar is depth 1 and
/// every level of object or array nesting adds one. Arrays of scalars do
/// not add depth beyond their own level, matching "arrays preserve order"
/// in `SPEC_FULL.md` §4.3 — they are a single level, not per-element.
pub fn value_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => {
            1 + map.values().map(value_depth).max().unwrap_or(0)
        }
        serde_json::Value::Array(items) => {
            1 + items.iter().map(value_depth).max().unwrap_or(0)
        }
        _ => 1,
    }
}

/// Validates that every field in `payload` nests no deeper than
/// [`MAX_PAYLOAD_DEPTH`] (the payload map itself is depth 0 at this point;
/// each field value is checked independently since fields are siblings,
/// not further nesting).
pub fn validate_payload_depth(payload: &Payload) -> Result<(), EntityError> {
    for value in payload.values() {
        if value_depth(value) > MAX_PAYLOAD_DEPTH {
            return Err(EntityError::DepthExceeded {
                max: MAX_PAYLOAD_DEPTH,
            });
        }
    }
    Ok(())
}

/// A record with an immutable id, an optional parent, a registered type
/// name, and a depth-capped payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub parent_id: Option<EntityId>,
    pub type_name: String,
    pub payload: Payload,
}

impl Entity {
    pub fn new(
        id: impl Into<EntityId>,
        parent_id: Option<EntityId>,
        type_name: impl Into<String>,
        payload: Payload,
    ) -> Result<Self, EntityError> {
        validate_payload_depth(&payload)?;
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(EntityError::InvalidTypeName);
        }
        Ok(Self {
            id: id.into(),
            parent_id,
            type_name,
            payload,
        })
    }

    /// The full serialized form used as CREATE's `forward` and DELETE's
    /// `reverse` (`SPEC_FULL.md` §3).
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.0,
            "parentId": self.parent_id.as_ref().map(|p| p.0.clone()).unwrap_or_default(),
            "type": self.type_name,
            "payload": self.payload,
        })
    }

    pub fn from_dict(
        registry: &EntityRegistry,
        dict: &serde_json::Value,
    ) -> Result<Self, EntityError> {
        let obj = dict.as_object().ok_or(EntityError::InvalidTypeName)?;
        let id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(EntityError::InvalidTypeName)?;
        let parent_id = obj
            .get("parentId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(EntityId::new);
        let type_name = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(EntityError::InvalidTypeName)?;
        if !registry.is_registered(type_name) {
            return Err(EntityError::UnknownType(type_name.to_owned()));
        }
        let payload = obj
            .get("payload")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        Self::new(id, parent_id, type_name, payload)
    }

    /// Flattened full record used as CREATE's `forward` and DELETE's
    /// `reverse` in [`crate::change::Change`]: payload fields plus the
    /// reserved `parentId`/`type` keys in one map, with `id` excluded
    /// (entity id is tracked separately by the `Change`/`Delta` key, not
    /// part of the field maps `SPEC_FULL.md` §3 describes).
    pub fn to_full_fields(&self) -> Payload {
        let mut fields = self.payload.clone();
        fields.insert(
            RESERVED_PARENT_ID.to_owned(),
            serde_json::Value::String(
                self.parent_id.as_ref().map(|p| p.0.clone()).unwrap_or_default(),
            ),
        );
        fields.insert(
            RESERVED_TYPE.to_owned(),
            serde_json::Value::String(self.type_name.clone()),
        );
        fields
    }

    /// Inverse of [`Entity::to_full_fields`].
    pub fn from_full_fields(
        registry: &EntityRegistry,
        id: EntityId,
        fields: &Payload,
    ) -> Result<Self, EntityError> {
        let type_name = fields
            .get(RESERVED_TYPE)
            .and_then(|v| v.as_str())
            .ok_or(EntityError::InvalidTypeName)?;
        if !registry.is_registered(type_name) {
            return Err(EntityError::UnknownType(type_name.to_owned()));
        }
        let parent_id = fields
            .get(RESERVED_PARENT_ID)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(EntityId::new);
        let mut payload = fields.clone();
        payload.remove(RESERVED_PARENT_ID);
        payload.remove(RESERVED_TYPE);
        Self::new(id, parent_id, type_name, payload)
    }
}

/// Reserved field name carrying an entity's parent id inside a flattened
/// [`Entity::to_full_fields`] record.
pub const RESERVED_PARENT_ID: &str = "parentId";
/// Reserved field name carrying an entity's type name inside a flattened
/// [`Entity::to_full_fields`] record.
pub const RESERVED_TYPE: &str = "type";

/// Per-type hook invoked when rehydrating an entity from a dict, mirroring
/// the "tagged-variant dispatch or name → factory mapping" design note in
/// `SPEC_FULL.md` §9. The default implementation performs no extra
/// validation beyond what [`Entity::from_dict`] already does; register a
/// richer factory to enforce required fields per type.
pub trait EntityFactory: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Extra, type-specific payload validation. Called after the generic
    /// depth check in [`Entity::from_dict`].
    fn validate(&self, _payload: &Payload) -> Result<(), EntityError> {
        Ok(())
    }
}

/// A trivial factory that registers a type name with no extra validation.
pub struct PlainEntityFactory(pub &'static str);

impl EntityFactory for PlainEntityFactory {
    fn type_name(&self) -> &'static str {
        self.0
    }
}

/// The process-start `name → factory` map. Construction-time only: there is
/// no dynamic registration after a [`crate::repo::Repository`] has been
/// opened, matching the specification's "registered at process start"
/// framing (`SPEC_FULL.md` §3).
#[derive(Default, Clone)]
pub struct EntityRegistry {
    factories: HashMap<&'static str, Arc<dyn EntityFactory>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn EntityFactory>) {
        self.factories.insert(factory.type_name(), factory);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn factory(&self, type_name: &str) -> Option<&Arc<dyn EntityFactory>> {
        self.factories.get(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityRegistry {
        let mut r = EntityRegistry::new();
        r.register(Arc::new(PlainEntityFactory("Page")));
        r
    }

    #[test]
    fn round_trip_through_dict_is_stable() {
        let registry = registry();
        let mut payload = Payload::new();
        payload.insert("name".into(), serde_json::json!("Test Page"));
        let e = Entity::new("p", None, "Page", payload).unwrap();

        let dict1 = e.to_dict();
        let reloaded1 = Entity::from_dict(&registry, &dict1).unwrap();
        let dict2 = reloaded1.to_dict();
        let reloaded2 = Entity::from_dict(&registry, &dict2).unwrap();

        assert_eq!(reloaded1, reloaded2);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let registry = registry();
        let dict = serde_json::json!({"id": "x", "parentId": "", "type": "Ghost", "payload": {}});
        let err = Entity::from_dict(&registry, &dict).unwrap_err();
        assert!(matches!(err, EntityError::UnknownType(_)));
    }

    #[test]
    fn full_fields_round_trip() {
        let registry = registry();
        let mut payload = Payload::new();
        payload.insert("name".into(), serde_json::json!("Test Page"));
        let e = Entity::new("p", Some(EntityId::new("root")), "Page", payload).unwrap();
        let fields = e.to_full_fields();
        let reloaded = Entity::from_full_fields(&registry, e.id.clone(), &fields).unwrap();
        assert_eq!(e, reloaded);
    }

    #[test]
    fn depth_exceeded_is_rejected() {
        let mut payload = Payload::new();
        payload.insert(
            "nested".into(),
            serde_json::json!({"a": {"b": {"c": {"d": "too deep"}}}}),
        );
        let err = Entity::new("x", None, "Page", payload).unwrap_err();
        assert!(matches!(err, EntityError::DepthExceeded { .. }));
    }
}
