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

//! Pluggable index configurations (`SPEC_FULL.md` §4.2). An [`IndexConfig`]
//! names an ordered list of fields to key by; [`IndexField::Type`] is the
//! synthetic `__type__` field with an allow-list, everything else is a
//! regular entity property (including the reserved `id`/`parentId`/`type`
//! names, addressed the same way a payload field is).

use indexmap::IndexMap;

use crate::entity::Entity;
use crate::entity::RESERVED_PARENT_ID;
use crate::entity::RESERVED_TYPE;

/// One field contributing to an index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexField {
    /// A regular entity property: `"id"`, `"parentId"`, `"type"`, or a
    /// payload field name.
    Property(String),
    /// The synthetic `__type__` field: matches iff the entity's type name
    /// is in `allowed_types` (strict equality, not subclassing).
    Type { allowed_types: Vec<String> },
}

impl IndexField {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn type_in(allowed_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Type {
            allowed_types: allowed_types.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub name: String,
    pub fields: Vec<IndexField>,
    pub unique: bool,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, fields: Vec<IndexField>, unique: bool) -> Self {
        Self {
            name: name.into(),
            fields,
            unique,
        }
    }

    /// Returns the property name a filter must supply to match this
    /// config's `field`, if `field` is a regular property, or `None` for a
    /// `Type` field (which is matched against the filter's `type` key, see
    /// [`IndexConfig::filter_key_for`]).
    fn filter_key_for(field: &IndexField) -> Option<&str> {
        match field {
            IndexField::Property(name) => Some(name.as_str()),
            IndexField::Type { .. } => Some("type"),
        }
    }

    /// Returns this config's index key for `entity`, or `None` if any
    /// field is absent (e.g. a payload field the entity doesn't define, or
    /// a `__type__` field whose allow-list the entity's type isn't in).
    pub fn key_for_entity(&self, entity: &Entity) -> Option<String> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            parts.push(self.component_for_entity(field, entity)?);
        }
        Some(parts.join("|"))
    }

    fn component_for_entity(&self, field: &IndexField, entity: &Entity) -> Option<String> {
        match field {
            IndexField::Property(name) => property_value(entity, name),
            IndexField::Type { allowed_types } => allowed_types
                .iter()
                .find(|t| t.as_str() == entity.type_name)
                .cloned(),
        }
    }

    /// Whether any of this config's fields would be affected by an update
    /// that touched the payload field names in `changed`.
    pub fn touches(&self, changed: &std::collections::HashSet<&str>) -> bool {
        self.fields.iter().any(|field| match field {
            IndexField::Property(name) => changed.contains(name.as_str()),
            IndexField::Type { .. } => changed.contains(RESERVED_TYPE),
        })
    }

    /// Returns the index key implied by a query filter, or `None` if the
    /// filter does not supply every field this config needs (the planner
    /// then skips this config).
    pub fn key_for_filter(&self, filter: &IndexMap<String, serde_json::Value>) -> Option<String> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let key = Self::filter_key_for(field)?;
            let value = filter.get(key)?;
            match field {
                IndexField::Type { allowed_types } => {
                    let type_name = value.as_str()?;
                    if !allowed_types.iter().any(|t| t == type_name) {
                        return None;
                    }
                    parts.push(type_name.to_owned());
                }
                IndexField::Property(_) => parts.push(scalar_key_component(value)),
            }
        }
        Some(parts.join("|"))
    }
}

fn property_value(entity: &Entity, name: &str) -> Option<String> {
    let value = match name {
        "id" => serde_json::Value::String(entity.id.0.clone()),
        RESERVED_PARENT_ID => {
            serde_json::Value::String(entity.parent_id.as_ref()?.0.clone())
        }
        RESERVED_TYPE => serde_json::Value::String(entity.type_name.clone()),
        _ => entity.payload.get(name)?.clone(),
    };
    Some(scalar_key_component(&value))
}

fn scalar_key_component(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single configured index: a key → bucket-of-ids map built from
/// [`IndexConfig::key_for_entity`].
#[derive(Debug, Default)]
pub struct Index {
    pub buckets: IndexMap<String, Vec<crate::entity::EntityId>>,
}

impl Index {
    pub fn selectivity(&self, key: &str) -> usize {
        self.buckets.get(key).map_or(0, |b| b.len())
    }

    pub fn insert(&mut self, key: String, id: crate::entity::EntityId) {
        self.buckets.entry(key).or_default().push(id);
    }

    pub fn remove(&mut self, key: &str, id: &crate::entity::EntityId) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.buckets.shift_remove(key);
            }
        }
    }
}
