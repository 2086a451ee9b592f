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

//! The indexed entity store (`SPEC_FULL.md` §4.2): insert/update/remove,
//! `find`/`find_one` with a selectivity-based query planner, and
//! `apply_delta` to materialize a [`crate::delta::Delta`] against live
//! state.

pub mod index;

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

pub use index::Index;
pub use index::IndexConfig;
pub use index::IndexField;

use crate::change::Change;
use crate::change::ChangeError;
use crate::change::ChangeKind;
use crate::change::diff_payloads;
use crate::delta::Delta;
use crate::entity::Entity;
use crate::entity::EntityError;
use crate::entity::EntityId;
use crate::entity::EntityRegistry;
use crate::entity::Payload;
use crate::entity::validate_payload_depth;
use crate::error::ErrorCategory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("at least one unique index over \"id\" must be configured")]
    NoIdIndex,
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),
    #[error("entity {0} not found")]
    NotFound(EntityId),
    #[error("parent entity {0} does not exist")]
    UnknownParent(EntityId),
    #[error("unique constraint violated on index {0:?}")]
    UniqueConstraintViolation(String),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Change(#[from] ChangeError),
}

impl StoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoIdIndex
            | Self::DuplicateId(_)
            | Self::NotFound(_)
            | Self::UnknownParent(_)
            | Self::UniqueConstraintViolation(_) => ErrorCategory::Validation,
            Self::Entity(e) => e.category(),
            Self::Change(e) => e.category(),
        }
    }
}

/// An equality filter over entity properties: field name → expected value.
/// Use `"type"` to filter by the synthetic `__type__` field.
pub type Filter = IndexMap<String, serde_json::Value>;

/// The in-memory indexed entity store.
pub struct EntityStore {
    registry: EntityRegistry,
    entities: IndexMap<EntityId, Entity>,
    indexes: Vec<(IndexConfig, Index)>,
}

impl EntityStore {
    pub fn new(registry: EntityRegistry, index_configs: Vec<IndexConfig>) -> Result<Self, StoreError> {
        let has_id_index = index_configs.iter().any(|c| {
            c.unique && c.fields == [IndexField::Property("id".to_owned())]
        });
        if !has_id_index {
            return Err(StoreError::NoIdIndex);
        }
        let indexes = index_configs
            .into_iter()
            .map(|c| (c, Index::default()))
            .collect();
        Ok(Self {
            registry,
            entities: IndexMap::new(),
            indexes,
        })
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.entities.get(id).cloned()
    }

    pub fn insert_one(&mut self, entity: Entity) -> Result<Change, StoreError> {
        if self.entities.contains_key(&entity.id) {
            return Err(StoreError::DuplicateId(entity.id.clone()));
        }
        if let Some(parent) = &entity.parent_id {
            if !self.entities.contains_key(parent) {
                return Err(StoreError::UnknownParent(parent.clone()));
            }
        }
        for (config, index) in &self.indexes {
            if let Some(key) = config.key_for_entity(&entity) {
                if config.unique && index.buckets.contains_key(&key) {
                    return Err(StoreError::UniqueConstraintViolation(config.name.clone()));
                }
            }
        }
        for (config, index) in &mut self.indexes {
            if let Some(key) = config.key_for_entity(&entity) {
                index.insert(key, entity.id.clone());
            }
        }
        let change = Change::create(entity.id.clone(), entity.to_full_fields());
        self.entities.insert(entity.id.clone(), entity);
        Ok(change)
    }

    pub fn update_one(&mut self, id: &EntityId, patch: Payload) -> Result<Change, StoreError> {
        let old_entity = self
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut new_payload = old_entity.payload.clone();
        for (k, v) in patch {
            new_payload.insert(k, v);
        }
        validate_payload_depth(&new_payload)?;
        let change = diff_payloads(id.clone(), &old_entity.payload, &new_payload)?;
        if change.kind() == ChangeKind::Empty {
            return Ok(change);
        }
        let changed_fields: HashSet<&str> =
            change.forward.keys().map(|s| s.as_str()).collect();
        let mut new_entity = old_entity.clone();
        new_entity.payload = new_payload;

        for (config, index) in &mut self.indexes {
            if !config.touches(&changed_fields) {
                continue;
            }
            if let Some(old_key) = config.key_for_entity(&old_entity) {
                index.remove(&old_key, id);
            }
            if let Some(new_key) = config.key_for_entity(&new_entity) {
                if config.unique && index.buckets.contains_key(&new_key) {
                    return Err(StoreError::UniqueConstraintViolation(config.name.clone()));
                }
                index.insert(new_key, id.clone());
            }
        }
        self.entities.insert(id.clone(), new_entity);
        Ok(change)
    }

    pub fn remove_one(&mut self, id: &EntityId) -> Result<Change, StoreError> {
        let entity = self
            .entities
            .shift_remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        for (config, index) in &mut self.indexes {
            if let Some(key) = config.key_for_entity(&entity) {
                index.remove(&key, id);
            }
        }
        Ok(Change::delete(id.clone(), entity.to_full_fields()))
    }

    /// Materializes a delta's Changes against current store state, in
    /// order (`SPEC_FULL.md` §4.2).
    pub fn apply_delta(&mut self, delta: &Delta) -> Result<(), StoreError> {
        for change in delta.iter() {
            match change.kind() {
                ChangeKind::Create => {
                    let entity = Entity::from_full_fields(
                        &self.registry,
                        change.entity_id.clone(),
                        &change.forward,
                    )?;
                    self.insert_one(entity)?;
                }
                ChangeKind::Update => {
                    self.update_one(&change.entity_id, change.forward.clone())?;
                }
                ChangeKind::Delete => {
                    self.remove_one(&change.entity_id)?;
                }
                ChangeKind::Empty => {}
            }
        }
        Ok(())
    }

    /// Selects the lowest-selectivity index whose fields are all covered
    /// by `filter`, falling back to a full scan over `id` when no config
    /// matches (`SPEC_FULL.md` §4.2).
    fn plan(&self, filter: &Filter) -> Vec<EntityId> {
        let mut best: Option<(usize, &IndexConfig, &Index, String)> = None;
        for (config, index) in &self.indexes {
            let Some(key) = config.key_for_filter(filter) else {
                continue;
            };
            let selectivity = index.selectivity(&key);
            if best.as_ref().is_none_or(|(s, ..)| selectivity < *s) {
                best = Some((selectivity, config, index, key));
            }
        }
        match best {
            Some((_, _, index, key)) => index.buckets.get(&key).cloned().unwrap_or_default(),
            None => self.entities.keys().cloned().collect(),
        }
    }

    fn matches_remaining_filter(&self, entity: &Entity, filter: &Filter) -> bool {
        filter.iter().all(|(key, expected)| {
            let actual = match key.as_str() {
                "id" => serde_json::Value::String(entity.id.0.clone()),
                "parentId" => entity
                    .parent_id
                    .as_ref()
                    .map(|p| serde_json::Value::String(p.0.clone()))
                    .unwrap_or(serde_json::Value::Null),
                "type" => serde_json::Value::String(entity.type_name.clone()),
                other => entity
                    .payload
                    .get(other)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            };
            actual == *expected
        })
    }

    pub fn find(&self, filter: &Filter) -> Vec<Entity> {
        self.plan(filter)
            .into_iter()
            .filter_map(|id| self.entities.get(&id))
            .filter(|entity| self.matches_remaining_filter(entity, filter))
            .cloned()
            .collect()
    }

    pub fn find_one(&self, filter: &Filter) -> Option<Entity> {
        self.plan(filter)
            .into_iter()
            .filter_map(|id| self.entities.get(&id))
            .find(|entity| self.matches_remaining_filter(entity, filter))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PlainEntityFactory;
    use std::sync::Arc;

    fn registry() -> EntityRegistry {
        let mut r = EntityRegistry::new();
        r.register(Arc::new(PlainEntityFactory("Page")));
        r.register(Arc::new(PlainEntityFactory("Note")));
        r
    }

    fn configs() -> Vec<IndexConfig> {
        vec![
            IndexConfig::new("id", vec![IndexField::property("id")], true),
            IndexConfig::new(
                "type",
                vec![IndexField::type_in(["Page", "Note"])],
                false,
            ),
        ]
    }

    fn page(id: &str) -> Entity {
        let mut payload = Payload::new();
        payload.insert("name".into(), serde_json::json!("Test Page"));
        Entity::new(id, None, "Page", payload).unwrap()
    }

    #[test]
    fn insert_find_update_remove_round_trip() {
        let mut store = EntityStore::new(registry(), configs()).unwrap();
        store.insert_one(page("p")).unwrap();

        let mut filter = Filter::new();
        filter.insert("id".into(), serde_json::json!("p"));
        assert_eq!(store.find_one(&filter).unwrap().id, EntityId::new("p"));

        let mut patch = Payload::new();
        patch.insert("name".into(), serde_json::json!("X"));
        let change = store.update_one(&EntityId::new("p"), patch).unwrap();
        assert_eq!(change.kind(), ChangeKind::Update);

        store.remove_one(&EntityId::new("p")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = EntityStore::new(registry(), configs()).unwrap();
        store.insert_one(page("p")).unwrap();
        assert!(matches!(
            store.insert_one(page("p")),
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[test]
    fn query_planner_is_equivalent_to_full_scan() {
        let mut store = EntityStore::new(registry(), configs()).unwrap();
        store.insert_one(page("p1")).unwrap();
        store.insert_one(page("p2")).unwrap();
        let mut note_payload = Payload::new();
        note_payload.insert("body".into(), serde_json::json!("hi"));
        store
            .insert_one(Entity::new("n1", None, "Note", note_payload).unwrap())
            .unwrap();

        let mut by_type = Filter::new();
        by_type.insert("type".into(), serde_json::json!("Page"));
        let via_index: HashSet<EntityId> =
            store.find(&by_type).into_iter().map(|e| e.id).collect();

        let full_scan: HashSet<EntityId> = store
            .find(&Filter::new())
            .into_iter()
            .filter(|e| e.type_name == "Page")
            .map(|e| e.id)
            .collect();

        assert_eq!(via_index, full_scan);
        assert_eq!(via_index.len(), 2);
    }

    #[test]
    fn index_consistency_after_mutation() {
        let mut store = EntityStore::new(registry(), configs()).unwrap();
        store.insert_one(page("p1")).unwrap();
        store.insert_one(page("p2")).unwrap();
        store.remove_one(&EntityId::new("p1")).unwrap();

        let (_, type_index) = store
            .indexes
            .iter()
            .find(|(c, _)| c.name == "type")
            .unwrap();
        let bucket = type_index.buckets.get("Page").unwrap();
        assert_eq!(bucket, &vec![EntityId::new("p2")]);
    }
}
