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

//! The hash tree: a rooted tree mirroring entity parent relationships,
//! incrementally rehashed to produce one root hash per snapshot
//! (`SPEC_FULL.md` §4.3).

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;

use crate::canonical_json::CanonicalJsonError;
use crate::canonical_json::hash_composite;
use crate::canonical_json::hash_value;
use crate::change::ChangeKind;
use crate::delta::Delta;
use crate::entity::Entity;
use crate::entity::EntityId;
use crate::error::ErrorCategory;
use crate::store::EntityStore;

#[derive(Debug, Error)]
pub enum HashTreeError {
    #[error(transparent)]
    CanonicalJson(#[from] CanonicalJsonError),
    #[error("orphan subtree rooted at {0}: parent was never inserted")]
    OrphanSubtree(EntityId),
    #[error("removal of non-leaf node {0} is not supported")]
    NonLeafRemoval(EntityId),
    #[error("node {0} not found in hash tree")]
    NotFound(EntityId),
}

impl HashTreeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CanonicalJson(e) => e.category(),
            Self::OrphanSubtree(_) | Self::NonLeafRemoval(_) => ErrorCategory::Integrity,
            Self::NotFound(_) => ErrorCategory::Validation,
        }
    }
}

/// Where a node sits relative to the tree root (`SPEC_FULL.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    SuperRoot,
    Root,
    NonRoot,
}

struct Node {
    kind: NodeKind,
    entity_data_hash: String,
    hash: String,
    children: IndexMap<EntityId, ()>,
    outdated: bool,
    children_sort_needed: bool,
    removed: bool,
}

impl Node {
    fn new(kind: NodeKind, entity_data_hash: String) -> Self {
        Self {
            kind,
            entity_data_hash,
            hash: String::new(),
            children: IndexMap::new(),
            outdated: true,
            children_sort_needed: false,
            removed: false,
        }
    }
}

const SUPER_ROOT_ID: &str = "";

/// A rooted tree of node hashes mirroring entity parent/child structure,
/// maintained incrementally as deltas are applied to the entity store.
pub struct HashTree {
    nodes: HashMap<EntityId, Node>,
    /// Children staged under a parent id that has not yet been inserted.
    orphans: HashMap<EntityId, Vec<EntityId>>,
    cleanup_needed: bool,
}

impl HashTree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            EntityId::new(SUPER_ROOT_ID),
            Node::new(NodeKind::SuperRoot, String::new()),
        );
        Self {
            nodes,
            orphans: HashMap::new(),
            cleanup_needed: false,
        }
    }

    /// Marks `id` outdated and walks up to the super-root marking every
    /// ancestor outdated too. The starting node is always marked and
    /// climbed past even if a caller already set its flag (both callers do,
    /// right before calling this) — only an *ancestor* found already
    /// outdated stops the climb, since recompute clears the whole chain in
    /// one bottom-up pass and a clean ancestor implies its own ancestors
    /// are clean.
    fn mark_outdated(&mut self, id: &EntityId) {
        let mut current = id.clone();
        let mut first = true;
        loop {
            let Some(node) = self.nodes.get_mut(&current) else {
                return;
            };
            let already_outdated = node.outdated;
            node.outdated = true;
            if already_outdated && !first {
                return;
            }
            first = false;
            let Some(parent) = self.parent_of(&current) else {
                return;
            };
            current = parent;
        }
    }

    fn parent_of(&self, id: &EntityId) -> Option<EntityId> {
        if id.as_str() == SUPER_ROOT_ID {
            return None;
        }
        self.nodes.iter().find_map(|(parent_id, node)| {
            node.children.contains_key(id).then(|| parent_id.clone())
        })
    }

    /// Inserts a new node under `parent_id` (or under the super-root if
    /// `parent_id` is `None`), staging it in the orphan side-map if the
    /// parent is not yet present (`SPEC_FULL.md` §4.3).
    pub fn insert_node(
        &mut self,
        id: EntityId,
        parent_id: Option<EntityId>,
        entity_data_hash: String,
    ) {
        let kind = if parent_id.is_some() {
            NodeKind::NonRoot
        } else {
            NodeKind::Root
        };
        self.nodes.insert(id.clone(), Node::new(kind, entity_data_hash));

        let attach_under = parent_id.clone().unwrap_or_else(|| EntityId::new(SUPER_ROOT_ID));
        match self.nodes.get_mut(&attach_under) {
            Some(parent_node) => {
                parent_node.children.insert(id.clone(), ());
                parent_node.children_sort_needed = true;
            }
            None => {
                self.orphans.entry(attach_under).or_default().push(id.clone());
            }
        }
        self.mark_outdated(&id);

        if let Some(staged) = self.orphans.remove(&id) {
            if let Some(node) = self.nodes.get_mut(&id) {
                for child in &staged {
                    node.children.insert(child.clone(), ());
                }
                node.children_sort_needed = true;
            }
            for child in staged {
                self.mark_outdated(&child);
            }
        }
    }

    /// Marks an existing node's serialized form as changed, triggering
    /// rehash on the next [`HashTree::update_root_hash`].
    pub fn mark_updated(&mut self, id: &EntityId, entity_data_hash: String) -> Result<(), HashTreeError> {
        let node = self.nodes.get_mut(id).ok_or_else(|| HashTreeError::NotFound(id.clone()))?;
        node.entity_data_hash = entity_data_hash;
        node.outdated = true;
        drop(node);
        self.mark_outdated(id);
        Ok(())
    }

    /// Tombstones a node. Only leaves may be removed directly; a non-leaf
    /// removal is a hard error (`SPEC_FULL.md` §4.3). A child tombstoned
    /// earlier in the same delta is detached from its parent's `children`
    /// map right here, not left until `sweep_tombstones`, so a delta that
    /// removes a child and then its now-childless parent (leaf-first,
    /// bottom-up) sees the parent as a leaf too.
    pub fn tombstone(&mut self, id: &EntityId) -> Result<(), HashTreeError> {
        let has_children = self
            .nodes
            .get(id)
            .map(|n| !n.children.is_empty())
            .unwrap_or(false);
        if has_children {
            return Err(HashTreeError::NonLeafRemoval(id.clone()));
        }
        let parent = self.parent_of(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.removed = true;
        }
        self.cleanup_needed = true;
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.shift_remove(id);
            }
            self.mark_outdated(&parent);
        }
        Ok(())
    }

    fn sweep_tombstones(&mut self) {
        if !self.cleanup_needed {
            return;
        }
        let removed_ids: Vec<EntityId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.removed)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed_ids {
            self.nodes.remove(id);
        }
        for node in self.nodes.values_mut() {
            for id in &removed_ids {
                node.children.shift_remove(id);
            }
        }
        self.cleanup_needed = false;
    }

    fn sort_children_where_flagged(&mut self) {
        let ids: Vec<EntityId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.children_sort_needed)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.sort_keys();
                node.children_sort_needed = false;
            }
        }
    }

    fn assert_no_orphans(&self) -> Result<(), HashTreeError> {
        if let Some((parent_id, _)) = self.orphans.iter().next() {
            return Err(HashTreeError::OrphanSubtree(parent_id.clone()));
        }
        Ok(())
    }

    fn recompute(&mut self, id: &EntityId) -> String {
        let (outdated, entity_data_hash, children): (bool, String, Vec<EntityId>) = {
            let node = self.nodes.get(id).expect("node must exist");
            (
                node.outdated,
                node.entity_data_hash.clone(),
                node.children.keys().cloned().collect(),
            )
        };
        if !outdated {
            return self.nodes[id].hash.clone();
        }
        let child_hashes: Vec<String> = children.iter().map(|c| self.recompute(c)).collect();
        let hash = hash_composite(&entity_data_hash, child_hashes.iter().map(|s| s.as_str()));
        let node = self.nodes.get_mut(id).expect("node must exist");
        node.hash = hash.clone();
        node.outdated = false;
        hash
    }

    /// Asserts no orphan subtrees remain, sweeps tombstones, sorts any
    /// children flagged dirty, then recomputes hashes for every outdated
    /// node bottom-up, returning the new root hash
    /// (`SPEC_FULL.md` §4.3). Async to leave room for a suspending crypto
    /// provider; the bundled SHA-256 path never actually suspends.
    pub async fn update_root_hash(&mut self) -> Result<String, HashTreeError> {
        self.assert_no_orphans()?;
        self.sweep_tombstones();
        self.sort_children_where_flagged();
        let root = EntityId::new(SUPER_ROOT_ID);
        Ok(self.recompute(&root))
    }

    pub fn node_kind(&self, id: &EntityId) -> Option<NodeKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    /// Applies every Change in `delta` against `store` (read *after* the
    /// delta has already been applied to the store's entities, so CREATE's
    /// hash reflects the final entity), per the `update_hash_tree`
    /// integration described in `SPEC_FULL.md` §4.3.
    pub fn apply_delta(&mut self, store: &EntityStore, delta: &Delta) -> Result<(), HashTreeError> {
        for change in delta.iter() {
            match change.kind() {
                ChangeKind::Create => {
                    let entity = store
                        .get(&change.entity_id)
                        .ok_or_else(|| HashTreeError::NotFound(change.entity_id.clone()))?;
                    let hash = entity_data_hash(&entity)?;
                    self.insert_node(entity.id.clone(), entity.parent_id.clone(), hash);
                }
                ChangeKind::Update => {
                    let entity = store
                        .get(&change.entity_id)
                        .ok_or_else(|| HashTreeError::NotFound(change.entity_id.clone()))?;
                    let hash = entity_data_hash(&entity)?;
                    self.mark_updated(&change.entity_id, hash)?;
                }
                ChangeKind::Delete => {
                    self.tombstone(&change.entity_id)?;
                }
                ChangeKind::Empty => {}
            }
        }
        Ok(())
    }
}

impl Default for HashTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of an entity's own serialized form (`SPEC_FULL.md` §4.3), computed
/// over the `{id, parentId, type, payload}` wrapper produced by
/// [`Entity::to_dict`].
fn entity_data_hash(entity: &Entity) -> Result<String, CanonicalJsonError> {
    hash_value(&entity.to_dict())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRegistry;
    use crate::entity::Payload;
    use crate::entity::PlainEntityFactory;
    use std::sync::Arc;

    fn registry() -> EntityRegistry {
        let mut r = EntityRegistry::new();
        r.register(Arc::new(PlainEntityFactory("Page")));
        r
    }

    fn store_with_configs() -> EntityStore {
        use crate::store::IndexConfig;
        use crate::store::IndexField;
        EntityStore::new(
            registry(),
            vec![IndexConfig::new("id", vec![IndexField::property("id")], true)],
        )
        .unwrap()
    }

    fn page(id: &str, parent: Option<&str>) -> Entity {
        let mut payload = Payload::new();
        payload.insert("name".into(), serde_json::json!(id));
        Entity::new(id, parent.map(EntityId::new), "Page", payload).unwrap()
    }

    #[tokio::test]
    async fn root_hash_changes_with_entity_mutation() {
        let mut store = store_with_configs();
        let mut tree = HashTree::new();

        store.insert_one(page("root", None)).unwrap();
        let hash = entity_data_hash(&store.get(&EntityId::new("root")).unwrap()).unwrap();
        tree.insert_node(EntityId::new("root"), None, hash);
        let h1 = tree.update_root_hash().await.unwrap();

        store
            .update_one(&EntityId::new("root"), {
                let mut p = Payload::new();
                p.insert("name".into(), serde_json::json!("changed"));
                p
            })
            .unwrap();
        let hash2 = entity_data_hash(&store.get(&EntityId::new("root")).unwrap()).unwrap();
        tree.mark_updated(&EntityId::new("root"), hash2).unwrap();
        let h2 = tree.update_root_hash().await.unwrap();

        assert_ne!(h1, h2);
    }

    #[tokio::test]
    async fn orphan_subtree_is_an_error_at_hash_time() {
        let mut tree = HashTree::new();
        tree.insert_node(EntityId::new("child"), Some(EntityId::new("missing-parent")), "h".into());
        assert!(matches!(
            tree.update_root_hash().await,
            Err(HashTreeError::OrphanSubtree(_))
        ));
    }

    #[tokio::test]
    async fn staged_orphan_attaches_once_parent_arrives() {
        let mut tree = HashTree::new();
        tree.insert_node(EntityId::new("child"), Some(EntityId::new("root")), "ch".into());
        tree.insert_node(EntityId::new("root"), None, "rh".into());
        let hash = tree.update_root_hash().await.unwrap();
        assert!(!hash.is_empty());
    }

    #[tokio::test]
    async fn removing_a_leaf_changes_root_hash_after_sweep() {
        let mut store = store_with_configs();
        let mut tree = HashTree::new();
        store.insert_one(page("root", None)).unwrap();
        store.insert_one(page("child", Some("root"))).unwrap();
        tree.insert_node(EntityId::new("root"), None, "rh".into());
        tree.insert_node(EntityId::new("child"), Some(EntityId::new("root")), "ch".into());
        let h1 = tree.update_root_hash().await.unwrap();

        tree.tombstone(&EntityId::new("child")).unwrap();
        let h2 = tree.update_root_hash().await.unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn removing_a_non_leaf_is_rejected() {
        let mut tree = HashTree::new();
        tree.insert_node(EntityId::new("root"), None, "rh".into());
        tree.insert_node(EntityId::new("child"), Some(EntityId::new("root")), "ch".into());
        assert!(matches!(
            tree.tombstone(&EntityId::new("root")),
            Err(HashTreeError::NonLeafRemoval(_))
        ));
    }
}
