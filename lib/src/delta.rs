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

//! An ordered collection of per-entity [`Change`]s and the squish/reversal
//! operations over it (`SPEC_FULL.md` §3, §4.1).

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::change::Change;
use crate::change::ChangeError;
use crate::change::merge_with_priority;
use crate::entity::EntityId;

/// At most one [`Change`] per entity id. Order matters: [`Delta::reversed`]
/// must emit changes in reverse insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    changes: IndexMap<EntityId, Change>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Change> {
        self.changes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.values()
    }

    /// Merges a single change into this delta in place, using
    /// [`merge_with_priority`] against any change already accumulated for
    /// the same entity. A brand-new entity id is simply inserted (the
    /// implicit "first" is EMPTY, and EMPTY⊕next = next).
    pub fn merge_change(&mut self, change: Change) -> Result<(), ChangeError> {
        match self.changes.get(&change.entity_id) {
            Some(existing) => {
                let merged = merge_with_priority(existing, &change)?;
                self.changes.insert(merged.entity_id.clone(), merged);
            }
            None => {
                self.changes.insert(change.entity_id.clone(), change);
            }
        }
        Ok(())
    }

    /// Builds a Delta from an ordered sequence of Changes, folding changes
    /// that target the same entity via [`merge_with_priority`]
    /// (`SPEC_FULL.md` §4.1).
    pub fn from_changes(changes: impl IntoIterator<Item = Change>) -> Result<Self, ChangeError> {
        let mut delta = Self::new();
        for change in changes {
            delta.merge_change(change)?;
        }
        Ok(delta)
    }

    /// Inverts every change (swap reverse/forward) and reverses the
    /// iteration order, so that `reversed().reversed() == self`.
    pub fn reversed(&self) -> Self {
        let mut changes = IndexMap::with_capacity(self.changes.len());
        for (id, change) in self.changes.iter().rev() {
            changes.insert(id.clone(), change.reversed());
        }
        Self { changes }
    }

    /// Left-folds a sequence of deltas into one equivalent delta via the
    /// per-entity merge-with-priority rule. Position within the result
    /// follows first-touch order across the whole sequence, matching the
    /// ordering contract a single `from_changes` call over the
    /// concatenation of every delta's changes would produce.
    pub fn squish(deltas: impl IntoIterator<Item = Delta>) -> Result<Self, ChangeError> {
        let mut acc = Self::new();
        for delta in deltas {
            for change in delta.changes.into_values() {
                acc.merge_change(change)?;
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Payload;

    fn payload(pairs: &[(&str, serde_json::Value)]) -> Payload {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn reversed_is_involutive() {
        let mut delta = Delta::new();
        delta
            .merge_change(Change::create(
                EntityId::new("a"),
                payload(&[("x", serde_json::json!(1))]),
            ))
            .unwrap();
        delta
            .merge_change(Change::update(
                EntityId::new("b"),
                payload(&[("y", serde_json::json!(1))]),
                payload(&[("y", serde_json::json!(2))]),
            ))
            .unwrap();
        assert_eq!(delta.reversed().reversed(), delta);
    }

    #[test]
    fn squish_of_delta_and_its_reverse_is_empty_changes() {
        let mut delta = Delta::new();
        delta
            .merge_change(Change::create(
                EntityId::new("a"),
                payload(&[("x", serde_json::json!(1))]),
            ))
            .unwrap();
        let reversed = delta.reversed();
        let squished = Delta::squish([delta, reversed]).unwrap();
        // a: CREATE then DELETE nets to EMPTY, which is still represented.
        let change = squished.get(&EntityId::new("a")).unwrap();
        assert_eq!(change.kind(), crate::change::ChangeKind::Empty);
    }

    #[test]
    fn from_changes_rejects_irrational_sequence() {
        let id = EntityId::new("x");
        let full = payload(&[("a", serde_json::json!(1))]);
        let changes = vec![Change::delete(id.clone(), full.clone()), Change::update(id, full.clone(), full)];
        let err = Delta::from_changes(changes).unwrap_err();
        assert!(matches!(err, ChangeError::IrrationalSequence { .. }));
    }
}
