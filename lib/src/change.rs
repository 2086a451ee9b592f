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

//! A single entity-scoped [`Change`] and the merge-with-priority algebra
//! over pairs of changes (`SPEC_FULL.md` §4.1). [`crate::delta::Delta`]
//! builds on this to fold a whole ordered sequence.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::entity::EntityId;
use crate::entity::MAX_PAYLOAD_DEPTH;
use crate::entity::Payload;
use crate::error::ErrorCategory;

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error(
        "irrational change sequence for entity {entity_id}: {first:?} followed by {next:?}"
    )]
    IrrationalSequence {
        entity_id: EntityId,
        first: ChangeKind,
        next: ChangeKind,
    },
    #[error("field comparison nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },
}

impl ChangeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IrrationalSequence { .. } => ErrorCategory::Integrity,
            Self::DepthExceeded { .. } => ErrorCategory::Validation,
        }
    }
}

/// Classification of a [`Change`] by non-emptiness of its two field maps
/// (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Empty,
    Create,
    Update,
    Delete,
}

/// A `(entity_id, reverse_fields, forward_fields)` triple. CREATE's
/// `forward` is the full serialized entity; DELETE's `reverse` is the full
/// serialized entity; UPDATE stores only the fields that actually changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub entity_id: EntityId,
    pub reverse: Payload,
    pub forward: Payload,
}

impl Change {
    pub fn new(entity_id: EntityId, reverse: Payload, forward: Payload) -> Self {
        Self {
            entity_id,
            reverse,
            forward,
        }
    }

    pub fn empty(entity_id: EntityId) -> Self {
        Self::new(entity_id, Payload::new(), Payload::new())
    }

    pub fn create(entity_id: EntityId, full_entity: Payload) -> Self {
        Self::new(entity_id, Payload::new(), full_entity)
    }

    pub fn delete(entity_id: EntityId, full_entity: Payload) -> Self {
        Self::new(entity_id, full_entity, Payload::new())
    }

    pub fn update(entity_id: EntityId, reverse: Payload, forward: Payload) -> Self {
        Self::new(entity_id, reverse, forward)
    }

    pub fn kind(&self) -> ChangeKind {
        match (self.reverse.is_empty(), self.forward.is_empty()) {
            (true, true) => ChangeKind::Empty,
            (true, false) => ChangeKind::Create,
            (false, true) => ChangeKind::Delete,
            (false, false) => ChangeKind::Update,
        }
    }

    /// Swaps `reverse` and `forward`. `reversed(reversed(c)) == c` for any
    /// `c` (P2 in `SPEC_FULL.md` §8).
    pub fn reversed(&self) -> Self {
        Self {
            entity_id: self.entity_id.clone(),
            reverse: self.forward.clone(),
            forward: self.reverse.clone(),
        }
    }
}

/// Merges `first` then `next` (targeting the same entity) into a single
/// equivalent Change, per the table in `SPEC_FULL.md` §4.1. The
/// UPDATE⊕UPDATE and UPDATE⊕DELETE rules share the same "first wins per
/// key when overlaying onto next's base" shape, implemented once in
/// [`merge_reverse_first_wins`].
pub fn merge_with_priority(first: &Change, next: &Change) -> Result<Change, ChangeError> {
    use ChangeKind::*;
    debug_assert_eq!(first.entity_id, next.entity_id);
    let id = first.entity_id.clone();

    match (first.kind(), next.kind()) {
        (Empty, _) => Ok(next.clone()),
        (_, Empty) => Ok(first.clone()),

        (Create, Create) => Err(irrational(id, Create, Create)),
        (Create, Update) => {
            let mut forward = first.forward.clone();
            for (k, v) in &next.forward {
                forward.insert(k.clone(), v.clone());
            }
            Ok(Change::create(id, forward))
        }
        (Create, Delete) => Ok(Change::empty(id)),

        (Update, Create) => Err(irrational(id, Update, Create)),
        (Update, Update) => {
            let mut forward = first.forward.clone();
            for (k, v) in &next.forward {
                forward.insert(k.clone(), v.clone());
            }
            let reverse = merge_reverse_first_wins(&next.reverse, &first.reverse);
            Ok(Change::update(id, reverse, forward))
        }
        (Update, Delete) => {
            let reverse = merge_reverse_first_wins(&next.reverse, &first.reverse);
            Ok(Change::delete(id, reverse))
        }

        (Delete, Create) => Ok(Change::update(id, first.reverse.clone(), next.forward.clone())),
        (Delete, Update) => Err(irrational(id, Delete, Update)),
        (Delete, Delete) => Err(irrational(id, Delete, Delete)),
    }
}

fn irrational(entity_id: EntityId, first: ChangeKind, next: ChangeKind) -> ChangeError {
    ChangeError::IrrationalSequence {
        entity_id,
        first,
        next,
    }
}

/// Overlays `winner` onto `base`, `winner`'s keys taking priority. Used for
/// the reverse-field merge in UPDATE⊕UPDATE and UPDATE⊕DELETE: `base` is
/// the full (or partial) post-first snapshot carried by `next.reverse`,
/// `winner` is `first.reverse` (the pre-first values for the keys `first`
/// actually touched). This is asymmetric relative to the forward merge
/// (which is next-wins) by design: `first.reverse` holds values at the
/// moment `first` was applied, so it must win to make `reversed()` restore
/// state correctly (`SPEC_FULL.md` §4.1 open question).
fn merge_reverse_first_wins(base: &Payload, winner: &Payload) -> Payload {
    let mut merged = base.clone();
    for (k, v) in winner {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Deep-equality of two JSON values with an explicit depth counter, hard
/// erroring past [`MAX_PAYLOAD_DEPTH`] rather than truncating silently
/// (`SPEC_FULL.md` §9).
pub fn fields_equal(a: &serde_json::Value, b: &serde_json::Value) -> Result<bool, ChangeError> {
    fields_equal_at_depth(a, b, 0)
}

fn fields_equal_at_depth(
    a: &serde_json::Value,
    b: &serde_json::Value,
    depth: usize,
) -> Result<bool, ChangeError> {
    if depth > MAX_PAYLOAD_DEPTH {
        return Err(ChangeError::DepthExceeded {
            max: MAX_PAYLOAD_DEPTH,
        });
    }
    match (a, b) {
        (serde_json::Value::Object(ma), serde_json::Value::Object(mb)) => {
            if ma.len() != mb.len() {
                return Ok(false);
            }
            for (k, va) in ma {
                match mb.get(k) {
                    Some(vb) if fields_equal_at_depth(va, vb, depth + 1)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (serde_json::Value::Array(aa), serde_json::Value::Array(ab)) => {
            if aa.len() != ab.len() {
                return Ok(false);
            }
            for (va, vb) in aa.iter().zip(ab.iter()) {
                if !fields_equal_at_depth(va, vb, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(a == b),
    }
}

/// Computes the UPDATE change between an entity's previous and new
/// payload: only fields that differ (by [`fields_equal`]) are included,
/// keyed by field name, in both the `reverse` (old value) and `forward`
/// (new value) maps. A field added or removed entirely is represented the
/// same way a changed field is (absence on one side compares unequal to
/// presence on the other).
pub fn diff_payloads(
    entity_id: EntityId,
    old: &Payload,
    new: &Payload,
) -> Result<Change, ChangeError> {
    let mut reverse = Payload::new();
    let mut forward = Payload::new();
    let mut keys: std::collections::BTreeSet<&String> = old.keys().collect();
    keys.extend(new.keys());
    for key in keys {
        let old_v = old.get(key).cloned().unwrap_or(serde_json::Value::Null);
        let new_v = new.get(key).cloned().unwrap_or(serde_json::Value::Null);
        if !fields_equal(&old_v, &new_v)? {
            reverse.insert(key.clone(), old_v);
            forward.insert(key.clone(), new_v);
        }
    }
    Ok(Change::new(entity_id, reverse, forward))
}
