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

//! Deterministic seniority-based auto-merge (`SPEC_FULL.md` §4.5): after a
//! `pull` has hydrated every branch's commits into the local graph, the
//! current branch is reconciled against every other branch by walking both
//! histories in lockstep and rebasing local commits that diverge from a
//! more senior branch's commit at the same position.
//!
//! This module holds the pure per-step logic — picking the dominant commit
//! and filtering a junior delta against it. [`crate::repo::Repository`]
//! owns the orchestration (it alone can mutate the head store, hash tree,
//! and graph), the same split the teacher draws between `rewrite.rs`'s pure
//! rebase planning and `MutableRepo`'s actual mutation.

use std::collections::HashSet;

use crate::change::Change;
use crate::change::ChangeError;
use crate::change::ChangeKind;
use crate::commit::Commit;
use crate::delta::Delta;

/// The commit at `position` on the most senior branch (by list order) that
/// still has one, or `None` once every branch in `histories` is exhausted.
/// `histories` must already exclude the local branch being reconciled.
pub(crate) fn pick_dominant<'a>(
    histories: impl IntoIterator<Item = &'a [Commit]>,
    position: usize,
) -> Option<Commit> {
    for history in histories {
        if history.len() >= position + 1 {
            return Some(history[position].clone());
        }
    }
    None
}

/// Filters `local`'s changes against `dominant`'s, per the conflict rule in
/// `SPEC_FULL.md` §4.5: a dominant CREATE or DELETE on an entity discards
/// the local change to it outright (two concurrent CREATEs of the same id,
/// or two concurrent DELETEs, both collapse to the dominant side); a
/// dominant UPDATE trims only the keys it touched from a local UPDATE on
/// the same entity, leaving the rest of the local change intact.
pub(crate) fn filter_junior_delta(local: &Delta, dominant: &Delta) -> Result<Delta, ChangeError> {
    let mut result = Delta::new();
    for change in local.iter() {
        let Some(dominant_change) = dominant.get(&change.entity_id) else {
            result.merge_change(change.clone())?;
            continue;
        };
        match dominant_change.kind() {
            ChangeKind::Create | ChangeKind::Delete => continue,
            ChangeKind::Empty => result.merge_change(change.clone())?,
            ChangeKind::Update => match change.kind() {
                ChangeKind::Create | ChangeKind::Delete => continue,
                ChangeKind::Empty => result.merge_change(change.clone())?,
                ChangeKind::Update => {
                    let touched: HashSet<&str> =
                        dominant_change.forward.keys().map(String::as_str).collect();
                    let mut forward = change.forward.clone();
                    let mut reverse = change.reverse.clone();
                    forward.retain(|k, _| !touched.contains(k.as_str()));
                    reverse.retain(|k, _| !touched.contains(k.as_str()));
                    result.merge_change(Change::new(change.entity_id.clone(), reverse, forward))?;
                }
            },
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;
    use crate::commit::CommitId;
    use crate::entity::EntityId;

    fn payload(pairs: &[(&str, serde_json::Value)]) -> crate::entity::Payload {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn commit(id: &str, delta: Delta) -> Commit {
        Commit {
            id: CommitId::new(id),
            parent_id: None,
            snapshot_hash: "h".to_owned(),
            timestamp: Timestamp {
                millis_since_epoch: 0,
                tz_offset_mins: 0,
            },
            message: String::new(),
            delta,
        }
    }

    #[test]
    fn dominant_comes_from_the_first_branch_with_a_commit_at_position() {
        let short = [commit("a", Delta::new())];
        let long = [commit("b", Delta::new()), commit("c", Delta::new())];
        let dominant = pick_dominant([short.as_slice(), long.as_slice()], 1).unwrap();
        assert_eq!(dominant.id, CommitId::new("c"));
        assert!(pick_dominant([short.as_slice()], 1).is_none());
    }

    #[test]
    fn dominant_create_drops_local_change_to_same_entity() {
        let id = EntityId::new("n");
        let mut local = Delta::new();
        local
            .merge_change(Change::create(id.clone(), payload(&[("title", serde_json::json!("mine"))])))
            .unwrap();
        let mut dominant = Delta::new();
        dominant
            .merge_change(Change::create(id.clone(), payload(&[("title", serde_json::json!("theirs"))])))
            .unwrap();

        let filtered = filter_junior_delta(&local, &dominant).unwrap();
        assert!(filtered.get(&id).is_none());
    }

    #[test]
    fn dominant_update_trims_only_overlapping_keys() {
        let id = EntityId::new("n");
        let mut local = Delta::new();
        local
            .merge_change(Change::update(
                id.clone(),
                payload(&[("title", serde_json::json!("a")), ("body", serde_json::json!("b"))]),
                payload(&[("title", serde_json::json!("mine")), ("body", serde_json::json!("c"))]),
            ))
            .unwrap();
        let mut dominant = Delta::new();
        dominant
            .merge_change(Change::update(
                id.clone(),
                payload(&[("title", serde_json::json!("a"))]),
                payload(&[("title", serde_json::json!("theirs"))]),
            ))
            .unwrap();

        let filtered = filter_junior_delta(&local, &dominant).unwrap();
        let change = filtered.get(&id).unwrap();
        assert!(change.forward.get("title").is_none());
        assert_eq!(change.forward.get("body"), Some(&serde_json::json!("c")));
    }

    #[test]
    fn local_change_to_an_untouched_entity_is_kept_verbatim() {
        let id = EntityId::new("n");
        let other = EntityId::new("other");
        let mut local = Delta::new();
        local
            .merge_change(Change::create(id.clone(), payload(&[("title", serde_json::json!("mine"))])))
            .unwrap();
        let mut dominant = Delta::new();
        dominant
            .merge_change(Change::create(other, payload(&[("title", serde_json::json!("theirs"))])))
            .unwrap();

        let filtered = filter_junior_delta(&local, &dominant).unwrap();
        assert_eq!(filtered.get(&id).unwrap().kind(), ChangeKind::Create);
    }
}
