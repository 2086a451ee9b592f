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

use branchstore::change::Change;
use branchstore::delta::Delta;
use branchstore::entity::Entity;
use branchstore::entity::EntityId;
use branchstore::hash_tree::HashTree;

/// Two pages, each with one note child. Remove one page and its note in a
/// single commit; rebuilding the hash tree from scratch over the
/// surviving entities must reproduce the commit's recorded snapshot hash
/// (`SPEC_FULL.md` §4.3, scenario 3).
#[tokio::test]
async fn removing_a_parent_and_child_together_preserves_hash_integrity() {
    let (mut repo, _adapter) = branchstore_testutils::new_repo("dev1").await;

    let page1 = Entity::new("page1", None, "Page", branchstore_testutils::page_payload("One"))
        .unwrap();
    let page2 = Entity::new("page2", None, "Page", branchstore_testutils::page_payload("Two"))
        .unwrap();
    let note1 = Entity::new(
        "note1",
        Some(EntityId::new("page1")),
        "Note",
        branchstore_testutils::note_payload("on one"),
    )
    .unwrap();
    let note2 = Entity::new(
        "note2",
        Some(EntityId::new("page2")),
        "Note",
        branchstore_testutils::note_payload("on two"),
    )
    .unwrap();

    let mut seed = Delta::new();
    for entity in [&page1, &page2, &note1, &note2] {
        seed.merge_change(Change::create(entity.id.clone(), entity.to_full_fields()))
            .unwrap();
    }
    repo.commit(seed, "seed").await.unwrap();

    // Remove page1 and its child note1 in one commit; the child must be
    // deleted before the parent (the hash tree rejects removing a node
    // that still has children).
    let note1_in_store = repo.head_store().get(&EntityId::new("note1")).unwrap();
    let page1_in_store = repo.head_store().get(&EntityId::new("page1")).unwrap();
    let mut removal = Delta::new();
    removal
        .merge_change(Change::delete(
            note1_in_store.id.clone(),
            note1_in_store.to_full_fields(),
        ))
        .unwrap();
    removal
        .merge_change(Change::delete(
            page1_in_store.id.clone(),
            page1_in_store.to_full_fields(),
        ))
        .unwrap();
    let commit_id = repo.commit(removal, "remove page1").await.unwrap();
    let recorded_hash = repo.graph().commit(&commit_id).unwrap().snapshot_hash.clone();

    assert_eq!(repo.head_store().len(), 2);
    assert!(repo.head_store().get(&EntityId::new("page1")).is_none());
    assert!(repo.head_store().get(&EntityId::new("note1")).is_none());

    // Recompute the hash tree from scratch over the surviving entities
    // (parents before children) and assert it matches the incrementally
    // maintained one.
    let mut rebuilt = HashTree::new();
    let mut recreate = Delta::new();
    let page2_now = repo.head_store().get(&EntityId::new("page2")).unwrap();
    let note2_now = repo.head_store().get(&EntityId::new("note2")).unwrap();
    recreate
        .merge_change(Change::create(page2_now.id.clone(), page2_now.to_full_fields()))
        .unwrap();
    recreate
        .merge_change(Change::create(note2_now.id.clone(), note2_now.to_full_fields()))
        .unwrap();
    rebuilt.apply_delta(repo.head_store(), &recreate).unwrap();
    let rebuilt_hash = rebuilt.update_root_hash().await.unwrap();

    assert_eq!(rebuilt_hash, recorded_hash);
}
