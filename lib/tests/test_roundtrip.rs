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

/// Insert, update, remove a single page; assert every snapshot hash along
/// the way is distinct, then undo the two non-empty commits and confirm
/// the engine's own hash check (inside `reset`) accepts the trip back to
/// the initial, empty snapshot.
#[tokio::test]
async fn create_update_delete_round_trip() {
    let (mut repo, _adapter) = branchstore_testutils::new_repo("dev1").await;

    let init_id = repo.commit(Delta::new(), "init").await.unwrap();
    let h0 = repo.graph().commit(&init_id).unwrap().snapshot_hash.clone();

    let page = Entity::new(
        "p",
        None,
        "Page",
        branchstore_testutils::page_payload("Test Page"),
    )
    .unwrap();
    let mut create_delta = Delta::new();
    create_delta
        .merge_change(Change::create(page.id.clone(), page.to_full_fields()))
        .unwrap();
    let create_id = repo.commit(create_delta, "create p").await.unwrap();
    let h1 = repo.graph().commit(&create_id).unwrap().snapshot_hash.clone();

    let mut update_delta = Delta::new();
    update_delta
        .merge_change(Change::update(
            EntityId::new("p"),
            branchstore_testutils::page_payload("Test Page"),
            branchstore_testutils::page_payload("X"),
        ))
        .unwrap();
    let update_id = repo.commit(update_delta, "rename p").await.unwrap();
    let h2 = repo.graph().commit(&update_id).unwrap().snapshot_hash.clone();

    assert_ne!(h0, h1);
    assert_ne!(h1, h2);
    assert_ne!(h0, h2);

    // Undo the rename and the create; `reset` itself asserts the
    // recomputed hash matches `init`'s recorded snapshot_hash.
    repo.reset(-2).await.unwrap();
    assert!(repo.head_store().is_empty());
    assert_eq!(
        repo.graph().branch("dev1").unwrap().head_commit_id,
        Some(init_id)
    );
}
