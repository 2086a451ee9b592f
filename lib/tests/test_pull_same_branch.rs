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

/// Two replicas on the same branch name, each with their own storage.
/// Fast-forward pulling in either direction brings both to the same
/// snapshot hash (`SPEC_FULL.md` §4.4, scenario 2).
#[tokio::test]
async fn fast_forward_converges_both_directions() {
    let (mut repo_a, adapter_a) = branchstore_testutils::new_repo("dev1").await;
    let (mut repo_b, adapter_b) = branchstore_testutils::new_repo("dev1").await;

    let page1 = Entity::new("page1", None, "Page", branchstore_testutils::page_payload("Page 1"))
        .unwrap();
    let entity1 = Entity::new(
        "entity1",
        Some(EntityId::new("page1")),
        "Note",
        branchstore_testutils::note_payload("first"),
    )
    .unwrap();
    let mut delta = Delta::new();
    delta
        .merge_change(Change::create(page1.id.clone(), page1.to_full_fields()))
        .unwrap();
    delta
        .merge_change(Change::create(entity1.id.clone(), entity1.to_full_fields()))
        .unwrap();
    repo_a.commit(delta, "seed").await.unwrap();

    repo_b.pull(adapter_a.as_ref()).await.unwrap();
    assert_eq!(
        repo_a.graph().branch("dev1").unwrap().head_commit_id,
        repo_b.graph().branch("dev1").unwrap().head_commit_id
    );
    assert_eq!(repo_b.head_store().len(), 2);

    let entity2 = Entity::new(
        "entity2",
        Some(EntityId::new("page1")),
        "Note",
        branchstore_testutils::note_payload("second"),
    )
    .unwrap();
    let mut delta2 = Delta::new();
    delta2
        .merge_change(Change::create(entity2.id.clone(), entity2.to_full_fields()))
        .unwrap();
    repo_b.commit(delta2, "add entity2").await.unwrap();

    repo_a.pull(adapter_b.as_ref()).await.unwrap();
    let head_a = repo_a.graph().branch("dev1").unwrap().head_commit_id.clone();
    let head_b = repo_b.graph().branch("dev1").unwrap().head_commit_id.clone();
    assert_eq!(head_a, head_b);
    assert_eq!(
        repo_a.graph().commit(head_a.as_ref().unwrap()).unwrap().snapshot_hash,
        repo_b.graph().commit(head_b.as_ref().unwrap()).unwrap().snapshot_hash
    );
    assert_eq!(repo_a.head_store().len(), 3);
}
