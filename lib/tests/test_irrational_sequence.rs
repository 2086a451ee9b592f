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
use branchstore::change::ChangeError;
use branchstore::delta::Delta;
use branchstore::entity::EntityId;

/// DELETE followed by UPDATE for the same entity id within one delta is
/// not a representable sequence: once gone, an entity cannot be updated
/// (`SPEC_FULL.md` §4.1, scenario 5).
#[test]
fn delete_then_update_is_rejected() {
    let id = EntityId::new("x");
    let full = branchstore_testutils::page_payload("X");
    let changes = vec![
        Change::delete(id.clone(), full.clone()),
        Change::update(id, full.clone(), full),
    ];

    let err = Delta::from_changes(changes).unwrap_err();
    assert!(matches!(err, ChangeError::IrrationalSequence { .. }));
}
