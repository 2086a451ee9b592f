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

//! Commit and branch metadata (`SPEC_FULL.md` §3). A [`Commit`] is
//! immutable once recorded; commit ids are fresh random strings, not
//! content-derived, so squishing commits on one branch never invalidates
//! an id referenced by another.

use serde::Deserialize;
use serde::Serialize;

use crate::clock::Timestamp;
use crate::delta::Delta;

/// Opaque commit identifier, as returned by [`crate::id::IdGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single recorded change to the head state: metadata plus the delta
/// that produced it from its parent's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    /// Empty only for the first commit on a branch.
    pub parent_id: Option<CommitId>,
    pub snapshot_hash: String,
    pub timestamp: Timestamp,
    pub message: String,
    pub delta: Delta,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A named pointer to the newest commit on a device's line of history.
/// Branches are ordered within a [`crate::graph::CommitGraph`]; position in
/// that order is the branch's seniority rank (lower index = more senior).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub head_commit_id: Option<CommitId>,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_commit_id: None,
        }
    }
}
