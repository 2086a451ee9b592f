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

//! The storage adapter contract (`SPEC_FULL.md` §6) and its
//! implementations: an in-memory adapter for tests, an embedded-database
//! adapter for production clients, and a remote-service wrapper.
//!
//! Mirrors the teacher's `#[async_trait] pub trait Backend: Any + Send +
//! Sync + Debug` shape (`backend.rs`): one boxed trait object the
//! [`crate::repo::Repository`] treats as the sole source of truth, with
//! adapter-originated errors carried in an opaque `Other` variant so
//! third-party adapter crates need not depend on this crate's error enum.

pub mod memory;
#[cfg(feature = "sled-adapter")]
pub mod sled_adapter;
pub mod remote;

use async_trait::async_trait;

use crate::commit::Branch;
use crate::commit::Commit;
use crate::commit::CommitId;
use crate::error::AdapterError;
use crate::graph::CommitGraph;

/// The minimal, slimmed-down update a [`crate::repo::Repository`] asks an
/// adapter to apply atomically (`SPEC_FULL.md` §6). Adapters must apply
/// every field or none — partial application is a correctness bug, not a
/// recoverable error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalRepoUpdate {
    pub added_commits: Vec<Commit>,
    pub removed_commits: Vec<CommitId>,
    pub added_branches: Vec<Branch>,
    pub updated_branches: Vec<Branch>,
    pub removed_branches: Vec<String>,
}

impl InternalRepoUpdate {
    pub fn is_empty(&self) -> bool {
        self.added_commits.is_empty()
            && self.removed_commits.is_empty()
            && self.added_branches.is_empty()
            && self.updated_branches.is_empty()
            && self.removed_branches.is_empty()
    }
}

/// The sole required persistence boundary. Adapter identity is opaque to
/// the repository; the repository treats the adapter as the source of
/// truth and its own cache as strictly derived (`SPEC_FULL.md` §6).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the full commit graph (branch list + commit metadata,
    /// without delta payloads — see [`StorageAdapter::get_commits`] for
    /// those).
    async fn get_commit_graph(&self) -> Result<CommitGraph, AdapterError>;

    /// Hydrates a set of commit ids to full [`Commit`]s, including delta
    /// data.
    async fn get_commits(&self, ids: &[CommitId]) -> Result<Vec<Commit>, AdapterError>;

    /// Applies `update` atomically.
    async fn apply_update(&self, update: InternalRepoUpdate) -> Result<(), AdapterError>;

    /// Releases any resources held open for this project. Idempotent.
    async fn close(&self) -> Result<(), AdapterError>;

    /// Irreversibly erases all persisted state for this project.
    async fn erase_storage(&self) -> Result<(), AdapterError>;
}
