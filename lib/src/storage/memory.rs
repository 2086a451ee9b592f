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

//! An in-memory [`StorageAdapter`], used by tests and by
//! `branchstore-testutils`'s one-call `Repository` builder.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::commit::Commit;
use crate::commit::CommitId;
use crate::error::AdapterError;
use crate::graph::CommitGraph;
use crate::storage::InternalRepoUpdate;
use crate::storage::StorageAdapter;

#[derive(Default)]
pub struct MemoryAdapter {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    graph: CommitGraph,
    commits: std::collections::HashMap<CommitId, Commit>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn get_commit_graph(&self) -> Result<CommitGraph, AdapterError> {
        Ok(self.state.lock().unwrap().graph.clone())
    }

    async fn get_commits(&self, ids: &[CommitId]) -> Result<Vec<Commit>, AdapterError> {
        let state = self.state.lock().unwrap();
        ids.iter()
            .map(|id| {
                state
                    .commits
                    .get(id)
                    .cloned()
                    .ok_or_else(|| AdapterError::Rejected(format!("commit {id} not found")))
            })
            .collect()
    }

    async fn apply_update(&self, update: InternalRepoUpdate) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        for commit in update.added_commits {
            state.graph.add_commit(commit.clone()).map_err(|e| AdapterError::Rejected(e.to_string()))?;
            state.commits.insert(commit.id.clone(), commit);
        }
        for id in &update.removed_commits {
            state.graph.remove_commits(std::slice::from_ref(id));
            state.commits.remove(id);
        }
        for branch in update.added_branches {
            state.graph.add_branch(branch.name.clone()).map_err(|e| AdapterError::Rejected(e.to_string()))?;
            state.graph.set_branch_head(&branch.name, branch.head_commit_id).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        }
        for branch in update.updated_branches {
            state.graph.set_branch_head(&branch.name, branch.head_commit_id).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        }
        for name in update.removed_branches {
            // The current branch can never appear here; the repository
            // enforces that invariant before building the update.
            state.graph.remove_branch_unchecked(&name);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn erase_storage(&self) -> Result<(), AdapterError> {
        *self.state.lock().unwrap() = State::default();
        Ok(())
    }
}
