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

//! The commit graph: an ordered branch list plus a commit id → commit map
//! (`SPEC_FULL.md` §3). Invariants: (G1) every branch's head, if set, is
//! present in the commit map; (G2) walking `parent_id` from any head
//! reaches the root without cycles; (G3) chronological order on a branch
//! is the reverse-parent walk from head.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::commit::Branch;
use crate::commit::Commit;
use crate::commit::CommitId;
use crate::error::ErrorCategory;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("branch {0:?} already exists")]
    DuplicateBranch(String),
    #[error("branch {0:?} not found")]
    UnknownBranch(String),
    #[error("commit {0} not found")]
    UnknownCommit(CommitId),
    #[error("commit {0} already exists")]
    DuplicateCommit(CommitId),
    #[error("parent {0} of a new commit is missing from the graph")]
    MissingParent(CommitId),
    #[error("cycle detected while walking ancestry from {0}")]
    Cycle(CommitId),
    #[error("cannot remove the current branch {0:?}")]
    RemovingCurrentBranch(String),
}

impl GraphError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cycle(_) => ErrorCategory::Integrity,
            Self::MissingParent(_) => ErrorCategory::Integrity,
            Self::DuplicateBranch(_)
            | Self::UnknownBranch(_)
            | Self::UnknownCommit(_)
            | Self::DuplicateCommit(_) => ErrorCategory::Protocol,
            Self::RemovingCurrentBranch(_) => ErrorCategory::Protocol,
        }
    }
}

/// An ordered branch list (seniority rank = position) plus the commit map
/// they reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitGraph {
    branches: Vec<Branch>,
    commits: IndexMap<CommitId, Commit>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn commit(&self, id: &CommitId) -> Option<&Commit> {
        self.commits.get(id)
    }

    pub fn commit_ids(&self) -> impl Iterator<Item = &CommitId> {
        self.commits.keys()
    }

    /// Appends a new, most-junior branch.
    pub fn add_branch(&mut self, name: impl Into<String>) -> Result<(), GraphError> {
        let name = name.into();
        if self.branch(&name).is_some() {
            return Err(GraphError::DuplicateBranch(name));
        }
        self.branches.push(Branch::new(name));
        Ok(())
    }

    pub fn remove_branch(&mut self, name: &str, current_branch: &str) -> Result<(), GraphError> {
        if name == current_branch {
            return Err(GraphError::RemovingCurrentBranch(name.to_owned()));
        }
        let before = self.branches.len();
        self.branches.retain(|b| b.name != name);
        if self.branches.len() == before {
            return Err(GraphError::UnknownBranch(name.to_owned()));
        }
        Ok(())
    }

    /// Removes a branch without the current-branch check performed by
    /// [`CommitGraph::remove_branch`]. Used by storage adapters, which
    /// receive a pre-validated [`crate::storage::InternalRepoUpdate`] from
    /// the repository (the repository itself never includes the current
    /// branch in `removed_branches`).
    pub fn remove_branch_unchecked(&mut self, name: &str) {
        self.branches.retain(|b| b.name != name);
    }

    pub fn set_branch_head(&mut self, name: &str, head: Option<CommitId>) -> Result<(), GraphError> {
        let branch = self
            .branches
            .iter_mut()
            .find(|b| b.name == name)
            .ok_or_else(|| GraphError::UnknownBranch(name.to_owned()))?;
        branch.head_commit_id = head;
        Ok(())
    }

    /// Adds a commit, enforcing G1 (parent, if set, must already be
    /// present — a commit's own parent is recorded before the commit
    /// itself can be).
    pub fn add_commit(&mut self, commit: Commit) -> Result<(), GraphError> {
        if self.commits.contains_key(&commit.id) {
            return Err(GraphError::DuplicateCommit(commit.id));
        }
        if let Some(parent_id) = &commit.parent_id {
            if !self.commits.contains_key(parent_id) {
                return Err(GraphError::MissingParent(parent_id.clone()));
            }
        }
        self.commits.insert(commit.id.clone(), commit);
        Ok(())
    }

    /// Removes a set of commits outright (used by the squish rule, §4.5).
    /// Callers are responsible for ensuring no remaining branch head or
    /// any remaining commit's `parent_id` still references a removed id.
    pub fn remove_commits(&mut self, ids: &[CommitId]) {
        for id in ids {
            self.commits.shift_remove(id);
        }
    }

    /// Chronological order (oldest first) on `branch_name`'s history,
    /// obtained by walking `parent_id` from head and reversing (G3).
    /// Errors on a cycle (G2 violation).
    pub fn history(&self, branch_name: &str) -> Result<Vec<&Commit>, GraphError> {
        let branch = self
            .branch(branch_name)
            .ok_or_else(|| GraphError::UnknownBranch(branch_name.to_owned()))?;
        let mut chain = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = branch.head_commit_id.clone();
        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                return Err(GraphError::Cycle(id));
            }
            let commit = self
                .commits
                .get(&id)
                .ok_or_else(|| GraphError::UnknownCommit(id.clone()))?;
            chain.push(commit);
            current = commit.parent_id.clone();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Validates G1 and G2 across the whole graph; used after hydrating a
    /// graph fetched from a storage adapter.
    pub fn validate(&self) -> Result<(), GraphError> {
        for branch in &self.branches {
            if let Some(head) = &branch.head_commit_id {
                if !self.commits.contains_key(head) {
                    return Err(GraphError::UnknownCommit(head.clone()));
                }
            }
            self.history(&branch.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;
    use crate::delta::Delta;

    fn commit(id: &str, parent: Option<&str>) -> Commit {
        Commit {
            id: CommitId::new(id),
            parent_id: parent.map(CommitId::new),
            snapshot_hash: "h".to_owned(),
            timestamp: Timestamp {
                millis_since_epoch: 0,
                tz_offset_mins: 0,
            },
            message: String::new(),
            delta: Delta::new(),
        }
    }

    #[test]
    fn history_is_chronological_oldest_first() {
        let mut graph = CommitGraph::new();
        graph.add_branch("dev1").unwrap();
        graph.add_commit(commit("a", None)).unwrap();
        graph.add_commit(commit("b", Some("a"))).unwrap();
        graph.set_branch_head("dev1", Some(CommitId::new("b"))).unwrap();

        let history = graph.history("dev1").unwrap();
        let ids: Vec<&str> = history.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let mut graph = CommitGraph::new();
        assert!(matches!(
            graph.add_commit(commit("b", Some("a"))),
            Err(GraphError::MissingParent(_))
        ));
    }

    #[test]
    fn removing_current_branch_is_an_error() {
        let mut graph = CommitGraph::new();
        graph.add_branch("dev1").unwrap();
        assert!(matches!(
            graph.remove_branch("dev1", "dev1"),
            Err(GraphError::RemovingCurrentBranch(_))
        ));
    }

    #[test]
    fn branch_order_reflects_seniority() {
        let mut graph = CommitGraph::new();
        graph.add_branch("dev1").unwrap();
        graph.add_branch("dev2").unwrap();
        let names: Vec<&str> = graph.branches().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["dev1", "dev2"]);
    }
}
