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

//! The repository: head store ↔ commit graph ↔ hash tree coordination
//! (`SPEC_FULL.md` §4.4). Every mutating method takes `&mut self` rather
//! than an internal lock — enforcing "not re-entrant" structurally, the
//! way the teacher's `MutableRepo` requires a single owner for its
//! mutating methods rather than guarding them with a mutex.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::change::ChangeError;
use crate::clock::Clock;
use crate::commit::Branch;
use crate::commit::Commit;
use crate::commit::CommitId;
use crate::config::RepoConfig;
use crate::delta::Delta;
use crate::error::AdapterError;
use crate::error::ErrorCategory;
use crate::graph::CommitGraph;
use crate::graph::GraphError;
use crate::hash_tree::HashTree;
use crate::hash_tree::HashTreeError;
use crate::id::IdGenerator;
use crate::store::EntityStore;
use crate::store::StoreError;
use crate::storage::InternalRepoUpdate;
use crate::storage::StorageAdapter;
use crate::sync::filter_junior_delta;
use crate::sync::pick_dominant;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    HashTree(#[from] HashTreeError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Change(#[from] ChangeError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("snapshot hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("no branch is currently checked out")]
    NoCurrentBranch,
    #[error("forward reset is unsupported; relative_to_head must be negative")]
    ForwardResetUnsupported,
    #[error("cannot reset {requested} commits past the branch root ({available} available)")]
    ResetPastRoot { requested: usize, available: usize },
    #[error("missing delta for commit {0} required to hydrate a remote update")]
    MissingCommitDelta(CommitId),
    #[error("configuration mismatch with the previously cached repository")]
    ConfigMismatch,
    #[error("branch {0:?} not found")]
    MissingBranch(String),
}

impl RepoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(e) => e.category(),
            Self::HashTree(e) => e.category(),
            Self::Graph(e) => e.category(),
            Self::Change(e) => e.category(),
            Self::Adapter(_) => ErrorCategory::Adapter,
            Self::HashMismatch { .. } => ErrorCategory::Integrity,
            Self::NoCurrentBranch
            | Self::ForwardResetUnsupported
            | Self::ResetPastRoot { .. }
            | Self::MissingCommitDelta(_)
            | Self::ConfigMismatch
            | Self::MissingBranch(_) => ErrorCategory::Protocol,
        }
    }
}

/// Ties together the indexed head store, the commit graph, and the hash
/// tree behind a single storage adapter (`SPEC_FULL.md` §4.4).
pub struct Repository {
    head_store: EntityStore,
    graph: CommitGraph,
    hash_tree: HashTree,
    current_branch: String,
    adapter: Arc<dyn StorageAdapter>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Repository {
    /// Initializes an empty head store and hash tree, creates the
    /// configured default branch on the adapter, and returns.
    #[instrument(skip(config, adapter))]
    pub async fn create(
        config: RepoConfig,
        adapter: Arc<dyn StorageAdapter>,
    ) -> Result<Self, RepoError> {
        let head_store = EntityStore::new(config.registry, config.index_configs)?;
        adapter
            .apply_update(InternalRepoUpdate {
                added_branches: vec![Branch::new(config.default_branch.clone())],
                ..Default::default()
            })
            .await?;
        Ok(Self {
            head_store,
            graph: CommitGraph::new(),
            hash_tree: HashTree::new(),
            current_branch: config.default_branch,
            adapter,
            id_generator: config.id_generator,
            clock: config.clock,
        })
    }

    /// Loads the commit graph from the adapter, then pulls to populate the
    /// head store and hash tree.
    #[instrument(skip(config, adapter))]
    pub async fn open(
        config: RepoConfig,
        adapter: Arc<dyn StorageAdapter>,
    ) -> Result<Self, RepoError> {
        let graph = adapter.get_commit_graph().await?;
        if graph.branch(&config.default_branch).is_none() {
            return Err(RepoError::MissingBranch(config.default_branch));
        }
        let head_store = EntityStore::new(config.registry, config.index_configs)?;
        let mut repo = Self {
            head_store,
            graph: CommitGraph::new(),
            hash_tree: HashTree::new(),
            current_branch: config.default_branch,
            adapter,
            id_generator: config.id_generator,
            clock: config.clock,
        };
        repo.pull_from(&RemoteGraph::Adapter).await?;
        Ok(repo)
    }

    pub fn head_store(&self) -> &EntityStore {
        &self.head_store
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    fn current_head_id(&self) -> Option<CommitId> {
        self.graph.branch(&self.current_branch)?.head_commit_id.clone()
    }

    /// Applies `delta` to the head store, updates the hash tree, appends a
    /// commit, advances the current branch, and persists the minimal
    /// update through the adapter.
    #[instrument(skip(self, delta, message))]
    pub async fn commit(&mut self, delta: Delta, message: impl Into<String>) -> Result<CommitId, RepoError> {
        self.head_store.apply_delta(&delta)?;
        self.hash_tree.apply_delta(&self.head_store, &delta)?;
        let snapshot_hash = self.hash_tree.update_root_hash().await?;

        let commit = Commit {
            id: CommitId::new(self.id_generator.next_id()),
            parent_id: self.current_head_id(),
            snapshot_hash,
            timestamp: self.clock.now(),
            message: message.into(),
            delta,
        };
        self.graph.add_commit(commit.clone())?;
        self.graph
            .set_branch_head(&self.current_branch, Some(commit.id.clone()))?;

        let branch = self.graph.branch(&self.current_branch).unwrap().clone();
        self.adapter
            .apply_update(InternalRepoUpdate {
                added_commits: vec![commit.clone()],
                updated_branches: vec![branch],
                ..Default::default()
            })
            .await?;
        Ok(commit.id)
    }

    /// Undoes the `k` trailing commits on the current branch (`k < 0`
    /// only). Asserts the resulting snapshot hash matches the target
    /// commit's recorded hash.
    #[instrument(skip(self))]
    pub async fn reset(&mut self, relative_to_head: i64) -> Result<(), RepoError> {
        if relative_to_head > 0 {
            return Err(RepoError::ForwardResetUnsupported);
        }
        let k = (-relative_to_head) as usize;
        let history = self.graph.history(&self.current_branch)?;
        if k > history.len() {
            return Err(RepoError::ResetPastRoot {
                requested: k,
                available: history.len(),
            });
        }
        let trailing: Vec<Commit> = history[history.len() - k..].iter().map(|c| (*c).clone()).collect();
        let target = if history.len() == k {
            None
        } else {
            Some(history[history.len() - k - 1].clone())
        };

        let reversed_deltas: Vec<Delta> = trailing.iter().rev().map(|c| c.delta.reversed()).collect();
        let squished = Delta::squish(reversed_deltas)?;
        self.head_store.apply_delta(&squished)?;
        self.hash_tree.apply_delta(&self.head_store, &squished)?;
        let new_hash = self.hash_tree.update_root_hash().await?;

        let expected_hash = target
            .map(|c| c.snapshot_hash.clone())
            .unwrap_or_default();
        if !expected_hash.is_empty() && new_hash != expected_hash {
            return Err(RepoError::HashMismatch {
                expected: expected_hash,
                actual: new_hash,
            });
        }

        let removed_ids: Vec<CommitId> = trailing.iter().map(|c| c.id.clone()).collect();
        self.graph.remove_commits(&removed_ids);
        let new_head = trailing.first().and_then(|c| c.parent_id.clone());
        self.graph.set_branch_head(&self.current_branch, new_head.clone())?;

        let branch = self.graph.branch(&self.current_branch).unwrap().clone();
        self.adapter
            .apply_update(InternalRepoUpdate {
                removed_commits: removed_ids,
                updated_branches: vec![branch],
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// Fetches the remote commit graph (another [`Repository`]'s adapter
    /// or a raw [`StorageAdapter`]), diffs it against the local graph, and
    /// applies the resulting slim [`InternalRepoUpdate`], verifying the new
    /// snapshot hash against the remote branch head.
    #[instrument(skip(self, remote))]
    pub async fn pull(&mut self, remote: &dyn StorageAdapter) -> Result<(), RepoError> {
        self.pull_from(&RemoteGraph::Other(remote)).await
    }

    async fn pull_from(&mut self, remote: &RemoteGraph<'_>) -> Result<(), RepoError> {
        let remote_adapter = match remote {
            RemoteGraph::Adapter => self.adapter.clone(),
            RemoteGraph::Other(adapter) => {
                // SAFETY-free: we only ever call methods through the
                // trait object reference within this function's scope.
                return self.pull_from_graph(remote_graph_of(*adapter).await?, *adapter).await;
            }
        };
        let graph = remote_adapter.get_commit_graph().await?;
        self.pull_from_graph(graph, remote_adapter.as_ref()).await
    }

    async fn pull_from_graph(
        &mut self,
        remote_graph: CommitGraph,
        remote_adapter: &dyn StorageAdapter,
    ) -> Result<(), RepoError> {
        let previous_head_id = self.current_head_id();
        let local_ids: HashSet<&CommitId> = self.graph.commit_ids().collect();
        let remote_ids: HashSet<&CommitId> = remote_graph.commit_ids().collect();

        let added_ids: Vec<CommitId> = remote_ids.difference(&local_ids).map(|id| (*id).clone()).collect();
        let removed_ids: Vec<CommitId> = local_ids.difference(&remote_ids).map(|id| (*id).clone()).collect();

        let local_branch_names: HashSet<&str> =
            self.graph.branches().iter().map(|b| b.name.as_str()).collect();
        let remote_branch_names: HashSet<&str> =
            remote_graph.branches().iter().map(|b| b.name.as_str()).collect();

        let added_branches: Vec<Branch> = remote_graph
            .branches()
            .iter()
            .filter(|b| !local_branch_names.contains(b.name.as_str()))
            .cloned()
            .collect();
        let updated_branches: Vec<Branch> = remote_graph
            .branches()
            .iter()
            .filter(|b| {
                self.graph
                    .branch(&b.name)
                    .is_some_and(|local| local.head_commit_id != b.head_commit_id)
            })
            .cloned()
            .collect();
        let removed_branch_names: Vec<String> = local_branch_names
            .difference(&remote_branch_names)
            .map(|s| (*s).to_owned())
            .filter(|name| name != &self.current_branch)
            .collect();

        let added_commits = if added_ids.is_empty() {
            Vec::new()
        } else {
            remote_adapter.get_commits(&added_ids).await?
        };
        if added_commits.len() != added_ids.len() {
            return Err(RepoError::MissingCommitDelta(added_ids[0].clone()));
        }

        self.adapter
            .apply_update(InternalRepoUpdate {
                added_commits: added_commits.clone(),
                removed_commits: removed_ids.clone(),
                added_branches: added_branches.clone(),
                updated_branches: updated_branches.clone(),
                removed_branches: removed_branch_names.clone(),
            })
            .await?;

        for id in &removed_ids {
            self.graph.remove_commits(std::slice::from_ref(id));
        }
        for commit in added_commits {
            self.graph.add_commit(commit)?;
        }
        for branch in &added_branches {
            self.graph.add_branch(branch.name.clone())?;
            self.graph.set_branch_head(&branch.name, branch.head_commit_id.clone())?;
        }
        for branch in &updated_branches {
            self.graph.set_branch_head(&branch.name, branch.head_commit_id.clone())?;
        }
        for name in &removed_branch_names {
            self.graph.remove_branch(name, &self.current_branch)?;
        }

        if let Some(current) = self.graph.branch(&self.current_branch).cloned() {
            if let Some(remote_head_id) = current.head_commit_id.clone() {
                let commits_behind = self.commits_behind(previous_head_id.as_ref(), &remote_head_id)?;
                if !commits_behind.is_empty() {
                    debug!(count = commits_behind.len(), "applying commits behind remote head");
                    let delta = Delta::squish(commits_behind.into_iter().map(|c| c.delta))?;
                    self.head_store.apply_delta(&delta)?;
                    self.hash_tree.apply_delta(&self.head_store, &delta)?;
                    let new_hash = self.hash_tree.update_root_hash().await?;

                    let expected_hash = self
                        .graph
                        .commit(&remote_head_id)
                        .map(|c| c.snapshot_hash.clone())
                        .ok_or(RepoError::MissingCommitDelta(remote_head_id.clone()))?;
                    if new_hash != expected_hash {
                        return Err(RepoError::HashMismatch {
                            expected: expected_hash,
                            actual: new_hash,
                        });
                    }
                }
            }
        }

        self.reconcile_with_senior_branches().await
    }

    /// The ancestry path strictly after `stop_before` (exclusive) up to and
    /// including `remote_head_id`, oldest first. `stop_before` is `None`
    /// only on a replica's very first pull, in which case the whole chain
    /// down to the root is behind.
    fn commits_behind(
        &self,
        stop_before: Option<&CommitId>,
        remote_head_id: &CommitId,
    ) -> Result<Vec<Commit>, RepoError> {
        let mut chain = Vec::new();
        let mut current = Some(remote_head_id.clone());
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if stop_before.is_some_and(|stop| *stop == id) {
                break;
            }
            if !seen.insert(id.clone()) {
                return Err(GraphError::Cycle(id).into());
            }
            let commit = self
                .graph
                .commit(&id)
                .ok_or_else(|| RepoError::MissingCommitDelta(id.clone()))?;
            chain.push(commit.clone());
            current = commit.parent_id.clone();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Reconciles the current branch against every other branch by
    /// seniority (`SPEC_FULL.md` §4.5): walks both histories in lockstep,
    /// and the moment the current branch's commit at a position diverges
    /// from the dominant commit chosen from the other branches, rebases
    /// every local commit from that position onward on top of the
    /// dominant commit, filtering each one against it first. A no-op when
    /// the current branch is the only branch, or shares no divergent
    /// history with any other.
    async fn reconcile_with_senior_branches(&mut self) -> Result<(), RepoError> {
        let mut position = 0usize;
        loop {
            let local_history: Vec<Commit> = self
                .graph
                .history(&self.current_branch)?
                .into_iter()
                .cloned()
                .collect();

            let other_histories: Vec<Vec<Commit>> = self
                .graph
                .branches()
                .iter()
                .filter(|b| b.name != self.current_branch)
                .map(|b| self.graph.history(&b.name).map(|h| h.into_iter().cloned().collect()))
                .collect::<Result<_, GraphError>>()?;
            let borrowed: Vec<&[Commit]> = other_histories.iter().map(Vec::as_slice).collect();
            let Some(dominant) = pick_dominant(borrowed, position) else {
                return Ok(());
            };

            if position >= local_history.len() {
                return Ok(());
            }
            if local_history[position].id == dominant.id {
                position += 1;
                continue;
            }

            warn!(
                branch = %self.current_branch,
                position,
                dominant = %dominant.id,
                "local commit diverges from a dominant branch; rebasing"
            );
            self.rebase_onto(&local_history[position..], &dominant).await?;
            position += 1;
        }
    }

    /// Rewinds `ahead` off the current branch, adopts `dominant` (already
    /// present in the graph on another branch) as the new common head, then
    /// re-commits each of `ahead`'s changes, filtered against `dominant`'s
    /// delta, with fresh commit ids on top of it.
    async fn rebase_onto(&mut self, ahead: &[Commit], dominant: &Commit) -> Result<(), RepoError> {
        self.reset(-(ahead.len() as i64)).await?;

        self.head_store.apply_delta(&dominant.delta)?;
        self.hash_tree.apply_delta(&self.head_store, &dominant.delta)?;
        let hash = self.hash_tree.update_root_hash().await?;
        if hash != dominant.snapshot_hash {
            return Err(RepoError::HashMismatch {
                expected: dominant.snapshot_hash.clone(),
                actual: hash,
            });
        }
        self.graph
            .set_branch_head(&self.current_branch, Some(dominant.id.clone()))?;
        let branch = self.graph.branch(&self.current_branch).unwrap().clone();
        self.adapter
            .apply_update(InternalRepoUpdate {
                updated_branches: vec![branch],
                ..Default::default()
            })
            .await?;

        for original in ahead {
            let filtered = filter_junior_delta(&original.delta, &dominant.delta)?;
            self.head_store.apply_delta(&filtered)?;
            self.hash_tree.apply_delta(&self.head_store, &filtered)?;
            let snapshot_hash = self.hash_tree.update_root_hash().await?;

            let commit = Commit {
                id: CommitId::new(self.id_generator.next_id()),
                parent_id: self.current_head_id(),
                snapshot_hash,
                timestamp: self.clock.now(),
                message: original.message.clone(),
                delta: filtered,
            };
            self.graph.add_commit(commit.clone())?;
            self.graph
                .set_branch_head(&self.current_branch, Some(commit.id.clone()))?;
            let branch = self.graph.branch(&self.current_branch).unwrap().clone();
            self.adapter
                .apply_update(InternalRepoUpdate {
                    added_commits: vec![commit],
                    updated_branches: vec![branch],
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }
}

enum RemoteGraph<'a> {
    Adapter,
    Other(&'a dyn StorageAdapter),
}

async fn remote_graph_of(adapter: &dyn StorageAdapter) -> Result<CommitGraph, RepoError> {
    Ok(adapter.get_commit_graph().await?)
}
