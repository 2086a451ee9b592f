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

//! Cross-replica update notification (`SPEC_FULL.md` §5, §6): a
//! process-local, multiplexed channel carrying `{project_id,
//! origin_replica_id, update}` messages. A replica that observes a message
//! not originating from itself, for a project it has loaded, is expected to
//! `pull` against its own adapter in response — this bus only delivers the
//! notification, it never drives the pull itself.

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::commit::Commit;
use crate::graph::CommitGraph;

/// Distinguishes the replica that published a [`RepoUpdateMessage`] from
/// every other replica sharing the same bus, so a publisher can recognize
/// and ignore its own echo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// The payload of a repo-update notification: the commit graph as of the
/// publishing replica's last write, plus the commits it added. Mirrors the
/// shape of an [`crate::storage::InternalRepoUpdate`]'s additive half —
/// recipients still pull for the authoritative, minimal update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoUpdateEvent {
    pub commit_graph: CommitGraph,
    pub new_commits: Vec<Commit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoUpdateMessage {
    pub project_id: String,
    pub origin_replica_id: ReplicaId,
    pub update: RepoUpdateEvent,
}

/// A named, multiplexed broadcast channel over [`RepoUpdateMessage`]s.
/// Every subscriber obtained via [`RepoUpdateBus::subscribe`] receives every
/// message published after it subscribes; a lagging subscriber observes
/// `tokio::sync::broadcast::error::RecvError::Lagged` rather than silently
/// missing updates, per `tokio::sync::broadcast`'s own contract.
pub struct RepoUpdateBus {
    sender: broadcast::Sender<RepoUpdateMessage>,
}

impl RepoUpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes `message`. Publishing with no subscribers is not an error
    /// — a lone replica publishing its own updates with nobody else
    /// listening is the common case, not a misconfiguration.
    pub fn publish(&self, message: RepoUpdateMessage) {
        let _ = self.sender.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepoUpdateMessage> {
        self.sender.subscribe()
    }
}

impl Default for RepoUpdateBus {
    fn default() -> Self {
        Self::new(64)
    }
}
