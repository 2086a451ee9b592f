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

//! A thin [`StorageAdapter`] that forwards every call to a caller-supplied
//! [`RemoteTransport`], so a repository can `pull` from a remote service
//! the same way it pulls from a local adapter (`SPEC_FULL.md` §4.4's
//! "remote is either another Repository or a raw storage adapter"). The
//! transport trait is the seam: this crate does not know or care whether
//! it is backed by HTTP, a native socket, or an in-process channel.

use async_trait::async_trait;

use crate::commit::Commit;
use crate::commit::CommitId;
use crate::error::AdapterError;
use crate::graph::CommitGraph;
use crate::storage::InternalRepoUpdate;
use crate::storage::StorageAdapter;

/// The transport a [`RemoteAdapter`] drives. Implementations own whatever
/// connection/session state a real remote protocol needs; this crate only
/// ever calls these four methods.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn fetch_commit_graph(&self) -> Result<CommitGraph, AdapterError>;
    async fn fetch_commits(&self, ids: &[CommitId]) -> Result<Vec<Commit>, AdapterError>;
    async fn push_update(&self, update: InternalRepoUpdate) -> Result<(), AdapterError>;
    async fn disconnect(&self) -> Result<(), AdapterError>;
}

pub struct RemoteAdapter<T: RemoteTransport> {
    transport: T,
}

impl<T: RemoteTransport> RemoteAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: RemoteTransport> StorageAdapter for RemoteAdapter<T> {
    async fn get_commit_graph(&self) -> Result<CommitGraph, AdapterError> {
        self.transport.fetch_commit_graph().await
    }

    async fn get_commits(&self, ids: &[CommitId]) -> Result<Vec<Commit>, AdapterError> {
        self.transport.fetch_commits(ids).await
    }

    async fn apply_update(&self, update: InternalRepoUpdate) -> Result<(), AdapterError> {
        self.transport.push_update(update).await
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.transport.disconnect().await
    }

    async fn erase_storage(&self) -> Result<(), AdapterError> {
        Err(AdapterError::Rejected(
            "remote adapters do not support erase_storage".to_owned(),
        ))
    }
}
