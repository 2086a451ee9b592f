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

//! Per-replica operation serialization (`SPEC_FULL.md` §5): a replica is
//! single-threaded and cooperative, but `commit`/`pull`/`reset` each
//! suspend at storage-adapter and hash-compute calls, so two concurrently
//! enqueued operations against the same [`crate::repo::Repository`] could
//! otherwise interleave. [`OperationQueue`] admits one at a time, in
//! enqueue order.

use std::future::Future;

use tokio::sync::Mutex;

/// Runs operations against a shared [`crate::repo::Repository`] to
/// completion one at a time, first-enqueued-first-run. Wrap every
/// mutating call — `commit`, `pull`, `reset` — in [`OperationQueue::run`]
/// so a suspension point inside one never lets a second call observe or
/// mutate intermediate state.
#[derive(Default)]
pub struct OperationQueue {
    lock: Mutex<()>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Awaits admission, then drives `op` to completion before releasing
    /// the next queued caller.
    pub async fn run<F, T>(&self, op: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.lock.lock().await;
        op.await
    }
}
