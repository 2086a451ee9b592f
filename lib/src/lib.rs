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

//! `branchstore`: a client-embedded, content-addressed, branch-based
//! version-control engine for structured entity data (`SPEC_FULL.md` §1).
//!
//! The core, dependency-ordered leaves-first:
//!
//! - [`entity`] — typed record identity, depth-bounded payloads, and the
//!   type registry.
//! - [`change`] / [`delta`] — the per-entity delta algebra and the ordered
//!   collection of changes it folds over.
//! - [`store`] — the indexed, in-memory entity store a commit's delta is
//!   materialized against.
//! - [`canonical_json`] / [`hash_tree`] — canonical serialization and the
//!   incrementally-maintained snapshot hash.
//! - [`commit`] / [`graph`] — commit metadata and the branch/commit graph.
//! - [`repo`] — the repository tying all of the above to a
//!   [`storage::StorageAdapter`].
//! - [`sync`] — deterministic, seniority-based reconciliation between
//!   branches, invoked by [`repo::Repository::pull`].
//!
//! Ambient concerns: [`storage`] (pluggable persistence), [`broadcast`] and
//! [`queue`] (the cross-replica and per-replica concurrency model),
//! [`media`] (the companion blob store), [`config`] (host-supplied static
//! configuration), [`id`] and [`clock`] (pluggable id/time sources, swapped
//! for deterministic fixtures in tests), and [`error`] (the unified error
//! taxonomy).

pub mod broadcast;
pub mod canonical_json;
pub mod change;
pub mod clock;
pub mod commit;
pub mod config;
pub mod delta;
pub mod entity;
pub mod error;
pub mod graph;
pub mod hash_tree;
pub mod id;
pub mod media;
pub mod queue;
pub mod repo;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::BranchstoreError;
pub use error::Result;
pub use repo::Repository;
