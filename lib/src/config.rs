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

//! Repository configuration (`SPEC_FULL.md` §10). Unlike the teacher's
//! layered-TOML `config.rs`/`config_resolver.rs` (this engine is embedded
//! in a host application, not a deployable service with a file tree to
//! read), `RepoConfig` is constructed programmatically by the host and
//! validated once at `EntityStore::new` / `Repository::create`/`open`
//! time, following the same validate-then-freeze shape.

use std::sync::Arc;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::entity::EntityRegistry;
use crate::id::IdGenerator;
use crate::id::RandomIdGenerator;
use crate::store::IndexConfig;

/// A repository's static configuration: the set of field types this engine
/// knows how to deserialize, how head-store entities are indexed, which
/// branch a fresh repository starts on, and the id/clock collaborators.
pub struct RepoConfig {
    pub registry: EntityRegistry,
    pub index_configs: Vec<IndexConfig>,
    pub default_branch: String,
    pub id_generator: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

impl RepoConfig {
    /// Builds a config with the default random id generator and wall
    /// clock. Callers needing deterministic fixtures should set
    /// `id_generator`/`clock` directly afterwards.
    pub fn new(
        registry: EntityRegistry,
        index_configs: Vec<IndexConfig>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            index_configs,
            default_branch: default_branch.into(),
            id_generator: Arc::new(RandomIdGenerator::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Whether `other` is compatible with a repository already cached
    /// against `self` — a mismatch on re-open is a Protocol error
    /// (`SPEC_FULL.md` §7).
    pub fn compatible_with(&self, other: &RepoConfig) -> bool {
        self.default_branch == other.default_branch
            && self.index_configs.len() == other.index_configs.len()
            && self
                .index_configs
                .iter()
                .zip(&other.index_configs)
                .all(|(a, b)| a.name == b.name && a.unique == b.unique)
    }
}
