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

//! Test fixtures for `branchstore`: a `Page`/`Note` entity registry, a
//! deterministic `Repository` builder over `MemoryAdapter`, and payload
//! helpers, mirroring the role the teacher's `testutils` crate plays for
//! `jj-lib`'s own integration tests.

use std::sync::Arc;

use branchstore::clock::Clock;
use branchstore::clock::SteppedClock;
use branchstore::config::RepoConfig;
use branchstore::entity::EntityRegistry;
use branchstore::entity::Payload;
use branchstore::entity::PlainEntityFactory;
use branchstore::id::IdGenerator;
use branchstore::id::SequentialIdGenerator;
use branchstore::repo::Repository;
use branchstore::storage::memory::MemoryAdapter;
use branchstore::store::IndexConfig;
use branchstore::store::IndexField;

/// The two entity types every fixture repository understands: `Page`
/// (optionally parented, for parent/child depth-squash tests) and `Note`
/// (always a root entity, used where a second type keeps a type-scoped
/// index honest).
pub fn test_registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry.register(Arc::new(PlainEntityFactory("Page")));
    registry.register(Arc::new(PlainEntityFactory("Note")));
    registry
}

/// A unique id index plus a type-scoped index, the minimal configuration
/// `EntityStore::new` accepts and enough to exercise the query planner.
pub fn test_index_configs() -> Vec<IndexConfig> {
    vec![
        IndexConfig::new("id", vec![IndexField::property("id")], true),
        IndexConfig::new("type", vec![IndexField::type_in(["Page", "Note"])], false),
    ]
}

/// Builds a `RepoConfig` for `branch_name` with a [`SequentialIdGenerator`]
/// seeded from `branch_name` and a [`SteppedClock`] starting at a fixed
/// instant, so commit ids and timestamps are reproducible across test
/// runs.
pub fn test_config(branch_name: &str) -> RepoConfig {
    let mut config = RepoConfig::new(test_registry(), test_index_configs(), branch_name);
    config.id_generator = Arc::new(SequentialIdGenerator::new(format!("{branch_name}-c")));
    config.clock = Arc::new(SteppedClock::starting_at(1_700_000_000_000));
    config
}

/// Builds a `RepoConfig` for `branch_name` using caller-supplied id and
/// clock collaborators, for tests that need specific commit ids or
/// timestamps rather than the default sequential/stepped fixtures.
pub fn test_config_with(
    branch_name: &str,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
) -> RepoConfig {
    let mut config = RepoConfig::new(test_registry(), test_index_configs(), branch_name);
    config.id_generator = id_generator;
    config.clock = clock;
    config
}

/// Creates a fresh [`Repository`] on its own [`MemoryAdapter`], checked out
/// on `branch_name`.
pub async fn new_repo(branch_name: &str) -> (Repository, Arc<MemoryAdapter>) {
    let adapter = Arc::new(MemoryAdapter::new());
    let repo = Repository::create(test_config(branch_name), adapter.clone())
        .await
        .unwrap();
    (repo, adapter)
}

/// Creates a second [`Repository`] as a new branch on an existing shared
/// [`MemoryAdapter`], then pulls once against that same adapter so its
/// local commit graph observes every branch already present (mirroring a
/// second developer cloning a project another developer already pushed
/// to).
pub async fn join_repo(adapter: Arc<MemoryAdapter>, branch_name: &str) -> Repository {
    let mut repo = Repository::create(test_config(branch_name), adapter.clone())
        .await
        .unwrap();
    repo.pull(adapter.as_ref()).await.unwrap();
    repo
}

/// A single-field `Payload` helper: `{"name": "Test Page"}`.
pub fn page_payload(name: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("name".to_owned(), serde_json::json!(name));
    payload
}

/// A single-field `Payload` helper: `{"body": "..."}`.
pub fn note_payload(body: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("body".to_owned(), serde_json::json!(body));
    payload
}
