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

//! Fresh id generation. Commit ids (and the default entity-id helper some
//! callers may use) are not content-derived: they are random strings drawn
//! from `[a-z0-9]{8}`. Tests substitute a deterministic generator so that
//! fixtures are reproducible.

use std::sync::Mutex;

use rand::Rng as _;
use rand::SeedableRng as _;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DEFAULT_LEN: usize = 8;

/// Supplies fresh, opaque ids for commits (and ad hoc entity ids, if the
/// caller wants one). Implementations must never repeat an id within the
/// lifetime of a single replica.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default generator: cryptographically-insignificant random
/// `[a-z0-9]{8}` strings, matching the specification's collaborator
/// contract (§6).
pub struct RandomIdGenerator {
    rng: Mutex<rand_chacha::ChaCha8Rng>,
}

impl RandomIdGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha8Rng::from_os_rng()),
        }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap();
        (0..DEFAULT_LEN)
            .map(|_| {
                let idx = rng.random_range(0..ALPHABET.len());
                ALPHABET[idx] as char
            })
            .collect()
    }
}

/// Deterministic generator for tests: returns `prefix-0`, `prefix-1`, ...
pub struct SequentialIdGenerator {
    prefix: String,
    next: Mutex<u64>,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Mutex::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let mut next = self.next.lock().unwrap();
        let id = format!("{}-{}", self.prefix, *next);
        *next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_generator_produces_well_formed_ids() {
        let gen = RandomIdGenerator::new();
        for _ in 0..100 {
            let id = gen.next_id();
            assert_eq!(id.len(), DEFAULT_LEN);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn sequential_generator_is_deterministic() {
        let gen = SequentialIdGenerator::new("c");
        assert_eq!(gen.next_id(), "c-0");
        assert_eq!(gen.next_id(), "c-1");
        assert_eq!(gen.next_id(), "c-2");
    }
}
