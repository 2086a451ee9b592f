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

//! Error taxonomy: Validation, Integrity, Protocol, Adapter.
//!
//! Each subsystem defines its own `thiserror` enum; all of them convert into
//! [`BranchstoreError`], which exposes [`BranchstoreError::category`] so
//! callers can implement the propagation policy without matching on every
//! concrete variant.

use std::fmt;

use thiserror::Error;

use crate::change::ChangeError;
use crate::hash_tree::HashTreeError;
use crate::repo::RepoError;
use crate::store::StoreError;

/// Coarse category a concrete error belongs to, used to select propagation
/// policy: validation errors leave all state untouched, integrity errors
/// require the repo to be re-opened, protocol errors abort only the failing
/// call, adapter errors propagate with the cache left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Integrity,
    Protocol,
    Adapter,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Integrity => "integrity",
            Self::Protocol => "protocol",
            Self::Adapter => "adapter",
        };
        f.write_str(s)
    }
}

/// Error returned by a [`crate::storage::StorageAdapter`] implementation.
/// Adapters that want to report a cause this crate does not know about use
/// [`AdapterError::Other`].
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter I/O failed: {0}")]
    Io(String),
    #[error("adapter rejected the update: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Top-level error type returned by public `branchstore` APIs.
#[derive(Debug, Error)]
pub enum BranchstoreError {
    #[error(transparent)]
    Change(#[from] ChangeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    HashTree(#[from] HashTreeError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl BranchstoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Change(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::HashTree(e) => e.category(),
            Self::Repo(e) => e.category(),
            Self::Adapter(_) => ErrorCategory::Adapter,
        }
    }
}

pub type Result<T> = std::result::Result<T, BranchstoreError>;
