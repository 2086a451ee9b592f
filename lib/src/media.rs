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

//! The media store companion contract (`SPEC_FULL.md` §6): add/get/remove
//! and trash/clean-trash for binary blobs referenced by entity payloads
//! (typically by path or id, never inline), content-addressed by a
//! truncated SHA-256. Independent of the commit graph: media is never
//! versioned, squished, or reconciled by [`crate::sync`].

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::Digest as _;
use sha2::Sha256;
use thiserror::Error;

use crate::entity::EntityId;
use crate::error::ErrorCategory;

/// Width, in hex characters, of a media content hash — a SHA-256 digest
/// truncated for a shorter, still-collision-resistant identifier
/// (`SPEC_FULL.md` §6).
pub const CONTENT_HASH_HEX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MediaId(pub String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub path: String,
    pub parent_id: Option<EntityId>,
    pub content_hash: String,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media item {0:?} not found")]
    NotFound(String),
    #[error("content hash mismatch for media item {id:?}: expected {expected}, got {actual}")]
    ContentHashMismatch {
        id: String,
        expected: String,
        actual: String,
    },
}

impl MediaError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) | Self::ContentHashMismatch { .. } => ErrorCategory::Validation,
        }
    }
}

/// The truncated-SHA-256 content hash of `blob`, lowercase hex,
/// [`CONTENT_HASH_HEX_LEN`] characters wide.
pub fn content_hash(blob: &[u8]) -> String {
    let digest = Sha256::digest(blob);
    hex::encode(digest)[..CONTENT_HASH_HEX_LEN].to_owned()
}

/// The companion blob-store contract (`SPEC_FULL.md` §6). A host supplies
/// its own implementation over its real blob backend (filesystem, object
/// storage, ...) the same way it supplies a [`crate::storage::StorageAdapter`]
/// for the commit graph; this crate provides [`InMemoryMediaStore`] for
/// tests and small embedded hosts.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn add_media(
        &self,
        blob: Vec<u8>,
        path: &str,
        parent_id: Option<EntityId>,
    ) -> Result<MediaItem, MediaError>;

    async fn get_media(&self, id: &MediaId, content_hash: &str) -> Result<Vec<u8>, MediaError>;

    async fn remove_media(&self, id: &MediaId, content_hash: &str) -> Result<(), MediaError>;

    /// Marks a media item trashed without removing it; a trashed item is
    /// excluded from path de-duplication but still answers `get_media`
    /// until [`MediaStore::clean_trash`] sweeps it.
    async fn move_media_to_trash(&self, id: &MediaId, content_hash: &str) -> Result<(), MediaError>;

    async fn clean_trash(&self) -> Result<(), MediaError>;
}

struct StoredMedia {
    item: MediaItem,
    blob: Vec<u8>,
    trashed: bool,
}

/// An in-memory [`MediaStore`].
#[derive(Default)]
pub struct InMemoryMediaStore {
    items: Mutex<HashMap<MediaId, StoredMedia>>,
    next_id: Mutex<u64>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&self) -> MediaId {
        let mut next = self.next_id.lock().unwrap();
        let id = MediaId::new(format!("media-{next}"));
        *next += 1;
        id
    }

    fn checked(&self, id: &MediaId, content_hash: &str) -> Result<(), MediaError> {
        let items = self.items.lock().unwrap();
        let stored = items.get(id).ok_or_else(|| MediaError::NotFound(id.0.clone()))?;
        if stored.item.content_hash != content_hash {
            return Err(MediaError::ContentHashMismatch {
                id: id.0.clone(),
                expected: stored.item.content_hash.clone(),
                actual: content_hash.to_owned(),
            });
        }
        Ok(())
    }

    /// Appends `_n` before the extension until `candidate` is unique among
    /// live (non-trashed) items sharing `parent_id` (`SPEC_FULL.md` §6).
    fn dedupe_path(&self, candidate: &str, parent_id: &Option<EntityId>) -> String {
        let items = self.items.lock().unwrap();
        let taken: HashSet<&str> = items
            .values()
            .filter(|stored| !stored.trashed && &stored.item.parent_id == parent_id)
            .map(|stored| stored.item.path.as_str())
            .collect();
        if !taken.contains(candidate) {
            return candidate.to_owned();
        }
        let (stem, ext) = split_extension(candidate);
        let mut n = 1u64;
        loop {
            let attempt = match ext {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            if !taken.contains(attempt.as_str()) {
                return attempt;
            }
            n += 1;
        }
    }
}

fn split_extension(path: &str) -> (&str, Option<&str>) {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (path, None),
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn add_media(
        &self,
        blob: Vec<u8>,
        path: &str,
        parent_id: Option<EntityId>,
    ) -> Result<MediaItem, MediaError> {
        let hash = content_hash(&blob);
        let path = self.dedupe_path(path, &parent_id);
        let id = self.fresh_id();
        let item = MediaItem {
            id: id.clone(),
            path,
            parent_id,
            content_hash: hash,
        };
        self.items.lock().unwrap().insert(
            id,
            StoredMedia {
                item: item.clone(),
                blob,
                trashed: false,
            },
        );
        Ok(item)
    }

    async fn get_media(&self, id: &MediaId, content_hash: &str) -> Result<Vec<u8>, MediaError> {
        self.checked(id, content_hash)?;
        Ok(self.items.lock().unwrap().get(id).unwrap().blob.clone())
    }

    async fn remove_media(&self, id: &MediaId, content_hash: &str) -> Result<(), MediaError> {
        self.checked(id, content_hash)?;
        self.items.lock().unwrap().remove(id);
        Ok(())
    }

    async fn move_media_to_trash(&self, id: &MediaId, content_hash: &str) -> Result<(), MediaError> {
        self.checked(id, content_hash)?;
        self.items.lock().unwrap().get_mut(id).unwrap().trashed = true;
        Ok(())
    }

    async fn clean_trash(&self) -> Result<(), MediaError> {
        self.items.lock().unwrap().retain(|_, stored| !stored.trashed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_paths_get_suffixed() {
        let store = InMemoryMediaStore::new();
        let a = store.add_media(b"a".to_vec(), "photo.png", None).await.unwrap();
        let b = store.add_media(b"b".to_vec(), "photo.png", None).await.unwrap();
        assert_eq!(a.path, "photo.png");
        assert_eq!(b.path, "photo_1.png");
    }

    #[tokio::test]
    async fn de_duplication_is_scoped_per_parent() {
        let store = InMemoryMediaStore::new();
        let parent_a = EntityId::new("a");
        let parent_b = EntityId::new("b");
        let under_a = store
            .add_media(b"x".to_vec(), "cover.png", Some(parent_a))
            .await
            .unwrap();
        let under_b = store
            .add_media(b"y".to_vec(), "cover.png", Some(parent_b))
            .await
            .unwrap();
        assert_eq!(under_a.path, "cover.png");
        assert_eq!(under_b.path, "cover.png");
    }

    #[test]
    fn content_hash_is_truncated_sha256() {
        let hash = content_hash(b"hello");
        assert_eq!(hash.len(), CONTENT_HASH_HEX_LEN);
        assert_eq!(hash, content_hash(b"hello"));
        assert_ne!(hash, content_hash(b"goodbye"));
    }

    #[tokio::test]
    async fn wrong_content_hash_is_rejected() {
        let store = InMemoryMediaStore::new();
        let item = store.add_media(b"x".to_vec(), "a.bin", None).await.unwrap();
        assert!(matches!(
            store.get_media(&item.id, "not-the-hash").await,
            Err(MediaError::ContentHashMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn trashed_media_is_removed_on_clean() {
        let store = InMemoryMediaStore::new();
        let item = store.add_media(b"x".to_vec(), "a.bin", None).await.unwrap();
        store.move_media_to_trash(&item.id, &item.content_hash).await.unwrap();
        store.clean_trash().await.unwrap();
        assert!(matches!(
            store.get_media(&item.id, &item.content_hash).await,
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn trashed_media_frees_its_path_for_reuse() {
        let store = InMemoryMediaStore::new();
        let first = store.add_media(b"x".to_vec(), "a.png", None).await.unwrap();
        store.move_media_to_trash(&first.id, &first.content_hash).await.unwrap();
        let second = store.add_media(b"y".to_vec(), "a.png", None).await.unwrap();
        assert_eq!(second.path, "a.png");
    }
}
