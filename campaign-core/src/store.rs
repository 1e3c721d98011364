//! On-disk campaign storage.
//!
//! A campaign is a directory. Each collection is one pretty-printed JSON
//! document, `<dir>/<key>.json`. Binary content (images, audio, tactical
//! maps) lives in an object store under `<dir>/objects/<bucket>/<id>`.

use crate::ids::RecordId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored '{key}' is not valid: {message}")]
    Corrupt { key: Collection, message: String },
}

/// Fixed document keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Party,
    Stash,
    Npcs,
    Quests,
    Notes,
    Logs,
    Lore,
    Playlists,
    Combat,
    ActiveLocation,
    TravelState,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Party,
        Collection::Stash,
        Collection::Npcs,
        Collection::Quests,
        Collection::Notes,
        Collection::Logs,
        Collection::Lore,
        Collection::Playlists,
        Collection::Combat,
        Collection::ActiveLocation,
        Collection::TravelState,
        Collection::Settings,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Collection::Party => "party",
            Collection::Stash => "stash",
            Collection::Npcs => "npcs",
            Collection::Quests => "quests",
            Collection::Notes => "notes",
            Collection::Logs => "logs",
            Collection::Lore => "lore",
            Collection::Playlists => "playlists",
            Collection::Combat => "combat",
            Collection::ActiveLocation => "active_location",
            Collection::TravelState => "travel_state",
            Collection::Settings => "settings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Collection::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

/// A stored document as text, with its parse error if it is not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub text: String,
    pub error: Option<String>,
}

impl RawDocument {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON documents for one campaign.
#[derive(Debug, Clone)]
pub struct CampaignStore {
    dir: PathBuf,
    objects: ObjectStore,
}

impl CampaignStore {
    /// Open (creating if needed) a campaign directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        let objects = ObjectStore::open(dir.join("objects")).await?;
        Ok(Self { dir, objects })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    fn path(&self, key: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", key.key()))
    }

    /// Load a document. `Ok(None)` when it was never written.
    pub async fn load<T: DeserializeOwned>(
        &self,
        key: Collection,
    ) -> Result<Option<T>, PersistError> {
        let Some(text) = read_optional(&self.path(key)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistError::Corrupt {
                key,
                message: e.to_string(),
            })
    }

    /// Write a document, replacing the previous version.
    pub async fn save<T: Serialize>(&self, key: Collection, value: &T) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(value)?;
        self.write(key, &content).await
    }

    /// Delete a document. Missing documents are fine.
    pub async fn remove(&self, key: Collection) -> Result<(), PersistError> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => {
                tracing::debug!(key = key.key(), "document removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Collections that currently have a stored document.
    pub async fn keys(&self) -> Result<Vec<Collection>, PersistError> {
        let mut keys = Vec::new();
        for key in Collection::ALL {
            if fs::try_exists(self.path(key)).await? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Raw text of a document, flagged when it does not parse.
    pub async fn raw(&self, key: Collection) -> Result<Option<RawDocument>, PersistError> {
        let Some(text) = read_optional(&self.path(key)).await? else {
            return Ok(None);
        };
        let error = serde_json::from_str::<serde_json::Value>(&text)
            .err()
            .map(|e| e.to_string());
        Ok(Some(RawDocument { text, error }))
    }

    /// Replace a document with hand-edited text. Invalid JSON is refused
    /// and the stored document is left alone.
    pub async fn write_raw(&self, key: Collection, text: &str) -> Result<(), PersistError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let content = serde_json::to_string_pretty(&value)?;
        self.write(key, &content).await
    }

    async fn write(&self, key: Collection, content: &str) -> Result<(), PersistError> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        tracing::debug!(key = key.key(), bytes = content.len(), "document saved");
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, PersistError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Object store
// ============================================================================

/// Object buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Images,
    Audio,
    Maps,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Images, Bucket::Audio, Bucket::Maps];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Images => "images",
            Bucket::Audio => "audio",
            Bucket::Maps => "maps",
        }
    }
}

/// Binary objects keyed by id.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        for bucket in Bucket::ALL {
            fs::create_dir_all(dir.join(bucket.name())).await?;
        }
        Ok(Self { dir })
    }

    fn path(&self, bucket: Bucket, id: RecordId) -> PathBuf {
        self.dir.join(bucket.name()).join(id.to_string())
    }

    pub async fn put(
        &self,
        bucket: Bucket,
        id: RecordId,
        bytes: &[u8],
    ) -> Result<(), PersistError> {
        fs::write(self.path(bucket, id), bytes).await?;
        tracing::debug!(bucket = bucket.name(), %id, bytes = bytes.len(), "object stored");
        Ok(())
    }

    pub async fn get(&self, bucket: Bucket, id: RecordId) -> Result<Option<Vec<u8>>, PersistError> {
        match fs::read(self.path(bucket, id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether anything was deleted.
    pub async fn delete(&self, bucket: Bucket, id: RecordId) -> Result<bool, PersistError> {
        match fs::remove_file(self.path(bucket, id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids in a bucket, oldest first.
    pub async fn list(&self, bucket: Bucket) -> Result<Vec<RecordId>, PersistError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(self.dir.join(bucket.name())).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<RecordId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn put_json<T: Serialize>(
        &self,
        bucket: Bucket,
        id: RecordId,
        value: &T,
    ) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put(bucket, id, &bytes).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        bucket: Bucket,
        id: RecordId,
    ) -> Result<Option<T>, PersistError> {
        match self.get(bucket, id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, CampaignStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CampaignStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_dir, store) = store().await;
        assert_eq!(store.load::<Vec<String>>(Collection::Notes).await.unwrap(), None);

        store
            .save(Collection::Notes, &vec!["a".to_string()])
            .await
            .unwrap();
        let loaded: Option<Vec<String>> = store.load(Collection::Notes).await.unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string()]));
        assert!(store.dir().join("notes.json").exists());
        assert_eq!(store.keys().await.unwrap(), vec![Collection::Notes]);
    }

    #[tokio::test]
    async fn test_corrupt_document_surfaces_as_raw_text() {
        let (dir, store) = store().await;
        std::fs::write(dir.path().join("npcs.json"), "[{\"name\": ").unwrap();

        let err = store.load::<Vec<String>>(Collection::Npcs).await.unwrap_err();
        assert!(matches!(err, PersistError::Corrupt { key: Collection::Npcs, .. }));

        let raw = store.raw(Collection::Npcs).await.unwrap().unwrap();
        assert_eq!(raw.text, "[{\"name\": ");
        assert!(!raw.is_valid());
    }

    #[tokio::test]
    async fn test_write_raw_refuses_invalid_json() {
        let (_dir, store) = store().await;
        store.write_raw(Collection::Lore, "[]").await.unwrap();

        assert!(store.write_raw(Collection::Lore, "{oops").await.is_err());
        let raw = store.raw(Collection::Lore).await.unwrap().unwrap();
        assert!(raw.is_valid());
        assert_eq!(raw.text, "[]");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, store) = store().await;
        store.save(Collection::TravelState, &1).await.unwrap();
        store.remove(Collection::TravelState).await.unwrap();
        store.remove(Collection::TravelState).await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_object_store() {
        let (dir, store) = store().await;
        let objects = store.objects();
        let id = RecordId::new();

        objects.put(Bucket::Audio, id, b"RIFF").await.unwrap();
        assert!(dir.path().join("objects/audio").join(id.to_string()).exists());
        assert_eq!(objects.get(Bucket::Audio, id).await.unwrap(), Some(b"RIFF".to_vec()));
        assert_eq!(objects.get(Bucket::Images, id).await.unwrap(), None);
        assert_eq!(objects.list(Bucket::Audio).await.unwrap(), vec![id]);

        assert!(objects.delete(Bucket::Audio, id).await.unwrap());
        assert!(!objects.delete(Bucket::Audio, id).await.unwrap());
    }

    #[test]
    fn test_collection_keys() {
        assert_eq!(Collection::ActiveLocation.key(), "active_location");
        assert_eq!("travel_state".parse::<Collection>(), Ok(Collection::TravelState));
        assert!("nope".parse::<Collection>().is_err());
        for key in Collection::ALL {
            let json = serde_json::to_value(key).unwrap();
            assert_eq!(json, key.key());
        }
    }
}
