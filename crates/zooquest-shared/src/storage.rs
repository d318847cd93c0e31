//! Key-value storage for persisted app state.
//!
//! Every record is a JSON blob under a fixed string key. `FileStore` keeps one
//! `<key>.json` file per key in a data directory; `MemoryStore` backs tests and
//! ephemeral sessions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, ZooQuestError};

/// Storage keys used by the engine
pub mod keys {
    pub const USER_PROFILE: &str = "userProfile";
    pub const USER_QUESTS: &str = "userQuests";
    pub const COMPLETED_TASKS: &str = "completedConservationTasks";
    pub const ALLOCATIONS: &str = "conservationAllocations";
    pub const REFLECTIONS: &str = "conservationReflections";

    pub const ALL: [&str; 5] = [
        USER_PROFILE,
        USER_QUESTS,
        COMPLETED_TASKS,
        ALLOCATIONS,
        REFLECTIONS,
    ];
}

/// String-keyed blob storage
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for a key, `None` if it was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value for a key
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key inside a data directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ZooQuestError::Storage(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Write-then-rename so a crash never leaves a half-written blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ZooQuestError::Internal("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read and parse a record. `Ok(None)` when absent.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Read a record, degrading to `T::default()` on absence or any failure.
pub fn read_json_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match read_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("No stored value for {}, using default", key);
            T::default()
        }
        Err(e) => {
            warn!("Failed to load {}: {}. Using default", key, e);
            T::default()
        }
    }
}

/// Serialize and persist a record
pub fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get(keys::USER_PROFILE).unwrap().is_none());
        store.set(keys::USER_PROFILE, "{}").unwrap();
        assert_eq!(store.get(keys::USER_PROFILE).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_store_writes_one_file_per_key() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        store.set(keys::ALLOCATIONS, r#"{"project1":10}"#).unwrap();
        assert!(dir.path().join("data").join("conservationAllocations.json").exists());
        assert!(!dir.path().join("data").join("conservationAllocations.json.tmp").exists());

        let reopened = FileStore::new(dir.path().join("data"));
        assert_eq!(
            reopened.get(keys::ALLOCATIONS).unwrap().as_deref(),
            Some(r#"{"project1":10}"#)
        );
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.set("../escape", "{}").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_read_json_or_default_on_corrupt_blob() {
        let store = MemoryStore::new();
        store.set(keys::ALLOCATIONS, "not json").unwrap();
        let allocations: BTreeMap<String, u32> = read_json_or_default(&store, keys::ALLOCATIONS);
        assert!(allocations.is_empty());
        assert!(read_json::<BTreeMap<String, u32>>(&store, keys::ALLOCATIONS).is_err());
    }
}
