//! Local key-value persistence for settings, history and the onboarding marker.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::domain::AppError;

pub const ONBOARDING_KEY: &str = "onboarding_complete";
pub const HISTORY_KEY: &str = "download_history";
pub const LANGUAGE_KEY: &str = "language";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::PersistenceDegraded(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| StorageError::Poisoned)
}

/// All keys in one JSON object file, rewritten on every mutation.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens `path`; a missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable settings file");
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, format!("{json}\n"))?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries)?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Store whose every operation fails, for degraded-persistence paths.
    pub struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::open(&path);
        store.set(ONBOARDING_KEY, "1").unwrap();
        store.set(LANGUAGE_KEY, "\"pt\"").unwrap();
        store.remove(LANGUAGE_KEY).unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get(ONBOARDING_KEY).unwrap(), Some("1".to_string()));
        assert_eq!(reopened.get(LANGUAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_malformed_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);

        store.set(HISTORY_KEY, "[]").unwrap();
        assert_eq!(
            JsonFileStore::open(&path).get(HISTORY_KEY).unwrap(),
            Some("[]".to_string())
        );
    }

    #[test]
    fn test_storage_error_maps_to_degraded() {
        let err: AppError = BrokenStore.get("x").unwrap_err().into();
        assert!(matches!(err, AppError::PersistenceDegraded(_)));
    }
}
