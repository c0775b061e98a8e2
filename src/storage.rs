//! Key/value persistence with per-key expiry.
//!
//! Values are opaque strings that expire like browser cookies: every `set`
//! stamps a fresh expiry and reads past that instant see nothing.

use chrono::{DateTime, TimeDelta, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const JAR_FILE: &str = "storage.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("expiry of {0} is out of range")]
    ExpiryOutOfRange(TimeDelta),
}

fn expiry_after(now: DateTime<Utc>, ttl: TimeDelta) -> Result<DateTime<Utc>, StorageError> {
    now.checked_add_signed(ttl)
        .ok_or(StorageError::ExpiryOutOfRange(ttl))
}

pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str, ttl: TimeDelta) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    value: String,
    expires: DateTime<Utc>,
}

impl Entry {
    fn live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires > now
    }
}

type Jar = BTreeMap<String, Entry>;

/// JSON jar file in the user's data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("org", "treemap", "treemap").ok_or(StorageError::NoDataDirectory)?;
        Ok(Self {
            root: dirs.data_local_dir().to_path_buf(),
        })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn jar_path(&self) -> PathBuf {
        self.root.join(JAR_FILE)
    }

    fn read_jar(&self) -> Result<Jar, StorageError> {
        let path = self.jar_path();
        if !path.exists() {
            return Ok(Jar::new());
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice(&bytes) {
            Ok(jar) => Ok(jar),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "storage file is corrupt, starting empty");
                Ok(Jar::new())
            }
        }
    }

    fn write_jar(&self, jar: &Jar) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let bytes = serde_json::to_vec_pretty(jar)?;
        let tmp = self.root.join(format!("{JAR_FILE}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.jar_path())?;
        Ok(())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        Ok(self
            .read_jar()?
            .remove(key)
            .filter(|entry| entry.live_at(now))
            .map(|entry| entry.value))
    }

    fn set_at(
        &self,
        key: &str,
        value: &str,
        expires: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut jar = self.read_jar()?;
        jar.retain(|_, entry| entry.live_at(now));
        jar.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires,
            },
        );
        self.write_jar(&jar)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.get_at(key, Utc::now())
    }

    fn set(&mut self, key: &str, value: &str, ttl: TimeDelta) -> Result<(), StorageError> {
        let now = Utc::now();
        self.set_at(key, value, expiry_after(now, ttl)?, now)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut jar = self.read_jar()?;
        if jar.remove(key).is_some() {
            self.write_jar(&jar)?;
        }
        Ok(())
    }
}

/// In-process storage with the same expiry rules as [`FileStorage`].
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Jar,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a raw value, bypassing serialization, as if another process wrote it.
    pub fn with_raw(key: &str, value: &str) -> Self {
        let mut storage = Self::new();
        storage.entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires: DateTime::<Utc>::MAX_UTC,
            },
        );
        storage
    }

    pub fn expires(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.expires)
    }
}

#[cfg(test)]
impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Utc::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.live_at(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&mut self, key: &str, value: &str, ttl: TimeDelta) -> Result<(), StorageError> {
        let now = Utc::now();
        let expires = expiry_after(now, ttl)?;
        self.entries.retain(|_, entry| entry.live_at(now));
        self.entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires,
            },
        );
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut storage = FileStorage::with_root(temp.path());

        storage
            .set("plantingRecords", "[]", TimeDelta::days(7))
            .expect("set should succeed");

        let reopened = FileStorage::with_root(temp.path());
        assert_eq!(
            reopened.get("plantingRecords").expect("get should succeed"),
            Some("[]".to_owned())
        );
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = FileStorage::with_root(temp.path().join("nested"));
        assert_eq!(storage.get("anything").expect("get should succeed"), None);
    }

    #[test]
    fn expired_entries_are_hidden_and_purged() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = FileStorage::with_root(temp.path());
        let now = Utc::now();

        storage
            .set_at("old", "x", now - TimeDelta::seconds(1), now - TimeDelta::days(8))
            .unwrap();
        assert_eq!(storage.get_at("old", now).unwrap(), None);

        storage
            .set_at("new", "y", now + TimeDelta::days(7), now)
            .unwrap();
        let jar = storage.read_jar().unwrap();
        assert!(!jar.contains_key("old"));
        assert!(jar.contains_key("new"));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join(JAR_FILE), b"{ not json").unwrap();

        let mut storage = FileStorage::with_root(temp.path());
        assert_eq!(storage.get("plantingRecords").unwrap(), None);

        // and is replaced on the next write
        storage.set("k", "v", TimeDelta::days(1)).unwrap();
        assert_eq!(storage.get("k").unwrap(), Some("v".to_owned()));
    }

    #[test]
    fn remove_deletes_key() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut storage = FileStorage::with_root(temp.path());
        storage.set("k", "v", TimeDelta::days(1)).unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn unreachable_expiry_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut storage = FileStorage::with_root(temp.path());
        storage.set("k", "v", TimeDelta::days(1)).unwrap();

        let err = storage
            .set("k", "w", TimeDelta::days(200_000_000))
            .expect_err("year overflow must not be stored");
        assert!(matches!(err, StorageError::ExpiryOutOfRange(_)));
        assert_eq!(storage.get("k").unwrap(), Some("v".to_owned()));

        let mut memory = MemoryStorage::new();
        assert!(memory.set("k", "v", TimeDelta::MAX).is_err());
        assert_eq!(memory.get("k").unwrap(), None);
    }

    #[test]
    fn memory_set_refreshes_expiry() {
        let mut storage = MemoryStorage::new();
        storage.set("k", "a", TimeDelta::days(7)).unwrap();
        let first = storage.expires("k").unwrap();
        storage.set("k", "b", TimeDelta::days(7)).unwrap();
        assert!(storage.expires("k").unwrap() >= first);
        assert_eq!(storage.get("k").unwrap(), Some("b".to_owned()));
    }

    #[test]
    fn memory_zero_ttl_is_immediately_expired() {
        let mut storage = MemoryStorage::new();
        storage.set("k", "v", TimeDelta::zero()).unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }
}
