//! Key-value persistence backends
//!
//! The event store keeps its whole log under a single key as UTF-8 text. Any
//! backend that can get, set and remove a string by key can hold it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;

/// Durable key-value storage for serialized event logs
///
/// Writes take `&mut self`: one writer per backend instance. Serializing writers
/// across processes that share the same storage is left to the caller.
pub trait PersistenceBackend {
    /// Read the value stored under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Delete `key`; deleting an absent key succeeds
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// In-memory backend, optionally with a byte quota
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects any write pushing total stored bytes past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn stored_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if let Some(quota) = self.quota_bytes {
            let needed = self.stored_bytes_excluding(key) + key.len() + value.len();
            if needed > quota {
                return Err(PersistenceError::QuotaExceeded { needed, quota });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Directory-backed storage, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a storage directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the value for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PersistenceBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let target = self.path_for(key);
        // Write-then-rename so readers see the old log or the new one, never a mix
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
