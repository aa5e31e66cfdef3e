//! Generic key-value snapshot store.
//!
//! The session history, pipeline records, and job queue all persist by
//! writing a full JSON snapshot under a stable key after every mutation.
//! A decode failure on read is logged and treated as "no data" so corrupt
//! state never prevents startup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{MurmurError, Result};

/// Storage contract consumed by the core: raw JSON blobs keyed by name.
pub trait KeyValueStore: Send + Sync {
    /// Store a raw JSON snapshot under `key`, replacing any prior value.
    fn set_raw(&self, key: &str, value: String) -> Result<()>;

    /// Fetch the raw JSON snapshot under `key`, or `None` if absent.
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Remove the snapshot under `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed helpers over the raw contract.
pub trait KeyValueStoreExt: KeyValueStore {
    /// Serialize `value` and store it under `key`.
    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, json)
    }

    /// Load and decode the value under `key`.
    ///
    /// Absent keys and decode failures both yield `None`; a decode failure
    /// is logged at `warn` so corruption is observable but never fatal.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored snapshot failed to decode, treating as empty");
                Ok(None)
            }
        }
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// In-memory store used in tests and as a default.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| MurmurError::Persistence(format!("Store lock poisoned: {}", e)))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| MurmurError::Persistence(format!("Store lock poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| MurmurError::Persistence(format!("Store lock poisoned: {}", e)))?;
        values.remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON file per key under a base directory.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal identifiers; sanitize path separators anyway.
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.base_dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for JsonFileStore {
    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MurmurError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MurmurError::Persistence(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
