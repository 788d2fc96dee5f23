//! Opaque key-value persistence substrate.
//!
//! Everything durable goes through [`ContentStore`]: string keys to string
//! values, nothing else. The repository serializes the whole document table
//! under a single key, so a store only ever sees opaque JSON payloads.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

mod file;

pub use file::FileStore;

/// Opaque persistent key-value mapping.
///
/// `get` never fails on a missing key; it returns `None`. `set` may fail
/// when the store is out of capacity, and that failure must propagate to
/// the caller (a swallowed write error is lost user data).
pub trait ContentStore: Send {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store, used for tests and ephemeral sessions.
///
/// An optional byte capacity models the browser quota: once the total size
/// of stored values would exceed it, `set` fails with
/// [`Error::CapacityExceeded`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once stored values total more than
    /// `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: Some(capacity),
        }
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            let used = self.used_bytes_excluding(key);
            let needed = key.len() + value.len();
            if used + needed > capacity {
                return Err(Error::CapacityExceeded {
                    needed,
                    available: capacity.saturating_sub(used),
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Default on-disk location for the document store file.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bunny-notes")
        .join("store.json")
}

/// Read a store file as a key-value map, tolerating a missing file.
pub(crate) fn read_store_file(path: &Path) -> Result<HashMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(err) => Err(err.into()),
    }
}
