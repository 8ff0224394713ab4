// SPDX-License-Identifier: MIT OR Apache-2.0
//! The persistent key/value capability and its bundled backends.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Errors surfaced by a [`KeyValueStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// The backend rejected the operation.
    #[error("store failure: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent key/value capability consumed by the disk cache tier.
///
/// Implementations must be thread-safe; the cache serialises per-key
/// operations above this trait.
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove `key`. Returns `true` when an entry existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Enumerate every stored key.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

/// Volatile in-memory backend, used in tests and cacheless configurations.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .remove(key)
            .is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

/// File-per-key persistent backend.
///
/// Cache keys contain characters that are not path-safe, so file names are
/// the hex encoding of the key bytes.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(hex::encode(key.as_bytes()))
    }
}

impl KeyValueStore for FsStore {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_of(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_of(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        match std::fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Skip interrupted writes.
            if name.ends_with(".tmp") {
                continue;
            }
            if let Ok(raw) = hex::decode(name) {
                if let Ok(key) = String::from_utf8(raw) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
