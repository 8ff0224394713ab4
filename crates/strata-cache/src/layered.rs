// SPDX-License-Identifier: MIT OR Apache-2.0
//! The two-tier cache facade used by the client runtime.

use crate::disk::DiskCache;
use crate::memory::MemoryCache;
use crate::store::{FsStore, KeyValueStore, StoreResult};
use crate::{now_epoch_seconds, NEVER_EXPIRES};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Cache construction settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Capacity of the in-memory tier in bytes; 0 disables it.
    pub memory_limit_bytes: usize,
    /// Capacity of the disk tier in bytes.
    pub disk_limit_bytes: usize,
    /// Directory of the persistent tier; `None` disables it.
    pub disk_path: Option<PathBuf>,
    /// Expiry applied when a put does not specify one, in seconds from now.
    /// `None` stores entries that never expire.
    pub default_expiry_seconds: Option<i64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 1024 * 1024,
            disk_limit_bytes: 32 * 1024 * 1024,
            disk_path: None,
            default_expiry_seconds: None,
        }
    }
}

/// In-memory LRU in front of the persistent envelope.
///
/// All operations are atomic at key granularity and thread-safe. Either
/// tier may be absent; a fully disabled cache accepts writes and misses
/// every read.
pub struct LayeredCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
    default_expiry_seconds: Option<i64>,
}

impl LayeredCache {
    /// Build the cache from settings, opening the disk tier when a path is
    /// configured.
    ///
    /// # Errors
    ///
    /// Propagates store failures while opening the disk tier.
    pub fn new(settings: CacheSettings) -> StoreResult<Self> {
        let disk = match &settings.disk_path {
            Some(path) => Some(DiskCache::open(
                Arc::new(FsStore::open(path)?),
                settings.disk_limit_bytes,
            )?),
            None => None,
        };
        Ok(Self::assemble(settings, disk))
    }

    /// Build the cache over a caller-supplied persistent backend.
    ///
    /// # Errors
    ///
    /// Propagates store failures while scanning the backend.
    pub fn with_store(
        settings: CacheSettings,
        store: Arc<dyn KeyValueStore>,
    ) -> StoreResult<Self> {
        let disk = Some(DiskCache::open(store, settings.disk_limit_bytes)?);
        Ok(Self::assemble(settings, disk))
    }

    fn assemble(settings: CacheSettings, disk: Option<DiskCache>) -> Self {
        let memory = (settings.memory_limit_bytes > 0)
            .then(|| MemoryCache::new(settings.memory_limit_bytes));
        Self {
            memory,
            disk,
            default_expiry_seconds: settings.default_expiry_seconds,
        }
    }

    fn resolve_expiry(&self, expiry: Option<i64>) -> i64 {
        match (expiry, self.default_expiry_seconds) {
            (Some(expiry), _) => expiry,
            (None, Some(ttl)) => now_epoch_seconds() + ttl,
            (None, None) => NEVER_EXPIRES,
        }
    }

    /// Store raw bytes under `key`.
    ///
    /// `expiry` is absolute epoch seconds; `None` applies the configured
    /// default. Returns `false` when the disk tier rejected the write.
    pub fn put(&self, key: &str, value: Bytes, expiry: Option<i64>) -> bool {
        let expiry = self.resolve_expiry(expiry);
        let mut ok = true;
        if let Some(disk) = &self.disk {
            match disk.put(key, &value, expiry) {
                Ok(stored) => ok = stored,
                Err(err) => {
                    warn!(target: "strata.cache", key, %err, "disk put failed");
                    ok = false;
                }
            }
        }
        if let Some(memory) = &self.memory {
            memory.put(key, value, expiry);
        }
        ok
    }

    /// Serialize `value` as JSON and store it under `key`.
    pub fn put_object<T: Serialize>(&self, key: &str, value: &T, expiry: Option<i64>) -> bool {
        match serde_json::to_vec(value) {
            Ok(raw) => self.put(key, Bytes::from(raw), expiry),
            Err(err) => {
                warn!(target: "strata.cache", key, %err, "serialisation failed");
                false
            }
        }
    }

    /// Fetch raw bytes, preferring the memory tier and promoting disk hits
    /// into it.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(memory) = &self.memory {
            if let Some(hit) = memory.get(key) {
                return Some(hit);
            }
        }
        let disk = self.disk.as_ref()?;
        let expiry = disk.expiry_of(key).unwrap_or(NEVER_EXPIRES);
        match disk.get(key) {
            Ok(Some(raw)) => {
                let value = Bytes::from(raw);
                if let Some(memory) = &self.memory {
                    memory.put(key, value.clone(), expiry);
                }
                Some(value)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(target: "strata.cache", key, %err, "disk get failed");
                None
            }
        }
    }

    /// Fetch and deserialize a JSON value.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(target: "strata.cache", key, %err, "deserialisation failed");
                None
            }
        }
    }

    /// Returns `true` when an unexpired entry exists in either tier.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.memory.as_ref().is_some_and(|m| m.contains(key))
            || self.disk.as_ref().is_some_and(|d| d.contains(key))
    }

    /// Remove `key` from both tiers. Returns `true` when any tier held it.
    pub fn remove(&self, key: &str) -> bool {
        let mem = self.memory.as_ref().is_some_and(|m| m.remove(key));
        let disk = self
            .disk
            .as_ref()
            .is_some_and(|d| d.remove(key).unwrap_or(false));
        mem || disk
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn remove_keys_with_prefix(&self, prefix: &str) -> bool {
        if let Some(memory) = &self.memory {
            memory.remove_with_prefix(prefix);
        }
        if let Some(disk) = &self.disk {
            if let Err(err) = disk.remove_with_prefix(prefix) {
                warn!(target: "strata.cache", prefix, %err, "disk prefix removal failed");
                return false;
            }
        }
        true
    }

    /// Pin keys or prefixes against size-driven eviction.
    pub fn protect<I, S>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match &self.disk {
            Some(disk) => disk.protect(keys).unwrap_or(false),
            None => false,
        }
    }

    /// Release keys or prefixes from protection.
    pub fn release<I, S>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match &self.disk {
            Some(disk) => disk.release(keys).unwrap_or(false),
            None => false,
        }
    }

    /// Returns `true` when `key` is protected.
    #[must_use]
    pub fn is_protected(&self, key: &str) -> bool {
        self.disk.as_ref().is_some_and(|d| d.is_protected(key))
    }

    /// Move `key` to the MRU position in both tiers.
    pub fn promote(&self, key: &str) {
        if let Some(memory) = &self.memory {
            memory.promote(key);
        }
        if let Some(disk) = &self.disk {
            disk.promote(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn memory_only() -> LayeredCache {
        LayeredCache::new(CacheSettings {
            memory_limit_bytes: 1024 * 1024,
            disk_path: None,
            ..CacheSettings::default()
        })
        .unwrap()
    }

    fn two_tier() -> LayeredCache {
        LayeredCache::with_store(CacheSettings::default(), Arc::new(InMemoryStore::new())).unwrap()
    }

    #[test]
    fn roundtrip_memory_only() {
        let cache = memory_only();
        assert!(cache.put("k", Bytes::from_static(b"v"), None));
        assert_eq!(cache.get("k").unwrap().as_ref(), b"v");
        assert!(cache.contains("k"));
        assert!(cache.remove("k"));
        assert!(!cache.contains("k"));
    }

    #[test]
    fn roundtrip_two_tier() {
        let cache = two_tier();
        assert!(cache.put("k", Bytes::from_static(b"v"), None));
        assert_eq!(cache.get("k").unwrap().as_ref(), b"v");
    }

    #[test]
    fn object_roundtrip() {
        let cache = two_tier();
        let value = vec!["a".to_string(), "b".to_string()];
        assert!(cache.put_object("k", &value, None));
        let back: Vec<String> = cache.get_object("k").unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn expired_put_misses() {
        let cache = two_tier();
        cache.put("k", Bytes::from_static(b"v"), Some(now_epoch_seconds() - 1));
        assert!(cache.get("k").is_none());
        assert!(!cache.contains("k"));
    }

    #[test]
    fn default_expiry_applies() {
        let cache = LayeredCache::with_store(
            CacheSettings {
                default_expiry_seconds: Some(3600),
                ..CacheSettings::default()
            },
            Arc::new(InMemoryStore::new()),
        )
        .unwrap();
        cache.put("k", Bytes::from_static(b"v"), None);
        assert!(cache.contains("k"));
    }

    #[test]
    fn disk_hit_promotes_to_memory() {
        let store = Arc::new(InMemoryStore::new());
        // Write through one cache, read through a fresh one with an empty
        // memory tier.
        let first = LayeredCache::with_store(CacheSettings::default(), store.clone()).unwrap();
        first.put("k", Bytes::from_static(b"v"), None);
        let second = LayeredCache::with_store(CacheSettings::default(), store).unwrap();
        assert_eq!(second.get("k").unwrap().as_ref(), b"v");
    }

    #[test]
    fn prefix_removal_spans_tiers() {
        let cache = two_tier();
        cache.put("p::1", Bytes::from_static(b"1"), None);
        cache.put("p::2", Bytes::from_static(b"2"), None);
        cache.put("q", Bytes::from_static(b"3"), None);
        assert!(cache.remove_keys_with_prefix("p::"));
        assert!(!cache.contains("p::1"));
        assert!(!cache.contains("p::2"));
        assert!(cache.contains("q"));
    }

    #[test]
    fn protect_release_forwarded_to_disk() {
        let cache = two_tier();
        assert!(cache.protect(["a::"]));
        assert!(cache.is_protected("a::1"));
        assert!(cache.release(["a::"]));
        assert!(!cache.is_protected("a::1"));
    }

    #[test]
    fn protect_without_disk_tier_is_refused() {
        let cache = memory_only();
        assert!(!cache.protect(["a"]));
    }

    #[test]
    fn corrupt_object_read_is_a_miss() {
        let cache = two_tier();
        cache.put("k", Bytes::from_static(b"not json"), None);
        let value: Option<Vec<String>> = cache.get_object("k");
        assert!(value.is_none());
    }
}
