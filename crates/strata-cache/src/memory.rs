// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory LRU tier, weighted by value size in bytes.

use crate::now_epoch_seconds;
use bytes::Bytes;
use lru::LruCache;
use std::sync::Mutex;
use tracing::trace;

struct MemEntry {
    value: Bytes,
    expiry: i64,
}

struct MemState {
    entries: LruCache<String, MemEntry>,
    current_bytes: usize,
}

/// Byte-weighted LRU keyed by string.
///
/// Expired entries are invisible to reads and collected lazily.
pub struct MemoryCache {
    state: Mutex<MemState>,
    capacity_bytes: usize,
}

impl MemoryCache {
    /// Create a tier bounded to `capacity_bytes` of stored values.
    #[must_use]
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(MemState {
                entries: LruCache::unbounded(),
                current_bytes: 0,
            }),
            capacity_bytes,
        }
    }

    /// Insert a value. Returns `false` when the value alone exceeds the
    /// tier capacity.
    pub fn put(&self, key: &str, value: Bytes, expiry: i64) -> bool {
        let size = value.len();
        if size > self.capacity_bytes {
            return false;
        }
        let mut state = self.state.lock().expect("memory cache lock poisoned");
        if let Some(old) = state.entries.pop(key) {
            state.current_bytes -= old.value.len();
        }
        state.current_bytes += size;
        state
            .entries
            .put(key.to_string(), MemEntry { value, expiry });
        while state.current_bytes > self.capacity_bytes {
            let Some((victim, entry)) = state.entries.pop_lru() else {
                break;
            };
            state.current_bytes -= entry.value.len();
            trace!(target: "strata.cache", key = %victim, "memory tier evicted");
        }
        true
    }

    /// Fetch a value and move it to the MRU position.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock().expect("memory cache lock poisoned");
        let expired = match state.entries.get(key) {
            Some(entry) if entry.expiry > now_epoch_seconds() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            if let Some(entry) = state.entries.pop(key) {
                state.current_bytes -= entry.value.len();
            }
        }
        None
    }

    /// Returns `true` when an unexpired entry exists, without promoting it.
    pub fn contains(&self, key: &str) -> bool {
        let state = self.state.lock().expect("memory cache lock poisoned");
        matches!(state.entries.peek(key), Some(entry) if entry.expiry > now_epoch_seconds())
    }

    /// Move `key` to the MRU position.
    pub fn promote(&self, key: &str) {
        let mut state = self.state.lock().expect("memory cache lock poisoned");
        let _ = state.entries.get(key);
    }

    /// Remove `key`. Returns `true` when an entry existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().expect("memory cache lock poisoned");
        if let Some(entry) = state.entries.pop(key) {
            state.current_bytes -= entry.value.len();
            true
        } else {
            false
        }
    }

    /// Remove every key starting with `prefix`.
    pub fn remove_with_prefix(&self, prefix: &str) {
        let mut state = self.state.lock().expect("memory cache lock poisoned");
        let victims: Vec<String> = state
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for victim in victims {
            if let Some(entry) = state.entries.pop(&victim) {
                state.current_bytes -= entry.value.len();
            }
        }
    }

    /// Bytes currently stored.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.state
            .lock()
            .expect("memory cache lock poisoned")
            .current_bytes
    }
}
