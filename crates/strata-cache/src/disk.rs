// SPDX-License-Identifier: MIT OR Apache-2.0
//! Size-counting disk envelope over a [`KeyValueStore`].
//!
//! Every entry is framed with an 8-byte little-endian expiry (epoch
//! seconds) ahead of the value bytes. The envelope tracks total bytes
//! written (key + framed value), evicts unprotected entries in LRU order to
//! stay under the configured cap, and persists the protected-key list in
//! the store itself under a reserved key.

use crate::now_epoch_seconds;
use crate::protected::ProtectedKeyList;
use crate::store::{KeyValueStore, StoreResult};
use lru::LruCache;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Reserved store key holding the serialized protected-key list.
pub(crate) const PROTECTED_LIST_KEY: &str = "protected::keys";

const ENVELOPE_HEADER: usize = 8;

fn encode(expiry: i64, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_HEADER + value.len());
    out.extend_from_slice(&expiry.to_le_bytes());
    out.extend_from_slice(value);
    out
}

fn decode(raw: &[u8]) -> Option<(i64, &[u8])> {
    let header: [u8; ENVELOPE_HEADER] = raw.get(..ENVELOPE_HEADER)?.try_into().ok()?;
    Some((i64::from_le_bytes(header), &raw[ENVELOPE_HEADER..]))
}

struct DiskMeta {
    entry_bytes: usize,
    expiry: i64,
}

struct DiskState {
    meta: LruCache<String, DiskMeta>,
    current_bytes: usize,
    protected: ProtectedKeyList,
}

/// The size-bounded persistent tier.
pub struct DiskCache {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<DiskState>,
    max_bytes: usize,
}

impl DiskCache {
    /// Open the envelope over `store`, rebuilding size accounting and the
    /// protected-key list from the stored content. Entries already expired
    /// are collected during the scan.
    ///
    /// # Errors
    ///
    /// Propagates store failures during the initial scan.
    pub fn open(store: Arc<dyn KeyValueStore>, max_bytes: usize) -> StoreResult<Self> {
        let mut meta = LruCache::unbounded();
        let mut current_bytes = 0usize;
        let now = now_epoch_seconds();
        for key in store.keys()? {
            if key == PROTECTED_LIST_KEY {
                continue;
            }
            let Some(raw) = store.get(&key)? else {
                continue;
            };
            match decode(&raw) {
                Some((expiry, _)) if expiry > now => {
                    let entry_bytes = key.len() + raw.len();
                    current_bytes += entry_bytes;
                    meta.put(key, DiskMeta { entry_bytes, expiry });
                }
                _ => {
                    // Expired or unreadable; collect it now.
                    let _ = store.remove(&key)?;
                }
            }
        }
        let protected = match store.get(PROTECTED_LIST_KEY)? {
            Some(raw) => ProtectedKeyList::deserialize(&raw),
            None => ProtectedKeyList::new(),
        };
        debug!(
            target: "strata.cache",
            entries = meta.len(),
            bytes = current_bytes,
            protected = protected.len(),
            "disk cache opened"
        );
        Ok(Self {
            store,
            state: Mutex::new(DiskState {
                meta,
                current_bytes,
                protected,
            }),
            max_bytes,
        })
    }

    /// Store `value` under `key` with the given expiry.
    ///
    /// Evicts unprotected entries in LRU order until the write fits;
    /// returns `Ok(false)` when it cannot fit without evicting a protected
    /// key, or when the value alone exceeds the cap.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn put(&self, key: &str, value: &[u8], expiry: i64) -> StoreResult<bool> {
        if key == PROTECTED_LIST_KEY {
            return Ok(false);
        }
        let entry_bytes = key.len() + ENVELOPE_HEADER + value.len();
        if entry_bytes > self.max_bytes {
            return Ok(false);
        }
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let replaced = state.meta.peek(key).map(|m| m.entry_bytes);
        let occupied = state.current_bytes - replaced.unwrap_or(0);

        // Evict LRU unprotected victims until the new entry fits.
        let mut to_free = (occupied + entry_bytes).saturating_sub(self.max_bytes);
        while to_free > 0 {
            let victim = state
                .meta
                .iter()
                .rev()
                .find(|(k, _)| k.as_str() != key && !state.protected.is_protected(k))
                .map(|(k, _)| k.clone());
            let Some(victim) = victim else {
                // Only protected entries remain; the write must fail.
                return Ok(false);
            };
            if let Some(meta) = state.meta.pop(&victim) {
                state.current_bytes -= meta.entry_bytes;
                to_free = to_free.saturating_sub(meta.entry_bytes);
                let _ = self.store.remove(&victim)?;
                trace!(target: "strata.cache", key = %victim, "disk tier evicted");
            }
        }

        self.store.put(key, &encode(expiry, value))?;
        if let Some(old) = state.meta.pop(key) {
            state.current_bytes -= old.entry_bytes;
        }
        state.current_bytes += entry_bytes;
        state
            .meta
            .put(key.to_string(), DiskMeta { entry_bytes, expiry });
        Ok(true)
    }

    /// Fetch the unexpired value under `key`, promoting it to MRU.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let expired = match state.meta.get(key) {
            Some(meta) if meta.expiry > now_epoch_seconds() => {
                let raw = self.store.get(key)?;
                return Ok(raw.and_then(|raw| decode(&raw).map(|(_, v)| v.to_vec())));
            }
            Some(_) => true,
            None => return Ok(None),
        };
        if expired {
            if let Some(meta) = state.meta.pop(key) {
                state.current_bytes -= meta.entry_bytes;
            }
            let _ = self.store.remove(key)?;
        }
        Ok(None)
    }

    /// Expiry of an unexpired entry, without promotion.
    #[must_use]
    pub fn expiry_of(&self, key: &str) -> Option<i64> {
        let state = self.state.lock().expect("disk cache lock poisoned");
        match state.meta.peek(key) {
            Some(meta) if meta.expiry > now_epoch_seconds() => Some(meta.expiry),
            _ => None,
        }
    }

    /// Returns `true` when an unexpired entry exists, without promotion.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let state = self.state.lock().expect("disk cache lock poisoned");
        matches!(state.meta.peek(key), Some(meta) if meta.expiry > now_epoch_seconds())
    }

    /// Remove `key`, protected or not. Returns `true` when it existed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        if let Some(meta) = state.meta.pop(key) {
            state.current_bytes -= meta.entry_bytes;
        }
        self.store.remove(key)
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn remove_with_prefix(&self, prefix: &str) -> StoreResult<()> {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let victims: Vec<String> = state
            .meta
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for victim in victims {
            if let Some(meta) = state.meta.pop(&victim) {
                state.current_bytes -= meta.entry_bytes;
            }
            let _ = self.store.remove(&victim)?;
        }
        Ok(())
    }

    /// Pin keys (or prefixes) against eviction, persisting the list.
    ///
    /// # Errors
    ///
    /// Propagates store failures while persisting the list.
    pub fn protect<I, S>(&self, keys: I) -> StoreResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let changed = state.protected.protect(keys, |absorbed| {
            trace!(target: "strata.cache", key = %absorbed, "absorbed by prefix protection");
        });
        self.persist_protected(&mut state)?;
        Ok(changed)
    }

    /// Release keys (or prefixes) from protection, persisting the list.
    ///
    /// # Errors
    ///
    /// Propagates store failures while persisting the list.
    pub fn release<I, S>(&self, keys: I) -> StoreResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let changed = state.protected.release(keys);
        self.persist_protected(&mut state)?;
        Ok(changed)
    }

    /// Returns `true` when `key` is protected, exactly or by prefix.
    #[must_use]
    pub fn is_protected(&self, key: &str) -> bool {
        self.state
            .lock()
            .expect("disk cache lock poisoned")
            .protected
            .is_protected(key)
    }

    /// Move `key` to the MRU position.
    pub fn promote(&self, key: &str) {
        let mut state = self.state.lock().expect("disk cache lock poisoned");
        let _ = state.meta.get(key);
    }

    /// Total bytes currently accounted to entries.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.state
            .lock()
            .expect("disk cache lock poisoned")
            .current_bytes
    }

    fn persist_protected(&self, state: &mut DiskState) -> StoreResult<()> {
        if state.protected.is_dirty() {
            let raw = state.protected.serialize();
            if let Err(err) = self.store.put(PROTECTED_LIST_KEY, &raw) {
                warn!(target: "strata.cache", %err, "failed to persist protected-key list");
                return Err(err);
            }
        }
        Ok(())
    }
}
