// SPDX-License-Identifier: MIT OR Apache-2.0
//! The persisted set of keys pinned against size-driven eviction.

use std::collections::BTreeSet;

/// A set of exact keys and key prefixes exempt from eviction.
///
/// Prefix entries protect every key beginning with the prefix; adding a
/// prefix absorbs (removes) exact entries it covers, so the serialized form
/// shrinks. The serialized layout is the keys joined by a NUL byte each and
/// is stable across process restarts.
#[derive(Debug, Default)]
pub struct ProtectedKeyList {
    keys: BTreeSet<String>,
    dirty: bool,
}

impl ProtectedKeyList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a list from its serialized form.
    #[must_use]
    pub fn deserialize(raw: &[u8]) -> Self {
        let keys = raw
            .split(|b| *b == 0)
            .filter(|chunk| !chunk.is_empty())
            .filter_map(|chunk| String::from_utf8(chunk.to_vec()).ok())
            .collect();
        Self { keys, dirty: false }
    }

    /// Serialize the list and clear the dirty flag.
    pub fn serialize(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for key in &self.keys {
            out.extend_from_slice(key.as_bytes());
            out.push(0);
        }
        self.dirty = false;
        out
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.keys.iter().map(|k| k.len() + 1).sum()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when no entries are protected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns `true` when the list changed since the last serialize.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Protect `keys` (exact keys or prefixes).
    ///
    /// Entries already covered by an existing prefix are ignored. When a new
    /// entry is itself a prefix of existing entries, those are absorbed and
    /// reported through `on_absorbed`. Returns `true` when at least one new
    /// entry was added.
    pub fn protect<I, S>(&mut self, keys: I, mut on_absorbed: impl FnMut(&str)) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = false;
        for key in keys {
            let key = key.as_ref();
            if self.is_protected(key) {
                // Covered by an existing entry (or an exact duplicate).
                continue;
            }
            let absorbed: Vec<String> = self
                .keys
                .iter()
                .filter(|existing| existing.starts_with(key))
                .cloned()
                .collect();
            for shadowed in absorbed {
                self.keys.remove(&shadowed);
                on_absorbed(&shadowed);
            }
            self.keys.insert(key.to_string());
            self.dirty = true;
            added = true;
        }
        added
    }

    /// Release `keys`: each entry removes the exact list entry and, when it
    /// is a prefix, every list entry under it. Returns `true` when anything
    /// was removed.
    pub fn release<I, S>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = false;
        for key in keys {
            let key = key.as_ref();
            let victims: Vec<String> = self
                .keys
                .iter()
                .filter(|existing| existing.as_str() == key || existing.starts_with(key))
                .cloned()
                .collect();
            for victim in victims {
                self.keys.remove(&victim);
                self.dirty = true;
                removed = true;
            }
        }
        removed
    }

    /// Returns `true` when `key` is protected, exactly or by prefix.
    #[must_use]
    pub fn is_protected(&self, key: &str) -> bool {
        self.keys
            .iter()
            .any(|entry| key == entry || key.starts_with(entry.as_str()))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        if !self.keys.is_empty() {
            self.dirty = true;
        }
        self.keys.clear();
    }
}
