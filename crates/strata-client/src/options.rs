// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request fetch policy.

/// How a read balances the cache against the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchOption {
    /// Serve from the cache only; never touch the network.
    CacheOnly,
    /// Serve from the cache when possible and refresh it in the background.
    CacheWithUpdate,
    /// Serve from the cache, going online only on a miss. The default for
    /// metadata reads.
    #[default]
    OnlineIfNotFound,
    /// Skip the cache read; the response is still written to the cache.
    OnlineOnly,
}

impl FetchOption {
    /// Returns `true` when the cache is consulted before the network.
    #[must_use]
    pub fn reads_cache(self) -> bool {
        !matches!(self, Self::OnlineOnly)
    }

    /// Returns `true` when a cache miss may go online.
    #[must_use]
    pub fn may_go_online(self) -> bool {
        !matches!(self, Self::CacheOnly)
    }
}
