//! TTL Store Module
//!
//! Concurrent key-value storage with a fixed per-entry lifetime. Expiry is
//! checked on every `get`; the background sweep only bounds memory.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache::entry::{CachedEntry, TimedEntry};

// == TTL Store ==
/// Sharded map from cache key to cached entry with fixed time-to-live.
///
/// Safe for concurrent `get`/`put` from any number of callers while the
/// sweep runs alongside. Concurrent `put`s to one key are last-writer-wins.
#[derive(Debug)]
pub struct TtlStore {
    entries: DashMap<String, TimedEntry>,
    expiration: Duration,
}

impl TtlStore {
    // == Constructor ==
    /// Creates an empty store whose entries live for `expiration`.
    pub fn new(expiration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            expiration,
        }
    }

    /// Lifetime given to every inserted entry.
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    // == Put ==
    /// Inserts or overwrites `key`, restarting its lifetime.
    pub fn put(&self, key: String, entry: CachedEntry) {
        self.entries
            .insert(key, TimedEntry::new(entry, self.expiration));
    }

    // == Get ==
    /// Returns the entry for `key` if present and not expired.
    ///
    /// An expired entry found here is removed on the spot.
    pub fn get(&self, key: &str) -> Option<CachedEntry> {
        let expired = match self.entries.get(key) {
            Some(timed) if !timed.is_expired() => return Some(timed.entry.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            // A concurrent put may have refreshed the key since the read guard dropped
            self.entries.remove_if(key, |_, timed| timed.is_expired());
        }
        None
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, timed| !timed.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    // == Length ==
    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
