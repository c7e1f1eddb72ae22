//! Record Store with Lazy Expiry
//!
//! This module implements the record store behind every command. Each key
//! maps to a [`Record`] holding the value, an opaque client flag, the time it
//! was stored and its TTL in seconds.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are spread over independent shards so commands
//!    arriving on different streams do not serialize on a single lock.
//! 2. **Lazy Expiry**: A record is only checked against its TTL when it is
//!    read. An expired record observed by [`StorageEngine::get`] is removed.
//!    Nothing sweeps in the background.
//! 3. **Injected Clock**: "now" comes from a [`Clock`], never from the
//!    system directly.
//!
//! ## Liveness
//!
//! ```text
//! live  <=>  ttl_seconds <= 0  ||  now < created_at + ttl_seconds
//! ```

use crate::storage::clock::{Clock, SystemClock};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored key/value/flag/expiry tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The key this record was stored under, as the raw bytes the client sent
    pub key: Bytes,
    /// Opaque payload
    pub value: Bytes,
    /// Client-supplied tag, echoed back verbatim
    pub flag: i64,
    /// Store time, seconds since the Unix epoch
    pub created_at: i64,
    /// Time-to-live in seconds; zero (or negative) never expires
    pub ttl_seconds: i64,
}

impl Record {
    pub fn new(
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flag: i64,
        ttl_seconds: i64,
        created_at: i64,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flag,
            created_at,
            ttl_seconds,
        }
    }

    /// Returns the second at which this record stops being live, if any.
    pub fn expires_at(&self) -> Option<i64> {
        if self.ttl_seconds <= 0 {
            None
        } else {
            Some(self.created_at.saturating_add(self.ttl_seconds))
        }
    }

    /// Checks whether this record has expired at `now`.
    ///
    /// `created_at + ttl_seconds` is already expired; see "Expiry boundary" in DESIGN.md.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at().map(|exp| now >= exp).unwrap_or(false)
    }
}

/// A single shard containing a portion of the records.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Record>>,
}

impl Shard {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Record>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Record>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Snapshot of the engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub expired: u64,
}

/// The record store.
///
/// It owns every [`Record`]; callers only ever see clones. Share it between
/// tasks by wrapping it in an `Arc`.
///
/// # Example
///
/// ```
/// use streamkv::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
/// engine.set("name", "ada", 7, 0);
///
/// let record = engine.get("name").unwrap();
/// assert_eq!(record.value, "ada");
/// assert_eq!(record.flag, 7);
/// assert!(engine.get("missing").is_none());
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,

    key_count: AtomicU64,
    get_count: AtomicU64,
    hit_count: AtomicU64,
    set_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty engine driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty engine driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            clock,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Returns the current time according to this engine's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Inserts or fully replaces the record for `key`, stamped with the
    /// current time. Nothing from a previous record is carried over.
    ///
    /// Returns `true` if the key was not present before.
    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, flag: i64, ttl_seconds: i64) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let key = key.into();
        let record = Record::new(key.clone(), value, flag, ttl_seconds, self.now());

        let mut data = self.get_shard(&key).write();
        let is_new = data.insert(key, record).is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Returns the live record for `key`.
    ///
    /// A record that has expired is removed as a side effect and `None` is
    /// returned. A missing key is not an error.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Record> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let key = key.as_ref();
        let shard = self.get_shard(key);
        let now = self.now();

        {
            let data = shard.read();
            match data.get(key) {
                Some(record) if !record.is_expired_at(now) => {
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    return Some(record.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: upgrade to a write lock and re-check, a concurrent set may
        // have replaced the record in between.
        let mut data = shard.write();
        match data.get(key) {
            Some(record) if record.is_expired_at(now) => {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(record) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(record.clone())
            }
            None => None,
        }
    }

    /// Checks whether `key` holds a live record without removing it if
    /// expired.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        let now = self.now();
        self.get_shard(key)
            .read()
            .get(key)
            .map(|record| !record.is_expired_at(now))
            .unwrap_or(false)
    }

    /// Removes `key`, live or not. Returns `true` if something was removed.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        let mut data = self.get_shard(key).write();
        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Removes every expired record and returns how many were dropped.
    ///
    /// The server never calls this on a schedule; it exists for embedders
    /// that want to reclaim memory held by keys nobody reads anymore.
    pub fn cleanup_expired(&self) -> u64 {
        let now = self.now();
        let mut removed = 0;

        for shard in &self.shards {
            let mut data = shard.write();
            let before = data.len();
            data.retain(|_, record| !record.is_expired_at(now));
            removed += (before - data.len()) as u64;
        }

        if removed > 0 {
            self.key_count.fetch_sub(removed, Ordering::Relaxed);
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }

        removed
    }

    /// Returns the number of stored records, including expired ones that
    /// have not been observed yet.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        let gets = self.get_count.load(Ordering::Relaxed);
        let hits = self.hit_count.load(Ordering::Relaxed);
        StorageStats {
            keys: self.len(),
            gets,
            hits,
            misses: gets.saturating_sub(hits),
            sets: self.set_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}
