//! Cache Store Module
//!
//! Thread-safe key to entry mapping shared by the population, eviction and
//! persistence paths.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{CacheEntry, CharWidthEstimator, SizeEstimator};

// == Cache Store ==
/// Concurrent map from key to [`CacheEntry`].
///
/// Readers and writers may come from any thread; a single key's last write
/// wins. Iteration works on a snapshot so callers never hold the lock while
/// running their own code.
///
/// Each entry's estimated size is computed once when it is written, and the
/// store keeps a running total plus an index ordered by write time, so
/// eviction never rescans stored values.
#[derive(Debug)]
pub struct CacheStore {
    inner: RwLock<Inner>,
    estimator: Arc<dyn SizeEstimator>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Slot>,
    by_age: BTreeSet<(u64, String)>,
    total_bytes: usize,
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    size: usize,
}

impl Inner {
    fn insert(&mut self, key: String, entry: CacheEntry, size: usize) -> Option<CacheEntry> {
        let previous = self.remove(&key);
        self.by_age.insert((entry.timestamp, key.clone()));
        self.total_bytes += size;
        self.entries.insert(key, Slot { entry, size });
        previous
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.by_age.remove(&(slot.entry.timestamp, key.to_string()));
        self.total_bytes -= slot.size;
        Some(slot.entry)
    }

    fn holds_newer(&self, key: &str, entry: &CacheEntry) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| slot.entry.timestamp > entry.timestamp)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::with_estimator(Arc::new(CharWidthEstimator::default()))
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new empty store sized with [`CharWidthEstimator`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store sized with `estimator`.
    pub fn with_estimator(estimator: Arc<dyn SizeEstimator>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            estimator,
        }
    }

    // == Get ==
    /// Returns a copy of the entry stored under `key`, stale or not.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().entries.get(key).map(|slot| slot.entry.clone())
    }

    // == Put ==
    /// Stores `entry` under `key`, returning the entry it replaced.
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) -> Option<CacheEntry> {
        let size = self.estimator.estimate(&entry);
        self.inner.write().insert(key.into(), entry, size)
    }

    /// Stores `entry` unless the key already holds a newer write.
    ///
    /// Returns true if the entry was stored.
    pub fn put_if_newer(&self, key: impl Into<String>, entry: CacheEntry) -> bool {
        let key = key.into();
        let size = self.estimator.estimate(&entry);
        let mut inner = self.inner.write();
        if inner.holds_newer(&key, &entry) {
            return false;
        }
        inner.insert(key, entry, size);
        true
    }

    /// [`put_if_newer`](Self::put_if_newer) for a batch, under a single lock.
    ///
    /// Returns the number of entries stored.
    pub fn merge_if_newer(&self, batch: Vec<(String, CacheEntry)>) -> usize {
        let sized: Vec<_> = batch
            .into_iter()
            .map(|(key, entry)| {
                let size = self.estimator.estimate(&entry);
                (key, entry, size)
            })
            .collect();

        let mut inner = self.inner.write();
        let mut stored = 0;
        for (key, entry, size) in sized {
            if !inner.holds_newer(&key, &entry) {
                inner.insert(key, entry, size);
                stored += 1;
            }
        }
        stored
    }

    // == Remove ==
    /// Removes the entry under `key`, returning it if present.
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.inner.write().remove(key)
    }

    // == Clear ==
    /// Removes every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let removed = inner.entries.len();
        *inner = Inner::default();
        removed
    }

    // == Contains ==
    /// Returns true if `key` has an entry, stale or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    // == Iteration ==
    /// Copies every entry out of the store.
    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(key, slot)| (key.clone(), slot.entry.clone()))
            .collect()
    }

    /// Visits a snapshot of the store; `f` runs without the lock held.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &CacheEntry),
    {
        for (key, entry) in self.snapshot() {
            f(&key, &entry);
        }
    }

    // == Retain ==
    /// Keeps only the entries for which `keep` returns true.
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str, &CacheEntry) -> bool,
    {
        let mut inner = self.inner.write();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(key, slot)| !keep(key, &slot.entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        doomed.len()
    }

    // == Size ==
    /// Sum of the estimated sizes of all entries, in bytes.
    pub fn estimated_bytes(&self) -> usize {
        self.inner.read().total_bytes
    }

    /// Removes oldest-written entries until the total fits in `budget_bytes`.
    ///
    /// Ties on timestamp go in key order. Returns the evicted keys, oldest first.
    pub(crate) fn evict_oldest_until(&self, budget_bytes: usize) -> Vec<String> {
        let mut inner = self.inner.write();
        let mut evicted = Vec::new();
        while inner.total_bytes > budget_bytes {
            let Some((_, key)) = inner.by_age.first().cloned() else {
                break;
            };
            inner.remove(&key);
            evicted.push(key);
        }
        evicted
    }

    // == Length ==
    /// Returns the current number of entries in the store.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
