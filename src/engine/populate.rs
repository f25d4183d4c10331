//! Cache-or-fetch population protocol.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::{
    estimated_size, trim, CacheEntry, CacheStats, CacheStore, SizeEstimator, StalenessEvaluator,
    StatsRecorder,
};
use crate::engine::Converter;

/// Removals recorded while the startup load is still running.
#[derive(Debug, Default)]
struct LoadFence {
    cleared: bool,
    removed: HashSet<String>,
}

/// State shared between engine handles and the jobs running on the pool.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) store: CacheStore,
    pub(crate) staleness: StalenessEvaluator,
    pub(crate) budget_bytes: usize,
    pub(crate) stats: StatsRecorder,
    load_fence: Mutex<Option<LoadFence>>,
}

impl Shared {
    pub(crate) fn new(
        staleness: StalenessEvaluator,
        estimator: Arc<dyn SizeEstimator>,
        budget_bytes: usize,
    ) -> Self {
        Self {
            store: CacheStore::with_estimator(estimator),
            staleness,
            budget_bytes,
            stats: StatsRecorder::new(),
            load_fence: Mutex::new(None),
        }
    }

    // == Startup Load ==
    /// Starts recording removals so the pending load cannot resurrect them.
    pub(crate) fn begin_load(&self) {
        *self.load_fence.lock() = Some(LoadFence::default());
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.load_fence.lock().is_some()
    }

    /// Merges the loaded entries into the live store and ends the load.
    ///
    /// Entries removed or cleared since [`begin_load`](Self::begin_load) are
    /// dropped, and entries written live since then win over older loaded ones.
    /// Returns the number of loaded entries stored.
    pub(crate) fn finish_load(&self, loaded: Option<CacheStore>) -> usize {
        let mut guard = self.load_fence.lock();
        let fence = guard.take().unwrap_or_default();

        let Some(loaded) = loaded else {
            return 0;
        };
        if fence.cleared {
            info!(skipped = loaded.len(), "cache cleared during load, discarding entries");
            return 0;
        }

        let batch = loaded
            .snapshot()
            .into_iter()
            .filter(|(key, _)| !fence.removed.contains(key))
            .collect();
        self.store.merge_if_newer(batch)
    }

    // == Removal ==
    /// Removes `key`, also from a load still in flight.
    pub(crate) fn remove(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.load_fence.lock();
        if let Some(fence) = guard.as_mut() {
            fence.removed.insert(key.to_string());
        }
        self.store.remove(key)
    }

    /// Removes every entry, also from a load still in flight.
    pub(crate) fn clear(&self) -> usize {
        let mut guard = self.load_fence.lock();
        if let Some(fence) = guard.as_mut() {
            fence.cleared = true;
        }
        self.store.clear()
    }

    /// Returns the stored value if present and fresh.
    pub(crate) fn lookup(&self, key: &str) -> Option<String> {
        let Some(entry) = self.store.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if self.staleness.is_stale(entry.time_to_live, entry.timestamp) {
            self.stats.record_stale();
            return None;
        }

        self.stats.record_hit();
        Some(entry.serialized_value)
    }

    /// Writes `entry` under `key`, then trims the store to the memory budget.
    pub(crate) fn insert(&self, key: &str, entry: CacheEntry) {
        self.store.put(key, entry);
        self.trim();
    }

    pub(crate) fn trim(&self) -> usize {
        let evicted = trim(&self.store, self.budget_bytes).len();
        if evicted > 0 {
            self.stats.record_evictions(evicted);
        }
        evicted
    }

    /// Runs `converter`, turning errors and panics into `None`.
    pub(crate) fn convert<T, C>(&self, key: &str, raw: &str, converter: &C) -> Option<T>
    where
        C: Converter<T> + ?Sized,
    {
        match catch_unwind(AssertUnwindSafe(|| converter.convert(raw))) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "conversion failed");
                self.stats.record_conversion_failure();
                None
            }
            Err(_) => {
                error!(key = %key, "converter panicked");
                self.stats.record_conversion_failure();
                None
            }
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.store.len(), estimated_size(&self.store))
    }
}

/// Returns the fresh cached value for `key`, or runs `fetch` and caches its result.
///
/// A failing, panicking or empty fetch yields `None` and leaves the store
/// untouched. Concurrent callers missing the same key each run their own
/// fetch; the last write wins.
pub(crate) fn populate<F>(
    shared: &Shared,
    key: &str,
    time_to_live: Option<u64>,
    fetch: F,
) -> Option<String>
where
    F: FnOnce(&str) -> anyhow::Result<Option<String>>,
{
    if let Some(value) = shared.lookup(key) {
        return Some(value);
    }

    shared.stats.record_fetch();
    let value = match catch_unwind(AssertUnwindSafe(|| fetch(key))) {
        Ok(Ok(Some(value))) => value,
        Ok(Ok(None)) => {
            debug!(key = %key, "fetch produced no value");
            shared.stats.record_fetch_failure();
            return None;
        }
        Ok(Err(e)) => {
            warn!(key = %key, error = %e, "fetch failed");
            shared.stats.record_fetch_failure();
            return None;
        }
        Err(_) => {
            error!(key = %key, "fetch panicked");
            shared.stats.record_fetch_failure();
            return None;
        }
    };

    shared.insert(key, CacheEntry::new(value.clone(), time_to_live));
    Some(value)
}
