//! Eviction Module
//!
//! Keeps the store under a memory budget by dropping the oldest writes first.
//! Recency here means write time only; reads never refresh an entry.

use std::fmt::Debug;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStore};

/// Fixed per-entry overhead used by [`CharWidthEstimator::default`].
pub const DEFAULT_ENTRY_OVERHEAD_BYTES: usize = 36;

// == Size Estimation ==
/// Estimates the memory footprint of a single entry.
pub trait SizeEstimator: Send + Sync + Debug {
    /// Approximate size of `entry` in bytes.
    fn estimate(&self, entry: &CacheEntry) -> usize;
}

/// Coarse estimate: a fixed overhead plus two bytes per UTF-16 code unit.
#[derive(Debug, Clone, Copy)]
pub struct CharWidthEstimator {
    /// Bytes charged to every entry regardless of its value
    pub overhead_bytes: usize,
    /// Bytes charged per UTF-16 code unit of the serialized value
    pub bytes_per_char: usize,
}

impl Default for CharWidthEstimator {
    fn default() -> Self {
        Self {
            overhead_bytes: DEFAULT_ENTRY_OVERHEAD_BYTES,
            bytes_per_char: 2,
        }
    }
}

impl SizeEstimator for CharWidthEstimator {
    fn estimate(&self, entry: &CacheEntry) -> usize {
        let units = entry.serialized_value.encode_utf16().count();
        self.overhead_bytes + self.bytes_per_char * units
    }
}

// == Estimated Size ==
/// Sum of the estimated sizes of every entry currently in the store.
pub fn estimated_size(store: &CacheStore) -> usize {
    store.estimated_bytes()
}

// == Trim ==
/// Evicts oldest-written entries until the store fits in `budget_bytes`.
///
/// Runs under the store's write lock so concurrent writers observe either
/// the state before or after the trim. Ties on timestamp are broken by key.
/// A single entry larger than the budget is evicted too; the loop stops once
/// the store is empty.
///
/// Returns the evicted keys, oldest first.
pub fn trim(store: &CacheStore, budget_bytes: usize) -> Vec<String> {
    if store.estimated_bytes() <= budget_bytes {
        return Vec::new();
    }

    let evicted = store.evict_oldest_until(budget_bytes);
    if !evicted.is_empty() {
        debug!(count = evicted.len(), budget_bytes, "trimmed cache to memory budget");
    }
    evicted
}
