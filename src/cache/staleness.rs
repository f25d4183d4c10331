//! Staleness Module
//!
//! Decides whether an entry is still valid given its own TTL or the global default.

use tracing::trace;

use crate::cache::entry::current_timestamp_ms;

// == Staleness Evaluator ==
/// Applies the three-tier TTL rule against the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessEvaluator {
    /// Global TTL in milliseconds, None = entries without their own TTL never expire
    default_ttl: Option<u64>,
}

impl StalenessEvaluator {
    /// Creates an evaluator with the given global TTL.
    pub fn new(default_ttl: Option<u64>) -> Self {
        Self { default_ttl }
    }

    // == Is Stale ==
    /// Checks staleness using the current time and emits a hit / stale event.
    ///
    /// # Arguments
    /// * `time_to_live` - The entry's own TTL in milliseconds, if any
    /// * `timestamp` - The entry's write time (Unix milliseconds)
    pub fn is_stale(&self, time_to_live: Option<u64>, timestamp: u64) -> bool {
        let stale = self.is_stale_at(time_to_live, timestamp, current_timestamp_ms());
        if stale {
            trace!(timestamp, "cache miss: stale");
        } else {
            trace!(timestamp, "cache hit");
        }
        stale
    }

    /// Pure form of [`is_stale`](Self::is_stale) evaluated at `now`.
    pub fn is_stale_at(&self, time_to_live: Option<u64>, timestamp: u64, now: u64) -> bool {
        let difference = now.saturating_sub(timestamp);
        match time_to_live.or(self.default_ttl) {
            Some(ttl) => difference > ttl,
            None => false,
        }
    }
}
