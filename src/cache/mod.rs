//! Cache Module
//!
//! Provides the in-memory store with TTL staleness and memory-bounded eviction.

mod entry;
pub mod eviction;
mod staleness;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::{estimated_size, trim, CharWidthEstimator, SizeEstimator};
pub use staleness::StalenessEvaluator;
pub use stats::{CacheStats, StatsRecorder};
pub use store::CacheStore;
