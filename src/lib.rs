//! ColdStorage - a persistent key-value cache with cache-or-fetch population
//!
//! Values are stored as strings with a per-entry or global TTL, populated on
//! a background worker pool, bounded by an approximate memory budget and
//! committed to a durable blob store that is reloaded at start-up.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod persistence;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEntry, CacheStats, CharWidthEstimator, SizeEstimator};
pub use config::Config;
pub use engine::{
    operation_key, CacheLayer, ColdStorage, Converter, Delivery, Fetcher, JsonConverter,
};
pub use error::{CacheError, Result};
pub use persistence::{BlobStore, CommitReport, FileBlobStore, LoadReport, MemoryBlobStore};
pub use tasks::{spawn_purge_task, WorkerPool};
