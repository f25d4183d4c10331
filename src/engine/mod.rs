//! Engine Module
//!
//! The cache engine handle: cache-or-fetch population on a background pool,
//! direct reads and writes, and persistence to a durable blob store.
//!
//! # Example
//! ```ignore
//! let blobs = Arc::new(MemoryBlobStore::new());
//! let cache = ColdStorage::initialize(Config::default(), blobs)?;
//!
//! let value = cache
//!     .fetch("user:1", Some(60_000), |key| Ok(Some(download(key)?)))
//!     .await;
//! cache.commit()?;
//! ```

mod converter;
mod delivery;
mod layer;
mod populate;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::{
    current_timestamp_ms, CacheEntry, CacheStats, CacheStore, CharWidthEstimator, SizeEstimator,
    StalenessEvaluator,
};
use crate::config::Config;
use crate::error::Result;
use crate::persistence::{BlobStore, CommitReport, PersistenceGateway};
use crate::tasks::WorkerPool;

pub use converter::{Converter, JsonConverter};
pub use delivery::Delivery;
pub use layer::{CacheLayer, Fetcher};

use populate::{populate, Shared};

// == Cold Storage ==
/// Handle to a cache engine instance.
///
/// Cloning is cheap and every clone talks to the same store, pool and blob
/// store. The pool shuts down when the last handle is dropped.
#[derive(Clone)]
pub struct ColdStorage {
    shared: Arc<Shared>,
    gateway: PersistenceGateway,
    pool: Arc<WorkerPool>,
    ready: watch::Receiver<bool>,
}

impl ColdStorage {
    // == Initialize ==
    /// Builds an engine and starts loading `blobs` in the background.
    ///
    /// Returns as soon as the load is scheduled; see [`ready`](Self::ready).
    pub fn initialize(config: Config, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        Self::initialize_with_estimator(config, blobs, Arc::new(CharWidthEstimator::default()))
    }

    /// Like [`initialize`](Self::initialize) with a custom size estimator for eviction.
    pub fn initialize_with_estimator(
        config: Config,
        blobs: Arc<dyn BlobStore>,
        estimator: Arc<dyn SizeEstimator>,
    ) -> Result<Self> {
        let pool = WorkerPool::new(config.worker_threads)?;
        let shared = Arc::new(Shared::new(
            StalenessEvaluator::new(config.default_ttl_ms),
            estimator,
            config.max_memory_bytes,
        ));
        let gateway = PersistenceGateway::new(blobs, config.disk_retention_days);
        let (ready_tx, ready) = watch::channel(false);

        // Loaded entries are staged and merged in one step, so removals made
        // while the load runs stick.
        shared.begin_load();
        {
            let loader = Arc::clone(&shared);
            let gateway = gateway.clone();
            let spawned = pool.spawn(move || {
                let staging = CacheStore::new();
                let loaded = match gateway.load(&staging, &loader.staleness) {
                    Ok(_) => Some(staging),
                    Err(e) => {
                        error!(error = %e, "unable to load persisted cache");
                        None
                    }
                };
                loader.finish_load(loaded);
                loader.trim();
                let _ = ready_tx.send(true);
            });
            if let Err(e) = spawned {
                shared.finish_load(None);
                return Err(e);
            }
        }

        info!(
            max_memory_bytes = config.max_memory_bytes,
            default_ttl_ms = ?config.default_ttl_ms,
            worker_threads = pool.size(),
            disk_retention_days = config.disk_retention_days,
            "cache engine initialized"
        );

        Ok(Self {
            shared,
            gateway,
            pool: Arc::new(pool),
            ready,
        })
    }

    /// Waits until the start-up load has finished (successfully or not).
    pub async fn ready(&self) {
        let mut ready = self.ready.clone();
        let _ = ready.wait_for(|loaded| *loaded).await;
    }

    /// Returns true once the start-up load has finished.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    // == Get ==
    /// Delivers the value for `key` to `callback` from a pool thread.
    ///
    /// A fresh cached value is delivered as is. Otherwise `fetch` runs, its
    /// result is cached with `time_to_live` (milliseconds) and delivered. A
    /// failing or empty fetch delivers `None`. The callback runs exactly once.
    pub fn get<F, CB>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        fetch: F,
        callback: CB,
    ) -> Result<JoinHandle<()>>
    where
        F: FnOnce(&str) -> anyhow::Result<Option<String>> + Send + 'static,
        CB: FnOnce(Option<String>) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let key = key.into();
        self.pool.spawn(move || {
            let value = populate(&shared, &key, time_to_live, fetch);
            callback(value);
        })
    }

    /// Like [`get`](Self::get), converting the value with `converter` before delivery.
    ///
    /// A conversion failure delivers `None` but leaves the cached entry in place.
    pub fn get_converted<T, F, C, CB>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        fetch: F,
        converter: C,
        callback: CB,
    ) -> Result<JoinHandle<()>>
    where
        T: 'static,
        F: FnOnce(&str) -> anyhow::Result<Option<String>> + Send + 'static,
        C: Converter<T> + 'static,
        CB: FnOnce(Option<T>) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let key = key.into();
        self.pool.spawn(move || {
            let value = populate(&shared, &key, time_to_live, fetch)
                .and_then(|raw| shared.convert(&key, &raw, &converter));
            callback(value);
        })
    }

    // == Fetch ==
    /// Future-returning form of [`get`](Self::get).
    pub fn fetch<F>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        fetch: F,
    ) -> Delivery<String>
    where
        F: FnOnce(&str) -> anyhow::Result<Option<String>> + Send + 'static,
    {
        let (tx, delivery) = Delivery::channel();
        if let Err(e) = self.get(key, time_to_live, fetch, move |value| {
            let _ = tx.send(value);
        }) {
            warn!(error = %e, "unable to schedule population");
        }
        delivery
    }

    /// Future-returning form of [`get_converted`](Self::get_converted).
    pub fn fetch_converted<T, F, C>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        fetch: F,
        converter: C,
    ) -> Delivery<T>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> anyhow::Result<Option<String>> + Send + 'static,
        C: Converter<T> + 'static,
    {
        let (tx, delivery) = Delivery::channel();
        if let Err(e) = self.get_converted(key, time_to_live, fetch, converter, move |value| {
            let _ = tx.send(value);
        }) {
            warn!(error = %e, "unable to schedule population");
        }
        delivery
    }

    // == Get Without Update ==
    /// Returns the cached value if present and fresh. Never fetches.
    pub fn get_without_update(&self, key: &str) -> Option<String> {
        self.shared.lookup(key)
    }

    /// Like [`get_without_update`](Self::get_without_update), converting the value.
    pub fn get_without_update_as<T, C>(&self, key: &str, converter: &C) -> Option<T>
    where
        C: Converter<T> + ?Sized,
    {
        let raw = self.shared.lookup(key)?;
        self.shared.convert(key, &raw, converter)
    }

    // == Put ==
    /// Stores a precomputed value, bypassing fetch. Overwrites any entry for `key`.
    pub fn put(&self, key: &str, value: impl Into<String>, time_to_live: Option<u64>) {
        self.shared.insert(key, CacheEntry::new(value, time_to_live));
    }

    /// Serializes `value` as JSON and stores it under `key`.
    pub fn put_json<V>(&self, key: &str, value: &V, time_to_live: Option<u64>) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let serialized = serde_json::to_string(value)?;
        self.put(key, serialized, time_to_live);
        Ok(())
    }

    /// Removes the entry for `key`. Returns true if one existed.
    ///
    /// The start-up load will not bring it back, and the next commit deletes
    /// its blob.
    pub fn invalidate(&self, key: &str) -> bool {
        self.shared.remove(key).is_some()
    }

    // == Refrigerate ==
    /// Memoizes the output of `producer` under a key derived from `operation`
    /// and `key_parts`.
    ///
    /// A fresh cached output is delivered without running `producer`. The
    /// callback receives the output and the operation name.
    pub fn refrigerate<P, CB>(
        &self,
        operation: &str,
        key_parts: &[&str],
        time_to_live: Option<u64>,
        producer: P,
        callback: CB,
    ) -> Result<JoinHandle<()>>
    where
        P: FnOnce() -> anyhow::Result<String> + Send + 'static,
        CB: FnOnce(Option<String>, &str) + Send + 'static,
    {
        let key = operation_key(operation, key_parts);
        let operation = operation.to_string();
        self.get(
            key,
            time_to_live,
            move |_| producer().map(Some),
            move |value| callback(value, &operation),
        )
    }

    // == Commit ==
    /// Trims the store, writes every fresh entry to the blob store and
    /// deletes blobs for entries no longer in memory.
    ///
    /// While the start-up load is still running, blobs not yet loaded are
    /// kept. Blocks on the blob store's I/O; call it from a thread that may
    /// block.
    pub fn commit(&self) -> Result<CommitReport> {
        let prune = !self.shared.is_loading();
        let report = self.gateway.commit(
            &self.shared.store,
            &self.shared.staleness,
            self.shared.budget_bytes,
            prune,
        )?;
        if report.evicted > 0 {
            self.shared.stats.record_evictions(report.evicted);
        }
        Ok(report)
    }

    // == Clear ==
    /// Removes every in-memory entry, including any the start-up load has
    /// yet to deliver. The blob store is emptied at the next commit.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let removed = self.shared.clear();
        info!(removed, "cache cleared");
        removed
    }

    // == Purge ==
    /// Removes stale entries from memory. Returns the number removed.
    pub fn purge_stale(&self) -> usize {
        let now = current_timestamp_ms();
        let staleness = self.shared.staleness;
        self.shared
            .store
            .retain(|_, entry| !staleness.is_stale_at(entry.time_to_live, entry.timestamp, now))
    }

    // == Introspection ==
    /// Returns true if `key` has an entry, fresh or stale.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.store.contains_key(key)
    }

    /// Number of entries in memory, fresh or stale.
    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    /// Returns true if no entries are in memory.
    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.stats()
    }
}

/// Key under which [`ColdStorage::refrigerate`] caches an operation's output.
///
/// The operation name alone when there are no key parts, otherwise the
/// operation and parts joined with `:`.
pub fn operation_key(operation: &str, key_parts: &[&str]) -> String {
    if key_parts.is_empty() {
        operation.to_string()
    } else {
        format!("{}:{}", operation, key_parts.join(":"))
    }
}
