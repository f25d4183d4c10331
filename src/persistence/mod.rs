//! Persistence Module
//!
//! Saves the cache into a durable string to string blob store and restores it
//! at start-up.
//!
//! # Blob stores
//! - [`MemoryBlobStore`] - shared in-process map, for tests and ephemeral use
//! - [`FileBlobStore`] - one JSON file per namespace on local disk

mod file;
mod memory;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, trim, CacheEntry, CacheStore, StalenessEvaluator};
use crate::error::{CacheError, Result};

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

// == Blob Store ==
/// A namespaced, durable string to string map supplied by the host.
///
/// Implementations may buffer writes; [`flush`](BlobStore::flush) makes them
/// durable.
pub trait BlobStore: Send + Sync {
    /// Returns every persisted key with its blob.
    fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Returns the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes the blob under `key`, if any.
    fn remove(&self, key: &str) -> Result<()>;

    /// Makes buffered writes durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// == Reports ==
/// Outcome of a [`PersistenceGateway::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Entries inserted into memory
    pub loaded: usize,
    /// Entries skipped because they were stale
    pub stale: usize,
    /// Blobs deleted because they outlived the disk retention window
    pub expired: usize,
    /// Blobs that could not be parsed
    pub corrupt: usize,
}

/// Outcome of a [`PersistenceGateway::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Entries written to the blob store
    pub written: usize,
    /// Entries skipped because they were stale
    pub stale: usize,
    /// Entries evicted by the pre-commit trim
    pub evicted: usize,
    /// Blobs deleted because their key was no longer fresh in memory
    pub removed: usize,
    /// Entries that could not be serialized, written or deleted
    pub failed: usize,
}

// == Persistence Gateway ==
/// Moves entries between the in-memory store and a [`BlobStore`].
#[derive(Clone)]
pub struct PersistenceGateway {
    blobs: Arc<dyn BlobStore>,
    retention: Duration,
}

impl PersistenceGateway {
    /// Creates a gateway that deletes blobs older than `retention_days`.
    pub fn new(blobs: Arc<dyn BlobStore>, retention_days: u32) -> Self {
        Self {
            blobs,
            retention: Duration::days(i64::from(retention_days)),
        }
    }


    fn outlived_retention(&self, entry: &CacheEntry, now: u64) -> bool {
        let age = i64::try_from(entry.age_at(now)).unwrap_or(i64::MAX);
        age > self.retention.num_milliseconds()
    }

    // == Load ==
    /// Restores every fresh persisted entry into `store`.
    ///
    /// Corrupt blobs are skipped one key at a time. Blobs past the retention
    /// window are deleted from the blob store. An entry already in memory
    /// with a newer write is kept.
    pub fn load(&self, store: &CacheStore, staleness: &StalenessEvaluator) -> Result<LoadReport> {
        let blobs = self.blobs.get_all()?;
        let now = current_timestamp_ms();
        let mut report = LoadReport::default();

        for (key, blob) in blobs {
            let entry = match CacheEntry::from_blob(&blob) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping corrupt persisted entry");
                    report.corrupt += 1;
                    continue;
                }
            };

            if self.outlived_retention(&entry, now) {
                if let Err(e) = self.blobs.remove(&key) {
                    warn!(key = %key, error = %e, "unable to delete expired blob");
                }
                report.expired += 1;
                continue;
            }

            if staleness.is_stale(entry.time_to_live, entry.timestamp) {
                report.stale += 1;
                continue;
            }

            if store.put_if_newer(key, entry) {
                report.loaded += 1;
            }
        }

        if report.expired > 0 {
            self.blobs.flush()?;
        }

        info!(
            loaded = report.loaded,
            stale = report.stale,
            expired = report.expired,
            corrupt = report.corrupt,
            "persisted cache loaded"
        );
        Ok(report)
    }

    // == Commit ==
    /// Trims `store` to `budget_bytes`, then writes every fresh entry to the blob store.
    ///
    /// With `prune` set, blobs whose key was not just written are deleted, so
    /// the blob store ends up holding exactly the fresh in-memory entries.
    /// Leave it unset while a load is still in progress, since blobs not yet
    /// loaded would otherwise be lost.
    ///
    /// A failure on one key is logged and counted; only listing the blob
    /// store and the final flush can fail the whole commit.
    pub fn commit(
        &self,
        store: &CacheStore,
        staleness: &StalenessEvaluator,
        budget_bytes: usize,
        prune: bool,
    ) -> Result<CommitReport> {
        let mut report = CommitReport {
            evicted: trim(store, budget_bytes).len(),
            ..CommitReport::default()
        };
        let mut written = HashSet::new();

        store.for_each(|key, entry| {
            if staleness.is_stale(entry.time_to_live, entry.timestamp) {
                report.stale += 1;
                return;
            }

            let outcome = entry
                .to_blob()
                .map_err(CacheError::from)
                .and_then(|blob| self.blobs.put(key, &blob));
            match outcome {
                Ok(()) => {
                    report.written += 1;
                    written.insert(key.to_string());
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "unable to persist entry");
                    report.failed += 1;
                }
            }
        });

        if prune {
            let persisted = self.blobs.get_all()?;
            for key in persisted.keys().filter(|key| !written.contains(*key)) {
                match self.blobs.remove(key) {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "unable to delete dropped entry");
                        report.failed += 1;
                    }
                }
            }
        }

        self.blobs.flush()?;

        debug!(?report, "commit finished");
        info!(
            written = report.written,
            removed = report.removed,
            "cache committed to durable storage"
        );
        Ok(report)
    }
}
