//! Stale Purge Task
//!
//! Background task that periodically drops stale entries from memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::ColdStorage;

/// Spawns a background task that periodically purges stale cache entries.
///
/// Stale entries are never served, so this only returns their memory early.
/// The blob store is not touched.
///
/// # Arguments
/// * `cache` - Engine handle whose store is purged
/// * `purge_interval_secs` - Interval in seconds between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let purge_handle = spawn_purge_task(cache.clone(), 60);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(cache: ColdStorage, purge_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(purge_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting stale purge task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_stale();

            if removed > 0 {
                info!("Stale purge: removed {} entries", removed);
            } else {
                debug!("Stale purge: no stale entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::persistence::MemoryBlobStore;
    use std::sync::Arc;

    fn cache() -> ColdStorage {
        ColdStorage::initialize(Config::default(), Arc::new(MemoryBlobStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_purge_task_removes_stale_entries() {
        let cache = cache();
        cache.put("expire_soon", "value", Some(1));

        let handle = spawn_purge_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!cache.contains_key("expire_soon"), "Stale entry should have been purged");
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_fresh_entries() {
        let cache = cache();
        cache.put("long_lived", "value", Some(3_600_000));
        cache.put("no_ttl", "value", None);

        let handle = spawn_purge_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get_without_update("long_lived").as_deref(), Some("value"));
        assert!(cache.contains_key("no_ttl"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let handle = spawn_purge_task(cache(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
