//! Configuration Module
//!
//! Handles loading and managing engine and server configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Default in-memory budget: 20 MiB.
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 20 * 1024 * 1024;
/// Default size of the background worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 10;
/// Default number of days a persisted blob is kept on disk.
pub const DEFAULT_DISK_RETENTION_DAYS: u32 = 2;

/// Engine and server configuration parameters.
///
/// Set once at initialization and read thereafter. All values can be
/// configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Approximate in-memory budget in bytes enforced by eviction
    pub max_memory_bytes: usize,
    /// Global TTL in milliseconds for entries without their own TTL; None = never stale
    pub default_ttl_ms: Option<u64>,
    /// Number of background threads running population and load work
    pub worker_threads: usize,
    /// Days after which a persisted blob is deleted from the durable store
    pub disk_retention_days: u32,
    /// Directory holding file-backed blob stores
    pub data_dir: PathBuf,
    /// Namespace of the durable blob store
    pub namespace: String,
    /// HTTP server port
    pub server_port: u16,
    /// Stale purge task interval in seconds
    pub purge_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `COLDSTORAGE_MAX_MEMORY_BYTES` - Memory budget in bytes (default: 20 MiB)
    /// - `COLDSTORAGE_DEFAULT_TTL_MS` - Global TTL in milliseconds (default: none)
    /// - `COLDSTORAGE_WORKER_THREADS` - Worker pool size (default: 10)
    /// - `COLDSTORAGE_DISK_RETENTION_DAYS` - Disk retention window (default: 2)
    /// - `COLDSTORAGE_DATA_DIR` - Blob store directory (default: ./coldstorage-data)
    /// - `COLDSTORAGE_NAMESPACE` - Blob store namespace (default: coldstorage)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PURGE_INTERVAL` - Stale purge frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_memory_bytes: parse_var("COLDSTORAGE_MAX_MEMORY_BYTES")
                .unwrap_or(defaults.max_memory_bytes),
            default_ttl_ms: parse_var("COLDSTORAGE_DEFAULT_TTL_MS"),
            worker_threads: parse_var::<usize>("COLDSTORAGE_WORKER_THREADS")
                .unwrap_or(defaults.worker_threads)
                .max(1),
            disk_retention_days: parse_var("COLDSTORAGE_DISK_RETENTION_DAYS")
                .unwrap_or(defaults.disk_retention_days),
            data_dir: env::var("COLDSTORAGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            namespace: env::var("COLDSTORAGE_NAMESPACE")
                .ok()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(defaults.namespace),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            purge_interval: parse_var("PURGE_INTERVAL").unwrap_or(defaults.purge_interval),
        }
    }

    /// Sets the memory budget.
    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Sets the global TTL in milliseconds.
    pub fn with_default_ttl_ms(mut self, ttl_ms: Option<u64>) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    /// Sets the worker pool size (at least one thread).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Sets the disk retention window in days.
    pub fn with_disk_retention_days(mut self, days: u32) -> Self {
        self.disk_retention_days = days;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            default_ttl_ms: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            disk_retention_days: DEFAULT_DISK_RETENTION_DAYS,
            data_dir: PathBuf::from("./coldstorage-data"),
            namespace: "coldstorage".to_string(),
            server_port: 3000,
            purge_interval: 60,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_memory_bytes, 20 * 1024 * 1024);
        assert_eq!(config.default_ttl_ms, None);
        assert_eq!(config.worker_threads, 10);
        assert_eq!(config.disk_retention_days, 2);
        assert_eq!(config.namespace, "coldstorage");
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("COLDSTORAGE_MAX_MEMORY_BYTES");
        env::remove_var("COLDSTORAGE_DEFAULT_TTL_MS");
        env::remove_var("COLDSTORAGE_WORKER_THREADS");
        env::remove_var("COLDSTORAGE_DISK_RETENTION_DAYS");
        env::remove_var("COLDSTORAGE_NAMESPACE");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.max_memory_bytes, DEFAULT_MAX_MEMORY_BYTES);
        assert_eq!(config.default_ttl_ms, None);
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(config.disk_retention_days, DEFAULT_DISK_RETENTION_DAYS);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_builder_clamps_worker_threads() {
        let config = Config::default().with_worker_threads(0);
        assert_eq!(config.worker_threads, 1);
    }
}
