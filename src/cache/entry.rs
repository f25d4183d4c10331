//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and their persisted form.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::staleness::StalenessEvaluator;

// == Cache Entry ==
/// A single cached value with its write time and optional TTL.
///
/// The value is stored already serialized; conversion back to a caller's
/// type happens at the engine boundary. The same shape is written to the
/// durable blob store as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored value, in serialized string form
    pub serialized_value: String,
    /// Write timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Per-entry TTL in milliseconds, None = use the global default
    #[serde(default)]
    pub time_to_live: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    ///
    /// # Arguments
    /// * `serialized_value` - The value to store
    /// * `time_to_live` - Optional TTL in milliseconds
    pub fn new(serialized_value: impl Into<String>, time_to_live: Option<u64>) -> Self {
        Self::with_timestamp(serialized_value, current_timestamp_ms(), time_to_live)
    }

    /// Creates an entry with an explicit write timestamp.
    pub fn with_timestamp(
        serialized_value: impl Into<String>,
        timestamp: u64,
        time_to_live: Option<u64>,
    ) -> Self {
        Self {
            serialized_value: serialized_value.into(),
            timestamp,
            time_to_live,
        }
    }

    // == Age ==
    /// Milliseconds elapsed between the write and `now`; zero if written in the future.
    pub fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    // == Staleness ==
    /// Three-tier staleness rule evaluated at `now`.
    ///
    /// The entry's own TTL wins, then the global default; with neither the
    /// entry never goes stale. An age exactly equal to the TTL is still fresh.
    pub fn is_stale_at(&self, default_ttl: Option<u64>, now: u64) -> bool {
        StalenessEvaluator::new(default_ttl).is_stale_at(self.time_to_live, self.timestamp, now)
    }

    // == Blob Encoding ==
    /// Serializes the entry into its persisted JSON form.
    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses an entry from its persisted JSON form.
    pub fn from_blob(blob: &str) -> serde_json::Result<Self> {
        serde_json::from_str(blob)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("test_value", None);

        assert_eq!(entry.serialized_value, "test_value");
        assert!(entry.time_to_live.is_none());
        assert!(!entry.is_stale_at(None, current_timestamp_ms() + 1_000_000));
    }

    #[test]
    fn test_entry_timestamp_is_now() {
        let before = current_timestamp_ms();
        let entry = CacheEntry::new("v", Some(10));
        let after = current_timestamp_ms();

        assert!(entry.timestamp >= before && entry.timestamp <= after);
    }

    #[test]
    fn test_entry_ttl_overrides_default() {
        let entry = CacheEntry::with_timestamp("v", 1_000, Some(100));

        // Own TTL elapsed even though the global default has not
        assert!(entry.is_stale_at(Some(10_000), 1_101));
        // Own TTL not elapsed even though the global default has
        let entry = CacheEntry::with_timestamp("v", 1_000, Some(10_000));
        assert!(!entry.is_stale_at(Some(10), 2_000));
    }

    #[test]
    fn test_entry_falls_back_to_default() {
        let entry = CacheEntry::with_timestamp("v", 1_000, None);

        assert!(!entry.is_stale_at(Some(500), 1_500));
        assert!(entry.is_stale_at(Some(500), 1_501));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::with_timestamp("test", 5_000, Some(250));

        // Difference equal to TTL is not stale, one more millisecond is
        assert!(!entry.is_stale_at(None, 5_250));
        assert!(entry.is_stale_at(None, 5_251));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let entry = CacheEntry::with_timestamp("v", 10_000, Some(1));
        assert_eq!(entry.age_at(5_000), 0);
        assert!(!entry.is_stale_at(None, 5_000));
    }

    #[test]
    fn test_blob_format() {
        let entry = CacheEntry::with_timestamp("payload", 42, Some(7));
        let blob = entry.to_blob().unwrap();

        let json: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(json["serializedValue"], "payload");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["timeToLive"], 7);
    }

    #[test]
    fn test_blob_without_ttl_field() {
        let entry = CacheEntry::from_blob(r#"{"serializedValue":"x","timestamp":3}"#).unwrap();
        assert_eq!(entry, CacheEntry::with_timestamp("x", 3, None));
    }

    #[test]
    fn test_blob_corrupt() {
        assert!(CacheEntry::from_blob("{not json").is_err());
        assert!(CacheEntry::from_blob(r#"{"timestamp":3}"#).is_err());
    }
}
