//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::warn;

use crate::engine::ColdStorage;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, CommitResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The engine handle is internally synchronized, so cloning it per request
/// is all the sharing handlers need.
#[derive(Clone)]
pub struct AppState {
    pub cache: ColdStorage,
}

impl AppState {
    /// Creates a new AppState around an initialized engine.
    pub fn new(cache: ColdStorage) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
///
/// Stores a precomputed value with an optional TTL in milliseconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.put(&req.key, req.value, req.ttl_ms);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Returns the value if present and fresh. Stale entries read as not found.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get_without_update(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.invalidate(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /commit
///
/// Runs the commit on the blocking pool since blob stores do synchronous I/O.
pub async fn commit_handler(State(state): State<AppState>) -> Result<Json<CommitResponse>> {
    let report = tokio::task::spawn_blocking(move || state.cache.commit())
        .await
        .map_err(|e| {
            warn!(error = %e, "commit task failed");
            CacheError::Internal(e.to_string())
        })??;

    Ok(Json(CommitResponse::new(report)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::new(state.cache.clear()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Always healthy once serving; `ready` reports whether the start-up load finished.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.is_ready()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::persistence::MemoryBlobStore;
    use std::sync::Arc;

    fn test_state() -> (AppState, MemoryBlobStore) {
        let blobs = MemoryBlobStore::new();
        let cache = ColdStorage::initialize(Config::default(), Arc::new(blobs.clone())).unwrap();
        (AppState::new(cache), blobs)
    }

    fn set_request(key: &str, value: &str, ttl_ms: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: value.to_string(),
            ttl_ms,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (state, _) = test_state();

        let result = set_handler(
            State(state.clone()),
            Json(set_request("test_key", "test_value", None)),
        )
        .await;
        assert!(result.is_ok());

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, "test_value");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (state, _) = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_stale_key_is_not_found() {
        let (state, _) = test_state();
        set_handler(State(state.clone()), Json(set_request("short", "v", Some(1))))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let result = get_handler(State(state), Path("short".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state();
        set_handler(State(state.clone()), Json(set_request("to_delete", "value", None)))
            .await
            .unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = get_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_err());

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_commit_handler_writes_blobs() {
        let (state, blobs) = test_state();
        state.cache.ready().await;
        set_handler(State(state.clone()), Json(set_request("a", "1", None)))
            .await
            .unwrap();

        let response = commit_handler(State(state)).await.unwrap();

        assert_eq!(response.report.written, 1);
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let (state, _) = test_state();
        state.cache.put("a", "1", None);
        state.cache.put("b", "2", None);

        let response = clear_handler(State(state.clone())).await;

        assert_eq!(response.removed, 2);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.hits, 0);
        assert_eq!(response.stats.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (state, _) = test_state();
        state.cache.ready().await;

        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert!(response.ready);
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let (state, _) = test_state();

        let result = set_handler(State(state), Json(set_request("", "value", None))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
