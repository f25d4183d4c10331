//! In-memory blob store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::BlobStore;
use crate::error::Result;

/// Blob store backed by a shared map. Clones share the same contents, so a
/// handle kept by a test survives engine restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.blobs.read().clone())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.blobs.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}
