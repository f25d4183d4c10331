//! File-backed blob store.
//!
//! Each namespace is a single JSON object file under a data directory. Writes
//! are buffered in memory and written out atomically on flush.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::BlobStore;
use crate::error::{CacheError, Result};

/// Durable blob store persisted as `<dir>/<namespace>.json`.
#[derive(Debug)]
pub struct FileBlobStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    blobs: HashMap<String, String>,
    dirty: bool,
}

impl FileBlobStore {
    /// Opens (or creates) the namespace file under `dir`.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// strings is a persistence error rather than silently discarded data.
    pub fn open(dir: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        if namespace.is_empty() || namespace.contains(['/', '\\']) {
            return Err(CacheError::InvalidRequest(format!(
                "Invalid blob store namespace: {:?}",
                namespace
            )));
        }

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", namespace));

        let blobs = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                CacheError::Persistence(format!("{} is unreadable: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = blobs.len(), "opened blob store");
        Ok(Self {
            path,
            state: Mutex::new(FileState {
                blobs,
                dirty: false,
            }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self, blobs: &HashMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string(blobs)?;
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "unable to replace blob store file");
            CacheError::from(e)
        })
    }
}

impl BlobStore for FileBlobStore {
    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.state.lock().blobs.clone())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().blobs.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.blobs.insert(key.to_string(), value.to_string());
        state.dirty = true;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.blobs.remove(key).is_some() {
            state.dirty = true;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        self.write_out(&state.blobs)?;
        state.dirty = false;
        Ok(())
    }
}
