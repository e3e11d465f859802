//! Chunk storage seam: where materialised sub-documents live.
//!
//! Object storage is an external collaborator; the pipeline only needs
//! put/get by key. [`FsChunkStore`] is the bundled implementation for local
//! runs and tests — an S3 (or any other) backend slots in behind the same
//! trait without touching the splitter or the worker.

use crate::error::ExtractError;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Durable storage for page-range chunks, keyed by string.
///
/// Keys look like `chunks/{job_id}/chunk_{start}_{end}.pdf`. Methods are
/// synchronous; chunk payloads are a handful of pages and callers that care
/// wrap the store in `spawn_blocking`.
pub trait ChunkStore: Send + Sync {
    /// Persist `bytes` under `key`, overwriting any previous value.
    /// Overwriting makes redelivered split jobs idempotent.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ExtractError>;

    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, ExtractError>;
}

/// Filesystem-backed chunk store rooted at a directory.
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ChunkStore for FsChunkStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ExtractError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::Storage {
                key: key.to_string(),
                detail: e.to_string(),
            })?;
        }
        fs::write(&path, bytes).map_err(|e| ExtractError::Storage {
            key: key.to_string(),
            detail: e.to_string(),
        })?;
        debug!("stored chunk {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ExtractError> {
        fs::read(self.path_for(key)).map_err(|e| ExtractError::Storage {
            key: key.to_string(),
            detail: e.to_string(),
        })
    }
}
