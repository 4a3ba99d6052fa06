//! Snapshot persistence collaborator.

use crate::types::Snapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while persisting a snapshot.
///
/// Persistence is best-effort: callers log these and move on.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to read or write the backing store.
    #[error("failed to access snapshot cache '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the snapshot.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value persistence of the last successful snapshot.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Loads the previously persisted snapshot.
    ///
    /// An absent or malformed store yields `None`; loading never fails the
    /// caller.
    async fn load(&self) -> Option<Snapshot>;

    /// Persists a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on I/O or serialization failure. Callers
    /// treat this as non-fatal.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), CacheError>;
}

/// JSON-file implementation of [`SnapshotCache`].
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    /// Creates a cache backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotCache for JsonFileCache {
    async fn load(&self) -> Option<Snapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no snapshot cache to load");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring malformed snapshot cache"
                );
                None
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|source| CacheError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}
