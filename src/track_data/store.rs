use std::sync::Arc;

use thiserror::Error;

use crate::storage::{BlobStore, ObjectMetadata, StorageError};

use super::TrackData;

/// Errors from reading or writing track-data artifacts.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The stored bytes are not a valid track-data document.
    #[error("Malformed track data at {key}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
}

/// Typed access to track-data artifacts in a blob store.
///
/// The one contract owned here is null-on-missing: `get` and `metadata`
/// return `None` for absent artifacts so callers never catch an error for
/// the ordinary "not generated yet" case.
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn BlobStore>,
}

impl ArtifactStore {
    /// Wrap a blob store.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// The underlying blob store.
    pub fn blob_store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    /// Fetch and parse an artifact, or `None` if it does not exist.
    pub fn get(&self, key: &str) -> Result<Option<TrackData>, ArtifactStoreError> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        let data =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactStoreError::Malformed {
                key: key.to_string(),
                source,
            })?;
        Ok(Some(data))
    }

    /// Persist an artifact, replacing any previous version.
    pub fn put(&self, key: &str, data: &TrackData) -> Result<(), ArtifactStoreError> {
        let mut bytes = serde_json::to_vec_pretty(data).map_err(|source| {
            ArtifactStoreError::Malformed {
                key: key.to_string(),
                source,
            }
        })?;
        bytes.push(b'\n');
        self.store.put(key, &bytes)?;
        Ok(())
    }

    /// Fetch an artifact's storage metadata without downloading its body.
    pub fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, ArtifactStoreError> {
        Ok(self.store.metadata(key)?)
    }
}
