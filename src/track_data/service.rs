use std::collections::HashMap;

use thiserror::Error;

use crate::storage::StorageError;

use super::{ArtifactStore, ArtifactStoreError, StalenessCheck, TrackData, batch_get, check_stale};

/// Concurrency cap for batched artifact retrieval.
pub const BATCH_CONCURRENCY: usize = 5;

/// Errors from a track-data service backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The remote endpoint answered with a non-success status.
    #[error("Request failed with status {status}")]
    Http { status: u16 },
    /// The request never completed.
    #[error("Network error: {0}")]
    Transport(String),
    /// The response body could not be interpreted.
    #[error("Invalid response body: {0}")]
    Body(String),
    /// A URL for the endpoint could not be built.
    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),
    /// The local storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ArtifactStoreError> for ServiceError {
    fn from(error: ArtifactStoreError) -> Self {
        match error {
            ArtifactStoreError::Storage(source) => ServiceError::Storage(source),
            ArtifactStoreError::Malformed { key, source } => {
                ServiceError::Body(format!("{key}: {source}"))
            }
        }
    }
}

/// Track-data operations a browsing session depends on.
///
/// Implemented over HTTP for real deployments and directly over the
/// artifact store for in-process use and tests, so the client cache and the
/// track loader never care which side of the wire they run on.
pub trait TrackDataService: Send + Sync {
    /// Cheap existence/staleness check for an artifact.
    fn check(
        &self,
        artifact_key: &str,
        audio_key: Option<&str>,
    ) -> Result<StalenessCheck, ServiceError>;

    /// Fetch one artifact; missing artifacts resolve to `None`.
    fn fetch(&self, artifact_key: &str) -> Result<Option<TrackData>, ServiceError>;

    /// Fetch many artifacts in one round trip. One entry per requested key;
    /// unresolved keys carry `None`.
    fn fetch_batch(
        &self,
        artifact_keys: &[String],
    ) -> Result<HashMap<String, Option<TrackData>>, ServiceError>;

    /// Persist an artifact, replacing any previous version.
    fn save(&self, artifact_key: &str, data: &TrackData) -> Result<(), ServiceError>;
}

/// In-process service speaking directly to an artifact store.
#[derive(Clone)]
pub struct LocalTrackDataService {
    store: ArtifactStore,
    concurrency: usize,
}

impl LocalTrackDataService {
    /// Create a service over the given store with the default batch
    /// concurrency.
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            concurrency: BATCH_CONCURRENCY,
        }
    }

    /// Override the batch concurrency cap (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl TrackDataService for LocalTrackDataService {
    fn check(
        &self,
        artifact_key: &str,
        audio_key: Option<&str>,
    ) -> Result<StalenessCheck, ServiceError> {
        Ok(check_stale(&self.store, artifact_key, audio_key)?)
    }

    fn fetch(&self, artifact_key: &str) -> Result<Option<TrackData>, ServiceError> {
        Ok(self.store.get(artifact_key)?)
    }

    fn fetch_batch(
        &self,
        artifact_keys: &[String],
    ) -> Result<HashMap<String, Option<TrackData>>, ServiceError> {
        Ok(batch_get(&self.store, artifact_keys, self.concurrency))
    }

    fn save(&self, artifact_key: &str, data: &TrackData) -> Result<(), ServiceError> {
        Ok(self.store.put(artifact_key, data)?)
    }
}
