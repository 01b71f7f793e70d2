//! Typed handlers for the track-data HTTP contract.
//!
//! The route plumbing (framework, auth, serialization of responses) is a
//! collaborator concern; these functions own the semantics: status codes,
//! cache policies, and the null-on-missing behavior the client relies on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::audio_files;
use crate::storage::BlobStore;
use crate::track_data::{
    ArtifactStore, BATCH_CONCURRENCY, StalenessCheck, TrackData, batch_get, check_stale,
};

/// Cache policy for artifact bodies and batch responses: serve from shared
/// caches for a bounded period and revalidate in the background, since the
/// data rarely changes.
pub const CACHE_CONTROL_SHARED: &str =
    "public, max-age=300, s-maxage=3600, stale-while-revalidate=86400";
/// Cache policy for staleness checks and listings, which must stay live.
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

/// A handler result: the response body plus its cache policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    /// Body to serialize.
    pub body: T,
    /// Value for the `Cache-Control` header.
    pub cache_control: &'static str,
}

/// Handler failures, each mapping to one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The `path` query parameter is required.
    #[error("Path is required")]
    MissingPath,
    /// A batch request needs at least one path.
    #[error("Paths are required")]
    EmptyBatch,
    /// The requested artifact does not exist.
    #[error("Track data not found")]
    NotFound,
    /// Something failed server-side.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MissingPath | ApiError::EmptyBatch => 400,
            ApiError::NotFound => 404,
            ApiError::Internal(_) => 500,
        }
    }
}

/// Acknowledgment body for a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAck {
    /// Human-readable confirmation.
    pub message: String,
}

/// Request body of the batch endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    /// Artifact keys to fetch.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Response body of the batch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// One entry per requested key; unresolved keys carry `null`.
    pub data: HashMap<String, Option<TrackData>>,
}

/// `GET track-data?path=&audioPath=&check=1`: existence and staleness.
pub fn check_track_data(
    store: &ArtifactStore,
    path: &str,
    audio_path: Option<&str>,
) -> Result<ApiResponse<StalenessCheck>, ApiError> {
    if path.is_empty() {
        return Err(ApiError::MissingPath);
    }
    let check = check_stale(store, path, audio_path).map_err(|err| {
        warn!(path = %path, error = %err, "Error checking track data");
        ApiError::Internal(String::from("Error checking track data"))
    })?;
    Ok(ApiResponse {
        body: check,
        cache_control: CACHE_CONTROL_NO_STORE,
    })
}

/// `GET track-data?path=`: the artifact body, or 404 when absent.
pub fn get_track_data(
    store: &ArtifactStore,
    path: &str,
) -> Result<ApiResponse<TrackData>, ApiError> {
    if path.is_empty() {
        return Err(ApiError::MissingPath);
    }
    match store.get(path) {
        Ok(Some(data)) => Ok(ApiResponse {
            body: data,
            cache_control: CACHE_CONTROL_SHARED,
        }),
        Ok(None) => Err(ApiError::NotFound),
        Err(err) => {
            warn!(path = %path, error = %err, "Error fetching track data");
            Err(ApiError::NotFound)
        }
    }
}

/// `POST track-data?path=`: persist an artifact, replacing any previous one.
pub fn save_track_data(
    store: &ArtifactStore,
    path: &str,
    data: &TrackData,
) -> Result<ApiResponse<SaveAck>, ApiError> {
    if path.is_empty() {
        return Err(ApiError::MissingPath);
    }
    store.put(path, data).map_err(|err| {
        warn!(path = %path, error = %err, "Error saving track data");
        ApiError::Internal(String::from("Error saving track data"))
    })?;
    Ok(ApiResponse {
        body: SaveAck {
            message: String::from("Track data saved successfully"),
        },
        cache_control: CACHE_CONTROL_NO_STORE,
    })
}

/// `POST track-data/batch`: fetch many artifacts with bounded concurrency.
pub fn batch_track_data(
    store: &ArtifactStore,
    request: &BatchRequest,
) -> Result<ApiResponse<BatchResponse>, ApiError> {
    if request.paths.is_empty() {
        return Err(ApiError::EmptyBatch);
    }
    let data = batch_get(store, &request.paths, BATCH_CONCURRENCY);
    Ok(ApiResponse {
        body: BatchResponse { data },
        cache_control: CACHE_CONTROL_SHARED,
    })
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Name relative to the listed folder.
    pub name: String,
    /// `"file"` or `"directory"`.
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Kind of a folder listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A sub-folder.
    Directory,
    /// A stored object.
    File,
}

/// `GET files?path=`: sub-folders and audio files under a prefix.
///
/// Derived artifacts and running order documents are internal; only audio
/// files and directories show up in the listing.
pub fn list_folder(
    store: &dyn BlobStore,
    prefix: &str,
) -> Result<ApiResponse<Vec<FolderEntry>>, ApiError> {
    let listing = store.list(prefix).map_err(|err| {
        warn!(prefix = %prefix, error = %err, "Error listing folder");
        ApiError::Internal(String::from("Error listing folder"))
    })?;

    let mut entries: Vec<FolderEntry> = listing
        .directories
        .into_iter()
        .map(|name| FolderEntry {
            name,
            kind: EntryKind::Directory,
        })
        .collect();
    entries.extend(
        listing
            .files
            .into_iter()
            .filter(|name| audio_files::is_supported_audio_name(name))
            .map(|name| FolderEntry {
                name,
                kind: EntryKind::File,
            }),
    );
    Ok(ApiResponse {
        body: entries,
        cache_control: CACHE_CONTROL_NO_STORE,
    })
}
