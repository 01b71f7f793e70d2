//! Blob storage abstraction used by the track-data pipeline.
//!
//! The store is a flat key/value namespace with `/`-separated keys. Folder
//! structure is simulated the way object stores do it: listing a prefix
//! partitions the children into sub-directories and files. Missing objects
//! are reported as `None`, never as errors, so callers do not need to catch
//! anything for the common "doesn't exist yet" case.

mod fs;
mod memory;

use std::io::Read;
use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Metadata for a stored object, as reported by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Last time the object was written.
    pub updated: SystemTime,
}

/// Immediate children of a storage prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Sub-directory names, relative to the listed prefix.
    pub directories: Vec<String>,
    /// File names, relative to the listed prefix.
    pub files: Vec<String>,
}

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key escapes the store's namespace or is otherwise malformed.
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },
    /// Failed to read an object that should be readable.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write an object.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to list a prefix.
    #[error("Failed to list {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The backend refused to serve the object.
    #[error("Object unavailable: {key}")]
    Unavailable { key: String },
}

/// Key/value blob store with last-modified metadata.
///
/// Implementations map a missing object to `Ok(None)` for `get` and
/// `metadata`; only genuine backend failures surface as errors.
pub trait BlobStore: Send + Sync {
    /// List the immediate children of a prefix. A missing prefix lists empty.
    fn list(&self, prefix: &str) -> Result<Listing, StorageError>;

    /// Fetch an object's bytes, or `None` if it does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write an object, replacing any previous contents.
    ///
    /// The write is atomic from a reader's viewpoint: concurrent readers see
    /// either the old bytes or the new bytes, never a partial object.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fetch an object's metadata without downloading its contents.
    fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError>;

    /// Open a streaming reader over an object. Missing objects are an error
    /// here; callers use `metadata` first when absence is expected.
    fn read_stream(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError>;
}
