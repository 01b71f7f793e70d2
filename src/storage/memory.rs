use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use super::{BlobStore, Listing, ObjectMetadata, StorageError};

/// In-memory blob store for tests and single-process previews.
///
/// Supports rewinding an object's `updated` timestamp and marking keys as
/// unavailable so staleness and partial-failure paths can be exercised
/// without a real backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    unavailable: HashSet<String>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    updated: SystemTime,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `updated` timestamp of an existing object.
    /// Returns false when the key does not exist.
    pub fn set_updated(&self, key: &str, updated: SystemTime) -> bool {
        let mut inner = self.lock();
        match inner.objects.get_mut(key) {
            Some(object) => {
                object.updated = updated;
                true
            }
            None => false,
        }
    }

    /// Make every access to the key fail with `StorageError::Unavailable`.
    pub fn mark_unavailable(&self, key: &str) {
        self.lock().unavailable.insert(key.to_string());
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// True when the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(inner: &Inner, key: &str) -> Result<(), StorageError> {
        if inner.unavailable.contains(key) {
            return Err(StorageError::Unavailable {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl BlobStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Listing, StorageError> {
        let inner = self.lock();
        let normalized = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        let mut directories = HashSet::new();
        let mut files = Vec::new();
        for key in inner.objects.keys() {
            let Some(rest) = key.strip_prefix(&normalized) else {
                continue;
            };
            match rest.split_once('/') {
                Some((directory, _)) => {
                    directories.insert(directory.to_string());
                }
                None => files.push(rest.to_string()),
            }
        }

        let mut directories: Vec<String> = directories.into_iter().collect();
        directories.sort();
        files.sort();
        Ok(Listing { directories, files })
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.lock();
        Self::check_available(&inner, key)?;
        Ok(inner.objects.get(key).map(|object| object.bytes.clone()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        Self::check_available(&inner, key)?;
        inner.objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                updated: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        let inner = self.lock();
        Self::check_available(&inner, key)?;
        Ok(inner
            .objects
            .get(key)
            .map(|object| ObjectMetadata {
                updated: object.updated,
            }))
    }

    fn read_stream(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let inner = self.lock();
        Self::check_available(&inner, key)?;
        let object = inner
            .objects
            .get(key)
            .ok_or_else(|| StorageError::Unavailable {
                key: key.to_string(),
            })?;
        Ok(Box::new(Cursor::new(object.bytes.clone())))
    }
}
