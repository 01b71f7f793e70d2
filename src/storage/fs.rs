use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use super::{BlobStore, Listing, ObjectMetadata, StorageError};

/// Filesystem-backed blob store rooted at a local directory.
///
/// Keys are `/`-separated paths relative to the root; keys that try to
/// escape the root are rejected.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store over the given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory this store serves from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidKey {
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(resolved)
    }
}

impl BlobStore for FsStore {
    fn list(&self, prefix: &str) -> Result<Listing, StorageError> {
        let dir = self.resolve(prefix)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(Listing::default()),
            Err(source) => return Err(StorageError::List { path: dir, source }),
        };

        let mut listing = Listing::default();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::List {
                path: dir.clone(),
                source,
            })?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let file_type = entry.file_type().map_err(|source| StorageError::List {
                path: entry.path(),
                source,
            })?;
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                listing.directories.push(name);
            } else {
                listing.files.push(name);
            }
        }
        listing.directories.sort();
        listing.files.sort();
        Ok(listing)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        // Write-then-rename so readers never observe a partial object.
        let staging = staging_path(&path);
        fs::write(&staging, bytes).map_err(|source| StorageError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StorageError::Write { path, source })
    }

    fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        let path = self.resolve(key)?;
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        let updated = meta
            .modified()
            .map_err(|source| StorageError::Read { path, source })?;
        Ok(Some(ObjectMetadata { updated }))
    }

    fn read_stream(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let path = self.resolve(key)?;
        let file = File::open(&path).map_err(|source| StorageError::Read { path, source })?;
        Ok(Box::new(file))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn get_returns_none_for_missing_object() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.get("missing.json").unwrap().is_none());
        assert!(store.metadata("missing.json").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips_and_creates_parents() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("album/one.json", b"{}").unwrap();
        assert_eq!(store.get("album/one.json").unwrap().unwrap(), b"{}");
        assert!(store.metadata("album/one.json").unwrap().is_some());
    }

    #[test]
    fn put_leaves_no_staging_file_behind() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("one.json", b"data").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["one.json".to_string()]);
    }

    #[test]
    fn rejects_keys_that_escape_the_root() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(
            store.get("../outside.json"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.put("/absolute.json", b"x"),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn list_partitions_directories_and_files() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("album/one.wav", b"a").unwrap();
        store.put("album/two.wav", b"b").unwrap();
        store.put("album/takes/three.wav", b"c").unwrap();

        let listing = store.list("album").unwrap();
        assert_eq!(listing.directories, vec!["takes".to_string()]);
        assert_eq!(
            listing.files,
            vec!["one.wav".to_string(), "two.wav".to_string()]
        );
    }

    #[test]
    fn read_stream_streams_object_bytes() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("album/one.wav", b"stream me").unwrap();

        let mut reader = store.read_stream("album/one.wav").unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"stream me");

        assert!(store.read_stream("album/missing.wav").is_err());
    }

    #[test]
    fn list_of_missing_prefix_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert_eq!(store.list("nowhere").unwrap(), Listing::default());
    }
}
