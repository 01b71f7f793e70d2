//! Running order documents: the user-controlled track ordering per folder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{BlobStore, StorageError};

/// File name of the running order document inside a folder.
///
/// The `.v2` marker is authoritative; legacy `running-order.json` files are
/// invisible to this code and left untouched.
pub const RUNNING_ORDER_FILE: &str = "running-order.v2.json";

/// Ordered playlist for one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningOrder {
    /// Track file names in play order.
    pub playlist: Vec<String>,
}

/// Errors from loading or saving a running order.
#[derive(Debug, Error)]
pub enum RunningOrderError {
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The stored bytes are not a valid running order document.
    #[error("Malformed running order at {key}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
}

impl RunningOrder {
    /// Storage key of the running order document for a folder.
    pub fn key_for_folder(folder_path: &str) -> String {
        if folder_path.is_empty() {
            RUNNING_ORDER_FILE.to_string()
        } else {
            format!("{}/{RUNNING_ORDER_FILE}", folder_path.trim_end_matches('/'))
        }
    }

    /// Load the running order for a folder, or `None` when none was saved.
    pub fn load(
        store: &dyn BlobStore,
        folder_path: &str,
    ) -> Result<Option<RunningOrder>, RunningOrderError> {
        let key = Self::key_for_folder(folder_path);
        let Some(bytes) = store.get(&key)? else {
            return Ok(None);
        };
        let order =
            serde_json::from_slice(&bytes).map_err(|source| RunningOrderError::Malformed {
                key,
                source,
            })?;
        Ok(Some(order))
    }

    /// Save the running order for a folder, replacing any previous document.
    pub fn save(&self, store: &dyn BlobStore, folder_path: &str) -> Result<(), RunningOrderError> {
        let key = Self::key_for_folder(folder_path);
        let mut bytes =
            serde_json::to_vec_pretty(self).map_err(|source| RunningOrderError::Malformed {
                key: key.clone(),
                source,
            })?;
        bytes.push(b'\n');
        store.put(&key, &bytes)?;
        Ok(())
    }

    /// Reconcile a saved order with the files currently in the folder.
    ///
    /// Keeps the saved order for names that still exist and appends files
    /// the order has never seen, in the order given. Names that vanished
    /// from the folder drop out.
    pub fn merge_with_files(&self, files: &[String]) -> Vec<String> {
        let mut merged: Vec<String> = self
            .playlist
            .iter()
            .filter(|name| files.contains(name))
            .cloned()
            .collect();
        for file in files {
            if !merged.contains(file) {
                merged.push(file.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn key_lands_inside_the_folder() {
        assert_eq!(
            RunningOrder::key_for_folder("demos/2025"),
            "demos/2025/running-order.v2.json"
        );
        assert_eq!(RunningOrder::key_for_folder(""), "running-order.v2.json");
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let order = RunningOrder {
            playlist: names(&["b.wav", "a.wav"]),
        };
        order.save(&store, "demos").unwrap();
        assert_eq!(RunningOrder::load(&store, "demos").unwrap(), Some(order));
        assert_eq!(RunningOrder::load(&store, "other").unwrap(), None);
    }

    #[test]
    fn merge_keeps_saved_order_and_appends_new_files() {
        let order = RunningOrder {
            playlist: names(&["c.wav", "a.wav", "gone.wav"]),
        };
        let merged = order.merge_with_files(&names(&["a.wav", "b.wav", "c.wav"]));
        assert_eq!(merged, names(&["c.wav", "a.wav", "b.wav"]));
    }
}
