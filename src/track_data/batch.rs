use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::warn;

use super::{ArtifactStore, TrackData};

/// Fetch many artifacts with bounded concurrency.
///
/// Workers share one cursor over the key list, so at most
/// `min(concurrency, keys.len())` fetches are in flight regardless of how
/// long the list is. Every requested key gets exactly one map entry;
/// not-found and per-key fetch failures both record `None` without
/// disturbing the rest of the batch.
pub fn batch_get(
    store: &ArtifactStore,
    keys: &[String],
    concurrency: usize,
) -> HashMap<String, Option<TrackData>> {
    if keys.is_empty() {
        return HashMap::new();
    }
    let worker_count = concurrency.clamp(1, keys.len());
    let cursor = AtomicUsize::new(0);
    let results: Mutex<HashMap<String, Option<TrackData>>> =
        Mutex::new(HashMap::with_capacity(keys.len()));

    thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(key) = keys.get(index) else {
                        break;
                    };
                    let value = match store.get(key) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(key = %key, error = %err, "Batch track-data fetch failed");
                            None
                        }
                    };
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(key.clone(), value);
                }
            });
        }
    });

    results.into_inner().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::track_data::test_track_data;
    use std::sync::Arc;

    fn seeded_store(present: &[&str]) -> (Arc<MemoryStore>, ArtifactStore) {
        let store = Arc::new(MemoryStore::new());
        let artifacts = ArtifactStore::new(store.clone());
        for key in present {
            artifacts.put(key, &test_track_data(10.0)).unwrap();
        }
        (store, artifacts)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn returns_one_entry_per_requested_key() {
        let (_, artifacts) = seeded_store(&["x.json"]);
        let result = batch_get(&artifacts, &keys(&["x.json", "y.json"]), 5);
        assert_eq!(result.len(), 2);
        assert!(result["x.json"].is_some());
        assert!(result["y.json"].is_none());
    }

    #[test]
    fn per_key_failures_do_not_abort_the_batch() {
        let (store, artifacts) = seeded_store(&["a.json", "b.json", "c.json"]);
        store.mark_unavailable("b.json");

        let result = batch_get(&artifacts, &keys(&["a.json", "b.json", "c.json"]), 5);
        assert_eq!(result.len(), 3);
        assert!(result["a.json"].is_some());
        assert!(result["b.json"].is_none());
        assert!(result["c.json"].is_some());
    }

    #[test]
    fn handles_more_keys_than_workers() {
        let names: Vec<String> = (0..37).map(|i| format!("{i}.json")).collect();
        let store = Arc::new(MemoryStore::new());
        let artifacts = ArtifactStore::new(store);
        for name in &names {
            artifacts.put(name, &test_track_data(1.0)).unwrap();
        }

        let result = batch_get(&artifacts, &names, 5);
        assert_eq!(result.len(), names.len());
        assert!(result.values().all(|value| value.is_some()));
    }

    #[test]
    fn empty_key_list_yields_empty_map() {
        let (_, artifacts) = seeded_store(&[]);
        assert!(batch_get(&artifacts, &[], 5).is_empty());
    }
}
