use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use super::{TrackData, TrackDataService};

/// Session-scoped in-memory cache over a track-data service.
///
/// One instance lives for one browsing session and is shared by everything
/// in it. Hits short-circuit the service entirely. Only usable artifacts are
/// cached; a missing result is never recorded, so a later retry can succeed
/// once the artifact has been generated.
pub struct TrackDataCache {
    service: Arc<dyn TrackDataService>,
    entries: Mutex<HashMap<String, TrackData>>,
}

impl TrackDataCache {
    /// Create an empty cache over the given service.
    pub fn new(service: Arc<dyn TrackDataService>) -> Self {
        Self {
            service,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch one artifact, consulting the cache first.
    ///
    /// Service failures degrade to `None` so callers treat "unavailable" and
    /// "not generated yet" the same way.
    pub fn fetch_one(&self, key: &str) -> Option<TrackData> {
        if let Some(cached) = self.lookup(key) {
            return Some(cached);
        }
        match self.service.fetch(key) {
            Ok(Some(data)) => {
                if data.is_usable() {
                    self.insert(key, data.clone());
                }
                Some(data)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "Track-data fetch failed");
                None
            }
        }
    }

    /// Fetch many artifacts, batching the uncached subset into one call.
    ///
    /// The result carries one entry per key the batch resolved (cached keys
    /// included). Keys the batch could not resolve are absent; callers fall
    /// back to sequential `fetch_one` for those.
    pub fn fetch_many(&self, keys: &[String]) -> HashMap<String, Option<TrackData>> {
        let mut result = HashMap::new();
        let mut uncached = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match self.lookup(key) {
                Some(cached) => {
                    result.insert(key.clone(), Some(cached));
                }
                None => uncached.push(key.clone()),
            }
        }

        if uncached.is_empty() {
            return result;
        }

        let batch = match self.service.fetch_batch(&uncached) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "Batch track-data fetch failed");
                return result;
            }
        };

        for (key, value) in batch {
            if let Some(data) = &value
                && data.is_usable()
            {
                self.insert(&key, data.clone());
            }
            result.insert(key, value);
        }
        result
    }

    /// Record an artifact, replacing any previous entry for the key.
    pub fn insert(&self, key: &str, data: TrackData) {
        self.lock().insert(key.to_string(), data);
    }

    /// Drop the entry for a key, if any.
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Number of cached artifacts.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<TrackData> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrackData>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
