use std::collections::{HashMap, HashSet};

use crate::track_data::{TrackDataCache, artifact_key};

use super::LoadTicket;

/// Whether a track's artifact was found during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackDataStatus {
    /// An artifact with a usable duration exists.
    Present,
    /// No artifact could be resolved for the track.
    Missing,
}

/// Per-track results of one duration sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    /// Track name to duration in seconds.
    pub durations: HashMap<String, f64>,
    /// Track name to artifact status.
    pub status: HashMap<String, TrackDataStatus>,
}

/// Batched duration lookup for a folder's playlist.
///
/// Tracks already known or already in flight are skipped, the rest go out
/// as one batch through the cache, and whatever the batch could not resolve
/// is retried sequentially as a degraded-but-correct fallback.
#[derive(Debug, Default)]
pub struct DurationSweep {
    pending: HashSet<String>,
}

impl DurationSweep {
    /// Create a sweep with no pending fetches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep the playlist for durations the caller does not know yet.
    pub fn run(
        &mut self,
        cache: &TrackDataCache,
        folder_path: &str,
        known_durations: &HashMap<String, f64>,
        tracks: &[String],
        ticket: &LoadTicket,
    ) -> SweepOutcome {
        let missing: Vec<String> = tracks
            .iter()
            .filter(|name| {
                !known_durations.contains_key(*name) && !self.pending.contains(*name)
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            return SweepOutcome::default();
        }

        for name in &missing {
            self.pending.insert(name.clone());
        }
        let outcome = sweep(cache, folder_path, &missing, ticket);
        for name in &missing {
            self.pending.remove(name);
        }
        outcome
    }
}

fn sweep(
    cache: &TrackDataCache,
    folder_path: &str,
    missing: &[String],
    ticket: &LoadTicket,
) -> SweepOutcome {
    let key_for = |name: &str| {
        if folder_path.is_empty() {
            artifact_key(name)
        } else {
            artifact_key(&format!("{}/{name}", folder_path.trim_end_matches('/')))
        }
    };
    let keys: Vec<String> = missing.iter().map(|name| key_for(name)).collect();

    let batch = cache.fetch_many(&keys);
    let mut outcome = SweepOutcome::default();
    if ticket.is_stale() {
        return outcome;
    }

    let mut still_missing = Vec::new();
    for name in missing {
        let key = key_for(name);
        match batch.get(&key) {
            Some(Some(data)) if data.is_usable() => {
                outcome.durations.insert(name.clone(), data.duration);
                outcome.status.insert(name.clone(), TrackDataStatus::Present);
            }
            _ => still_missing.push(name.clone()),
        }
    }

    for name in still_missing {
        if ticket.is_stale() {
            return outcome;
        }
        let key = key_for(&name);
        match cache.fetch_one(&key) {
            Some(data) if data.is_usable() => {
                outcome.durations.insert(name.clone(), data.duration);
                outcome.status.insert(name, TrackDataStatus::Present);
            }
            _ => {
                outcome.status.insert(name, TrackDataStatus::Missing);
            }
        }
    }
    outcome
}
