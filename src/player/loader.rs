use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{info, warn};

use crate::generate::{
    GenerateError, GeneratePhase, ProgressUpdate, TrackDataGenerator, TrackSource,
};
use crate::track_data::{
    DEFAULT_SCALE, ServiceError, TrackData, TrackDataCache, TrackDataService, artifact_key,
};

use super::{CancelFlag, DURATION_TOLERANCE_SECONDS, LoadTicket, VerifyConfig};

/// Storage keys for one selected track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackKeys {
    /// Display name of the track within its folder.
    pub track_name: String,
    /// Storage key of the audio file.
    pub audio_key: String,
    /// Storage key of the derived artifact.
    pub artifact_key: String,
}

impl TrackKeys {
    /// Derive keys for a track inside a folder.
    pub fn for_track(folder_path: &str, track_name: &str) -> Self {
        let audio_key = if folder_path.is_empty() {
            track_name.to_string()
        } else {
            format!("{}/{track_name}", folder_path.trim_end_matches('/'))
        };
        Self {
            track_name: track_name.to_string(),
            artifact_key: artifact_key(&audio_key),
            audio_key,
        }
    }
}

/// Where the loader currently is for the selected track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing selected.
    #[default]
    NoTrack,
    /// Deciding between cached artifact and regeneration.
    LoadingArtifact,
    /// Artifact peaks and duration are in hand.
    ArtifactReady,
    /// The playback engine confirmed the track and durations agree.
    EngineReady,
    /// A duration mismatch triggered a forced regeneration.
    Regenerating,
}

/// Result of a load attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Artifact available; feed its peaks and duration to the engine.
    Ready(TrackData),
    /// The check said the artifact exists but it could not be fetched.
    Unavailable,
    /// The track changed before the result could be applied.
    Cancelled,
}

/// Result of reconciling the engine's duration against the artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Durations agree within tolerance.
    Consistent,
    /// The artifact was presumed corrupt and regenerated.
    Repaired(TrackData),
    /// The track changed before the result could be applied.
    Cancelled,
}

/// Errors from loading or repairing a track's artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The track-data service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Generation failed for this track.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Maps a track to the audio source its generator should read.
pub type SourceResolver = dyn Fn(&TrackKeys) -> TrackSource + Send + Sync;

/// Drives the artifact lifecycle for the currently selected track.
pub struct TrackLoader {
    service: Arc<dyn TrackDataService>,
    cache: Arc<TrackDataCache>,
    generator: Arc<dyn TrackDataGenerator>,
    resolve_source: Box<SourceResolver>,
    scale: u32,
    verify: VerifyConfig,
    flag: CancelFlag,
    state: Mutex<LoadState>,
}

impl TrackLoader {
    /// Create a loader over a service, cache, and generator.
    pub fn new(
        service: Arc<dyn TrackDataService>,
        cache: Arc<TrackDataCache>,
        generator: Arc<dyn TrackDataGenerator>,
        resolve_source: Box<SourceResolver>,
    ) -> Self {
        Self {
            service,
            cache,
            generator,
            resolve_source,
            scale: DEFAULT_SCALE,
            verify: VerifyConfig::default(),
            flag: CancelFlag::new(),
            state: Mutex::new(LoadState::NoTrack),
        }
    }

    /// Override the peak scale used for regeneration.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Override the post-save verification settings.
    pub fn with_verify(mut self, verify: VerifyConfig) -> Self {
        self.verify = verify;
        self
    }

    /// Current load state.
    pub fn state(&self) -> LoadState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancellation flag shared with folder-level work.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.flag
    }

    /// Select a track: invalidates in-flight loads for the previous track
    /// and returns the ticket and keys for this one.
    pub fn begin(&self, folder_path: &str, track_name: &str) -> (LoadTicket, TrackKeys) {
        let ticket = self.flag.next_ticket();
        (ticket, TrackKeys::for_track(folder_path, track_name))
    }

    /// Deselect: invalidates in-flight loads and returns to `NoTrack`.
    pub fn clear(&self) {
        self.flag.invalidate();
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = LoadState::NoTrack;
    }

    /// Run the load sequence for a selected track.
    ///
    /// Checks staleness first; a fresh artifact loads through the cache,
    /// anything else regenerates, saves, and re-checks visibility. A
    /// generation that is already in flight when the user navigates away
    /// still completes and persists; only state updates are discarded.
    pub fn load(
        &self,
        ticket: &LoadTicket,
        keys: &TrackKeys,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<LoadOutcome, LoadError> {
        if !self.set_state(ticket, LoadState::LoadingArtifact) {
            return Ok(LoadOutcome::Cancelled);
        }

        let check = self
            .service
            .check(&keys.artifact_key, Some(&keys.audio_key))?;
        if check.exists && !check.needs_regeneration {
            let Some(data) = self.cache.fetch_one(&keys.artifact_key) else {
                return Ok(LoadOutcome::Unavailable);
            };
            if !self.set_state(ticket, LoadState::ArtifactReady) {
                return Ok(LoadOutcome::Cancelled);
            }
            return Ok(LoadOutcome::Ready(data));
        }

        if ticket.is_stale() {
            return Ok(LoadOutcome::Cancelled);
        }
        info!(track = %keys.track_name, "Regenerating track data");
        let data = self.generate_and_save(keys, progress)?;
        self.cache.insert(&keys.artifact_key, data.clone());
        if !self.set_state(ticket, LoadState::ArtifactReady) {
            return Ok(LoadOutcome::Cancelled);
        }
        info!(track = %keys.track_name, "Regenerated track data");
        Ok(LoadOutcome::Ready(data))
    }

    /// Compare the engine's self-reported duration against the artifact's.
    ///
    /// A disagreement beyond tolerance means the artifact is presumed
    /// corrupt (an interrupted write, a lost race); it is regenerated in
    /// force mode, bypassing the staleness check and the cache entry. The
    /// mismatch is logged, never surfaced as a user-facing error.
    pub fn reconcile_engine_duration(
        &self,
        ticket: &LoadTicket,
        keys: &TrackKeys,
        artifact_duration: f64,
        engine_duration: f64,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<ReconcileOutcome, LoadError> {
        if ticket.is_stale() {
            return Ok(ReconcileOutcome::Cancelled);
        }
        let difference = (engine_duration - artifact_duration).abs();
        if difference <= DURATION_TOLERANCE_SECONDS {
            if !self.set_state(ticket, LoadState::EngineReady) {
                return Ok(ReconcileOutcome::Cancelled);
            }
            return Ok(ReconcileOutcome::Consistent);
        }

        warn!(
            track = %keys.track_name,
            artifact_duration,
            engine_duration,
            "Track data duration disagrees with engine; regenerating"
        );
        if !self.set_state(ticket, LoadState::Regenerating) {
            return Ok(ReconcileOutcome::Cancelled);
        }
        self.cache.remove(&keys.artifact_key);
        let data = self.generate_and_save(keys, progress)?;
        self.cache.insert(&keys.artifact_key, data.clone());
        if !self.set_state(ticket, LoadState::EngineReady) {
            return Ok(ReconcileOutcome::Cancelled);
        }
        Ok(ReconcileOutcome::Repaired(data))
    }

    fn generate_and_save(
        &self,
        keys: &TrackKeys,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<TrackData, LoadError> {
        let source = (self.resolve_source)(keys);
        let data = self.generator.generate(&source, self.scale, progress)?;
        progress(ProgressUpdate::phase(GeneratePhase::Saving));
        self.service.save(&keys.artifact_key, &data)?;
        progress(ProgressUpdate::phase(GeneratePhase::Verifying));
        self.verify_saved(&keys.artifact_key);
        Ok(data)
    }

    /// Re-check until the saved artifact is visible, with linear backoff.
    ///
    /// Exhaustion is a warning, not a failure: the artifact was already
    /// saved, only the visibility confirmation timed out.
    fn verify_saved(&self, key: &str) -> bool {
        for attempt in 1..=self.verify.max_attempts {
            match self.service.check(key, None) {
                Ok(check) if check.exists => return true,
                Ok(_) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "Visibility check failed after save");
                }
            }
            if attempt < self.verify.max_attempts {
                thread::sleep(self.verify.backoff_step * attempt as u32);
            }
        }
        warn!(key = %key, "Saved track data still not visible; giving up");
        false
    }

    fn set_state(&self, ticket: &LoadTicket, state: LoadState) -> bool {
        if ticket.is_stale() {
            return false;
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobStore, MemoryStore};
    use crate::track_data::{ArtifactStore, LocalTrackDataService, generated_at_now};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    struct StubGenerator {
        duration: f64,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TrackDataGenerator for StubGenerator {
        fn generate(
            &self,
            _source: &TrackSource,
            scale: u32,
            progress: &mut dyn FnMut(ProgressUpdate),
        ) -> Result<TrackData, GenerateError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            progress(ProgressUpdate::phase(GeneratePhase::Waveform));
            Ok(TrackData {
                duration: self.duration,
                peaks: vec![0.2, 0.6],
                sample_rate: 44_100,
                scale,
                generated_at: generated_at_now(),
            })
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        cache: Arc<TrackDataCache>,
        generator: Arc<StubGenerator>,
        loader: TrackLoader,
    }

    fn harness(duration: f64) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let service: Arc<dyn TrackDataService> = Arc::new(LocalTrackDataService::new(
            ArtifactStore::new(store.clone()),
        ));
        let cache = Arc::new(TrackDataCache::new(service.clone()));
        let generator = Arc::new(StubGenerator::new(duration));
        let loader = TrackLoader::new(
            service,
            cache.clone(),
            generator.clone(),
            Box::new(|keys: &TrackKeys| {
                TrackSource::LocalFile(std::path::PathBuf::from(&keys.audio_key))
            }),
        )
        .with_verify(VerifyConfig {
            max_attempts: 2,
            backoff_step: Duration::from_millis(0),
        });
        Harness {
            store,
            cache,
            generator,
            loader,
        }
    }

    #[test]
    fn missing_artifact_generates_saves_and_caches() {
        let h = harness(90.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        let mut phases = Vec::new();
        let outcome = h
            .loader
            .load(&ticket, &keys, &mut |update| phases.push(update.phase))
            .unwrap();

        let LoadOutcome::Ready(data) = outcome else {
            panic!("expected a ready outcome");
        };
        assert_eq!(data.duration, 90.0);
        assert_eq!(h.loader.state(), LoadState::ArtifactReady);
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 1);
        // Saved through the service and visible in the backing store.
        assert!(
            h.store
                .get("demos/one.wav.track-data.v2.json")
                .unwrap()
                .is_some()
        );
        // Saving and verifying phases follow the generator's own phases.
        assert_eq!(
            phases,
            vec![
                GeneratePhase::Waveform,
                GeneratePhase::Saving,
                GeneratePhase::Verifying
            ]
        );
        // Cached for the next fetch.
        assert!(h.cache.fetch_one(&keys.artifact_key).is_some());
    }

    #[test]
    fn fresh_artifact_loads_without_generating() {
        let h = harness(90.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 1);

        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        let outcome = h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();
        assert!(matches!(outcome, LoadOutcome::Ready(_)));
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn stale_artifact_regenerates() {
        let h = harness(90.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();

        // Audio replaced after the artifact was written.
        h.store.put(&keys.audio_key, b"new audio").unwrap();
        h.store.set_updated(
            &keys.artifact_key,
            SystemTime::now() - Duration::from_secs(3600),
        );

        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        let outcome = h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();
        assert!(matches!(outcome, LoadOutcome::Ready(_)));
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn switching_tracks_discards_the_first_load() {
        let h = harness(90.0);
        let (first_ticket, first_keys) = h.loader.begin("demos", "one.wav");
        // User skips ahead before the first load runs.
        let _ = h.loader.begin("demos", "two.wav");

        let outcome = h.loader.load(&first_ticket, &first_keys, &mut |_| {}).unwrap();
        assert_eq!(outcome, LoadOutcome::Cancelled);
    }

    #[test]
    fn matching_durations_reconcile_without_repair() {
        let h = harness(90.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();

        let outcome = h
            .loader
            .reconcile_engine_duration(&ticket, &keys, 90.0, 91.2, &mut |_| {})
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Consistent);
        assert_eq!(h.loader.state(), LoadState::EngineReady);
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn duration_mismatch_forces_regeneration() {
        let h = harness(120.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");

        // Seed a corrupt artifact claiming a much shorter duration.
        let corrupt = TrackData {
            duration: 95.0,
            peaks: vec![0.1],
            sample_rate: 44_100,
            scale: 256,
            generated_at: generated_at_now(),
        };
        h.cache.insert(&keys.artifact_key, corrupt);

        let outcome = h
            .loader
            .reconcile_engine_duration(&ticket, &keys, 95.0, 120.0, &mut |_| {})
            .unwrap();
        let ReconcileOutcome::Repaired(data) = outcome else {
            panic!("expected a repair");
        };
        assert_eq!(data.duration, 120.0);
        assert_eq!(h.loader.state(), LoadState::EngineReady);
        assert_eq!(h.generator.calls.load(Ordering::Relaxed), 1);
        // The cache entry now reflects the repaired artifact.
        assert_eq!(
            h.cache.fetch_one(&keys.artifact_key).unwrap().duration,
            120.0
        );
    }

    #[test]
    fn clear_returns_to_no_track() {
        let h = harness(90.0);
        let (ticket, keys) = h.loader.begin("demos", "one.wav");
        h.loader.load(&ticket, &keys, &mut |_| {}).unwrap();
        h.loader.clear();
        assert_eq!(h.loader.state(), LoadState::NoTrack);
        assert!(ticket.is_stale());
    }
}
