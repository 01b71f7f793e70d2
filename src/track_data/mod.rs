//! Track-data artifacts and the machinery around them.
//!
//! A track-data artifact is the persisted JSON summary of one audio file:
//! its duration, a downsampled peak envelope, and the parameters used to
//! produce it. Artifacts live next to their audio file in the storage
//! namespace under a versioned suffix.

mod batch;
mod cache;
mod peaks;
mod remote;
mod service;
mod staleness;
mod store;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub use batch::batch_get;
pub use cache::TrackDataCache;
pub use peaks::{PeakAccumulator, PeakError, PeakSummary, extract_peaks, mix_to_mono};
pub use remote::HttpTrackDataService;
pub use service::{BATCH_CONCURRENCY, LocalTrackDataService, ServiceError, TrackDataService};
pub use staleness::{StalenessCheck, check_stale};
pub use store::{ArtifactStore, ArtifactStoreError};

/// Versioned suffix appended to an audio path to derive its artifact key.
///
/// The `.v2` segment is a breaking-format marker: readers of one version do
/// not resolve keys of another, so older artifacts are simply invisible.
pub const TRACK_DATA_SUFFIX: &str = ".track-data.v2.json";

/// Default number of samples summarized into one peak.
pub const DEFAULT_SCALE: u32 = 256;

/// Derive the artifact key for an audio path.
pub fn artifact_key(audio_path: &str) -> String {
    format!("{audio_path}{TRACK_DATA_SUFFIX}")
}

/// Persisted waveform summary of one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    /// Duration in seconds.
    pub duration: f64,
    /// One peak per `scale`-sample window, each in `[0, 1]`.
    pub peaks: Vec<f32>,
    /// Sample rate of the source audio in Hz.
    pub sample_rate: u32,
    /// Samples per peak window used to produce `peaks`.
    pub scale: u32,
    /// ISO-8601 timestamp of artifact creation.
    pub generated_at: String,
}

impl TrackData {
    /// True when the artifact carries a usable duration.
    ///
    /// Consumers gate on this before trusting or caching an artifact.
    pub fn is_usable(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// Current time as an ISO-8601 / RFC 3339 UTC timestamp.
pub fn generated_at_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
pub(crate) fn test_track_data(duration: f64) -> TrackData {
    TrackData {
        duration,
        peaks: vec![0.1, 0.4, 0.2],
        sample_rate: 44_100,
        scale: DEFAULT_SCALE,
        generated_at: String::from("2025-01-01T00:00:00Z"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_key_appends_versioned_suffix() {
        assert_eq!(
            artifact_key("album/one.wav"),
            "album/one.wav.track-data.v2.json"
        );
    }

    #[test]
    fn wire_format_uses_camel_case_fields() {
        let data = test_track_data(12.5);
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"sampleRate\":44100"));
        assert!(json.contains("\"generatedAt\""));
        let back: TrackData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn usability_requires_finite_positive_duration() {
        assert!(test_track_data(1.0).is_usable());
        assert!(!test_track_data(0.0).is_usable());
        assert!(!test_track_data(f64::NAN).is_usable());
        assert!(!test_track_data(f64::INFINITY).is_usable());
    }

    #[test]
    fn generated_at_is_rfc3339() {
        let stamp = generated_at_now();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z') || stamp.contains('+'));
    }
}
