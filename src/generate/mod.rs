//! Track-data generation.
//!
//! Two interchangeable strategies produce the same artifact: an offline
//! generator that shells out to an external decoder while walking local
//! files, and an on-demand generator that downloads and decodes in-process
//! when a track is played before its artifact exists. Callers depend only on
//! the [`TrackDataGenerator`] trait and run whichever variant fits their
//! environment.

mod decode;
mod offline;
mod on_demand;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::track_data::PeakError;

pub use decode::{DecodeError, DecodedAudio, decode_audio_bytes};
pub use offline::OfflineGenerator;
pub use on_demand::OnDemandGenerator;

/// Where a generator reads its audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// A file on the local filesystem.
    LocalFile(PathBuf),
    /// An encoded audio URL, typically a signed download link.
    RemoteUrl(Url),
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::LocalFile(path) => write!(f, "{}", path.display()),
            TrackSource::RemoteUrl(url) => write!(f, "{url}"),
        }
    }
}

/// Phase of a generation run, in the order phases occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratePhase {
    /// Fetching encoded audio bytes.
    Downloading,
    /// Decoding the encoded audio.
    Decoding,
    /// Extracting the peak envelope.
    Waveform,
    /// Persisting the artifact.
    Saving,
    /// Confirming the saved artifact is visible.
    Verifying,
}

impl GeneratePhase {
    /// Stable lowercase name for UI and logging.
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratePhase::Downloading => "downloading",
            GeneratePhase::Decoding => "decoding",
            GeneratePhase::Waveform => "waveform",
            GeneratePhase::Saving => "saving",
            GeneratePhase::Verifying => "verifying",
        }
    }
}

impl fmt::Display for GeneratePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress event from a generation run.
///
/// Only the downloading phase reliably knows a percentage; other phases
/// report `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Current phase.
    pub phase: GeneratePhase,
    /// Percent complete within the phase, when known.
    pub percent: Option<f32>,
}

impl ProgressUpdate {
    /// Event for entering a phase with no known percentage.
    pub fn phase(phase: GeneratePhase) -> Self {
        Self {
            phase,
            percent: None,
        }
    }
}

/// Errors from generating track data for one audio source.
///
/// Every variant is fatal for that single source; batch callers isolate
/// failures per item and keep going.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The generator cannot read this kind of source.
    #[error("Unsupported audio source: {0}")]
    UnsupportedSource(String),
    /// The metadata probe failed or returned an unusable sample rate.
    #[error("Unable to read sample rate for {path}: {message}")]
    Probe { path: PathBuf, message: String },
    /// The decoder subprocess could not be started.
    #[error("Failed to start {program}: {source}")]
    DecoderSpawn {
        program: String,
        source: std::io::Error,
    },
    /// The decoder subprocess failed.
    #[error("Decoder failed for {path}: {message}")]
    DecoderFailed { path: PathBuf, message: String },
    /// Reading the decoder's output stream failed.
    #[error("Failed to read decoded audio for {path}: {source}")]
    DecoderRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The download failed or exceeded limits.
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },
    /// In-process decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The source decoded to zero samples.
    #[error("Decoded no audio samples from {source_name}")]
    EmptyAudio { source_name: String },
    /// The requested peak window size is invalid.
    #[error(transparent)]
    InvalidScale(#[from] PeakError),
}

/// A strategy for producing a track-data artifact from an audio source.
pub trait TrackDataGenerator: Send + Sync {
    /// Generate track data at the given peak scale, reporting progress
    /// through the callback as phases begin and advance.
    fn generate(
        &self,
        source: &TrackSource,
        scale: u32,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<crate::track_data::TrackData, GenerateError>;
}
