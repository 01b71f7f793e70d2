use std::io::Read;

use url::Url;

use crate::http_client;
use crate::track_data::{TrackData, extract_peaks, generated_at_now, mix_to_mono};

use super::decode::decode_audio_bytes;
use super::{GenerateError, GeneratePhase, ProgressUpdate, TrackDataGenerator, TrackSource};

/// Size cap for downloaded audio, matching what a session can decode.
const MAX_AUDIO_BYTES: usize = 512 * 1024 * 1024;

/// On-demand generator that downloads and decodes in-process.
///
/// Used when a track is opened before its artifact exists or after it went
/// stale: download with progress, decode, mix to mono, extract peaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnDemandGenerator;

impl OnDemandGenerator {
    fn download(
        url: &Url,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<Vec<u8>, GenerateError> {
        progress(ProgressUpdate::phase(GeneratePhase::Downloading));
        let response = http_client::agent()
            .request_url("GET", url)
            .call()
            .map_err(|err| GenerateError::Download {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let declared = http_client::declared_content_length(&response);
        if declared.is_some_and(|length| length > MAX_AUDIO_BYTES as u64) {
            return Err(GenerateError::Download {
                url: url.to_string(),
                message: format!("audio exceeds {MAX_AUDIO_BYTES} bytes"),
            });
        }

        let mut reader = response.into_reader().take(MAX_AUDIO_BYTES as u64 + 1);
        let mut bytes = Vec::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = reader
                .read(&mut buf)
                .map_err(|err| GenerateError::Download {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..read]);
            if bytes.len() > MAX_AUDIO_BYTES {
                return Err(GenerateError::Download {
                    url: url.to_string(),
                    message: format!("audio exceeds {MAX_AUDIO_BYTES} bytes"),
                });
            }
            let percent = declared
                .filter(|&total| total > 0)
                .map(|total| ((bytes.len() as f64 / total as f64) * 100.0).min(100.0) as f32);
            progress(ProgressUpdate {
                phase: GeneratePhase::Downloading,
                percent,
            });
        }

        if bytes.is_empty() {
            return Err(GenerateError::Download {
                url: url.to_string(),
                message: String::from("empty response body"),
            });
        }
        Ok(bytes)
    }
}

impl TrackDataGenerator for OnDemandGenerator {
    fn generate(
        &self,
        source: &TrackSource,
        scale: u32,
        progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<TrackData, GenerateError> {
        let TrackSource::RemoteUrl(url) = source else {
            return Err(GenerateError::UnsupportedSource(source.to_string()));
        };

        let bytes = Self::download(url, progress)?;

        progress(ProgressUpdate::phase(GeneratePhase::Decoding));
        let extension = extension_hint(url);
        let decoded = decode_audio_bytes(bytes, extension.as_deref())?;
        if decoded.frame_count() == 0 {
            return Err(GenerateError::EmptyAudio {
                source_name: url.to_string(),
            });
        }

        progress(ProgressUpdate::phase(GeneratePhase::Waveform));
        let mono = mix_to_mono(&decoded.samples, decoded.channels as usize);
        let summary = extract_peaks(&mono, scale)?;

        Ok(TrackData {
            duration: decoded.duration_seconds(),
            peaks: summary.peaks,
            sample_rate: decoded.sample_rate,
            scale,
            generated_at: generated_at_now(),
        })
    }
}

fn extension_hint(url: &Url) -> Option<String> {
    let path = url.path();
    let name = path.rsplit('/').next()?;
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_ascii_lowercase())
    }
}
