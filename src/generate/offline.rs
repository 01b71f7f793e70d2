use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::track_data::{PeakAccumulator, PeakSummary, TrackData, generated_at_now};

use super::{GenerateError, ProgressUpdate, TrackDataGenerator, TrackSource};

/// Offline generator that shells out to an external decoder.
///
/// The prober reports the source's native sample rate; the decoder emits raw
/// interleaved little-endian 32-bit float mono PCM on stdout, which is
/// consumed incrementally so whole files are never buffered.
#[derive(Debug, Clone)]
pub struct OfflineGenerator {
    decoder: String,
    prober: String,
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self {
            decoder: String::from("ffmpeg"),
            prober: String::from("ffprobe"),
        }
    }
}

impl OfflineGenerator {
    /// Use specific decoder/prober executables instead of the defaults.
    pub fn with_programs(decoder: impl Into<String>, prober: impl Into<String>) -> Self {
        Self {
            decoder: decoder.into(),
            prober: prober.into(),
        }
    }

    fn probe_sample_rate(&self, path: &Path) -> Result<u32, GenerateError> {
        let output = Command::new(&self.prober)
            .args([
                "-v",
                "error",
                "-select_streams",
                "a:0",
                "-show_entries",
                "stream=sample_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|source| GenerateError::DecoderSpawn {
                program: self.prober.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(GenerateError::Probe {
                path: path.to_path_buf(),
                message: stderr_message(&output.stderr, "probe exited with an error"),
            });
        }

        parse_sample_rate(&output.stdout).ok_or_else(|| GenerateError::Probe {
            path: path.to_path_buf(),
            message: String::from("no usable sample rate in probe output"),
        })
    }

    fn stream_peaks(&self, path: &Path, scale: u32) -> Result<PeakSummary, GenerateError> {
        let mut accumulator = PeakAccumulator::new(scale)?;
        let mut child = Command::new(&self.decoder)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-ac", "1", "-f", "f32le", "-acodec", "pcm_f32le", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GenerateError::DecoderSpawn {
                program: self.decoder.clone(),
                source,
            })?;

        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut message = String::new();
                let _ = stderr.read_to_string(&mut message);
                message
            })
        });

        let read_result = match child.stdout.take() {
            Some(mut stdout) => consume_pcm_stream(&mut stdout, &mut accumulator),
            None => Ok(()),
        };

        let status = child.wait().map_err(|source| GenerateError::DecoderRead {
            path: path.to_path_buf(),
            source,
        })?;
        let stderr_message = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        read_result.map_err(|source| GenerateError::DecoderRead {
            path: path.to_path_buf(),
            source,
        })?;
        if !status.success() {
            return Err(GenerateError::DecoderFailed {
                path: path.to_path_buf(),
                message: non_empty_or(stderr_message.trim(), "decoder exited with an error"),
            });
        }
        Ok(accumulator.finish())
    }
}

impl TrackDataGenerator for OfflineGenerator {
    fn generate(
        &self,
        source: &TrackSource,
        scale: u32,
        _progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<TrackData, GenerateError> {
        let TrackSource::LocalFile(path) = source else {
            return Err(GenerateError::UnsupportedSource(source.to_string()));
        };

        let sample_rate = self.probe_sample_rate(path)?;
        debug!(path = %path.display(), sample_rate, "Probed audio sample rate");

        let summary = self.stream_peaks(path, scale)?;
        if summary.sample_count == 0 {
            return Err(GenerateError::EmptyAudio {
                source_name: path.display().to_string(),
            });
        }

        Ok(TrackData {
            duration: summary.sample_count as f64 / sample_rate as f64,
            peaks: summary.peaks,
            sample_rate,
            scale,
            generated_at: generated_at_now(),
        })
    }
}

/// Feed a raw little-endian f32 PCM stream into the accumulator.
///
/// Chunks from the pipe need not align to sample boundaries, so up to three
/// bytes carry over between reads.
fn consume_pcm_stream(
    reader: &mut impl Read,
    accumulator: &mut PeakAccumulator,
) -> Result<(), std::io::Error> {
    let mut carry: Vec<u8> = Vec::with_capacity(4);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        let mut data = &buf[..read];

        if !carry.is_empty() {
            while carry.len() < 4 && !data.is_empty() {
                carry.push(data[0]);
                data = &data[1..];
            }
            if carry.len() == 4 {
                accumulator.push(f32::from_le_bytes([carry[0], carry[1], carry[2], carry[3]]));
                carry.clear();
            }
        }

        let chunks = data.chunks_exact(4);
        let remainder = chunks.remainder();
        for chunk in chunks {
            accumulator.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        carry.extend_from_slice(remainder);
    }
    Ok(())
}

fn parse_sample_rate(probe_stdout: &[u8]) -> Option<u32> {
    let value: serde_json::Value = serde_json::from_slice(probe_stdout).ok()?;
    let rate = value.pointer("/streams/0/sample_rate")?;
    let rate = match rate {
        serde_json::Value::String(text) => text.parse::<f64>().ok()?,
        serde_json::Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    Some(rate as u32)
}

fn stderr_message(stderr: &[u8], fallback: &str) -> String {
    non_empty_or(String::from_utf8_lossy(stderr).trim(), fallback)
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_data::extract_peaks;

    #[test]
    fn parses_sample_rate_from_probe_json() {
        let json = br#"{"streams":[{"sample_rate":"44100"}]}"#;
        assert_eq!(parse_sample_rate(json), Some(44_100));

        let numeric = br#"{"streams":[{"sample_rate":48000}]}"#;
        assert_eq!(parse_sample_rate(numeric), Some(48_000));
    }

    #[test]
    fn rejects_missing_or_unusable_sample_rates() {
        assert_eq!(parse_sample_rate(br#"{"streams":[]}"#), None);
        assert_eq!(
            parse_sample_rate(br#"{"streams":[{"sample_rate":"0"}]}"#),
            None
        );
        assert_eq!(
            parse_sample_rate(br#"{"streams":[{"sample_rate":"abc"}]}"#),
            None
        );
        assert_eq!(parse_sample_rate(b"not json"), None);
    }

    #[test]
    fn pcm_stream_survives_unaligned_chunks() {
        let samples: Vec<f32> = (0..100).map(|i| ((i as f32) * 0.21).sin()).collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let expected = extract_peaks(&samples, 16).unwrap();

        // A reader that doles out awkward chunk sizes.
        struct Dribble<'a> {
            bytes: &'a [u8],
            step: usize,
        }
        impl Read for Dribble<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let take = self.step.min(self.bytes.len()).min(buf.len());
                buf[..take].copy_from_slice(&self.bytes[..take]);
                self.bytes = &self.bytes[take..];
                self.step = (self.step % 7) + 1;
                Ok(take)
            }
        }

        let mut accumulator = PeakAccumulator::new(16).unwrap();
        consume_pcm_stream(
            &mut Dribble {
                bytes: &bytes,
                step: 3,
            },
            &mut accumulator,
        )
        .unwrap();
        assert_eq!(accumulator.finish(), expected);
    }

    #[test]
    fn remote_sources_are_rejected() {
        let generator = OfflineGenerator::default();
        let source = TrackSource::RemoteUrl(url::Url::parse("https://example.com/a.wav").unwrap());
        let result = generator.generate(&source, 256, &mut |_| {});
        assert!(matches!(result, Err(GenerateError::UnsupportedSource(_))));
    }
}
