use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use thiserror::Error;

/// Raw decoded audio in interleaved `f32` samples.
pub struct DecodedAudio {
    /// Interleaved samples across all channels.
    pub samples: Vec<f32>,
    /// Sample rate in Hz (at least 1).
    pub sample_rate: u32,
    /// Channel count (at least 1).
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of frames in the decoded audio.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration in seconds derived from frames and sample rate.
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Errors from decoding encoded audio bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No known container/codec matched the bytes.
    #[error("Audio probe failed: {0}")]
    Probe(String),
    /// The container has no decodable audio track.
    #[error("No default audio track")]
    NoTrack,
    /// The track is missing a required parameter.
    #[error("Missing codec parameter: {0}")]
    MissingParameter(&'static str),
    /// Building the codec decoder failed.
    #[error("Decoder setup failed: {0}")]
    DecoderSetup(String),
    /// Reading packets from the container failed mid-stream.
    #[error("Packet read failed: {0}")]
    PacketRead(String),
    /// The stream decoded to zero samples.
    #[error("Decoded 0 samples")]
    Empty,
}

/// Decode encoded audio bytes into interleaved `f32` samples.
///
/// The optional extension hint speeds up container probing; decoding still
/// succeeds without it when the bytes identify themselves.
pub fn decode_audio_bytes(
    bytes: Vec<u8>,
    extension_hint: Option<&str>,
) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| DecodeError::Probe(err.to_string()))?;
    let mut format = probed.format;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or(DecodeError::MissingParameter("sample rate"))?;
    let channels = codec_params
        .channels
        .ok_or(DecodeError::MissingParameter("channel count"))?
        .count() as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|err| DecodeError::DecoderSetup(err.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(DecodeError::PacketRead(err.to_string())),
        };
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(DecodeError::PacketRead(err.to_string())),
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_wav_bytes_with_expected_shape() {
        let samples = [0.0_f32, 0.5, -0.5, 0.25];
        let decoded = decode_audio_bytes(wav_bytes(&samples, 8000, 1), Some("wav")).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frame_count(), 4);
        assert!((decoded.duration_seconds() - 4.0 / 8000.0).abs() < 1e-9);
        for (got, want) in decoded.samples.iter().zip(samples) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn stereo_frames_count_per_frame_not_per_sample() {
        let samples = [0.1_f32, 0.2, 0.3, 0.4];
        let decoded = decode_audio_bytes(wav_bytes(&samples, 4000, 2), Some("wav")).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frame_count(), 2);
    }

    #[test]
    fn garbage_bytes_fail_the_probe() {
        let result = decode_audio_bytes(vec![0u8; 64], None);
        assert!(matches!(result, Err(DecodeError::Probe(_))));
    }

    #[test]
    fn empty_input_fails_explicitly() {
        let result = decode_audio_bytes(Vec::new(), Some("wav"));
        assert!(result.is_err());
    }
}
