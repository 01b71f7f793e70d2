use thiserror::Error;

/// Errors from configuring peak extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeakError {
    /// The window size must cover at least one sample.
    #[error("Peak window scale must be a positive sample count")]
    ZeroScale,
}

/// Result of running peak extraction over a sample stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSummary {
    /// One peak per complete-or-partial window, each in `[0, 1]`.
    pub peaks: Vec<f32>,
    /// Number of finite samples consumed.
    pub sample_count: u64,
}

/// Streaming peak extractor over mono samples.
///
/// Consumes samples in order, closing a window every `scale` samples and
/// emitting `max(|min|, |max|)` of the window. Non-finite samples are
/// skipped entirely and do not count toward the window tally; samples are
/// clamped into `[-1, 1]` so every peak lands in `[0, 1]`. A trailing
/// partial window still yields one peak if it saw at least one sample.
#[derive(Debug)]
pub struct PeakAccumulator {
    scale: u32,
    in_window: u32,
    min: f32,
    max: f32,
    sample_count: u64,
    peaks: Vec<f32>,
}

impl PeakAccumulator {
    /// Create an accumulator with the given window size.
    ///
    /// A zero `scale` is a configuration error, not something to clamp.
    pub fn new(scale: u32) -> Result<Self, PeakError> {
        if scale == 0 {
            return Err(PeakError::ZeroScale);
        }
        Ok(Self {
            scale,
            in_window: 0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            sample_count: 0,
            peaks: Vec::new(),
        })
    }

    /// Feed one sample.
    pub fn push(&mut self, sample: f32) {
        if !sample.is_finite() {
            return;
        }
        let sample = sample.clamp(-1.0, 1.0);
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.in_window += 1;
        self.sample_count += 1;
        if self.in_window == self.scale {
            self.flush_window();
        }
    }

    /// Feed a slice of samples in order.
    pub fn push_slice(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Finish the stream, flushing any trailing partial window.
    pub fn finish(mut self) -> PeakSummary {
        if self.in_window > 0 {
            self.flush_window();
        }
        PeakSummary {
            peaks: self.peaks,
            sample_count: self.sample_count,
        }
    }

    fn flush_window(&mut self) {
        self.peaks.push(self.min.abs().max(self.max.abs()));
        self.in_window = 0;
        self.min = f32::INFINITY;
        self.max = f32::NEG_INFINITY;
    }
}

/// Extract peaks from an in-memory mono sample buffer.
pub fn extract_peaks(samples: &[f32], scale: u32) -> Result<PeakSummary, PeakError> {
    let mut accumulator = PeakAccumulator::new(scale)?;
    accumulator.push_slice(samples);
    Ok(accumulator.finish())
}

/// Collapse interleaved multi-channel samples into one mono sample per frame.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    if channels == 1 {
        return samples.to_vec();
    }
    let frame_count = samples.len() / channels;
    let mut mono = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let start = frame * channels;
        let sum: f32 = samples[start..start + channels].iter().sum();
        mono.push(sum / channels as f32);
    }
    mono
}
