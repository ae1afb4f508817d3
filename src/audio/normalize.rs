//! Frame normalization
//!
//! Converts raw network frames (any supported encoding, planar or
//! interleaved) into canonical interleaved f32 frames. This is the only
//! place raw encodings exist; a malformed frame is rejected here and
//! never reaches the jitter buffer.

use std::time::Instant;

use crate::audio::frame::{AudioFrame, FrameShape, RawFrame, SampleData};
use crate::error::AudioError;

/// Converts incoming raw frames to the canonical format, assigning
/// monotonic sequence numbers and timestamps relative to the pipeline
/// epoch.
pub struct FrameNormalizer {
    epoch: Instant,
    sequence: u32,
}

impl FrameNormalizer {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            sequence: 0,
        }
    }

    /// Normalize one raw frame.
    ///
    /// Returns `MalformedFrame` for empty or inconsistent payloads; the
    /// caller drops such frames without counting them as received.
    pub fn normalize(&mut self, raw: RawFrame) -> Result<AudioFrame, AudioError> {
        if raw.data.is_empty() {
            return Err(AudioError::MalformedFrame("empty sample payload".into()));
        }

        let samples = to_float(raw.data);
        let (samples, channels) = reshape(samples, raw.shape)?;

        let timestamp = self.epoch.elapsed().as_micros() as u64;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        Ok(AudioFrame::new(
            samples,
            channels,
            raw.sample_rate,
            timestamp,
            sequence,
        ))
    }
}

impl Default for FrameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert any supported encoding to f32 amplitudes in [-1.0, 1.0].
/// Integer inputs are scaled by the encoding's maximum magnitude.
fn to_float(data: SampleData) -> Vec<f32> {
    match data {
        SampleData::I8(v) => v.iter().map(|&s| s as f32 / 128.0).collect(),
        SampleData::I16(v) => v.iter().map(|&s| s as f32 / 32768.0).collect(),
        SampleData::I32(v) => v
            .iter()
            .map(|&s| (s as f64 / 2_147_483_648.0) as f32)
            .collect(),
        SampleData::F32(v) => v.iter().map(|&s| s.clamp(-1.0, 1.0)).collect(),
    }
}

/// Resolve the frame shape to (interleaved samples, channel count).
///
/// A 2-D frame whose first dimension is smaller than its second is
/// treated as channels-first (planar) and transposed to samples-first;
/// otherwise the second dimension is the channel count and the data is
/// already interleaved.
fn reshape(samples: Vec<f32>, shape: FrameShape) -> Result<(Vec<f32>, u16), AudioError> {
    match shape {
        FrameShape::Flat => Ok((samples, 1)),
        FrameShape::Grid { rows, cols } => {
            if rows == 0 || cols == 0 || rows * cols != samples.len() {
                return Err(AudioError::MalformedFrame(format!(
                    "shape {}x{} does not match {} samples",
                    rows,
                    cols,
                    samples.len()
                )));
            }

            if rows < cols {
                if rows > u16::MAX as usize {
                    return Err(AudioError::MalformedFrame(format!(
                        "{} channels exceeds supported range",
                        rows
                    )));
                }
                // Channels-first: transpose plane-major data to
                // interleaved samples-first.
                let channels = rows;
                let frames = cols;
                let mut out = vec![0.0f32; samples.len()];
                for ch in 0..channels {
                    for i in 0..frames {
                        out[i * channels + ch] = samples[ch * frames + i];
                    }
                }
                Ok((out, channels as u16))
            } else {
                if cols > u16::MAX as usize {
                    return Err(AudioError::MalformedFrame(format!(
                        "{} channels exceeds supported range",
                        cols
                    )));
                }
                Ok((samples, cols as u16))
            }
        }
    }
}
