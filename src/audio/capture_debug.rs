//! Debug WAV capture
//!
//! Serializes a bounded number of post-normalization frames to an
//! uncompressed WAV file for offline inspection, then closes itself.
//! Off by default; a capture failure never disturbs playout.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::audio::frame::AudioFrame;
use crate::error::Error;

/// Writes the first N frames it sees to a 32-bit float WAV file
pub struct WavCapture {
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: u16,
    sample_rate: u32,
    remaining: usize,
}

impl WavCapture {
    /// Open a capture of up to `frames` frames with the given shape
    pub fn create(
        path: &Path,
        channels: u16,
        sample_rate: u32,
        frames: usize,
    ) -> Result<Self, Error> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec).map_err(|e| Error::Capture(e.to_string()))?;

        tracing::info!(path = %path.display(), frames, "Debug capture started");

        Ok(Self {
            writer: Some(writer),
            channels,
            sample_rate,
            remaining: frames,
        })
    }

    /// True once the configured number of frames has been written
    pub fn finished(&self) -> bool {
        self.writer.is_none()
    }

    /// Append one frame; closes the file after the last one. Frames
    /// whose shape differs from the first are skipped, the WAV header
    /// has one shape.
    pub fn write(&mut self, frame: &AudioFrame) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        if frame.channels != self.channels || frame.sample_rate != self.sample_rate {
            tracing::debug!(
                sequence = frame.sequence,
                "Skipping capture of frame with mismatched shape"
            );
            return;
        }

        for &sample in &frame.samples {
            if let Err(e) = writer.write_sample(sample) {
                tracing::warn!("Debug capture write failed: {}", e);
                self.close();
                return;
            }
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.close();
        }
    }

    /// Finalize the file; further writes are no-ops
    pub fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(()) => tracing::info!("Debug capture complete"),
                Err(e) => tracing::warn!("Failed to finalize debug capture: {}", e),
            }
        }
    }
}

impl Drop for WavCapture {
    fn drop(&mut self) {
        self.close();
    }
}
