//! Pipeline assembly
//!
//! `AudioPipeline` is what the media-session layer holds: it accepts raw
//! frames on the session's thread, adapts them to the negotiated device
//! profile, and owns everything downstream. Delivery calls only
//! normalize and push; no blocking I/O happens on the caller.

use std::sync::Arc;

use crate::audio::buffer::JitterBuffer;
use crate::audio::capture_debug::WavCapture;
use crate::audio::device::{self, CpalOutput, OutputDevice};
use crate::audio::frame::{AudioFrame, DeviceProfile, RawFrame};
use crate::audio::mix::mix_channels;
use crate::audio::negotiate::negotiate_profile;
use crate::audio::normalize::FrameNormalizer;
use crate::audio::playback::{DeviceFactory, PlaybackWorker, WorkerState};
use crate::audio::resample::resample;
use crate::audio::stats::{StatsCollector, StatsSnapshot};
use crate::config::PlayoutConfig;
use crate::error::Result;

/// The audio playout pipeline
///
/// Device negotiation runs once at construction; the resulting profile
/// is immutable. Re-negotiation means building a new pipeline.
pub struct AudioPipeline {
    config: PlayoutConfig,
    profile: DeviceProfile,
    buffer: Arc<JitterBuffer>,
    stats: Arc<StatsCollector>,
    normalizer: FrameNormalizer,
    capture: Option<WavCapture>,
    capture_pending: bool,
    worker: Option<PlaybackWorker>,
    factory: Option<DeviceFactory>,
}

impl AudioPipeline {
    /// Build a pipeline against the default system output device
    pub fn new(config: PlayoutConfig) -> Result<Self> {
        device::log_output_devices();
        let probe = CpalOutput::default_output()?;
        let factory: DeviceFactory =
            Box::new(|| Ok(Box::new(CpalOutput::default_output()?) as Box<dyn OutputDevice>));
        Self::with_device(&probe, factory, config)
    }

    /// Build a pipeline for an explicit device implementation.
    ///
    /// `probe` is used for negotiation only; `factory` runs later on the
    /// playback thread to construct the device actually written to.
    pub fn with_device(
        probe: &dyn OutputDevice,
        factory: DeviceFactory,
        config: PlayoutConfig,
    ) -> Result<Self> {
        let profile = negotiate_profile(probe, &config);
        let stats = Arc::new(StatsCollector::new());
        let buffer = Arc::new(JitterBuffer::new(config.jitter_capacity, stats.clone()));
        let capture_pending = config.debug_capture_enabled();

        Ok(Self {
            config,
            profile,
            buffer,
            stats,
            normalizer: FrameNormalizer::new(),
            capture: None,
            capture_pending,
            worker: None,
            factory: Some(factory),
        })
    }

    /// Accept one raw frame from the session layer.
    ///
    /// Malformed frames are dropped here, logged, and never counted as
    /// received. The first successful enqueue lazily starts the
    /// playback worker.
    pub fn ingest(&mut self, raw: RawFrame) -> Result<()> {
        let frame = match self.normalizer.normalize(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                return Ok(());
            }
        };

        self.stats.record_received();
        self.capture_frame(&frame);

        let adapted = self.adapt(frame);
        self.buffer.push(adapted);
        self.ensure_worker()
    }

    /// Start the playback worker explicitly. Also happens lazily on the
    /// first enqueue, so calling this is optional.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_worker()
    }

    /// Stop playback: bounded worker shutdown, then discard whatever is
    /// still queued without playing it. Terminal for this pipeline.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            worker.stop();
        }
        self.factory = None;

        let discarded = self.buffer.drain();
        if discarded > 0 {
            tracing::info!(discarded, "Discarded queued frames at shutdown");
        }

        if let Some(capture) = self.capture.as_mut() {
            capture.close();
        }
    }

    /// Current worker lifecycle state
    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .as_ref()
            .map(|worker| worker.state())
            .unwrap_or(WorkerState::Idle)
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.buffer.len())
    }

    /// Reset all counters on operator request
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// The negotiated device profile
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Adapt a canonical frame to the device profile: rate first, then
    /// channel layout.
    fn adapt(&self, frame: AudioFrame) -> AudioFrame {
        let AudioFrame {
            samples,
            channels,
            sample_rate,
            timestamp,
            sequence,
        } = frame;

        let samples = resample(&samples, channels, sample_rate, self.profile.sample_rate);
        let samples = mix_channels(&samples, channels, self.profile.channels);

        AudioFrame::new(
            samples,
            self.profile.channels,
            self.profile.sample_rate,
            timestamp,
            sequence,
        )
    }

    fn capture_frame(&mut self, frame: &AudioFrame) {
        if self.capture_pending {
            // Sized from the first frame: captures record what actually
            // arrived, pre-adaptation.
            self.capture_pending = false;
            match WavCapture::create(
                &self.config.debug_capture_path,
                frame.channels,
                frame.sample_rate,
                self.config.debug_capture_frames,
            ) {
                Ok(capture) => self.capture = Some(capture),
                Err(e) => tracing::warn!("Could not open debug capture: {}", e),
            }
        }

        if let Some(capture) = self.capture.as_mut() {
            capture.write(frame);
            if capture.finished() {
                self.capture = None;
            }
        }
    }

    fn ensure_worker(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        // A stopped pipeline stays stopped; the factory is gone.
        let Some(factory) = self.factory.take() else {
            return Ok(());
        };

        let worker = PlaybackWorker::spawn(
            self.buffer.clone(),
            self.profile.clone(),
            &self.config,
            self.stats.clone(),
            factory,
        )?;
        self.worker = Some(worker);
        Ok(())
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
