//! Audio output device abstraction
//!
//! The playback worker drives exactly one output device through the
//! `OutputDevice` trait; nothing else touches the device handle. The
//! cpal implementation feeds the stream callback through a bounded
//! sample ring so a stalled device can never wedge the worker.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::queue::ArrayQueue;
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants::{BLOCKING_WRITE_BOUND_MS, DEVICE_RING_MS};
use crate::error::AudioError;

/// A local audio output device
///
/// Capability queries (`max_output_channels`, `validate`) run during
/// negotiation on the caller's thread; `play` is only ever called from
/// the playback worker.
pub trait OutputDevice {
    /// Opaque identifier for logging and the device profile
    fn id(&self) -> &str;

    /// Probe the maximum channel count the device will accept
    fn max_output_channels(&self) -> Result<u16, AudioError>;

    /// Check one (channels, sample rate) combination without opening it
    fn validate(&self, channels: u16, sample_rate: u32) -> Result<(), AudioError>;

    /// Render one block of interleaved samples.
    ///
    /// A blocking write waits (bounded) for device-side space; a
    /// non-blocking write delivers what fits and discards the rest.
    fn play(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
        blocking: bool,
    ) -> Result<(), AudioError>;
}

/// cpal-backed output device
///
/// The output stream is built lazily on the first `play` call, which
/// happens on the playback worker thread: stream handles stay on the
/// thread that owns them.
pub struct CpalOutput {
    device: cpal::Device,
    name: String,
    active: Option<ActiveStream>,
}

struct ActiveStream {
    // Held only to keep the callback alive; dropped to stop the device
    _stream: cpal::Stream,
    ring: Arc<ArrayQueue<f32>>,
    error_rx: Receiver<AudioError>,
    sample_rate: u32,
    channels: u16,
}

impl CpalOutput {
    /// Open the default system output device
    pub fn default_output() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "default".to_string());

        Ok(Self {
            device,
            name,
            active: None,
        })
    }

    /// Drop the stream if its error callback reported a failure since
    /// the last write; the next `play` rebuilds it.
    fn reap_failed_stream(&mut self) {
        if let Some(active) = &self.active {
            if let Ok(err) = active.error_rx.try_recv() {
                tracing::warn!("Output stream failed, rebuilding: {}", err);
                self.active = None;
            }
        }
    }

    fn build_stream(&self, sample_rate: u32, channels: u16) -> Result<ActiveStream, AudioError> {
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring_capacity =
            (sample_rate as usize * channels as usize * DEVICE_RING_MS as usize) / 1000;
        let ring = Arc::new(ArrayQueue::new(ring_capacity.max(1024)));
        let callback_ring = ring.clone();

        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Zero-fill whatever the ring cannot supply; silence
                    // is the correct output when playout is starved.
                    for slot in out.iter_mut() {
                        *slot = callback_ring.pop().unwrap_or(0.0);
                    }
                },
                move |err| {
                    let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        tracing::info!(
            device = %self.name,
            sample_rate,
            channels,
            "Opened output stream"
        );

        Ok(ActiveStream {
            _stream: stream,
            ring,
            error_rx,
            sample_rate,
            channels,
        })
    }
}

impl OutputDevice for CpalOutput {
    fn id(&self) -> &str {
        &self.name
    }

    fn max_output_channels(&self) -> Result<u16, AudioError> {
        let configs = self
            .device
            .supported_output_configs()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let max = configs.map(|range| range.channels()).max().unwrap_or(0);
        if max == 0 {
            return Err(AudioError::DeviceNotFound(format!(
                "{} reports no output configurations",
                self.name
            )));
        }
        Ok(max)
    }

    fn validate(&self, channels: u16, sample_rate: u32) -> Result<(), AudioError> {
        let configs = self
            .device
            .supported_output_configs()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let rate = cpal::SampleRate(sample_rate);
        for range in configs {
            if range.channels() == channels
                && rate >= range.min_sample_rate()
                && rate <= range.max_sample_rate()
            {
                return Ok(());
            }
        }
        Err(AudioError::DeviceUnsupported {
            channels,
            sample_rate,
        })
    }

    fn play(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
        blocking: bool,
    ) -> Result<(), AudioError> {
        self.reap_failed_stream();

        // Profiles are immutable per pipeline, so a shape change means a
        // fresh stream, not an in-place reconfigure.
        if let Some(active) = &self.active {
            if active.sample_rate != sample_rate || active.channels != channels {
                self.active = None;
            }
        }
        if self.active.is_none() {
            self.active = Some(self.build_stream(sample_rate, channels)?);
        }
        let Some(active) = self.active.as_ref() else {
            return Err(AudioError::WriteFailed("stream unavailable".to_string()));
        };

        let deadline = Instant::now() + Duration::from_millis(BLOCKING_WRITE_BOUND_MS);
        for &sample in samples {
            let mut value = sample;
            loop {
                match active.ring.push(value) {
                    Ok(()) => break,
                    Err(rejected) => {
                        if !blocking {
                            // Ring full: the device is behind. Discard
                            // the remainder to keep latency bounded.
                            return Ok(());
                        }
                        if Instant::now() >= deadline {
                            return Err(AudioError::WriteFailed(
                                "output ring full past write deadline".to_string(),
                            ));
                        }
                        value = rejected;
                        std::thread::sleep(Duration::from_micros(500));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Log the available output devices and their capabilities. Startup
/// diagnostics only.
pub fn log_output_devices() {
    let host = cpal::default_host();
    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Could not enumerate output devices: {}", e);
            return;
        }
    };

    for device in devices {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        match device.supported_output_configs() {
            Ok(configs) => {
                for range in configs {
                    tracing::debug!(
                        device = %name,
                        channels = range.channels(),
                        min_rate = range.min_sample_rate().0,
                        max_rate = range.max_sample_rate().0,
                        "output config"
                    );
                }
            }
            Err(e) => tracing::debug!(device = %name, "no output configs: {}", e),
        }
    }
}
