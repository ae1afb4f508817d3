//! Playback worker
//!
//! A dedicated thread that drains the jitter buffer on its own cadence
//! and drives the output device. It is the only code that touches the
//! device handle; the device itself is constructed inside the thread
//! because stream handles must stay on the thread that owns them.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::buffer::JitterBuffer;
use crate::audio::device::OutputDevice;
use crate::audio::frame::{AudioFrame, DeviceProfile};
use crate::audio::stats::StatsCollector;
use crate::config::PlayoutConfig;
use crate::constants::SILENCE_PERIOD_MS;
use crate::error::{AudioError, Result};

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Not yet started
    Idle = 0,
    /// Draining the buffer and driving the device
    Running = 1,
    /// Stop signalled; finishing the in-flight write
    Draining = 2,
    /// Thread exited, device released
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

/// Constructs the worker's device on the worker thread
pub type DeviceFactory = Box<dyn FnOnce() -> std::result::Result<Box<dyn OutputDevice>, AudioError> + Send>;

/// Dedicated playback thread handle
pub struct PlaybackWorker {
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl PlaybackWorker {
    /// Spawn the worker thread against an already-negotiated profile
    pub fn spawn(
        buffer: Arc<JitterBuffer>,
        profile: DeviceProfile,
        config: &PlayoutConfig,
        stats: Arc<StatsCollector>,
        factory: DeviceFactory,
    ) -> Result<Self> {
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let stop = Arc::new(AtomicBool::new(false));

        let pop_timeout = config.pop_timeout();
        let blocking = config.blocking_writes;
        let underrun_threshold = config.underrun_threshold.max(1);
        let join_timeout = config.join_timeout();

        let thread_state = state.clone();
        let thread_stop = stop.clone();

        let handle = thread::Builder::new().name("audio-playout".to_string()).spawn(
            move || {
                run_loop(
                    buffer,
                    profile,
                    pop_timeout,
                    blocking,
                    underrun_threshold,
                    stats,
                    factory,
                    thread_state,
                    thread_stop,
                );
            },
        )?;

        Ok(Self {
            state,
            stop,
            handle: Some(handle),
            join_timeout,
        })
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Signal stop and wait (bounded) for the thread to reach `Stopped`.
    ///
    /// Queued frames are not played; the caller drains the buffer after
    /// this returns. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + self.join_timeout;
        while self.state() != WorkerState::Stopped && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if self.state() == WorkerState::Stopped {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        } else if self.handle.take().is_some() {
            // Leave the thread detached; it observes the stop flag within
            // one pop timeout and releases the device on its own.
            tracing::warn!(
                "Playback worker did not stop within {:?}, detaching",
                self.join_timeout
            );
        }
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    buffer: Arc<JitterBuffer>,
    profile: DeviceProfile,
    pop_timeout: Duration,
    blocking: bool,
    underrun_threshold: u32,
    stats: Arc<StatsCollector>,
    factory: DeviceFactory,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
) {
    let mut device = match factory() {
        Ok(device) => device,
        Err(e) => {
            tracing::error!("Failed to open output device: {}", e);
            state.store(WorkerState::Stopped as u8, Ordering::SeqCst);
            return;
        }
    };

    state.store(WorkerState::Running as u8, Ordering::SeqCst);
    tracing::info!(
        device = %profile.device_id,
        channels = profile.channels,
        sample_rate = profile.sample_rate,
        "Playback started"
    );

    let silence_len = (profile.sample_rate as usize * profile.channels as usize
        * SILENCE_PERIOD_MS as usize)
        / 1000;
    let silence = vec![0.0f32; silence_len.max(1)];
    let mut consecutive_timeouts = 0u32;

    while !stop.load(Ordering::Relaxed) {
        match buffer.pop(pop_timeout) {
            Some(frame) => {
                consecutive_timeouts = 0;
                write_frame(device.as_mut(), &frame, &profile, blocking, &stats);
            }
            None => {
                consecutive_timeouts = consecutive_timeouts.saturating_add(1);
                if consecutive_timeouts == underrun_threshold {
                    stats.record_underrun();
                }
                // Keep the device fed so its clock runs through the gap
                let _ = device.play(&silence, profile.sample_rate, profile.channels, false);
            }
        }
    }

    // Stop pulling; the in-flight write above has already completed.
    state.store(WorkerState::Draining as u8, Ordering::SeqCst);
    drop(device);
    state.store(WorkerState::Stopped as u8, Ordering::SeqCst);
    tracing::info!("Playback stopped");
}

/// Write one frame, retrying once in degraded (non-blocking) mode before
/// dropping it. The worker never terminates on a write failure.
fn write_frame(
    device: &mut dyn OutputDevice,
    frame: &AudioFrame,
    profile: &DeviceProfile,
    blocking: bool,
    stats: &StatsCollector,
) {
    match device.play(&frame.samples, profile.sample_rate, profile.channels, blocking) {
        Ok(()) => stats.record_played(),
        Err(first) => {
            tracing::warn!(
                sequence = frame.sequence,
                "Device write failed, retrying non-blocking: {}",
                first
            );
            match device.play(&frame.samples, profile.sample_rate, profile.channels, false) {
                Ok(()) => stats.record_played(),
                Err(second) => {
                    tracing::warn!(
                        sequence = frame.sequence,
                        "Retry failed, dropping frame: {}",
                        second
                    );
                    stats.record_dropped();
                }
            }
        }
    }
}
