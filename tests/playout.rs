//! End-to-end pipeline tests against a mock output device

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_playout::audio::device::OutputDevice;
use audio_playout::audio::frame::{RawFrame, SampleData};
use audio_playout::audio::playback::{DeviceFactory, WorkerState};
use audio_playout::error::AudioError;
use audio_playout::{AudioPipeline, PlayoutConfig};

/// Shared recording of everything a mock device was asked to play
type WriteLog = Arc<Mutex<Vec<Vec<f32>>>>;

/// Stereo 48 kHz device; optionally slow, to let frames pile up
struct MockDevice {
    log: WriteLog,
    write_delay: Duration,
}

impl OutputDevice for MockDevice {
    fn id(&self) -> &str {
        "mock"
    }

    fn max_output_channels(&self) -> std::result::Result<u16, AudioError> {
        Ok(2)
    }

    fn validate(&self, channels: u16, sample_rate: u32) -> std::result::Result<(), AudioError> {
        if channels <= 2 && sample_rate == 48000 {
            Ok(())
        } else {
            Err(AudioError::DeviceUnsupported {
                channels,
                sample_rate,
            })
        }
    }

    fn play(
        &mut self,
        samples: &[f32],
        _: u32,
        _: u16,
        _: bool,
    ) -> std::result::Result<(), AudioError> {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.log.lock().push(samples.to_vec());
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn mock_pipeline(config: PlayoutConfig, write_delay: Duration) -> Result<(AudioPipeline, WriteLog)> {
    let log: WriteLog = Arc::new(Mutex::new(Vec::new()));
    let probe = MockDevice {
        log: log.clone(),
        write_delay: Duration::ZERO,
    };
    let factory: DeviceFactory = {
        let log = log.clone();
        Box::new(move || {
            Ok(Box::new(MockDevice { log, write_delay }) as Box<dyn OutputDevice>)
        })
    };
    let pipeline = AudioPipeline::with_device(&probe, factory, config)?;
    Ok((pipeline, log))
}

fn stereo_frame(frames: usize) -> RawFrame {
    RawFrame::grid(SampleData::F32(vec![0.25; frames * 2]), frames, 2, 48000)
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let end = Instant::now() + deadline;
    while !done() && Instant::now() < end {
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn plays_ingested_frames_and_accounts_for_all() -> Result<()> {
    init_tracing();
    let (mut pipeline, log) = mock_pipeline(PlayoutConfig::default(), Duration::ZERO)?;

    assert_eq!(pipeline.worker_state(), WorkerState::Idle);

    for _ in 0..5 {
        pipeline.ingest(stereo_frame(480))?;
    }
    // Lazy start: the first enqueue brought the worker up
    wait_until(Duration::from_secs(2), || {
        pipeline.worker_state() == WorkerState::Running
    });
    assert_eq!(pipeline.worker_state(), WorkerState::Running);

    wait_until(Duration::from_secs(2), || {
        pipeline.stats().frames_played == 5
    });
    pipeline.stop();

    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 5);
    assert_eq!(
        stats.frames_received,
        stats.frames_played + stats.frames_dropped + stats.frames_queued as u64
    );
    // Every real frame reached the device (silence blocks are all-zero)
    assert!(log.lock().iter().filter(|w| w.first() == Some(&0.25)).count() >= 5);
    Ok(())
}

#[test]
fn adapts_mono_low_rate_input_to_profile() -> Result<()> {
    init_tracing();
    let (mut pipeline, log) = mock_pipeline(PlayoutConfig::default(), Duration::ZERO)?;
    assert_eq!(pipeline.profile().channels, 2);
    assert_eq!(pipeline.profile().sample_rate, 48000);

    // 320 mono samples at 16 kHz: upsampled x3, then duplicated to stereo
    let raw = RawFrame::flat(SampleData::I16(vec![8192; 320]), 16000);
    pipeline.ingest(raw)?;

    wait_until(Duration::from_secs(2), || {
        pipeline.stats().frames_played == 1
    });
    pipeline.stop();

    let log = log.lock();
    let frame = log
        .iter()
        .find(|w| w.first().map(|s| *s != 0.0).unwrap_or(false))
        .expect("adapted frame was played");
    assert_eq!(frame.len(), 320 * 3 * 2);
    // Mono upmix: both channels identical
    for pair in frame.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    Ok(())
}

#[test]
fn malformed_frames_are_not_counted() -> Result<()> {
    init_tracing();
    let (mut pipeline, _log) = mock_pipeline(PlayoutConfig::default(), Duration::ZERO)?;

    pipeline.ingest(RawFrame::flat(SampleData::F32(Vec::new()), 48000))?;

    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 0);
    assert_eq!(stats.frames_queued, 0);
    // A rejected frame does not start the worker either
    assert_eq!(pipeline.worker_state(), WorkerState::Idle);
    pipeline.stop();
    Ok(())
}

#[test]
fn stop_discards_queued_frames_within_bound() -> Result<()> {
    init_tracing();
    let config = PlayoutConfig {
        jitter_capacity: 8,
        join_timeout_ms: 1000,
        ..Default::default()
    };
    // Slow device: 50 ms per write lets the producer race ahead
    let (mut pipeline, _log) = mock_pipeline(config, Duration::from_millis(50))?;

    for _ in 0..10 {
        pipeline.ingest(stereo_frame(480))?;
    }

    let start = Instant::now();
    pipeline.stop();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "stop exceeded its bound: {:?}",
        start.elapsed()
    );
    assert_eq!(pipeline.worker_state(), WorkerState::Stopped);

    let stats = pipeline.stats();
    assert_eq!(stats.frames_queued, 0);
    assert!(stats.frames_dropped > 0, "queued frames were discarded, not played");
    assert_eq!(
        stats.frames_received,
        stats.frames_played + stats.frames_dropped
    );
    Ok(())
}

#[test]
fn negotiation_clamps_excessive_channel_request() -> Result<()> {
    init_tracing();
    let config = PlayoutConfig {
        preferred_channels: 6,
        ..Default::default()
    };
    let (pipeline, _log) = mock_pipeline(config, Duration::ZERO)?;
    assert_eq!(pipeline.profile().channels, 2);
    Ok(())
}

#[test]
fn stats_reset_clears_counters() -> Result<()> {
    init_tracing();
    let (mut pipeline, _log) = mock_pipeline(PlayoutConfig::default(), Duration::ZERO)?;

    pipeline.ingest(stereo_frame(480))?;
    wait_until(Duration::from_secs(2), || {
        pipeline.stats().frames_played == 1
    });
    pipeline.stop();

    assert!(pipeline.stats().frames_received > 0);
    pipeline.reset_stats();
    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 0);
    assert_eq!(stats.frames_played, 0);
    assert_eq!(stats.frames_dropped, 0);
    Ok(())
}
