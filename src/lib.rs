//! # Audio Playout
//!
//! Real-time playout of a network audio stream to a single local output
//! device on a resource-constrained embedded host.
//!
//! ## Architecture Overview
//!
//! ```text
//!  session thread (producer)                         playback thread (consumer)
//! ┌──────────────────────────────────────────────┐  ┌──────────────────────────┐
//! │                                              │  │                          │
//! │  RawFrame (any encoding / shape)             │  │   ┌────────────────┐     │
//! │        │                                     │  │   │ PlaybackWorker │     │
//! │        ▼                                     │  │   └───────┬────────┘     │
//! │  ┌───────────────┐    ┌───────────┐          │  │           │ pop(timeout) │
//! │  │FrameNormalizer│───►│ Resampler │          │  │           ▼              │
//! │  └───────────────┘    └─────┬─────┘          │  │   ┌──────────────┐       │
//! │                             │                │  │   │ OutputDevice │       │
//! │                       ┌─────▼──────┐  push   │  │   │    (cpal)    │       │
//! │                       │ChannelMixer│───────┐ │  │   └──────────────┘       │
//! │                       └────────────┘       │ │  │                          │
//! └────────────────────────────────────────────┼─┘  └───────────▲──────────────┘
//!                                              │                │
//!                                      ┌───────▼────────────────┴──────┐
//!                                      │   JitterBuffer (bounded,      │
//!                                      │   oldest evicted when full)   │
//!                                      └───────────────────────────────┘
//! ```
//!
//! Network delivery is bursty and unsynchronized with the device clock.
//! The jitter buffer absorbs the difference under a hard capacity bound:
//! when the producer outruns playback, the oldest frames are evicted so
//! the newest audio always gets in. Bounded latency wins over
//! completeness; the worst case is silence or dropped audio, never an
//! unbounded block.

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PlayoutConfig;
pub use error::{Error, Result};
pub use pipeline::AudioPipeline;

/// Application-wide constants
pub mod constants {
    /// Preferred device sample rate (matches the WebRTC native rate)
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Known-safe sample rate used when the preferred rate is rejected
    pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

    /// Output is capped at stereo regardless of device capability
    pub const MAX_OUTPUT_CHANNELS: u16 = 2;

    /// Default jitter buffer capacity in frames
    pub const DEFAULT_JITTER_CAPACITY: usize = 8;

    /// Default consumer-side pop timeout in milliseconds
    pub const DEFAULT_POP_TIMEOUT_MS: u64 = 20;

    /// Consecutive pop timeouts before an underrun is counted
    pub const DEFAULT_UNDERRUN_THRESHOLD: u32 = 3;

    /// Default bound on worker shutdown in milliseconds
    pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 500;

    /// Length of the silence block emitted on underrun, in milliseconds
    pub const SILENCE_PERIOD_MS: u32 = 10;

    /// Depth of the device-side sample ring, in milliseconds
    pub const DEVICE_RING_MS: u32 = 250;

    /// Hard bound on a single blocking device write, in milliseconds
    pub const BLOCKING_WRITE_BOUND_MS: u64 = 250;

    /// Received-frame interval between sampled stats log lines
    pub const STATS_LOG_INTERVAL: u64 = 500;
}
