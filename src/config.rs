//! Pipeline configuration
//!
//! Loaded from a TOML file or built from defaults. Every field has a
//! default so a partial config file works.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Tunables for the playout pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayoutConfig {
    /// Jitter buffer capacity in frames. Bounds end-to-end latency to
    /// roughly `capacity * frame_duration`; must be large enough to
    /// absorb typical network jitter.
    pub jitter_capacity: usize,

    /// Preferred device sample rate in Hz
    pub target_sample_rate: u32,

    /// Preferred output channel count (clamped to mono/stereo)
    pub preferred_channels: u16,

    /// Blocking device writes favor fidelity; non-blocking writes favor
    /// responsiveness and are the safer default under load.
    pub blocking_writes: bool,

    /// Consecutive pop timeouts before one underrun is counted
    pub underrun_threshold: u32,

    /// Consumer-side pop timeout in milliseconds
    pub pop_timeout_ms: u64,

    /// Upper bound on worker shutdown in milliseconds
    pub join_timeout_ms: u64,

    /// Number of post-normalization frames to capture to a WAV file
    /// for offline inspection (0 disables the capture)
    pub debug_capture_frames: usize,

    /// Destination of the debug capture file
    pub debug_capture_path: PathBuf,
}

impl Default for PlayoutConfig {
    fn default() -> Self {
        Self {
            jitter_capacity: DEFAULT_JITTER_CAPACITY,
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            preferred_channels: MAX_OUTPUT_CHANNELS,
            blocking_writes: false,
            underrun_threshold: DEFAULT_UNDERRUN_THRESHOLD,
            pop_timeout_ms: DEFAULT_POP_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            debug_capture_frames: 0,
            debug_capture_path: PathBuf::from("playout-capture.wav"),
        }
    }
}

impl PlayoutConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from the platform config directory, falling back to defaults
    /// when no file exists or the file does not parse.
    pub fn load_default() -> Self {
        let path = ProjectDirs::from("", "", "audio-playout")
            .map(|dirs| dirs.config_dir().join("playout.toml"));

        match path {
            Some(ref path) if path.exists() => Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Consumer-side pop timeout
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    /// Bound on worker shutdown
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Whether the debug WAV capture is enabled
    pub fn debug_capture_enabled(&self) -> bool {
        self.debug_capture_frames > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayoutConfig::default();
        assert_eq!(config.jitter_capacity, DEFAULT_JITTER_CAPACITY);
        assert_eq!(config.target_sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.preferred_channels, 2);
        assert!(!config.blocking_writes);
        assert!(!config.debug_capture_enabled());
    }

    #[test]
    fn test_partial_toml() {
        let config: PlayoutConfig =
            toml::from_str("jitter_capacity = 4\nblocking_writes = true").unwrap();
        assert_eq!(config.jitter_capacity, 4);
        assert!(config.blocking_writes);
        // Unspecified fields keep their defaults
        assert_eq!(config.target_sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.pop_timeout_ms, DEFAULT_POP_TIMEOUT_MS);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PlayoutConfig::load(Path::new("/nonexistent/playout.toml"));
        assert!(result.is_err());
    }
}
