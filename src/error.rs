//! Error types for the playout pipeline

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
///
/// None of these terminate the pipeline: malformed frames are dropped,
/// unsupported device configurations fall back along the negotiation
/// chain, and write failures are retried once before the frame is
/// dropped.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported device configuration: {channels} ch @ {sample_rate} Hz")]
    DeviceUnsupported { channels: u16, sample_rate: u32 },

    #[error("Device write failed: {0}")]
    WriteFailed(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
