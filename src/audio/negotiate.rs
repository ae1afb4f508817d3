//! Device capability negotiation
//!
//! An ordered list of candidate configurations is tried in sequence and
//! the first one the device validates wins. Negotiation can degrade but
//! never fail: the worst case is mono at the fallback rate, so the
//! pipeline always gets a usable profile.

use crate::audio::device::OutputDevice;
use crate::audio::frame::DeviceProfile;
use crate::config::PlayoutConfig;
use crate::constants::{FALLBACK_SAMPLE_RATE, MAX_OUTPUT_CHANNELS};

/// Determine a profile the device will reliably accept.
///
/// The requested channel count is clamped to [1, 2] and to the device's
/// probed maximum; a failed probe degrades to mono. Fallback order:
/// preferred rate, then the known-safe rate, then the same two at mono.
pub fn negotiate_profile(device: &dyn OutputDevice, config: &PlayoutConfig) -> DeviceProfile {
    let max_channels = match device.max_output_channels() {
        Ok(channels) => channels.max(1),
        Err(e) => {
            tracing::warn!("Could not probe output channels, assuming mono: {}", e);
            1
        }
    };

    let preferred = config
        .preferred_channels
        .clamp(1, MAX_OUTPUT_CHANNELS)
        .min(max_channels);

    let mut candidates: Vec<(u16, u32)> = Vec::with_capacity(4);
    for candidate in [
        (preferred, config.target_sample_rate),
        (preferred, FALLBACK_SAMPLE_RATE),
        (1, config.target_sample_rate),
        (1, FALLBACK_SAMPLE_RATE),
    ] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    for (channels, sample_rate) in candidates {
        match device.validate(channels, sample_rate) {
            Ok(()) => {
                tracing::info!(
                    device = device.id(),
                    channels,
                    sample_rate,
                    "Negotiated output profile"
                );
                return DeviceProfile {
                    device_id: device.id().to_string(),
                    channels,
                    sample_rate,
                };
            }
            Err(e) => {
                tracing::debug!(channels, sample_rate, "Candidate rejected: {}", e);
            }
        }
    }

    // Nothing validated. Run with the conservative profile anyway rather
    // than erroring the pipeline out of existence.
    tracing::warn!(
        device = device.id(),
        "No candidate configuration validated, using mono @ {} Hz",
        FALLBACK_SAMPLE_RATE
    );
    DeviceProfile {
        device_id: device.id().to_string(),
        channels: 1,
        sample_rate: FALLBACK_SAMPLE_RATE,
    }
}
