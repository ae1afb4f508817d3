//! Sample rate conversion
//!
//! Downsampling applies a moving-average low-pass before decimating,
//! trading fidelity for CPU cost appropriate to the embedded target;
//! this is deliberately not a polyphase/sinc resampler. Upsampling uses
//! linear interpolation. Channels are converted independently so
//! per-channel alignment is preserved.

/// Convert interleaved `samples` from `source_rate` to `target_rate`.
///
/// Equal rates are an identity. Output length per channel is exactly
/// `floor(input_frames / ratio)` where `ratio = source / target`; buffer
/// sizing downstream relies on this.
pub fn resample(samples: &[f32], channels: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    let channels = channels.max(1) as usize;
    debug_assert_eq!(samples.len() % channels, 0);

    if channels == 1 {
        return resample_channel(samples, source_rate, target_rate);
    }

    let planes = deinterleave(samples, channels);
    let converted: Vec<Vec<f32>> = planes
        .iter()
        .map(|plane| resample_channel(plane, source_rate, target_rate))
        .collect();
    interleave(&converted)
}

fn resample_channel(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate > target_rate {
        downsample(input, source_rate, target_rate)
    } else {
        upsample_linear(input, source_rate, target_rate)
    }
}

/// Low-pass with a moving average sized to the rate ratio, then
/// decimate by the integer stride.
fn downsample(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = source_rate as f64 / target_rate as f64;
    let stride = (ratio as usize).max(1);
    let window = ((ratio / 2.0) as usize).max(3);
    let out_len = (input.len() as f64 / ratio) as usize;

    let filtered = moving_average(input, window);

    (0..out_len).map(|i| filtered[i * stride]).collect()
}

/// Centered moving average with edge clamping, O(n) via prefix sums
fn moving_average(input: &[f32], window: usize) -> Vec<f32> {
    let half = window / 2;

    let mut prefix = Vec::with_capacity(input.len() + 1);
    let mut acc = 0.0f64;
    prefix.push(0.0);
    for &sample in input {
        acc += sample as f64;
        prefix.push(acc);
    }

    let mut out = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(input.len());
        let sum = prefix[hi] - prefix[lo];
        out.push((sum / (hi - lo) as f64) as f32);
    }
    out
}

/// Zero-order hold would be cheaper, but linear interpolation avoids the
/// stairstep artifacts on the rates the device actually asks for.
fn upsample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (input.len() as f64 / ratio) as usize;
    let last = input.len() - 1;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = (pos as usize).min(last);
        let frac = (pos - idx as f64) as f32;
        let a = input[idx];
        let b = input[(idx + 1).min(last)];
        out.push(a + (b - a) * frac);
    }
    out
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for (i, &sample) in samples.iter().enumerate() {
        planes[i % channels].push(sample);
    }
    planes
}

fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.iter().map(|p| p.len()).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planes.len());
    for i in 0..frames {
        for plane in planes {
            out.push(plane[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_rates_equal() {
        let input: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0).sin()).collect();
        let output = resample(&input, 1, 48000, 48000);
        assert_eq!(output, input);
    }

    #[test]
    fn test_downsample_length_integer_ratio() {
        // 48k -> 16k, ratio 3: floor(960 / 3) = 320
        let input = vec![0.5f32; 960];
        let output = resample(&input, 1, 48000, 16000);
        assert_eq!(output.len(), 320);
    }

    #[test]
    fn test_downsample_length_fractional_ratio() {
        // 48k -> 44.1k, ratio ~1.08843: floor(4410 / ratio) = 4051
        let input = vec![0.0f32; 4410];
        let output = resample(&input, 1, 48000, 44100);
        assert_eq!(output.len(), 4051);
    }

    #[test]
    fn test_downsample_preserves_dc() {
        // A constant signal must survive the moving-average filter intact
        let input = vec![0.5f32; 960];
        let output = resample(&input, 1, 48000, 8000);
        assert_eq!(output.len(), 160);
        for sample in output {
            assert!((sample - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_downsample_stereo_channels_independent() {
        let mut input = Vec::with_capacity(960);
        for _ in 0..480 {
            input.push(1.0);
            input.push(-1.0);
        }
        let output = resample(&input, 2, 48000, 16000);
        assert_eq!(output.len(), 320);
        for pair in output.chunks(2) {
            assert!((pair[0] - 1.0).abs() < 1e-6);
            assert!((pair[1] + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_upsample_linear() {
        // 16k -> 48k triples the length; midpoints are interpolated
        let input = vec![0.0f32, 0.3];
        let output = resample(&input, 1, 16000, 48000);
        assert_eq!(output.len(), 6);
        assert!((output[0] - 0.0).abs() < 1e-6);
        assert!((output[1] - 0.1).abs() < 1e-5);
        assert!((output[2] - 0.2).abs() < 1e-5);
        assert!((output[3] - 0.3).abs() < 1e-5);
        // Past the last input sample the value holds
        assert!((output[5] - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_empty_input() {
        let output = resample(&[], 2, 48000, 16000);
        assert!(output.is_empty());
    }
}
