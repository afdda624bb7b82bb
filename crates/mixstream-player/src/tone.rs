//! Sine burst generator
//!
//! Produces short interleaved buffers for the mixer to play, plus the
//! per-channel gains that place them in the stereo field.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use mixstream_core::{Sample, SampleBuffer};

/// Fade applied to both ends of a burst to avoid clicks
const FADE: Duration = Duration::from_millis(5);

/// Render a sine burst with the same signal on every channel
pub fn sine_burst(
    frequency: f32,
    duration: Duration,
    amplitude: f32,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<SampleBuffer> {
    let frames = ((duration.as_secs_f64() * sample_rate as f64).round() as usize).max(1);
    let fade_frames = ((FADE.as_secs_f64() * sample_rate as f64) as usize).clamp(1, frames / 2 + 1);
    let step = TAU * frequency / sample_rate as f32;

    let mut samples = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        let from_edge = frame.min(frames - 1 - frame);
        let envelope = (from_edge as f32 / fade_frames as f32).min(1.0);
        let value = (step * frame as f32).sin() * amplitude * envelope;
        samples.extend(std::iter::repeat(value).take(channels));
    }

    Ok(SampleBuffer::interleaved(samples, channels)?)
}

/// Equal-power pan gains for `channels` outputs
///
/// Even channels count as left and odd channels as right. `pan` runs from
/// -1.0 (left) to 1.0 (right).
pub fn pan_gains(pan: f32, channels: usize) -> Vec<Sample> {
    if channels < 2 {
        return vec![1.0; channels];
    }
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5 * FRAC_PI_2;
    let (left, right) = (angle.cos(), angle.sin());
    (0..channels)
        .map(|channel| if channel % 2 == 0 { left } else { right })
        .collect()
}
