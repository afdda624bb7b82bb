//! Common types for mixstream
//!
//! Sample buffers handed to the mixer are immutable 32-bit float PCM in one of
//! two layouts. Construction validates the shape, so a buffer that exists is
//! always non-empty with a whole number of frames.

use std::sync::Arc;

use crate::audio::ValidationError;

/// Audio sample type
pub type Sample = f32;

/// Memory layout of a sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// One sample per channel per frame: `[L0, R0, L1, R1, ...]`
    Interleaved,
    /// One contiguous plane per channel: `[L0, L1, ..., R0, R1, ...]`
    Planar,
}

/// An immutable multi-channel buffer of samples
///
/// Cloning is cheap: the sample data is reference counted, so the same buffer
/// can be queued any number of times.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[Sample]>,
    channels: usize,
    frames: usize,
    layout: SampleLayout,
}

impl SampleBuffer {
    /// Wrap interleaved samples
    pub fn interleaved(
        samples: impl Into<Arc<[Sample]>>,
        channels: usize,
    ) -> Result<Self, ValidationError> {
        let samples = samples.into();
        if channels == 0 {
            return Err(ValidationError::ZeroChannels);
        }
        if samples.is_empty() {
            return Err(ValidationError::EmptyBuffer);
        }
        if samples.len() % channels != 0 {
            return Err(ValidationError::RaggedBuffer {
                len: samples.len(),
                channels,
            });
        }

        Ok(Self {
            frames: samples.len() / channels,
            samples,
            channels,
            layout: SampleLayout::Interleaved,
        })
    }

    /// Wrap planar samples laid out channel after channel
    pub fn planar(
        samples: impl Into<Arc<[Sample]>>,
        channels: usize,
    ) -> Result<Self, ValidationError> {
        // Same shape rules as interleaved; only the addressing differs
        let buffer = Self::interleaved(samples, channels)?;
        Ok(Self {
            layout: SampleLayout::Planar,
            ..buffer
        })
    }

    /// Build a planar buffer from one vector per channel
    pub fn from_channels(channels: &[Vec<Sample>]) -> Result<Self, ValidationError> {
        let first = channels.first().ok_or(ValidationError::ZeroChannels)?;
        let frames = first.len();
        if let Some((channel, plane)) = channels
            .iter()
            .enumerate()
            .find(|(_, plane)| plane.len() != frames)
        {
            return Err(ValidationError::UnevenPlanes {
                channel,
                expected: frames,
                actual: plane.len(),
            });
        }

        let samples: Vec<Sample> = channels.concat();
        Self::planar(samples, channels.len())
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// Raw sample data in this buffer's layout
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sample at a frame and channel
    ///
    /// Callers guarantee `frame < frames()` and `channel < channels()`.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> Sample {
        match self.layout {
            SampleLayout::Interleaved => self.samples[frame * self.channels + channel],
            SampleLayout::Planar => self.samples[channel * self.frames + frame],
        }
    }
}
