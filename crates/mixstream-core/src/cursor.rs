//! Buffer playback cursor
//!
//! One cursor per queued buffer. The cursor remembers how many frames it has
//! already emitted and, once per period, adds its next slice into the output
//! buffer with a per-channel gain.

use crate::types::{Sample, SampleBuffer};

/// Result of one mixing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixStep {
    /// Frames remain; keep the cursor for the next period
    Continue,
    /// Every frame has been emitted; the cursor must be dropped
    Complete,
}

impl MixStep {
    #[inline]
    pub fn is_complete(self) -> bool {
        self == MixStep::Complete
    }
}

/// Playback state for one queued buffer
#[derive(Debug)]
pub struct BufferCursor {
    buffer: SampleBuffer,
    gains: Box<[Sample]>,
    /// Frames already emitted, always `<= buffer.frames()`
    position: usize,
}

impl BufferCursor {
    /// Create a cursor at frame 0
    ///
    /// `gains` must hold one entry per buffer channel; the mixer checks this
    /// before building a cursor.
    pub fn new(buffer: SampleBuffer, gains: Box<[Sample]>) -> Self {
        debug_assert_eq!(gains.len(), buffer.channels());
        Self {
            buffer,
            gains,
            position: 0,
        }
    }

    /// Create a cursor with unity gain on every channel
    pub fn unity(buffer: SampleBuffer) -> Self {
        let gains = vec![1.0; buffer.channels()].into_boxed_slice();
        Self::new(buffer, gains)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total_frames(&self) -> usize {
        self.buffer.frames()
    }

    pub fn remaining_frames(&self) -> usize {
        self.buffer.frames() - self.position
    }

    pub fn channels(&self) -> usize {
        self.buffer.channels()
    }

    pub fn gains(&self) -> &[Sample] {
        &self.gains
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.buffer.frames()
    }

    /// Add up to `frames` frames into an interleaved output period
    ///
    /// `output` holds `channels()` samples per frame and is expected to be
    /// zeroed by the caller for the first cursor of a period. Frames that do
    /// not fit in `output` are not emitted.
    pub fn mix_step(&mut self, output: &mut [Sample], frames: usize) -> MixStep {
        let channels = self.buffer.channels();
        let fit = output.len() / channels;
        let count = frames.min(fit).min(self.remaining_frames());

        let start = self.position;
        for (offset, out_frame) in output.chunks_exact_mut(channels).take(count).enumerate() {
            let frame = start + offset;
            for (channel, (out, gain)) in out_frame.iter_mut().zip(self.gains.iter()).enumerate() {
                *out += self.buffer.sample(frame, channel) * gain;
            }
        }
        self.position += count;

        if self.is_complete() {
            MixStep::Complete
        } else {
            MixStep::Continue
        }
    }
}
