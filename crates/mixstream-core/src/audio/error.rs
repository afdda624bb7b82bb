//! Mixer error types
//!
//! Errors are grouped into three families, each surfaced synchronously to the
//! calling thread:
//!
//! - [`DeviceResolutionError`]: the requested output device cannot be selected
//! - [`ValidationError`]: a queued buffer does not fit the stream
//! - [`StreamStateError`]: the audio subsystem rejected a stream operation
//!
//! The real-time callback has no error path. Everything it relies on is
//! validated before a buffer reaches the work queue.

use thiserror::Error;

/// Errors raised while selecting an output device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceResolutionError {
    /// A device name was given without its owning host API
    #[error("Host API must be specified when selecting device '{device}'")]
    HostApiRequired { device: String },

    /// A host API was given without a device name
    #[error("Device must be specified when selecting host API '{host_api}'")]
    DeviceRequired { host_api: String },

    /// The host API is not available on this system
    #[error("Host API not found: {0}")]
    HostApiNotFound(String),

    /// No output device with that name exists under the host API
    #[error("Device '{device}' could not be found in '{host_api}'")]
    DeviceNotFound { device: String, host_api: String },

    /// The system reports no default output device
    #[error("No default audio output device available")]
    NoDefaultDevice,

    /// Device or host enumeration failed
    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),
}

/// Errors raised when a buffer is rejected at enqueue time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The buffer holds no samples
    #[error("Sample buffer is empty")]
    EmptyBuffer,

    /// The buffer declares zero channels
    #[error("Sample buffer must have at least one channel")]
    ZeroChannels,

    /// Interleaved data does not divide evenly into frames
    #[error("Interleaved buffer of {len} samples is not a whole number of {channels}-channel frames")]
    RaggedBuffer { len: usize, channels: usize },

    /// Planar channels have different lengths
    #[error("Planar channel {channel} has {actual} frames, expected {expected}")]
    UnevenPlanes {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// The buffer's channel count differs from the stream's
    #[error("The number of channels in the sample buffer ({actual}) must match the stream ({expected})")]
    ChannelMismatch { expected: usize, actual: usize },

    /// The gain vector length differs from the stream's channel count
    #[error("Channel gain has {actual} entries, expected one per output channel ({expected})")]
    GainLengthMismatch { expected: usize, actual: usize },
}

/// Errors reported by the audio subsystem for stream operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamStateError {
    /// Failed to open/build the output stream
    #[error("Failed to open audio stream: {0}")]
    Open(String),

    /// Failed to start the stream
    #[error("Failed to start audio stream: {0}")]
    Start(String),

    /// Failed to stop the stream
    #[error("Failed to stop audio stream: {0}")]
    Stop(String),

    /// Failed to release the stream
    #[error("Failed to close audio stream: {0}")]
    Close(String),

    /// The device offers no 32-bit float output configuration
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The opened stream does not match what was requested
    #[error("Output stream config mismatch: {0}")]
    ConfigMismatch(String),

    /// Start was requested on a running stream
    #[error("Audio stream is already running")]
    AlreadyRunning,

    /// Stop was requested on a stream that is not running
    #[error("Audio stream is not running")]
    NotRunning,

    /// The mixer stream has been closed
    #[error("Mixer stream is closed")]
    Closed,
}

/// Top-level error for mixer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error(transparent)]
    DeviceResolution(#[from] DeviceResolutionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    StreamState(#[from] StreamStateError),
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families_convert_into_mixer_error() {
        let err: MixerError = ValidationError::EmptyBuffer.into();
        assert!(matches!(err, MixerError::Validation(ValidationError::EmptyBuffer)));

        let err: MixerError = StreamStateError::Closed.into();
        assert!(matches!(err, MixerError::StreamState(StreamStateError::Closed)));
    }

    #[test]
    fn test_messages_name_the_device() {
        let err = DeviceResolutionError::DeviceNotFound {
            device: "Speakers".to_string(),
            host_api: "ALSA".to_string(),
        };
        assert_eq!(err.to_string(), "Device 'Speakers' could not be found in 'ALSA'");

        // Transparent wrapper keeps the inner message
        let err: MixerError = err.into();
        assert_eq!(err.to_string(), "Device 'Speakers' could not be found in 'ALSA'");
    }
}
