//! Mixer stream configuration
//!
//! Defines which output device to open, the requested sample rate and the
//! suggested output latency. Requested values are only a starting point: the
//! audio subsystem reports the negotiated values after the stream is opened.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Default sample rate requested from the device (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Buffer size used to derive a device's default low output latency when the
/// backend does not report one (frames)
pub const DEFAULT_LOW_LATENCY_FRAMES: u32 = 256;

/// Smallest and largest fixed buffer sizes the backends will request (frames)
pub const MIN_BUFFER_FRAMES: u32 = 16;
pub const MAX_BUFFER_FRAMES: u32 = 8192;

/// Output device selection
///
/// Both fields must be given together, or both omitted to select the system
/// default output device. Empty strings count as omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelector {
    /// Host API name (e.g. "ALSA", "JACK", "WASAPI")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_api: Option<String>,
    /// Device name as reported by the host API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl DeviceSelector {
    /// Select the system default output device
    pub fn system_default() -> Self {
        Self::default()
    }

    /// Select a named device under a named host API
    pub fn new(host_api: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            host_api: Some(host_api.into()),
            device_name: Some(device_name.into()),
        }
    }

    /// Host API name, treating an empty string as unset
    pub fn host_api(&self) -> Option<&str> {
        self.host_api.as_deref().filter(|s| !s.is_empty())
    }

    /// Device name, treating an empty string as unset
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Display label including the host API when available
    pub fn display_label(&self) -> String {
        match (self.host_api(), self.device_name()) {
            (Some(host), Some(name)) => format!("[{}] {}", host, name),
            (None, Some(name)) => name.to_string(),
            (Some(host), None) => format!("[{}]", host),
            (None, None) => "system default".to_string(),
        }
    }
}

/// Configuration for opening a mixer stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output device (both fields unset = system default)
    pub device: DeviceSelector,

    /// Requested sample rate in samples per second
    pub sample_rate: u32,

    /// Suggested output latency in seconds
    /// None = use the selected device's default low output latency.
    /// Low values may not give workable playback on every system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_latency: Option<f64>,

    /// Simultaneously playing buffers reserved for up front
    /// Going past this grows the callback's working list on the audio thread.
    pub queue_capacity: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            suggested_latency: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MixerConfig {
    /// Set the output device
    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    /// Set the requested sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the suggested output latency
    pub fn with_suggested_latency(mut self, latency: Duration) -> Self {
        self.suggested_latency = Some(latency.as_secs_f64());
        self
    }

    /// Set how many simultaneously playing buffers to reserve for
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Suggested latency as a duration
    ///
    /// Negative, non-finite and unrepresentably large values count as unset.
    pub fn suggested_latency(&self) -> Option<Duration> {
        self.suggested_latency
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Convert a latency into a whole number of frames at a sample rate
pub fn latency_to_frames(latency: Duration, sample_rate: u32) -> u32 {
    (latency.as_secs_f64() * sample_rate as f64).round() as u32
}

/// Convert a frame count into a latency at a sample rate
pub fn frames_to_latency(frames: u32, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}
