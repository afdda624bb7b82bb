//! Audio backend traits
//!
//! Defines the capabilities the mixer consumes from the audio subsystem:
//! - **CPAL**: cross-platform hardware output ([`super::CpalHost`])
//! - **Offline**: deterministic in-process output driven by the caller
//!   ([`super::OfflineHost`])
//!
//! Both backends hand the registered callback an interleaved `f32` buffer of
//! `frames × channels` samples on whatever thread delivers audio periods.

use std::time::Duration;

use super::error::MixerResult;

/// Identity of an output device: the host API it belongs to plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Host API name (e.g. "ALSA", "JACK")
    pub host_api: String,
    /// Device name as reported by the host API
    pub name: String,
}

impl DeviceId {
    pub fn new(host_api: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host_api: host_api.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host_api, self.name)
    }
}

/// Capabilities of an output device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Host API and device name
    pub id: DeviceId,
    /// Maximum number of output channels
    pub max_output_channels: u16,
    /// Latency suggested when the caller does not request one
    pub default_low_output_latency: Duration,
    /// Sample rate the device runs at by default
    pub default_sample_rate: u32,
    /// Whether this is the default output device of its host API
    pub is_default: bool,
}

/// Parameters for opening an output stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub device: DeviceInfo,
    pub channels: u16,
    pub sample_rate: u32,
    pub suggested_latency: Duration,
}

/// Values in effect once a stream is open
///
/// These may differ from the [`StreamRequest`]; always read them back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub output_latency: Duration,
}

/// Periodic render callback
///
/// Receives the interleaved output buffer for one period. Runs on the audio
/// subsystem's real-time thread: no blocking, no allocation, no I/O.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Audio subsystem entry point
pub trait AudioHost {
    /// Names of the host APIs available on this system
    fn host_api_names(&self) -> MixerResult<Vec<String>>;

    /// Devices under a host API with their output capabilities
    ///
    /// Fails with `HostApiNotFound` for an unknown host API.
    fn output_devices(&self, host_api: &str) -> MixerResult<Vec<DeviceInfo>>;

    /// The system default output device
    fn default_output_device(&self) -> MixerResult<DeviceInfo>;

    /// Open a 32-bit float output stream and register its render callback
    ///
    /// The stream is returned stopped; no callback fires until `start`.
    fn open_output_stream(
        &self,
        request: &StreamRequest,
        callback: RenderCallback,
    ) -> MixerResult<Box<dyn OutputStream>>;
}

/// An open output stream
///
/// Exclusively owned by one mixer stream. Dropping the box without calling
/// `close` still releases the stream.
pub trait OutputStream {
    /// Negotiated stream parameters
    fn params(&self) -> StreamParams;

    /// Begin callback delivery
    fn start(&mut self) -> MixerResult<()>;

    /// Pause callback delivery; the stream can be started again
    fn stop(&mut self) -> MixerResult<()>;

    /// Stop callback delivery and release the stream and its callback
    fn close(self: Box<Self>) -> MixerResult<()>;
}
