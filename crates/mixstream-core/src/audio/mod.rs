//! Audio subsystem access for mixstream
//!
//! Everything the mixer needs from the platform audio layer goes through the
//! [`AudioHost`] / [`OutputStream`] traits:
//!
//! - **[`CpalHost`]**: hardware output through CPAL (ALSA/PipeWire/JACK on
//!   Linux, WASAPI/ASIO on Windows, CoreAudio on macOS)
//! - **[`OfflineHost`]**: virtual devices rendered on demand, for tests and
//!   offline rendering
//!
//! # Example Usage
//!
//! ```ignore
//! use mixstream_core::audio::{list_host_apis, list_output_device_names, CpalHost};
//!
//! let host = CpalHost::new();
//! for host_api in list_host_apis(&host)? {
//!     println!("{}: {:?}", host_api, list_output_device_names(&host, &host_api)?);
//! }
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod offline;

pub use backend::{
    AudioHost, DeviceId, DeviceInfo, OutputStream, RenderCallback, StreamParams, StreamRequest,
};
pub use config::{
    frames_to_latency, latency_to_frames, DeviceSelector, MixerConfig, DEFAULT_LOW_LATENCY_FRAMES,
    DEFAULT_SAMPLE_RATE, MAX_BUFFER_FRAMES, MIN_BUFFER_FRAMES,
};
pub use cpal_backend::CpalHost;
pub use device::{
    list_all_output_devices, list_host_apis, list_output_device_names, resolve_output_device,
};
pub use error::{
    DeviceResolutionError, MixerError, MixerResult, StreamStateError, ValidationError,
};
pub use offline::{OfflineDevice, OfflineDriver, OfflineHost};
