//! CPAL audio backend implementation
//!
//! Maps the mixer's host API / device model onto CPAL:
//! - Host APIs are CPAL hosts (ALSA, JACK, WASAPI, CoreAudio, ...)
//! - Devices are CPAL output devices offering a 32-bit float configuration
//! - Latency is requested as a fixed buffer size in frames and reported back
//!   as `frames / sample_rate`
//!
//! ```text
//! ┌──────────────────┐   enqueue()   ┌─────────────────────┐
//! │ Producer threads │──────────────►│   Work Queue        │
//! └──────────────────┘   (swap lock) │  pending ⇄ scratch  │
//!                                    └──────────┬──────────┘
//!                                               │ drain_and_process()
//!                                    ┌──────────▼──────────┐
//!                                    │  CPAL Audio Thread  │
//!                                    │ (owns the cursors)  │
//!                                    └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, Host, HostId, SampleFormat, SampleRate, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfigRange,
};

use super::backend::{
    AudioHost, DeviceId, DeviceInfo, OutputStream, RenderCallback, StreamParams, StreamRequest,
};
use super::config::{
    frames_to_latency, latency_to_frames, DEFAULT_LOW_LATENCY_FRAMES, MAX_BUFFER_FRAMES,
    MIN_BUFFER_FRAMES,
};
use super::error::{DeviceResolutionError, MixerResult, StreamStateError};

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    // Use the debug representation which gives us the variant name
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        "Asio" => "ASIO".to_string(),
        _ => name,
    }
}

/// Get a host by its name string
fn get_host_by_name(name: &str) -> MixerResult<Host> {
    let host_id = cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .ok_or_else(|| DeviceResolutionError::HostApiNotFound(name.to_string()))?;

    cpal::host_from_id(host_id)
        .map_err(|e| DeviceResolutionError::Enumeration(format!("{}: {}", name, e)).into())
}

/// Supported 32-bit float output configurations of a device
fn f32_output_configs(device: &cpal::Device) -> Vec<SupportedStreamConfigRange> {
    match device.supported_output_configs() {
        Ok(configs) => configs
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .collect(),
        Err(e) => {
            log::debug!("Could not query output configs: {}", e);
            Vec::new()
        }
    }
}

/// Build the device description the mixer works with
fn describe_device(
    device: &cpal::Device,
    host_api: &str,
    default_name: Option<&str>,
) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let configs = f32_output_configs(device);

    let max_output_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);

    let default_sample_rate = device
        .default_output_config()
        .map(|c| c.sample_rate().0)
        .unwrap_or(super::config::DEFAULT_SAMPLE_RATE);

    // CPAL has no latency query; derive one from a small buffer clamped into
    // the range the device accepts
    let low_latency_frames = configs
        .iter()
        .find_map(|c| match c.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                Some(DEFAULT_LOW_LATENCY_FRAMES.clamp(*min, (*max).max(*min)))
            }
            SupportedBufferSize::Unknown => None,
        })
        .unwrap_or(DEFAULT_LOW_LATENCY_FRAMES);

    Some(DeviceInfo {
        id: DeviceId::new(host_api, name.clone()),
        max_output_channels,
        default_low_output_latency: frames_to_latency(low_latency_frames, default_sample_rate),
        default_sample_rate,
        is_default: default_name == Some(name.as_str()),
    })
}

/// Find a CPAL device by host API and name
fn find_cpal_device(id: &DeviceId) -> MixerResult<cpal::Device> {
    let host = get_host_by_name(&id.host_api)?;
    let mut devices = host
        .output_devices()
        .map_err(|e| DeviceResolutionError::Enumeration(e.to_string()))?;

    devices
        .find(|d: &cpal::Device| d.name().ok().as_deref() == Some(id.name.as_str()))
        .ok_or_else(|| {
            DeviceResolutionError::DeviceNotFound {
                device: id.name.clone(),
                host_api: id.host_api.clone(),
            }
            .into()
        })
}

/// Pick the stream configuration closest to the request
///
/// Prefers an `f32` config with exactly the requested channel count whose
/// range covers the requested sample rate. Falls back to the device's maximum
/// supported rate, matching what the device will actually run at.
fn select_stream_config(
    device: &cpal::Device,
    request: &StreamRequest,
) -> MixerResult<StreamConfig> {
    let configs: Vec<_> = f32_output_configs(device)
        .into_iter()
        .filter(|c| c.channels() == request.channels)
        .collect();

    if configs.is_empty() {
        return Err(StreamStateError::UnsupportedFormat(format!(
            "{} offers no f32 output config with {} channels",
            request.device.id, request.channels
        ))
        .into());
    }

    let target = request.sample_rate;
    let best_config = configs
        .iter()
        .find(|c| target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0)
        .or_else(|| configs.iter().max_by_key(|c| c.max_sample_rate().0))
        .ok_or_else(|| {
            StreamStateError::UnsupportedFormat("No suitable output configuration found".to_string())
        })?;

    let sample_rate = if target >= best_config.min_sample_rate().0
        && target <= best_config.max_sample_rate().0
    {
        SampleRate(target)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target,
            fallback.0
        );
        fallback
    };

    let supported = best_config.clone().with_sample_rate(sample_rate);

    let requested_frames = latency_to_frames(request.suggested_latency, sample_rate.0)
        .clamp(MIN_BUFFER_FRAMES, MAX_BUFFER_FRAMES);
    let buffer_frames = match *supported.buffer_size() {
        SupportedBufferSize::Range { min, max } => requested_frames.clamp(min, max.max(min)),
        SupportedBufferSize::Unknown => requested_frames,
    };

    log::debug!(
        "Selected buffer size: {} frames (requested {:?})",
        buffer_frames,
        request.suggested_latency
    );

    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate,
        buffer_size: CpalBufferSize::Fixed(buffer_frames),
    };

    Ok(config)
}

/// Production audio host backed by CPAL
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

impl AudioHost for CpalHost {
    fn host_api_names(&self) -> MixerResult<Vec<String>> {
        Ok(cpal::available_hosts().into_iter().map(host_name).collect())
    }

    fn output_devices(&self, host_api: &str) -> MixerResult<Vec<DeviceInfo>> {
        let host = get_host_by_name(host_api)?;
        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let devices = host
            .output_devices()
            .map_err(|e| DeviceResolutionError::Enumeration(e.to_string()))?;

        Ok(devices
            .filter_map(|d| describe_device(&d, host_api, default_name.as_deref()))
            .collect())
    }

    fn default_output_device(&self) -> MixerResult<DeviceInfo> {
        let host = cpal::default_host();
        let host_api = host_name(host.id());
        let device = host
            .default_output_device()
            .ok_or(DeviceResolutionError::NoDefaultDevice)?;
        let name = device.name().ok();

        describe_device(&device, &host_api, name.as_deref())
            .ok_or_else(|| DeviceResolutionError::NoDefaultDevice.into())
    }

    fn open_output_stream(
        &self,
        request: &StreamRequest,
        mut callback: RenderCallback,
    ) -> MixerResult<Box<dyn OutputStream>> {
        let device = find_cpal_device(&request.device.id)?;
        let config = select_stream_config(&device, request)?;

        let frames = match config.buffer_size {
            CpalBufferSize::Fixed(frames) => frames,
            CpalBufferSize::Default => DEFAULT_LOW_LATENCY_FRAMES,
        };
        let params = StreamParams {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            output_latency: frames_to_latency(frames, config.sample_rate.0),
        };

        let device_label = request.device.id.to_string();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| callback(data),
                move |err| {
                    log::error!("Audio stream error on {}: {}", device_label, err);
                },
                None,
            )
            .map_err(|e| StreamStateError::Open(e.to_string()))?;

        // Some hosts start streams on build; the mixer starts explicitly
        stream
            .pause()
            .map_err(|e| StreamStateError::Open(format!("could not pause new stream: {}", e)))?;

        log::info!(
            "Opened output stream on {}: {} channels, {}Hz, {} frames",
            request.device.id,
            params.channels,
            params.sample_rate,
            frames
        );

        Ok(Box::new(CpalOutputStream { stream, params }))
    }
}

/// CPAL-specific output stream
///
/// Dropping the inner stream stops callback delivery and frees the callback.
struct CpalOutputStream {
    stream: Stream,
    params: StreamParams,
}

impl OutputStream for CpalOutputStream {
    fn params(&self) -> StreamParams {
        self.params
    }

    fn start(&mut self) -> MixerResult<()> {
        self.stream
            .play()
            .map_err(|e| StreamStateError::Start(e.to_string()).into())
    }

    fn stop(&mut self) -> MixerResult<()> {
        self.stream
            .pause()
            .map_err(|e| StreamStateError::Stop(e.to_string()).into())
    }

    fn close(self: Box<Self>) -> MixerResult<()> {
        // Stop delivery before the stream (and the callback it owns) drops
        let result = self
            .stream
            .pause()
            .map_err(|e| StreamStateError::Close(e.to_string()).into());
        drop(self);
        result
    }
}
