//! Offline audio backend
//!
//! An in-process audio subsystem with virtual host APIs and devices. Nothing
//! is played: the caller pulls periods through an [`OfflineDriver`], which
//! invokes the registered render callback exactly like a hardware backend
//! would, but on the caller's thread and only while the stream is running.
//!
//! The host keeps open/close counters and supports fault injection, which
//! makes stream lifecycle behaviour observable in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::backend::{
    AudioHost, DeviceId, DeviceInfo, OutputStream, RenderCallback, StreamParams, StreamRequest,
};
use super::config::{
    frames_to_latency, latency_to_frames, DEFAULT_LOW_LATENCY_FRAMES, DEFAULT_SAMPLE_RATE,
    MAX_BUFFER_FRAMES, MIN_BUFFER_FRAMES,
};
use super::error::{DeviceResolutionError, MixerResult, StreamStateError};

/// Value written into driver buffers before the callback runs
///
/// A correct callback overwrites every sample, so this never reaches output.
const UNINITIALIZED_SAMPLE: f32 = f32::NAN;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A virtual output device
#[derive(Debug, Clone)]
pub struct OfflineDevice {
    id: DeviceId,
    channels: u16,
    latency: Option<Duration>,
    min_sample_rate: u32,
    max_sample_rate: u32,
    is_default: bool,
}

impl OfflineDevice {
    /// A stereo device supporting 8kHz-192kHz
    pub fn new(host_api: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(host_api, name),
            channels: 2,
            latency: None,
            min_sample_rate: 8000,
            max_sample_rate: 192_000,
            is_default: false,
        }
    }

    /// Set the maximum number of output channels (0 = input-only device)
    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Set the default low output latency
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Restrict the supported sample rate range
    pub fn sample_rates(mut self, min: u32, max: u32) -> Self {
        self.min_sample_rate = min.min(max);
        self.max_sample_rate = max.max(min);
        self
    }

    /// Mark as the system default output device
    pub fn default_device(mut self) -> Self {
        self.is_default = true;
        self
    }

    fn default_sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE.clamp(self.min_sample_rate, self.max_sample_rate)
    }

    fn info(&self) -> DeviceInfo {
        let default_sample_rate = self.default_sample_rate();
        DeviceInfo {
            id: self.id.clone(),
            max_output_channels: self.channels,
            default_low_output_latency: self
                .latency
                .unwrap_or_else(|| frames_to_latency(DEFAULT_LOW_LATENCY_FRAMES, default_sample_rate)),
            default_sample_rate,
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    fail_open: bool,
    fail_start: bool,
    reported_channels: Option<u16>,
}

#[derive(Default)]
struct HostCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// In-process audio host
pub struct OfflineHost {
    devices: Vec<OfflineDevice>,
    faults: Faults,
    counters: Arc<HostCounters>,
    last_stream: Mutex<Option<Arc<Mutex<StreamSlot>>>>,
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineHost {
    /// A host with no devices
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            faults: Faults::default(),
            counters: Arc::new(HostCounters::default()),
            last_stream: Mutex::new(None),
        }
    }

    /// A host with one default stereo device under host API "Offline"
    pub fn stereo() -> Self {
        Self::new().with_device(OfflineDevice::new("Offline", "Virtual Output").default_device())
    }

    /// Register a virtual device
    pub fn with_device(mut self, device: OfflineDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Make every `open_output_stream` call fail
    pub fn fail_open(mut self) -> Self {
        self.faults.fail_open = true;
        self
    }

    /// Make every `start` call fail
    pub fn fail_start(mut self) -> Self {
        self.faults.fail_start = true;
        self
    }

    /// Report a different channel count than requested after opening
    pub fn misreport_channels(mut self, channels: u16) -> Self {
        self.faults.reported_channels = Some(channels);
        self
    }

    /// Number of streams opened so far
    pub fn streams_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of streams released so far
    pub fn streams_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Driver for the most recently opened stream
    pub fn driver(&self) -> Option<OfflineDriver> {
        lock(&self.last_stream)
            .as_ref()
            .map(|slot| OfflineDriver { slot: Arc::clone(slot) })
    }
}

impl AudioHost for OfflineHost {
    fn host_api_names(&self) -> MixerResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for device in &self.devices {
            if !names.contains(&device.id.host_api) {
                names.push(device.id.host_api.clone());
            }
        }
        Ok(names)
    }

    fn output_devices(&self, host_api: &str) -> MixerResult<Vec<DeviceInfo>> {
        let devices: Vec<DeviceInfo> = self
            .devices
            .iter()
            .filter(|d| d.id.host_api == host_api)
            .map(OfflineDevice::info)
            .collect();

        if devices.is_empty() {
            return Err(DeviceResolutionError::HostApiNotFound(host_api.to_string()).into());
        }
        Ok(devices)
    }

    fn default_output_device(&self) -> MixerResult<DeviceInfo> {
        self.devices
            .iter()
            .find(|d| d.is_default && d.channels > 0)
            .map(OfflineDevice::info)
            .ok_or_else(|| DeviceResolutionError::NoDefaultDevice.into())
    }

    fn open_output_stream(
        &self,
        request: &StreamRequest,
        callback: RenderCallback,
    ) -> MixerResult<Box<dyn OutputStream>> {
        if self.faults.fail_open {
            return Err(StreamStateError::Open("offline host refused to open".to_string()).into());
        }

        let device = self
            .devices
            .iter()
            .find(|d| d.id == request.device.id)
            .ok_or_else(|| StreamStateError::Open(format!("unknown device {}", request.device.id)))?;

        if request.channels == 0 || request.channels > device.channels {
            return Err(StreamStateError::Open(format!(
                "{} does not support {} output channels",
                device.id, request.channels
            ))
            .into());
        }

        let sample_rate = request
            .sample_rate
            .clamp(device.min_sample_rate, device.max_sample_rate);
        let buffer_frames = latency_to_frames(request.suggested_latency, sample_rate)
            .clamp(MIN_BUFFER_FRAMES, MAX_BUFFER_FRAMES);

        let params = StreamParams {
            sample_rate,
            channels: self.faults.reported_channels.unwrap_or(request.channels),
            output_latency: frames_to_latency(buffer_frames, sample_rate),
        };

        let slot = Arc::new(Mutex::new(StreamSlot {
            callback: Some(callback),
            running: false,
            closed: false,
            channels: request.channels as usize,
            buffer_frames: buffer_frames as usize,
        }));

        *lock(&self.last_stream) = Some(Arc::clone(&slot));
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(OfflineStream {
            slot,
            counters: Arc::clone(&self.counters),
            params,
            fail_start: self.faults.fail_start,
        }))
    }
}

struct StreamSlot {
    callback: Option<RenderCallback>,
    running: bool,
    closed: bool,
    channels: usize,
    buffer_frames: usize,
}

struct OfflineStream {
    slot: Arc<Mutex<StreamSlot>>,
    counters: Arc<HostCounters>,
    params: StreamParams,
    fail_start: bool,
}

impl OfflineStream {
    /// Release the stream once; later calls are no-ops
    fn release(&self) {
        let callback = {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return;
            }
            slot.closed = true;
            slot.running = false;
            slot.callback.take()
        };
        // Drop the callback (and everything it owns) outside the slot lock
        drop(callback);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl OutputStream for OfflineStream {
    fn params(&self) -> StreamParams {
        self.params
    }

    fn start(&mut self) -> MixerResult<()> {
        let mut slot = lock(&self.slot);
        if slot.closed {
            return Err(StreamStateError::Closed.into());
        }
        if slot.running {
            return Err(StreamStateError::AlreadyRunning.into());
        }
        if self.fail_start {
            return Err(StreamStateError::Start("offline host refused to start".to_string()).into());
        }
        slot.running = true;
        Ok(())
    }

    fn stop(&mut self) -> MixerResult<()> {
        let mut slot = lock(&self.slot);
        if slot.closed {
            return Err(StreamStateError::Closed.into());
        }
        if !slot.running {
            return Err(StreamStateError::NotRunning.into());
        }
        slot.running = false;
        Ok(())
    }

    fn close(self: Box<Self>) -> MixerResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pulls periods from an offline stream
#[derive(Clone)]
pub struct OfflineDriver {
    slot: Arc<Mutex<StreamSlot>>,
}

impl OfflineDriver {
    /// Whether the stream is currently delivering callbacks
    pub fn is_running(&self) -> bool {
        lock(&self.slot).running
    }

    /// Whether the stream has been released
    pub fn is_closed(&self) -> bool {
        lock(&self.slot).closed
    }

    /// Negotiated period size in frames
    pub fn buffer_frames(&self) -> usize {
        lock(&self.slot).buffer_frames
    }

    /// Render one period of `frames` frames
    ///
    /// Returns `None` when the stream is stopped or closed, in which case the
    /// callback is not invoked.
    pub fn render(&self, frames: usize) -> Option<Vec<f32>> {
        let mut slot = lock(&self.slot);
        if !slot.running || slot.closed {
            return None;
        }
        let mut buffer = vec![UNINITIALIZED_SAMPLE; frames * slot.channels];
        let callback = slot.callback.as_mut()?;
        callback(&mut buffer);
        Some(buffer)
    }

    /// Render one period of the negotiated size
    pub fn render_period(&self) -> Option<Vec<f32>> {
        let frames = self.buffer_frames();
        self.render(frames)
    }
}
