//! Mixer stream lifecycle
//!
//! A [`MixerStream`] binds one output device to one work queue of buffer
//! cursors. Producers queue buffers through [`BufferQueue`] handles from any
//! thread; the render callback registered with the device mixes them.
//!
//! ```text
//!   open()          start()            stop()
//! ─────────► Created ───────► Running ◄───────► Stopped
//!               │                │                  │
//!               └──── close() / drop ───────────────┴──► released
//! ```
//!
//! Closing consumes the [`MixerStream`]; afterwards only [`BufferQueue`]
//! handles remain and their `enqueue` fails with `StreamStateError::Closed`.
//! Callbacks only fire while `Running`; a stopped stream keeps its cursors
//! and resumes them where they left off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use basedrop::Owned;

use super::atomics::MixerAtomics;
use super::callback::MixerCallback;
use crate::audio::{
    resolve_output_device, AudioHost, DeviceInfo, MixerConfig, MixerResult, OutputStream,
    StreamParams, StreamRequest, StreamStateError, ValidationError,
};
use crate::cursor::BufferCursor;
use crate::gc::gc_handle;
use crate::queue::{work_queue_with_capacity, WorkProducer};
use crate::types::{Sample, SampleBuffer};

/// Lifecycle state of a mixer stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    /// Opened, callbacks not yet started
    Created,
    /// Callbacks are being delivered
    Running,
    /// Callbacks paused; queued buffers are kept
    Stopped,
}

/// Cloneable producer handle for queueing buffers from any thread
#[derive(Clone)]
pub struct BufferQueue {
    producer: WorkProducer<Owned<BufferCursor>>,
    channels: usize,
    closed: Arc<AtomicBool>,
    atomics: Arc<MixerAtomics>,
}

impl BufferQueue {
    /// Queue a buffer to start playing at the next period
    ///
    /// `gain` holds one factor per output channel; `None` plays at unity.
    /// The buffer must have exactly as many channels as the stream.
    pub fn enqueue(&self, buffer: SampleBuffer, gain: Option<&[Sample]>) -> MixerResult<()> {
        if self.is_closed() {
            return Err(StreamStateError::Closed.into());
        }
        if buffer.channels() != self.channels {
            return Err(ValidationError::ChannelMismatch {
                expected: self.channels,
                actual: buffer.channels(),
            }
            .into());
        }
        let gains: Box<[Sample]> = match gain {
            Some(gain) if gain.len() != self.channels => {
                return Err(ValidationError::GainLengthMismatch {
                    expected: self.channels,
                    actual: gain.len(),
                }
                .into());
            }
            Some(gain) => gain.into(),
            None => vec![1.0; self.channels].into_boxed_slice(),
        };

        let cursor = Owned::new(&gc_handle(), BufferCursor::new(buffer, gains));
        self.atomics.record_enqueued();
        self.producer.add(cursor);

        // Lost a race with close: nothing will ever drain this item
        if self.is_closed() {
            let discarded = self.producer.clear_pending();
            self.atomics.record_discarded(discarded as u64);
            return Err(StreamStateError::Closed.into());
        }
        Ok(())
    }

    /// Output channel count every queued buffer must match
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Whether the owning stream has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shared mixer statistics
    pub fn atomics(&self) -> &MixerAtomics {
        &self.atomics
    }
}

/// An open output stream that mixes queued buffers
///
/// Exclusively owns the device stream; dropping the mixer closes it.
pub struct MixerStream {
    stream: Option<Box<dyn OutputStream>>,
    queue: BufferQueue,
    device: DeviceInfo,
    requested: MixerConfig,
    params: StreamParams,
    state: MixerState,
}

impl MixerStream {
    /// Open a stream on the configured output device
    ///
    /// The channel count is the device's maximum output channel count. The
    /// sample rate and latency actually in effect are read back from the
    /// opened stream and may differ from the request.
    pub fn open<H>(host: &H, config: &MixerConfig) -> MixerResult<Self>
    where
        H: AudioHost + ?Sized,
    {
        let device = resolve_output_device(host, &config.device)?;
        let channels = device.max_output_channels;
        if channels == 0 {
            return Err(StreamStateError::UnsupportedFormat(format!(
                "{} has no output channels",
                device.id
            ))
            .into());
        }

        let suggested_latency = config
            .suggested_latency()
            .unwrap_or(device.default_low_output_latency);
        let request = StreamRequest {
            device: device.clone(),
            channels,
            sample_rate: config.sample_rate,
            suggested_latency,
        };

        log::debug!(
            "Opening {} with {} channels at {}Hz, suggested latency {:?}",
            device.id,
            channels,
            config.sample_rate,
            suggested_latency
        );

        let atomics = Arc::new(MixerAtomics::new());
        let (producer, consumer) = work_queue_with_capacity(config.queue_capacity);
        let mut callback = MixerCallback::new(consumer, channels as usize, Arc::clone(&atomics));
        let stream = host.open_output_stream(
            &request,
            Box::new(move |output: &mut [f32]| callback.render(output)),
        )?;

        let params = stream.params();
        if params.channels != channels {
            if let Err(e) = stream.close() {
                log::warn!("Failed to close mismatched stream on {}: {}", device.id, e);
            }
            return Err(StreamStateError::ConfigMismatch(format!(
                "requested {} channels, stream opened with {}",
                channels, params.channels
            ))
            .into());
        }

        if params.sample_rate != config.sample_rate {
            log::warn!(
                "{} runs at {}Hz instead of the requested {}Hz",
                device.id,
                params.sample_rate,
                config.sample_rate
            );
        }
        log::info!(
            "Mixer stream open on {}: {} channels, {}Hz, output latency {:.1}ms",
            device.id,
            params.channels,
            params.sample_rate,
            params.output_latency.as_secs_f64() * 1000.0
        );

        Ok(Self {
            stream: Some(stream),
            queue: BufferQueue {
                producer,
                channels: channels as usize,
                closed: Arc::new(AtomicBool::new(false)),
                atomics,
            },
            device,
            requested: config.clone(),
            params,
            state: MixerState::Created,
        })
    }

    /// Queue a buffer from the owning thread
    ///
    /// See [`BufferQueue::enqueue`].
    pub fn enqueue(&self, buffer: SampleBuffer, gain: Option<&[Sample]>) -> MixerResult<()> {
        self.queue.enqueue(buffer, gain)
    }

    /// Begin callback delivery
    pub fn start(&mut self) -> MixerResult<()> {
        let stream = self.stream.as_mut().ok_or(StreamStateError::Closed)?;
        stream.start()?;
        self.state = MixerState::Running;
        log::info!("Mixer stream started on {}", self.device.id);
        Ok(())
    }

    /// Pause callback delivery, keeping queued buffers
    pub fn stop(&mut self) -> MixerResult<()> {
        let stream = self.stream.as_mut().ok_or(StreamStateError::Closed)?;
        stream.stop()?;
        self.state = MixerState::Stopped;
        log::info!("Mixer stream stopped on {}", self.device.id);
        Ok(())
    }

    /// Stop callbacks, release the device stream and discard queued buffers
    pub fn close(mut self) -> MixerResult<()> {
        self.shutdown()
    }

    /// Release everything once; later calls are no-ops
    fn shutdown(&mut self) -> MixerResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        self.queue.closed.store(true, Ordering::Release);

        // Closing drops the callback, which clears the working list
        let result = stream.close();
        let discarded = self.queue.producer.clear_pending();
        self.queue.atomics.record_discarded(discarded as u64);

        log::info!("Mixer stream closed on {}", self.device.id);
        result
    }

    pub fn state(&self) -> MixerState {
        self.state
    }

    /// Negotiated sample rate
    pub fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    /// Negotiated output latency
    pub fn output_latency(&self) -> Duration {
        self.params.output_latency
    }

    /// Output channel count
    pub fn channels(&self) -> usize {
        self.params.channels as usize
    }

    /// The device this stream plays on
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Configuration the stream was opened with
    pub fn requested_config(&self) -> &MixerConfig {
        &self.requested
    }

    /// A producer handle that can be moved to other threads
    pub fn queue_handle(&self) -> BufferQueue {
        self.queue.clone()
    }

    /// Shared mixer statistics
    pub fn atomics(&self) -> Arc<MixerAtomics> {
        Arc::clone(&self.queue.atomics)
    }
}

impl Drop for MixerStream {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error closing mixer stream on {}: {}", self.device.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        DeviceResolutionError, DeviceSelector, MixerError, OfflineDevice, OfflineDriver,
        OfflineHost,
    };
    use std::thread;

    fn open_stereo() -> (OfflineHost, MixerStream, OfflineDriver) {
        let host = OfflineHost::stereo();
        let mixer = MixerStream::open(&host, &MixerConfig::default()).unwrap();
        let driver = host.driver().unwrap();
        (host, mixer, driver)
    }

    fn constant(value: f32, frames: usize) -> SampleBuffer {
        SampleBuffer::interleaved(vec![value; frames * 2], 2).unwrap()
    }

    /// Stereo buffer whose frame `i` holds `[i, -i]`
    fn ramp(frames: usize) -> SampleBuffer {
        let samples: Vec<f32> = (0..frames).flat_map(|i| [i as f32, -(i as f32)]).collect();
        SampleBuffer::interleaved(samples, 2).unwrap()
    }

    fn multi_host() -> OfflineHost {
        OfflineHost::new()
            .with_device(OfflineDevice::new("ALSA", "hw:0,0").default_device())
            .with_device(OfflineDevice::new("ALSA", "hw:1,0").channels(8))
    }

    #[test]
    fn test_open_default_device() {
        let (_host, mixer, _driver) = open_stereo();
        assert_eq!(mixer.state(), MixerState::Created);
        assert_eq!(mixer.channels(), 2);
        assert_eq!(mixer.sample_rate(), 48000);
        assert_eq!(mixer.device().id.name, "Virtual Output");
        assert_eq!(mixer.output_latency(), crate::audio::frames_to_latency(256, 48000));
    }

    #[test]
    fn test_channel_count_follows_device_maximum() {
        let host = multi_host();
        let config =
            MixerConfig::default().with_device(DeviceSelector::new("ALSA", "hw:1,0"));
        let mixer = MixerStream::open(&host, &config).unwrap();
        assert_eq!(mixer.channels(), 8);
        assert_eq!(mixer.queue_handle().channels(), 8);
    }

    #[test]
    fn test_negotiated_latency_is_read_back() {
        let host = OfflineHost::stereo();
        let config = MixerConfig::default()
            .with_sample_rate(44100)
            .with_suggested_latency(Duration::from_millis(10));
        let mixer = MixerStream::open(&host, &config).unwrap();
        assert_eq!(mixer.sample_rate(), 44100);
        // 441 whole frames at 44.1kHz
        assert_eq!(mixer.output_latency(), crate::audio::frames_to_latency(441, 44100));
        assert_eq!(host.driver().unwrap().buffer_frames(), 441);
    }

    #[test]
    fn test_out_of_range_latency_falls_back_to_device_default() {
        let host = OfflineHost::stereo();
        let mut config = MixerConfig::default();
        config.suggested_latency = Some(1e30);

        let mixer = MixerStream::open(&host, &config).unwrap();
        assert_eq!(mixer.output_latency(), crate::audio::frames_to_latency(256, 48000));
        assert_eq!(mixer.requested_config().suggested_latency, Some(1e30));
    }

    #[test]
    fn test_requested_config_is_kept_beside_negotiated_values() {
        let host = OfflineHost::new().with_device(
            OfflineDevice::new("Offline", "Low Rate")
                .sample_rates(8000, 44100)
                .default_device(),
        );
        let config = MixerConfig::default()
            .with_sample_rate(96000)
            .with_queue_capacity(1024);
        let mixer = MixerStream::open(&host, &config).unwrap();

        assert_eq!(mixer.requested_config(), &config);
        assert_eq!(mixer.requested_config().sample_rate, 96000);
        assert_eq!(mixer.sample_rate(), 44100);
        assert_eq!(mixer.device().default_sample_rate, 44100);
    }

    #[test]
    fn test_partial_device_selection_is_rejected() {
        let host = multi_host();

        let device_only = MixerConfig::default().with_device(DeviceSelector {
            host_api: None,
            device_name: Some("hw:0,0".to_string()),
        });
        assert_eq!(
            MixerStream::open(&host, &device_only).err(),
            Some(MixerError::DeviceResolution(
                DeviceResolutionError::HostApiRequired {
                    device: "hw:0,0".to_string()
                }
            ))
        );

        let host_only = MixerConfig::default().with_device(DeviceSelector {
            host_api: Some("ALSA".to_string()),
            device_name: None,
        });
        assert_eq!(
            MixerStream::open(&host, &host_only).err(),
            Some(MixerError::DeviceResolution(
                DeviceResolutionError::DeviceRequired {
                    host_api: "ALSA".to_string()
                }
            ))
        );

        let missing =
            MixerConfig::default().with_device(DeviceSelector::new("ALSA", "hw:9,0"));
        assert!(matches!(
            MixerStream::open(&host, &missing),
            Err(MixerError::DeviceResolution(
                DeviceResolutionError::DeviceNotFound { .. }
            ))
        ));

        assert_eq!(host.streams_opened(), 0);
    }

    #[test]
    fn test_gain_length_mismatch_creates_no_cursor() {
        let (_host, mut mixer, driver) = open_stereo();
        let err = mixer.enqueue(constant(1.0, 16), Some(&[1.0][..])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::GainLengthMismatch {
                expected: 2,
                actual: 1
            }
            .into()
        );
        assert_eq!(mixer.atomics().enqueued(), 0);

        mixer.start().unwrap();
        let out = driver.render(16).unwrap();
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.atomics().active(), 0);
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let (_host, mixer, _driver) = open_stereo();
        let mono = SampleBuffer::interleaved(vec![0.5; 16], 1).unwrap();
        assert_eq!(
            mixer.enqueue(mono, None).unwrap_err(),
            ValidationError::ChannelMismatch {
                expected: 2,
                actual: 1
            }
            .into()
        );
    }

    #[test]
    fn test_buffers_mix_additively() {
        let (_host, mut mixer, driver) = open_stereo();
        mixer.enqueue(constant(1.0, 32), Some(&[1.0, 1.0][..])).unwrap();
        mixer.enqueue(constant(0.5, 32), Some(&[2.0, 0.0][..])).unwrap();
        mixer.start().unwrap();

        let out = driver.render(32).unwrap();
        for frame in out.chunks_exact(2) {
            assert_eq!(frame, [2.0, 1.0]);
        }
        assert!(mixer.atomics().is_idle());
    }

    #[test]
    fn test_idle_stream_renders_silence() {
        let (_host, mut mixer, driver) = open_stereo();
        mixer.start().unwrap();
        for _ in 0..3 {
            let out = driver.render_period().unwrap();
            assert_eq!(out.len(), 256 * 2);
            assert!(out.iter().all(|s| *s == 0.0));
        }
        assert_eq!(mixer.atomics().periods(), 3);
    }

    #[test]
    fn test_callbacks_only_while_running() {
        let (_host, mut mixer, driver) = open_stereo();
        mixer.enqueue(constant(1.0, 8), None).unwrap();
        assert!(driver.render(8).is_none());

        mixer.start().unwrap();
        assert_eq!(mixer.state(), MixerState::Running);
        assert!(driver.render(4).is_some());

        mixer.stop().unwrap();
        assert_eq!(mixer.state(), MixerState::Stopped);
        assert!(driver.render(4).is_none());
    }

    #[test]
    fn test_stop_start_resumes_from_saved_position() {
        let (_host, mut mixer, driver) = open_stereo();
        mixer.enqueue(ramp(8), None).unwrap();
        mixer.start().unwrap();

        let first = driver.render(3).unwrap();
        assert_eq!(first, [0.0, -0.0, 1.0, -1.0, 2.0, -2.0]);

        mixer.stop().unwrap();
        // Queueing while stopped is allowed
        mixer.enqueue(constant(0.0, 1), None).unwrap();
        mixer.start().unwrap();

        let second = driver.render(5).unwrap();
        assert_eq!(second, [3.0, -3.0, 4.0, -4.0, 5.0, -5.0, 6.0, -6.0, 7.0, -7.0]);
        assert!(mixer.atomics().is_idle());
    }

    #[test]
    fn test_redundant_transitions_surface_stream_errors() {
        let (_host, mut mixer, _driver) = open_stereo();
        assert_eq!(mixer.stop().unwrap_err(), StreamStateError::NotRunning.into());
        mixer.start().unwrap();
        assert_eq!(mixer.start().unwrap_err(), StreamStateError::AlreadyRunning.into());
        assert_eq!(mixer.state(), MixerState::Running);
    }

    #[test]
    fn test_start_failure_is_reported() {
        let host = OfflineHost::stereo().fail_start();
        let mut mixer = MixerStream::open(&host, &MixerConfig::default()).unwrap();
        assert!(matches!(
            mixer.start(),
            Err(MixerError::StreamState(StreamStateError::Start(_)))
        ));
        assert_eq!(mixer.state(), MixerState::Created);
    }

    #[test]
    fn test_close_releases_stream_once() {
        let (host, mut mixer, driver) = open_stereo();
        mixer.start().unwrap();
        mixer.close().unwrap();

        assert!(driver.is_closed());
        assert!(driver.render(8).is_none());
        assert_eq!(host.streams_opened(), 1);
        assert_eq!(host.streams_closed(), 1);
    }

    #[test]
    fn test_drop_releases_stream_once() {
        let (host, mixer, driver) = open_stereo();
        drop(mixer);
        assert!(driver.is_closed());
        assert_eq!(host.streams_closed(), 1);
    }

    #[test]
    fn test_failed_open_leaves_nothing_open() {
        let host = OfflineHost::stereo().misreport_channels(1);
        let err = MixerStream::open(&host, &MixerConfig::default()).err();
        assert!(matches!(
            err,
            Some(MixerError::StreamState(StreamStateError::ConfigMismatch(_)))
        ));
        assert_eq!(host.streams_opened(), 1);
        assert_eq!(host.streams_closed(), 1);

        let host = OfflineHost::stereo().fail_open();
        assert!(MixerStream::open(&host, &MixerConfig::default()).is_err());
        assert_eq!(host.streams_opened(), 0);
        assert_eq!(host.streams_closed(), 0);
    }

    #[test]
    fn test_enqueue_after_close_fails() {
        let (_host, mixer, _driver) = open_stereo();
        let queue = mixer.queue_handle();
        queue.enqueue(constant(1.0, 64), None).unwrap();
        mixer.close().unwrap();

        assert!(queue.is_closed());
        assert_eq!(
            queue.enqueue(constant(1.0, 64), None).unwrap_err(),
            StreamStateError::Closed.into()
        );
        // The unplayed buffer was discarded with the stream
        assert!(queue.atomics().is_idle());
    }

    #[test]
    fn test_concurrent_producers_all_play_out() {
        const PRODUCERS: usize = 4;
        const BUFFERS_PER_PRODUCER: usize = 50;

        let (_host, mut mixer, driver) = open_stereo();
        mixer.start().unwrap();
        let atomics = mixer.atomics();

        thread::scope(|s| {
            for _ in 0..PRODUCERS {
                let queue = mixer.queue_handle();
                s.spawn(move || {
                    for i in 0..BUFFERS_PER_PRODUCER {
                        queue.enqueue(constant(0.01, 16 + i), None).unwrap();
                    }
                });
            }
            for _ in 0..200 {
                driver.render(64);
            }
        });

        let mut periods = 0;
        while !atomics.is_idle() && periods < 10_000 {
            driver.render(64);
            periods += 1;
        }

        assert!(atomics.is_idle());
        assert_eq!(atomics.enqueued(), (PRODUCERS * BUFFERS_PER_PRODUCER) as u64);
        assert_eq!(atomics.retired(), atomics.enqueued());
        assert_eq!(atomics.active(), 0);
    }
}
