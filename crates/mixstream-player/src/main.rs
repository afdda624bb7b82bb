//! Mixstream Player - plays overlapping tone bursts through the mixer
//!
//! Exercises the mixing engine end to end: several producer threads queue
//! sine bursts at their own pace while the audio callback mixes them.
//!
//! ## Commands
//!
//! - `list`: print host APIs and their output devices
//! - `play`: open the configured device and play tone bursts
//!
//! ## `play` flags
//!
//! - `--config <path>`: config file (default: ~/.config/mixstream/player.yaml)
//! - `--host <name>` / `--device <name>`: output device (give both or neither)
//! - `--rate <hz>`: requested sample rate
//! - `--latency-ms <ms>`: suggested output latency
//! - `--voices <n>` / `--bursts <n>`: producer threads and bursts per thread
//! - `--save-config`: write the effective config back to the config file

mod config;
mod tone;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel;

use config::PlayerConfig;
use mixstream_core::audio::list_all_output_devices;
use mixstream_core::config::{load_config, save_config};
use mixstream_core::{
    list_host_apis, list_output_device_names, BufferQueue, CpalHost, DeviceSelector, MixerStream,
};

const USAGE: &str = "usage: mixstream-player <list|play> [--config <path>] [--host <name>] \
[--device <name>] [--rate <hz>] [--latency-ms <ms>] [--voices <n>] [--bursts <n>] [--save-config]";

/// How long to wait for queued audio to drain after the producers finish
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Play(PlayArgs),
}

#[derive(Debug, Default, PartialEq)]
struct PlayArgs {
    config_path: Option<PathBuf>,
    host_api: Option<String>,
    device: Option<String>,
    sample_rate: Option<u32>,
    latency_ms: Option<f64>,
    voices: Option<usize>,
    bursts: Option<usize>,
    save_config: bool,
}

impl PlayArgs {
    /// Apply command line overrides on top of the loaded config
    fn apply(&self, config: &mut PlayerConfig) {
        if self.host_api.is_some() || self.device.is_some() {
            config.mixer.device = DeviceSelector {
                host_api: self.host_api.clone(),
                device_name: self.device.clone(),
            };
        }
        if let Some(rate) = self.sample_rate {
            config.mixer.sample_rate = rate;
        }
        if let Some(ms) = self.latency_ms {
            config.mixer.suggested_latency = Some(ms / 1000.0);
        }
        if let Some(voices) = self.voices {
            config.tones.voices = voices;
        }
        if let Some(bursts) = self.bursts {
            config.tones.bursts = bursts;
        }
    }
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!("missing command\n{}", USAGE))?;

    match command.as_str() {
        "list" => {
            if let Some(extra) = args.next() {
                bail!("unexpected argument '{}'\n{}", extra, USAGE);
            }
            Ok(Command::List)
        }
        "play" => {
            let mut play = PlayArgs::default();
            while let Some(flag) = args.next() {
                let mut value = || {
                    args.next()
                        .ok_or_else(|| anyhow!("{} requires a value", flag))
                };
                match flag.as_str() {
                    "--config" => play.config_path = Some(PathBuf::from(value()?)),
                    "--host" => play.host_api = Some(value()?),
                    "--device" => play.device = Some(value()?),
                    "--rate" => play.sample_rate = Some(parse_value(&flag, value()?)?),
                    "--latency-ms" => play.latency_ms = Some(parse_value(&flag, value()?)?),
                    "--voices" => play.voices = Some(parse_value(&flag, value()?)?),
                    "--bursts" => play.bursts = Some(parse_value(&flag, value()?)?),
                    "--save-config" => play.save_config = true,
                    _ => bail!("unknown flag '{}'\n{}", flag, USAGE),
                }
            }
            Ok(Command::Play(play))
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn parse_value<T>(flag: &str, value: String) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{}' for {}", value, flag))
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match parse_args(std::env::args().skip(1))? {
        Command::List => list_devices(),
        Command::Play(args) => play(args),
    }
}

fn list_devices() -> Result<()> {
    let host = CpalHost::new();

    for host_api in list_host_apis(&host)? {
        println!("{}", host_api);
        match list_output_device_names(&host, &host_api) {
            Ok(names) if names.is_empty() => println!("  (no output devices)"),
            Ok(names) => {
                for name in names {
                    println!("  {}", name);
                }
            }
            Err(e) => println!("  error: {}", e),
        }
    }

    if let Some(default) = list_all_output_devices(&host)?
        .into_iter()
        .find(|d| d.is_default)
    {
        println!();
        println!(
            "Default: {} ({} channels, {}Hz, {:.1}ms)",
            default.id,
            default.max_output_channels,
            default.default_sample_rate,
            default.default_low_output_latency.as_secs_f64() * 1000.0
        );
    }
    Ok(())
}

fn play(args: PlayArgs) -> Result<()> {
    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut config: PlayerConfig = load_config(&config_path);
    args.apply(&mut config);

    if args.save_config {
        save_config(&config, &config_path)?;
    }

    let host = CpalHost::new();
    let mut mixer = MixerStream::open(&host, &config.mixer).with_context(|| {
        format!(
            "Failed to open output device {}",
            config.mixer.device.display_label()
        )
    })?;
    mixer.start().context("Failed to start mixer stream")?;

    println!(
        "Playing on {} ({} channels, {}Hz, {:.1}ms latency)",
        mixer.device().id,
        mixer.channels(),
        mixer.sample_rate(),
        mixer.output_latency().as_secs_f64() * 1000.0
    );
    if let Some(note) = negotiation_note(&mixer) {
        println!("{}", note);
    }

    let tones = config.tones.clone();
    let sample_rate = mixer.sample_rate();
    let (done_tx, done_rx) = channel::unbounded::<(usize, Result<usize>)>();

    for voice in 0..tones.voices {
        let queue = mixer.queue_handle();
        let tones = tones.clone();
        let done_tx = done_tx.clone();
        thread::Builder::new()
            .name(format!("voice-{}", voice))
            .spawn(move || {
                let result = run_voice(voice, &tones, &queue, sample_rate);
                // The receiver outlives every voice
                let _ = done_tx.send((voice, result));
            })
            .context("Failed to spawn voice thread")?;
    }
    drop(done_tx);

    let mut queued = 0;
    for (voice, result) in done_rx.iter() {
        match result {
            Ok(count) => {
                log::debug!("Voice {} queued {} bursts", voice, count);
                queued += count;
            }
            Err(e) => log::error!("Voice {} failed: {:#}", voice, e),
        }
    }

    let atomics = mixer.atomics();
    let deadline = Instant::now() + DRAIN_GRACE;
    while !atomics.is_idle() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    if !atomics.is_idle() {
        log::warn!(
            "{} buffers still playing after {:?}",
            atomics.enqueued() - atomics.retired(),
            DRAIN_GRACE
        );
    }

    println!(
        "Played {} bursts over {} periods",
        queued,
        atomics.periods()
    );

    mixer.stop().context("Failed to stop mixer stream")?;
    mixer.close().context("Failed to close mixer stream")?;
    Ok(())
}

/// Describe where the device diverged from the requested format
fn negotiation_note(mixer: &MixerStream) -> Option<String> {
    let requested = mixer.requested_config();
    let mut changes = Vec::new();
    if requested.sample_rate != mixer.sample_rate() {
        changes.push(format!(
            "sample rate {}Hz -> {}Hz",
            requested.sample_rate,
            mixer.sample_rate()
        ));
    }
    if let Some(latency) = requested.suggested_latency() {
        if latency != mixer.output_latency() {
            changes.push(format!(
                "latency {:.1}ms -> {:.1}ms",
                latency.as_secs_f64() * 1000.0,
                mixer.output_latency().as_secs_f64() * 1000.0
            ));
        }
    }
    if changes.is_empty() {
        None
    } else {
        Some(format!("Device adjusted {}", changes.join(", ")))
    }
}

/// Queue one voice's bursts, pausing between them
fn run_voice(
    voice: usize,
    tones: &config::ToneConfig,
    queue: &BufferQueue,
    sample_rate: u32,
) -> Result<usize> {
    let channels = queue.channels();
    let burst = tone::sine_burst(
        tones.voice_frequency(voice),
        Duration::from_millis(tones.burst_ms),
        tones.amplitude,
        sample_rate,
        channels,
    )?;
    let gains = tone::pan_gains(tones.voice_pan(voice), channels);
    let interval = Duration::from_millis(tones.burst_ms + tones.gap_ms);

    // Stagger voices so their bursts overlap rather than coincide
    thread::sleep(interval * voice as u32 / tones.voices.max(1) as u32);

    for _ in 0..tones.bursts {
        queue.enqueue(burst.clone(), Some(gains.as_slice()))?;
        thread::sleep(interval);
    }
    Ok(tones.bursts)
}
