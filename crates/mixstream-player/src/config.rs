//! Player configuration for mixstream-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/mixstream/player.yaml

use std::path::PathBuf;

use mixstream_core::MixerConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device, sample rate and latency
    pub mixer: MixerConfig,
    /// Generated tone bursts
    pub tones: ToneConfig,
}

/// Tone burst generation section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Producer threads, each with its own pitch and pan position
    pub voices: usize,
    /// Bursts queued by each voice
    pub bursts: usize,
    /// Length of one burst in milliseconds
    pub burst_ms: u64,
    /// Pause between a voice's bursts in milliseconds
    pub gap_ms: u64,
    /// Pitch of the first voice in Hz; later voices climb a fifth each
    pub base_frequency: f32,
    /// Peak amplitude of each burst (0.0-1.0)
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            voices: 4,
            bursts: 8,
            burst_ms: 250,
            gap_ms: 125,
            base_frequency: 220.0,
            amplitude: 0.2,
        }
    }
}

impl ToneConfig {
    /// Pitch of a voice
    pub fn voice_frequency(&self, voice: usize) -> f32 {
        self.base_frequency * 1.5f32.powi(voice as i32)
    }

    /// Pan position of a voice, spread evenly from left (-1.0) to right (1.0)
    pub fn voice_pan(&self, voice: usize) -> f32 {
        if self.voices <= 1 {
            return 0.0;
        }
        -1.0 + 2.0 * voice as f32 / (self.voices - 1) as f32
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    mixstream_core::config::default_config_path("player.yaml")
}
