//! Configuration files for mixstream applications
//!
//! [`MixerConfig`](crate::audio::MixerConfig) is plain serde data, so it can be
//! embedded in any application config and stored as YAML with the helpers here.
//!
//! ```ignore
//! use mixstream_core::config::{default_config_path, load_config, save_config};
//!
//! let path = default_config_path("player.yaml");
//! let config: PlayerConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};
