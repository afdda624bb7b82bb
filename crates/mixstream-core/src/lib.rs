//! Mixstream Core - Real-time mixing engine for simultaneous buffer playback

pub mod audio;
pub mod config;
pub mod cursor;
pub mod gc;
pub mod mixer;
pub mod queue;
pub mod types;

pub use audio::{
    list_host_apis, list_output_device_names, AudioHost, CpalHost, DeviceSelector, MixerConfig,
    MixerError, MixerResult, OfflineHost,
};
pub use cursor::{BufferCursor, MixStep};
pub use mixer::{BufferQueue, MixerAtomics, MixerState, MixerStream};
pub use queue::{work_queue, WorkConsumer, WorkProducer};
pub use types::*;
