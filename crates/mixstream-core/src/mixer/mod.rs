//! Real-time mixer
//!
//! Ties the work queue, buffer cursors and an output stream together:
//!
//! ```text
//! ┌─────────────────┐  BufferQueue::enqueue  ┌──────────────────────────┐
//! │ Producer threads │──────────────────────►│ pending (Mutex<Vec<_>>)  │
//! └─────────────────┘                        └────────────┬─────────────┘
//!                                                         │ O(1) swap
//!                                            ┌────────────▼─────────────┐
//!                                            │ MixerCallback (audio RT) │
//!                                            │  zero → mix → retire     │
//!                                            └──────────────────────────┘
//! ```

mod atomics;
mod callback;
mod stream;

pub use atomics::MixerAtomics;
pub use stream::{BufferQueue, MixerState, MixerStream};
