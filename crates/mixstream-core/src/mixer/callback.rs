//! Real-time render callback
//!
//! The callback state lives inside the closure registered with the output
//! stream, so the audio thread owns the consumer half of the work queue and
//! every active cursor outright. Nothing here blocks apart from the O(1)
//! pending-list swap, and nothing allocates: retired cursors are handed to
//! the GC thread by their `Owned` wrapper.

use std::sync::Arc;

use basedrop::Owned;

use super::atomics::MixerAtomics;
use crate::cursor::BufferCursor;
use crate::queue::WorkConsumer;
use crate::types::Sample;

/// Consumer-side mixer state, owned by the audio thread
pub(crate) struct MixerCallback {
    cursors: WorkConsumer<Owned<BufferCursor>>,
    channels: usize,
    atomics: Arc<MixerAtomics>,
}

impl MixerCallback {
    pub(crate) fn new(
        cursors: WorkConsumer<Owned<BufferCursor>>,
        channels: usize,
        atomics: Arc<MixerAtomics>,
    ) -> Self {
        Self {
            cursors,
            channels: channels.max(1),
            atomics,
        }
    }

    /// Render one interleaved output period
    pub(crate) fn render(&mut self, output: &mut [Sample]) {
        output.fill(0.0);

        let frames = output.len() / self.channels;
        let mut retired = 0u64;
        self.cursors.drain_and_process(|cursor| {
            let complete = cursor.mix_step(output, frames).is_complete();
            retired += complete as u64;
            complete
        });

        self.atomics
            .record_period(retired, self.cursors.working_len());
    }
}

impl Drop for MixerCallback {
    fn drop(&mut self) {
        let discarded = self.cursors.clear();
        self.atomics.record_discarded(discarded as u64);
        if discarded > 0 {
            log::debug!("Discarded {} unfinished buffers", discarded);
        }
    }
}
