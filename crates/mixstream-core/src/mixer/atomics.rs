//! Lock-free mixer statistics
//!
//! Written by producers (enqueue) and the audio callback (retire, render),
//! read from any thread without ever blocking the audio thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between the mixer's threads
#[derive(Debug, Default)]
pub struct MixerAtomics {
    /// Buffers accepted by enqueue
    pub enqueued: AtomicU64,
    /// Buffers fully played and removed by the callback
    pub retired: AtomicU64,
    /// Cursors in the callback's working list after the last period
    pub active: AtomicUsize,
    /// Periods rendered by the callback
    pub periods: AtomicU64,
}

impl MixerAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers accepted so far (lock-free)
    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Buffers played to completion so far (lock-free)
    #[inline]
    pub fn retired(&self) -> u64 {
        self.retired.load(Ordering::Relaxed)
    }

    /// Cursors mixed in the last period (lock-free)
    #[inline]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Periods rendered so far (lock-free)
    #[inline]
    pub fn periods(&self) -> u64 {
        self.periods.load(Ordering::Relaxed)
    }

    /// Check whether every enqueued buffer has been played out
    ///
    /// Counts are incremented before a buffer becomes visible to the
    /// callback, so `retired` never overtakes `enqueued`.
    pub fn is_idle(&self) -> bool {
        let enqueued = self.enqueued.load(Ordering::Acquire);
        self.retired.load(Ordering::Acquire) >= enqueued
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Release);
    }

    /// Called by the audio callback once per period
    #[inline]
    pub(crate) fn record_period(&self, retired: u64, active: usize) {
        if retired > 0 {
            self.retired.fetch_add(retired, Ordering::Release);
        }
        self.active.store(active, Ordering::Relaxed);
        self.periods.fetch_add(1, Ordering::Relaxed);
    }

    /// Called when cursors are discarded without playing out
    pub(crate) fn record_discarded(&self, discarded: u64) {
        if discarded > 0 {
            self.retired.fetch_add(discarded, Ordering::Release);
        }
        self.active.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_tracks_enqueue_and_retire() {
        let atomics = MixerAtomics::new();
        assert!(atomics.is_idle());

        atomics.record_enqueued();
        atomics.record_enqueued();
        assert!(!atomics.is_idle());

        atomics.record_period(1, 1);
        assert!(!atomics.is_idle());
        assert_eq!(atomics.active(), 1);

        atomics.record_period(1, 0);
        assert!(atomics.is_idle());
        assert_eq!(atomics.periods(), 2);
        assert_eq!(atomics.retired(), 2);
    }

    #[test]
    fn test_discard_counts_as_retired() {
        let atomics = MixerAtomics::new();
        for _ in 0..3 {
            atomics.record_enqueued();
        }
        atomics.record_discarded(3);
        assert!(atomics.is_idle());
        assert_eq!(atomics.active(), 0);
    }
}
