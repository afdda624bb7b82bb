//! Multiple-producer / single-consumer work queue
//!
//! Any number of threads add items; one consumer (the audio thread) makes
//! them visible and processes them in a single pass per cycle.
//!
//! # Double buffering
//!
//! Producers append to a **pending** list behind a mutex. The consumer keeps a
//! private **working** list plus an empty **scratch** list. Each cycle:
//!
//! 1. Lock, swap pending with scratch, unlock. Only two `Vec` headers move,
//!    so the critical section is O(1) no matter how many items are queued.
//! 2. Append the swapped-out items to the working list (no lock).
//! 3. Run the step over the whole working list and drop finished items (no lock).
//!
//! A producer racing the swap either lands in the list being swapped out
//! (visible this cycle) or in the fresh pending list (visible next cycle).
//! Both the add and the swap take the same mutex, so an item can never be
//! appended to a list the consumer is already reading.
//!
//! The scratch list keeps its capacity across swaps, so steady-state cycles
//! ping-pong two allocations without touching the allocator. The working list
//! only allocates when more items are live at once than it was created for;
//! size it with [`work_queue_with_capacity`] to keep that off the consumer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Initial capacity of each list
///
/// Covers typical polyphony without the consumer growing its lists.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

fn lock_pending<T>(pending: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    // A producer that panicked mid-push cannot leave the Vec inconsistent
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a work queue with [`DEFAULT_QUEUE_CAPACITY`]
///
/// Returns `(WorkProducer, WorkConsumer)` where:
/// - Producer: cloneable add side, usable from any thread
/// - Consumer: drain side, owned by exactly one thread
pub fn work_queue<T>() -> (WorkProducer<T>, WorkConsumer<T>) {
    work_queue_with_capacity(DEFAULT_QUEUE_CAPACITY)
}

/// Create a work queue whose lists start with `capacity` slots
pub fn work_queue_with_capacity<T>(capacity: usize) -> (WorkProducer<T>, WorkConsumer<T>) {
    let pending = Arc::new(Mutex::new(Vec::with_capacity(capacity)));
    (
        WorkProducer {
            pending: Arc::clone(&pending),
        },
        WorkConsumer {
            pending,
            scratch: Vec::with_capacity(capacity),
            working: Vec::with_capacity(capacity),
        },
    )
}

/// Add side of a work queue
pub struct WorkProducer<T> {
    pending: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for WorkProducer<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> WorkProducer<T> {
    /// Queue an item for the consumer's next cycle
    pub fn add(&self, item: T) {
        lock_pending(&self.pending).push(item);
    }

    /// Number of items waiting for the next swap
    pub fn pending_len(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    /// Discard every item not yet swapped to the consumer
    ///
    /// Returns the number of discarded items.
    pub fn clear_pending(&self) -> usize {
        let discarded = std::mem::take(&mut *lock_pending(&self.pending));
        discarded.len()
    }
}

/// Drain side of a work queue
pub struct WorkConsumer<T> {
    pending: Arc<Mutex<Vec<T>>>,
    /// Always empty between cycles; swapped in as the next pending list
    scratch: Vec<T>,
    /// Items visible to the consumer, touched by no other thread
    working: Vec<T>,
}

impl<T> WorkConsumer<T> {
    /// Make newly added items visible, then process every working item
    ///
    /// `step` is offered each working item once per call; items for which it
    /// returns `true` are removed. Items added before the swap are processed
    /// in this call; items added after it wait for the next call.
    pub fn drain_and_process<F>(&mut self, mut step: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        {
            let mut pending = lock_pending(&self.pending);
            std::mem::swap(&mut *pending, &mut self.scratch);
        }

        self.working.append(&mut self.scratch);
        self.working.retain_mut(|item| !step(item));
    }

    /// Number of items currently in the working list
    pub fn working_len(&self) -> usize {
        self.working.len()
    }

    /// Items the working list holds before it has to reallocate
    pub fn working_capacity(&self) -> usize {
        self.working.capacity()
    }

    /// Discard every item in the pending, scratch and working lists
    ///
    /// Only meant for teardown. Returns the number of discarded items.
    pub fn clear(&mut self) -> usize {
        let mut pending = lock_pending(&self.pending);
        let discarded = pending.len() + self.scratch.len() + self.working.len();
        pending.clear();
        self.scratch.clear();
        self.working.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    #[test]
    fn test_items_visible_after_drain() {
        let (tx, mut rx) = work_queue();
        tx.add(1);
        tx.add(2);
        assert_eq!(tx.pending_len(), 2);

        let mut seen = Vec::new();
        rx.drain_and_process(|item| {
            seen.push(*item);
            false
        });

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(rx.working_len(), 2);
        assert_eq!(tx.pending_len(), 0);
    }

    #[test]
    fn test_completed_items_are_removed() {
        let (tx, mut rx) = work_queue();
        for countdown in [1u32, 2, 3] {
            tx.add(countdown);
        }

        // Each item counts down and completes when it reaches zero
        let mut cycles = 0;
        while cycles == 0 || rx.working_len() > 0 {
            rx.drain_and_process(|remaining| {
                *remaining -= 1;
                *remaining == 0
            });
            cycles += 1;
        }
        assert_eq!(cycles, 3);
    }

    #[test]
    fn test_item_added_during_drain_waits_for_next_cycle() {
        let (tx, mut rx) = work_queue();
        tx.add("first");

        let mut seen = Vec::new();
        rx.drain_and_process(|item| {
            seen.push(*item);
            // Simulates a producer racing the pass after the swap
            tx.add("late");
            true
        });
        assert_eq!(seen, vec!["first"]);

        seen.clear();
        rx.drain_and_process(|item| {
            seen.push(*item);
            true
        });
        assert_eq!(seen, vec!["late"]);
    }

    #[test]
    fn test_clear_discards_everything() {
        let (tx, mut rx) = work_queue();
        tx.add(1);
        rx.drain_and_process(|_| false);
        tx.add(2);

        assert_eq!(rx.clear(), 2);
        assert_eq!(rx.working_len(), 0);

        let mut visited = 0;
        rx.drain_and_process(|_| {
            visited += 1;
            true
        });
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_clear_pending_from_producer() {
        let (tx, mut rx) = work_queue();
        tx.add(1);
        tx.add(2);
        assert_eq!(tx.clear_pending(), 2);

        rx.drain_and_process(|_| panic!("nothing should be visible"));
    }

    #[test]
    fn test_concurrent_producers_no_loss_no_duplication() {
        const PRODUCERS: usize = 8;
        const ITEMS_PER_PRODUCER: usize = 5_000;

        let (tx, mut rx) = work_queue_with_capacity(16);
        let (done_tx, done_rx) = crossbeam::channel::unbounded::<usize>();
        let mut visits: HashMap<(usize, usize), usize> = HashMap::new();
        let mut removed = 0usize;

        thread::scope(|s| {
            for producer in 0..PRODUCERS {
                let tx = tx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    for seq in 0..ITEMS_PER_PRODUCER {
                        tx.add((producer, seq));
                        if seq % 512 == 0 {
                            thread::yield_now();
                        }
                    }
                    done_tx.send(producer).unwrap();
                });
            }
            drop(done_tx);

            // Consumer cycles while producers race it
            let mut finished = 0;
            loop {
                rx.drain_and_process(|item| {
                    *visits.entry(*item).or_insert(0) += 1;
                    removed += 1;
                    true
                });
                if finished == PRODUCERS {
                    break;
                }
                finished += done_rx.try_iter().count();
            }
        });

        assert_eq!(removed, PRODUCERS * ITEMS_PER_PRODUCER);
        assert_eq!(visits.len(), PRODUCERS * ITEMS_PER_PRODUCER);
        assert!(visits.values().all(|&count| count == 1));
    }

    #[test]
    fn test_working_list_does_not_grow_within_capacity() {
        let (tx, mut rx) = work_queue_with_capacity(64);
        let reserved = rx.working_capacity();
        assert!(reserved >= 64);

        // Two waves, all live at once, filling the reservation exactly
        for item in 0..32 {
            tx.add(item);
        }
        rx.drain_and_process(|_| false);
        for item in 32..64 {
            tx.add(item);
        }
        rx.drain_and_process(|_| false);

        assert_eq!(rx.working_len(), 64);
        assert_eq!(rx.working_capacity(), reserved);
    }

    #[test]
    fn test_items_kept_across_cycles_are_offered_every_cycle() {
        let (tx, mut rx) = work_queue();
        tx.add(0u32);

        for _ in 0..5 {
            rx.drain_and_process(|visits| {
                *visits += 1;
                false
            });
        }

        let mut total = 0;
        rx.drain_and_process(|visits| {
            total = *visits;
            true
        });
        assert_eq!(total, 5);
        assert_eq!(rx.working_len(), 0);
    }
}
