//! Deferred reclamation of retired cursors
//!
//! Cursors finish on the audio thread. Freeing a cursor there would release
//! its gain vector and possibly the last reference to its sample buffer,
//! which means a trip into the allocator in the middle of a period.
//!
//! Cursors are therefore wrapped in `basedrop::Owned<T>`. Dropping an `Owned`
//! only pushes a pointer onto a lock-free list; a dedicated `mixstream-gc`
//! thread runs the real destructors.
//!
//! ```ignore
//! use basedrop::Owned;
//! use crate::gc::gc_handle;
//!
//! let cursor = Owned::new(&gc_handle(), BufferCursor::new(buffer, gains));
//! drop(cursor); // queued for the GC thread, not freed here
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the GC thread runs deferred destructors
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Spawn the collector thread and return a handle to it
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("mixstream-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created on the thread that owns it
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::debug!("Cursor GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn mixstream GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Owned<T>` / `Shared<T>` allocations
///
/// The collector thread starts on first use and lives for the process.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
