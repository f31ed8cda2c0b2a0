//! # Parallel Finalization
//!
//! After the sequential pass every goroutine's spans are still open-ended
//! and unclassified. Finalizing a goroutine only touches that goroutine, so
//! the work is spread over a fixed pool of worker threads pulling goroutines
//! from a channel:
//!
//! ```text
//!                 ┌──► worker 0 ──┐
//! &mut Goroutine ─┼──► worker 1 ──┼──► join (all or nothing)
//!     (queue)     └──► worker N ──┘
//! ```
//!
//! Per goroutine, in order: end every span at the start of the next one,
//! refine its state from its stack, skip leading runtime frames, then drop a
//! trailing `Done` span or end the last span with the trace.

use goscope_common::EventTables;
use log::debug;
use std::num::NonZeroUsize;
use std::thread;

use crate::domain::{Timestamp, TraceError};
use crate::model::{Goroutine, MAX_AT_OFFSET};
use crate::patterns::{apply_patterns, is_runtime_function};
use crate::state::SchedulingState;

/// Worker count used when none is configured.
pub fn default_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Finalize all goroutines on up to `workers` threads.
///
/// Returns once every goroutine is done. The output does not depend on the
/// number of workers.
///
/// # Errors
/// Returns [`TraceError::WorkerPanicked`] if a worker thread panicked; the
/// goroutines are then in an unspecified state and must be discarded.
pub fn finalize_goroutines(
    goroutines: &mut [Goroutine],
    tables: &EventTables,
    workers: NonZeroUsize,
) -> Result<(), TraceError> {
    let trace_end = Timestamp(tables.last_timestamp());
    let workers = workers.get().min(goroutines.len()).max(1);
    debug!("Finalizing {} goroutines on {} workers", goroutines.len(), workers);

    thread::scope(|scope| {
        let (tx, rx) = crossbeam_channel::unbounded::<&mut Goroutine>();

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || {
                    let mut frames = Vec::new();
                    for g in rx {
                        finalize_goroutine(g, tables, trace_end, &mut frames);
                    }
                })
            })
            .collect();
        drop(rx);

        // Sending only fails once every worker has exited early
        let mut queued = Ok(());
        for g in goroutines.iter_mut() {
            if tx.send(g).is_err() {
                queued = Err(TraceError::WorkerPanicked);
                break;
            }
        }
        drop(tx);

        for handle in handles {
            handle.join().map_err(|_| TraceError::WorkerPanicked)?;
        }
        queued
    })
}

/// Finalize one goroutine.
///
/// `frames` is scratch space, reused across calls to avoid allocating per
/// span.
pub fn finalize_goroutine<'t>(
    g: &mut Goroutine,
    tables: &'t EventTables,
    trace_end: Timestamp,
    frames: &mut Vec<&'t str>,
) {
    for i in 0..g.spans.len() {
        if let Some(next) = g.spans.get(i + 1).map(|s| s.event) {
            g.spans[i].end = Timestamp(tables.events[next.index()].ts);
        }

        let span = &mut g.spans[i];
        frames.clear();
        frames.extend(tables.stack_functions(span.stack.0));

        let (state, tags) = apply_patterns(span.state, frames);
        span.state = state;
        span.tags = tags;
        span.at = first_interesting_frame(frames);
    }

    match g.spans.last_mut() {
        Some(last) if last.state == SchedulingState::Done => {
            g.spans.pop();
        }
        Some(last) => last.end = trace_end,
        None => {}
    }
}

/// Offset of the first frame outside the runtime.
///
/// Never points past the last frame, and scans at most
/// [`MAX_AT_OFFSET`] frames.
fn first_interesting_frame(frames: &[&str]) -> u8 {
    let mut at: u8 = 0;
    while usize::from(at) + 1 < frames.len()
        && at < MAX_AT_OFFSET
        && is_runtime_function(frames[usize::from(at)])
    {
        at += 1;
    }
    at
}
