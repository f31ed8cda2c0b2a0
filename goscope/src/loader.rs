//! Trace loading: decoder output in, finished [`Trace`] out.

use crossbeam_channel::Sender;
use goscope_common::EventTables;
use log::info;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Instant;

use crate::domain::TraceError;
use crate::finalize::{default_workers, finalize_goroutines};
use crate::model::Trace;
use crate::progress::Progress;
use crate::reconstruct::Reconstructor;

/// How to build a trace.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Finalization threads; `None` uses every available core
    pub workers: Option<NonZeroUsize>,
    /// Stages the decoder reported progress for before reconstruction
    pub parser_stages: u32,
    /// Receives overall progress in `0.0..=1.0`
    pub progress: Option<Sender<f32>>,
}

/// Reconstruct the execution model from decoded event tables.
///
/// All or nothing: any error discards everything built so far.
///
/// # Errors
/// Returns the first inconsistency found in the event stream; see
/// [`TraceError`].
pub fn build_trace(tables: EventTables, options: &LoadOptions) -> Result<Trace, TraceError> {
    let started = Instant::now();
    let mut progress = Progress::new(options.progress.clone(), options.parser_stages);

    let raw = Reconstructor::new(&tables).run(&mut progress)?;

    let mut goroutines = raw.goroutines;
    let workers = options.workers.unwrap_or_else(default_workers);
    finalize_goroutines(&mut goroutines, &tables, workers)?;

    goroutines.retain(|g| !g.spans().is_empty());
    goroutines.sort_unstable_by_key(|g| g.id());
    let mut processors = raw.processors;
    processors.sort_unstable_by_key(|p| p.id());

    let trace = Trace { goroutines, processors, gc: raw.gc, stw: raw.stw, tables };
    progress.finish();

    info!(
        "Built trace from {} events in {:.2?}: {} goroutines, {} processors",
        trace.tables.events.len(),
        started.elapsed(),
        trace.goroutines.len(),
        trace.processors.len()
    );
    Ok(trace)
}

/// Read a JSON event-table document and build its trace.
///
/// # Errors
/// Fails if the document cannot be loaded or the trace cannot be built.
pub fn load_trace(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Trace, TraceError> {
    let path = path.as_ref();
    info!("Loading events from {}", path.display());
    let tables = EventTables::from_file(path)?;
    build_trace(tables, options)
}

