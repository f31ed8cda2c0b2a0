//! The reconstructed execution model.
//!
//! A [`Trace`] is built once by [`crate::build_trace`] and is read-only
//! afterwards; it can be shared between threads without locking.

pub mod span;
pub mod stats;

use goscope_common::{Event, EventTables};
use std::fmt;

use crate::domain::{Duration, EventId, GoroutineId, ProcessorId, Timestamp};
use crate::state::Reason;

pub use span::{Span, SpanTags, MAX_AT_OFFSET};
pub use stats::{goroutine_stats, StateStats};

/// A goroutine and its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goroutine {
    pub(crate) id: GoroutineId,
    /// Function the goroutine was started with, if its creation was traced
    pub(crate) function: Option<String>,
    pub(crate) spans: Vec<Span>,
    /// Side events: creations, unblocks, syscalls and logs issued while in
    /// some span, ordered by time
    pub(crate) events: Vec<EventId>,
}

impl Goroutine {
    pub(crate) fn new(id: GoroutineId) -> Self {
        Self { id, function: None, spans: Vec::new(), events: Vec::new() }
    }

    pub fn id(&self) -> GoroutineId {
        self.id
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn events(&self) -> &[EventId] {
        &self.events
    }
}

impl fmt::Display for Goroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "goroutine {}: {function}", self.id.0),
            None => write!(f, "goroutine {}", self.id.0),
        }
    }
}

/// A processor and the goroutine runs it hosted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    pub(crate) id: ProcessorId,
    pub(crate) spans: Vec<Span>,
}

impl Processor {
    pub(crate) fn new(id: ProcessorId) -> Self {
        Self { id, spans: Vec::new() }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// `RunningG` spans, one per goroutine run; there may be gaps between them
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }
}

/// The finished model: timelines plus the tables needed to resolve them.
#[derive(Debug)]
pub struct Trace {
    pub(crate) goroutines: Vec<Goroutine>,
    pub(crate) processors: Vec<Processor>,
    pub(crate) gc: Vec<Span>,
    pub(crate) stw: Vec<Span>,
    pub(crate) tables: EventTables,
}

impl Trace {
    /// Goroutines with at least one span, sorted by id
    pub fn goroutines(&self) -> &[Goroutine] {
        &self.goroutines
    }

    /// Processors, sorted by id
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Garbage collection cycles
    pub fn gc(&self) -> &[Span] {
        &self.gc
    }

    /// Stop-the-world pauses
    pub fn stw(&self) -> &[Span] {
        &self.stw
    }

    /// The decoder output this model was built from
    pub fn tables(&self) -> &EventTables {
        &self.tables
    }

    /// Look up a goroutine by id.
    ///
    /// Ids are not contiguous, so this is a binary search.
    pub fn goroutine(&self, id: GoroutineId) -> Option<&Goroutine> {
        self.goroutines.binary_search_by_key(&id, |g| g.id).ok().map(|idx| &self.goroutines[idx])
    }

    pub fn processor(&self, id: ProcessorId) -> Option<&Processor> {
        self.processors.binary_search_by_key(&id, |p| p.id).ok().map(|idx| &self.processors[idx])
    }

    /// Resolve an event reference.
    ///
    /// # Panics
    /// Panics if `id` was not produced from this trace.
    pub fn event(&self, id: EventId) -> &Event {
        &self.tables.events[id.index()]
    }

    pub fn start(&self, span: &Span) -> Timestamp {
        Timestamp(self.event(span.event).ts)
    }

    pub fn duration(&self, span: &Span) -> Duration {
        span.end.since(self.start(span))
    }

    /// Why the span's owner entered its state, where the event type says so
    pub fn reason(&self, span: &Span) -> Option<Reason> {
        Reason::for_event(self.event(span.event).ty)
    }

    /// Goroutine a processor span was running
    pub fn running_goroutine(&self, span: &Span) -> GoroutineId {
        GoroutineId(self.event(span.event).g)
    }

    /// Function of the first interesting frame of the span's stack.
    pub fn at_function(&self, span: &Span) -> Option<&str> {
        self.tables.stack_functions(span.stack.0).nth(span.at())
    }

    /// Timestamp of the first event
    pub fn start_time(&self) -> Timestamp {
        Timestamp(self.tables.events.first().map_or(0, |ev| ev.ts))
    }

    /// Timestamp of the last event
    pub fn end_time(&self) -> Timestamp {
        Timestamp(self.tables.last_timestamp())
    }

    pub fn total_duration(&self) -> Duration {
        self.end_time().since(self.start_time())
    }

    /// The side events of `all` that happened during `span`.
    ///
    /// `all` must be sorted by time, as [`Goroutine::events`] is.
    pub fn span_events<'a>(&self, span: &Span, all: &'a [EventId]) -> &'a [EventId] {
        self.events_between(self.start(span), span.end, all)
    }

    /// The side events of `all` that happened during a run of consecutive
    /// spans.
    pub fn range_events<'a>(&self, spans: &[Span], all: &'a [EventId]) -> &'a [EventId] {
        match (spans.first(), spans.last()) {
            (Some(first), Some(last)) => self.events_between(self.start(first), last.end, all),
            _ => &[],
        }
    }

    fn events_between<'a>(&self, start: Timestamp, end: Timestamp, all: &'a [EventId]) -> &'a [EventId] {
        let hi = all.partition_point(|&ev| Timestamp(self.event(ev).ts) < end);
        let lo = all[..hi].partition_point(|&ev| Timestamp(self.event(ev).ts) < start);
        &all[lo..hi]
    }
}
