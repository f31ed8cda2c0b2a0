//! Structured error types for goscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every trace-construction failure is fatal for that trace; there is no
//! partially built model.

use std::fmt;

use goscope_common::{EventType, LoadError};
use thiserror::Error;

use super::types::{EventId, GoroutineId, ProcessorId, Timestamp};
use crate::state::SchedulingState;

/// Which trace-global interval list an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSpanKind {
    GC,
    STW,
}

impl fmt::Display for GlobalSpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalSpanKind::GC => f.write_str("GC"),
            GlobalSpanKind::STW => f.write_str("STW"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("illegal state transition {from:?} -> {to:?} for goroutine {goroutine} at {ts} (event {event})")]
    IllegalTransition {
        goroutine: GoroutineId,
        from: SchedulingState,
        to: SchedulingState,
        ts: Timestamp,
        event: EventId,
    },

    #[error("unsupported trace event {ty} (event {event})")]
    UnsupportedEvent { event: EventId, ty: EventType },

    #[error("{ty} (event {event}) refers to goroutine {goroutine}, which has no open span")]
    NoOpenSpan { goroutine: GoroutineId, event: EventId, ty: EventType },

    #[error("{kind} done at {ts} (event {event}) without an open {kind} span")]
    UnmatchedDone { kind: GlobalSpanKind, event: EventId, ts: Timestamp },

    #[error("{kind} start at {ts} (event {event}) while a {kind} span is still open")]
    AlreadyInProgress { kind: GlobalSpanKind, event: EventId, ts: Timestamp },

    #[error("processor {processor} stops a goroutine at {ts} (event {event}) but is not running one")]
    ProcessorNotRunning { processor: ProcessorId, event: EventId, ts: Timestamp },

    #[error("event index {0} does not fit in a 32-bit event reference")]
    EventIndexOverflow(usize),

    #[error("a finalization worker panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
