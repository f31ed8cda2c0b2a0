//! # Shared Data Structures (Event Source ↔ Reconstruction)
//!
//! Defines the raw records produced by the execution-trace decoder and
//! consumed by the span reconstructor in `goscope`. Nothing in here knows
//! about scheduling states or spans; it is the boundary between "bytes on
//! disk" and "events in memory".
//!
//! ## Key Types
//!
//! - [`EventType`] - Every event kind the runtime's tracer can emit
//! - [`Event`] - One decoded event (type, timestamp, G, P, args, stack)
//! - [`Frame`] - A resolved program counter
//! - [`EventTables`] - Events plus the stack, PC and string tables they refer to
//!
//! The binary decoder itself lives outside this workspace. Tables can be
//! handed over either in memory or as a JSON interchange document, see
//! [`EventTables::from_reader`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Event Type Constants
// ============================================================================

/// Number of integer arguments carried by every event.
///
/// The runtime uses at most three; the fourth slot keeps the record a round
/// 32 bytes of arguments.
pub const MAX_EVENT_ARGS: usize = 4;

/// Stack id meaning "no stack trace was captured".
pub const NO_STACK: u32 = 0;

/// Event kinds of the runtime execution tracer, numbered as in the binary
/// trace format.
///
/// The decoder folds the `*Local` variants into their plain counterparts and
/// consumes the framing events (`Batch`, `Frequency`, `Stack`, `String`,
/// `TimerGoroutine`, `FutileWakeup`) itself, so the reconstructor never
/// expects to see those.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    None = 0,
    Batch = 1,
    Frequency = 2,
    Stack = 3,
    Gomaxprocs = 4,
    ProcStart = 5,
    ProcStop = 6,
    GCStart = 7,
    GCDone = 8,
    GCSTWStart = 9,
    GCSTWDone = 10,
    GCSweepStart = 11,
    GCSweepDone = 12,
    GoCreate = 13,
    GoStart = 14,
    GoEnd = 15,
    GoStop = 16,
    GoSched = 17,
    GoPreempt = 18,
    GoSleep = 19,
    GoBlock = 20,
    GoUnblock = 21,
    GoBlockSend = 22,
    GoBlockRecv = 23,
    GoBlockSelect = 24,
    GoBlockSync = 25,
    GoBlockCond = 26,
    GoBlockNet = 27,
    GoSysCall = 28,
    GoSysExit = 29,
    GoSysBlock = 30,
    GoWaiting = 31,
    GoInSyscall = 32,
    HeapAlloc = 33,
    HeapGoal = 34,
    TimerGoroutine = 35,
    FutileWakeup = 36,
    String = 37,
    GoStartLocal = 38,
    GoUnblockLocal = 39,
    GoSysExitLocal = 40,
    GoStartLabel = 41,
    GoBlockGC = 42,
    GCMarkAssistStart = 43,
    GCMarkAssistDone = 44,
    UserTaskCreate = 45,
    UserTaskEnd = 46,
    UserRegion = 47,
    UserLog = 48,
    CPUSample = 49,
}

impl EventType {
    /// Number of defined event types.
    pub const COUNT: usize = 50;
}

impl TryFrom<u8> for EventType {
    type Error = LoadError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use EventType::{
            Batch, CPUSample, Frequency, FutileWakeup, GCDone, GCMarkAssistDone,
            GCMarkAssistStart, GCSTWDone, GCSTWStart, GCStart, GCSweepDone, GCSweepStart,
            GoBlock, GoBlockCond, GoBlockGC, GoBlockNet, GoBlockRecv, GoBlockSelect,
            GoBlockSend, GoBlockSync, GoCreate, GoEnd, GoInSyscall, GoPreempt, GoSched,
            GoSleep, GoStart, GoStartLabel, GoStartLocal, GoStop, GoSysBlock, GoSysCall,
            GoSysExit, GoSysExitLocal, GoUnblock, GoUnblockLocal, GoWaiting, Gomaxprocs,
            HeapAlloc, HeapGoal, ProcStart, ProcStop, Stack, TimerGoroutine, UserLog,
            UserRegion, UserTaskCreate, UserTaskEnd,
        };

        const TABLE: [EventType; EventType::COUNT] = [
            EventType::None,
            Batch,
            Frequency,
            Stack,
            Gomaxprocs,
            ProcStart,
            ProcStop,
            GCStart,
            GCDone,
            GCSTWStart,
            GCSTWDone,
            GCSweepStart,
            GCSweepDone,
            GoCreate,
            GoStart,
            GoEnd,
            GoStop,
            GoSched,
            GoPreempt,
            GoSleep,
            GoBlock,
            GoUnblock,
            GoBlockSend,
            GoBlockRecv,
            GoBlockSelect,
            GoBlockSync,
            GoBlockCond,
            GoBlockNet,
            GoSysCall,
            GoSysExit,
            GoSysBlock,
            GoWaiting,
            GoInSyscall,
            HeapAlloc,
            HeapGoal,
            TimerGoroutine,
            FutileWakeup,
            EventType::String,
            GoStartLocal,
            GoUnblockLocal,
            GoSysExitLocal,
            GoStartLabel,
            GoBlockGC,
            GCMarkAssistStart,
            GCMarkAssistDone,
            UserTaskCreate,
            UserTaskEnd,
            UserRegion,
            UserLog,
            CPUSample,
        ];

        TABLE.get(usize::from(code)).copied().ok_or(LoadError::UnknownEventType(code))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ev{self:?}")
    }
}

// ============================================================================
// Shared Data Structures
// ============================================================================

/// A single decoded trace event.
///
/// Events are immutable once decoded and are referenced by index everywhere
/// downstream; nothing copies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    #[serde(rename = "type")]
    pub ty: EventType,

    /// Timestamp in nanoseconds, non-decreasing across the event list
    pub ts: u64,

    /// Goroutine the event was emitted on (0 = no goroutine / runtime)
    #[serde(default)]
    pub g: u64,

    /// Processor the event was emitted on
    #[serde(default)]
    pub p: i32,

    /// Event-specific arguments.
    ///
    /// For example `GoCreate` stores the new goroutine id in `args[0]` and its
    /// creation stack in `args[1]`; `GoStartLabel` stores a string id in
    /// `args[2]`.
    #[serde(default)]
    pub args: [u64; MAX_EVENT_ARGS],

    /// Stack trace id ([`NO_STACK`] if none)
    #[serde(default)]
    pub stk: u32,
}

impl Event {
    /// Create an event without arguments or stack.
    pub fn new(ty: EventType, ts: u64, g: u64, p: i32) -> Self {
        Self { ty, ts, g, p, args: [0; MAX_EVENT_ARGS], stk: NO_STACK }
    }
}

/// A resolved program counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Fully qualified function name, e.g. `sync.(*Mutex).Lock`
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

/// Output of the trace decoder: the event list and the lookup tables the
/// events refer to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTables {
    /// Trace format version, e.g. `1019` for a Go 1.19 trace
    #[serde(default)]
    pub version: u16,

    /// All events, ordered by timestamp
    pub events: Vec<Event>,

    /// Stack id → program counters, innermost first
    #[serde(default)]
    pub stacks: HashMap<u32, Vec<u64>>,

    /// Program counter → resolved frame
    #[serde(default)]
    pub pcs: HashMap<u64, Frame>,

    /// String id → string
    #[serde(default)]
    pub strings: HashMap<u64, String>,
}

impl EventTables {
    /// Read and validate a JSON interchange document.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read or parsed, or if the
    /// events are not ordered by timestamp.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let tables: EventTables = serde_json::from_reader(reader)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Read and validate a JSON interchange document from disk.
    ///
    /// # Errors
    /// See [`EventTables::from_reader`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Check that timestamps never go backwards.
    ///
    /// # Errors
    /// Returns [`LoadError::NonMonotonic`] for the first out-of-order event.
    pub fn validate(&self) -> Result<(), LoadError> {
        for (index, pair) in self.events.windows(2).enumerate() {
            if pair[1].ts < pair[0].ts {
                return Err(LoadError::NonMonotonic {
                    index: index + 1,
                    prev: pair[0].ts,
                    ts: pair[1].ts,
                });
            }
        }
        Ok(())
    }

    /// Resolved function names of a stack, innermost first.
    ///
    /// Unknown stack ids and unknown PCs yield nothing; a missing frame ends
    /// the walk so that frame indices stay aligned with the PC list.
    pub fn stack_functions(&self, stk: u32) -> impl Iterator<Item = &str> + '_ {
        self.stacks
            .get(&stk)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map_while(|pc| self.pcs.get(pc).map(|frame| frame.function.as_str()))
    }

    /// Function name of the innermost frame of a stack.
    pub fn top_function(&self, stk: u32) -> Option<&str> {
        self.stack_functions(stk).next()
    }

    /// Timestamp of the last event, or 0 for an empty trace.
    pub fn last_timestamp(&self) -> u64 {
        self.events.last().map_or(0, |ev| ev.ts)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Malformed-stream errors raised while loading event tables.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unknown event type code {0}")]
    UnknownEventType(u8),

    #[error("Event {index} goes back in time ({ts} < {prev})")]
    NonMonotonic { index: usize, prev: u64, ts: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
