//! Scheduling states and the static tables keyed by them.
//!
//! A [`SchedulingState`] belongs to exactly one of two sub-universes: the
//! goroutine states, and the single processor state [`SchedulingState::RunningG`].
//! Spans of a goroutine only ever carry goroutine states and spans of a
//! processor only ever carry `RunningG`.

pub mod transitions;

use goscope_common::EventType;
use std::fmt;

pub use transitions::is_legal_transition;

/// What a goroutine (or processor) is doing during a span.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchedulingState {
    // Goroutine states
    Inactive,
    Active,
    GCIdle,
    GCDedicated,
    Blocked,
    BlockedWaitingForTraceData,
    BlockedSend,
    BlockedRecv,
    BlockedSelect,
    BlockedSync,
    BlockedSyncOnce,
    BlockedSyncTriggeringGC,
    BlockedCond,
    BlockedNet,
    BlockedGC,
    BlockedSyscall,
    Stuck,
    Ready,
    Created,
    Done,
    GCMarkAssist,
    GCSweep,

    // Processor states
    RunningG,
}

impl SchedulingState {
    /// Number of states, the dimension of every state-indexed table
    pub const COUNT: usize = 23;

    /// Every state, in ordinal order
    pub const ALL: [SchedulingState; Self::COUNT] = [
        Self::Inactive,
        Self::Active,
        Self::GCIdle,
        Self::GCDedicated,
        Self::Blocked,
        Self::BlockedWaitingForTraceData,
        Self::BlockedSend,
        Self::BlockedRecv,
        Self::BlockedSelect,
        Self::BlockedSync,
        Self::BlockedSyncOnce,
        Self::BlockedSyncTriggeringGC,
        Self::BlockedCond,
        Self::BlockedNet,
        Self::BlockedGC,
        Self::BlockedSyscall,
        Self::Stuck,
        Self::Ready,
        Self::Created,
        Self::Done,
        Self::GCMarkAssist,
        Self::GCSweep,
        Self::RunningG,
    ];

    /// Position of the state in state-indexed tables
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Returns true for states a goroutine span may carry
    pub const fn is_goroutine_state(self) -> bool {
        !self.is_processor_state()
    }

    /// Returns true for states a processor span may carry
    pub const fn is_processor_state(self) -> bool {
        matches!(self, Self::RunningG)
    }

    /// Returns true for any flavour of "blocked"
    pub const fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::Blocked
                | Self::BlockedWaitingForTraceData
                | Self::BlockedSend
                | Self::BlockedRecv
                | Self::BlockedSelect
                | Self::BlockedSync
                | Self::BlockedSyncOnce
                | Self::BlockedSyncTriggeringGC
                | Self::BlockedCond
                | Self::BlockedNet
                | Self::BlockedGC
                | Self::BlockedSyscall
        )
    }

    /// Human-readable label, as shown in statistics tables
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Active => "Active",
            Self::GCIdle => "GC (idle)",
            Self::GCDedicated => "GC (dedicated)",
            Self::Blocked => "Blocked",
            Self::BlockedWaitingForTraceData => "Blocked (runtime/trace)",
            Self::BlockedSend => "Blocked (channel send)",
            Self::BlockedRecv => "Blocked (channel receive)",
            Self::BlockedSelect => "Blocked (select)",
            Self::BlockedSync => "Blocked (sync)",
            Self::BlockedSyncOnce => "Blocked (sync.Once)",
            Self::BlockedSyncTriggeringGC => "Blocked (triggering GC)",
            Self::BlockedCond => "Blocked (sync.Cond)",
            Self::BlockedNet => "Blocked (pollable I/O)",
            Self::BlockedGC => "Blocked (GC)",
            Self::BlockedSyscall => "Blocking syscall",
            Self::Stuck => "Stuck",
            Self::Ready => "Ready",
            Self::Created => "Created",
            Self::Done => "Done",
            Self::GCMarkAssist => "GC (mark assist)",
            Self::GCSweep => "GC (sweep assist)",
            Self::RunningG => "Running goroutine",
        }
    }
}

impl fmt::Display for SchedulingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a goroutine entered its current state, for the few event types where
/// the state alone does not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NewlyCreated,
    CalledGosched,
    CalledSleep,
    GotPreempted,
}

impl Reason {
    /// Reason implied by the event that opened a span
    pub fn for_event(ty: EventType) -> Option<Reason> {
        match ty {
            EventType::GoCreate => Some(Reason::NewlyCreated),
            EventType::GoSched => Some(Reason::CalledGosched),
            EventType::GoSleep => Some(Reason::CalledSleep),
            EventType::GoPreempt => Some(Reason::GotPreempted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reason::NewlyCreated => "newly created",
            Reason::CalledGosched => "called runtime.Gosched",
            Reason::CalledSleep => "called time.Sleep",
            Reason::GotPreempted => "got preempted",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
