//! Legal state transitions.
//!
//! A boolean matrix indexed by `(from, to)` ordinals. The processor state
//! `RunningG` has no row or column entries: processor spans are never
//! validated against this table, and a goroutine can never enter or leave
//! `RunningG`.

use super::SchedulingState::{
    self, Active, Blocked, BlockedCond, BlockedGC, BlockedNet, BlockedRecv, BlockedSelect,
    BlockedSend, BlockedSync, BlockedSyncOnce, BlockedSyncTriggeringGC, BlockedSyscall,
    BlockedWaitingForTraceData, Created, Done, GCDedicated, GCIdle, GCMarkAssist, GCSweep,
    Inactive, Ready, Stuck,
};

const N: usize = SchedulingState::COUNT;

type Table = [[bool; N]; N];

/// Adjacency lists the matrix is built from.
const EDGES: &[(SchedulingState, &[SchedulingState])] = &[
    (
        Inactive,
        &[
            Active,
            Ready,
            BlockedSyscall,
            // Starting back into a preempted mark assist
            GCMarkAssist,
        ],
    ),
    (
        Active,
        &[
            // Preemption
            Ready,
            Inactive,
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
            Done,
            GCMarkAssist,
            GCSweep,
        ],
    ),
    (GCIdle, &[Ready, Inactive, BlockedSync, BlockedSyncOnce, BlockedSyncTriggeringGC]),
    (GCDedicated, &[Ready, Inactive, BlockedSync, BlockedSyncOnce, BlockedSyncTriggeringGC]),
    (
        Created,
        &[
            Active,
            // Goroutines that already existed when tracing started
            Inactive,
            Blocked,
            BlockedWaitingForTraceData,
            BlockedSyscall,
        ],
    ),
    (Ready, &[Active, GCMarkAssist, GCIdle, GCDedicated]),
    (Blocked, &[Ready]),
    (BlockedWaitingForTraceData, &[Ready]),
    (BlockedSend, &[Ready]),
    (BlockedRecv, &[Ready]),
    (BlockedSelect, &[Ready]),
    (BlockedSync, &[Ready]),
    (BlockedSyncOnce, &[Ready]),
    (BlockedSyncTriggeringGC, &[Ready]),
    (BlockedCond, &[Ready]),
    (BlockedNet, &[Ready]),
    (BlockedGC, &[Ready]),
    (BlockedSyscall, &[Ready]),
    (
        GCMarkAssist,
        &[
            // Preemption
            Ready,
            // Back to the goroutine's previous state
            Active,
            Inactive,
            Blocked,
            BlockedWaitingForTraceData,
            BlockedSync,
            BlockedSyncOnce,
            BlockedSyncTriggeringGC,
            BlockedGC,
        ],
    ),
    (GCSweep, &[Active]),
];

const fn build(edges: &[(SchedulingState, &[SchedulingState])]) -> Table {
    let mut table = [[false; N]; N];
    let mut i = 0;
    while i < edges.len() {
        let (from, tos) = edges[i];
        let mut j = 0;
        while j < tos.len() {
            table[from.ordinal()][tos[j].ordinal()] = true;
            j += 1;
        }
        i += 1;
    }
    table
}

static LEGAL: Table = build(EDGES);

/// Returns true if a goroutine may go directly from `from` to `to`.
pub fn is_legal_transition(from: SchedulingState, to: SchedulingState) -> bool {
    LEGAL[from.ordinal()][to.ordinal()]
}
