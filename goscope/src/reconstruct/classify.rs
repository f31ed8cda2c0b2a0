//! Per-event classification.
//!
//! [`classify`] answers, for one event, every question the reconstructor
//! needs answered without touching any timeline: whose state changes and to
//! what, which goroutine gets a side event, what happens on the processor and
//! whether a GC or STW interval opens or closes. The little state the answer
//! depends on lives in [`SchedContext`].

use goscope_common::{Event, EventTables, EventType};
use log::warn;
use std::collections::{HashMap, HashSet};

use crate::domain::{EventId, GlobalSpanKind, GoroutineId, StackId, Timestamp, TraceError};
use crate::state::SchedulingState;

/// Runtime goroutines that park in `GoBlock` while waiting for work.
/// They are idle, not blocked on anything.
const BACKGROUND_FUNCTIONS: &[&str] = &[
    "runtime.gcBgMarkWorker",
    "runtime.forcegchelper",
    "runtime.bgsweep",
    "runtime.bgscavenge",
    "runtime.runfinq",
];

const LABEL_GC_DEDICATED: &str = "GC (dedicated)";
const LABEL_GC_IDLE: &str = "GC (idle)";

/// What happens on the event's processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEffect {
    None,
    /// A goroutine starts running: open a `RunningG` span
    RunG,
    /// The running goroutine stops: close the open span
    StopG,
}

/// Opening or closing a trace-global interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalOp {
    Open(GlobalSpanKind),
    Close(GlobalSpanKind),
}

/// A goroutine entering a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub goroutine: GoroutineId,
    pub state: SchedulingState,
    pub stack: StackId,
}

/// Everything one event implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    /// Goroutine that records the event as a side event, applied first
    pub side: Option<GoroutineId>,
    pub subject: Option<StateChange>,
    pub processor: ProcessorEffect,
    pub global: Option<GlobalOp>,
}

impl Classified {
    const NOTHING: Classified =
        Classified { side: None, subject: None, processor: ProcessorEffect::None, global: None };

    fn side(goroutine: GoroutineId) -> Self {
        Self { side: Some(goroutine), ..Self::NOTHING }
    }

    fn change(goroutine: GoroutineId, state: SchedulingState, stack: StackId) -> Self {
        Self { subject: Some(StateChange { goroutine, state, stack }), ..Self::NOTHING }
    }

    fn on_processor(self, processor: ProcessorEffect) -> Self {
        Self { processor, ..self }
    }

    fn global(op: GlobalOp) -> Self {
        Self { global: Some(op), ..Self::NOTHING }
    }
}

/// Scheduler facts carried from one event to the next.
#[derive(Debug, Default)]
pub struct SchedContext<'t> {
    /// Goroutines currently assisting the GC's mark phase
    mark_assist: HashSet<GoroutineId>,
    /// Stack of the syscall each goroutine entered most recently
    last_syscall: HashMap<GoroutineId, StackId>,
    /// Functions goroutines were created with
    entry_functions: HashMap<GoroutineId, &'t str>,
    gc_in_progress: bool,
    stw_in_progress: bool,
}

impl<'t> SchedContext<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_mark_assist(&self, goroutine: GoroutineId) -> bool {
        self.mark_assist.contains(&goroutine)
    }

    pub fn entry_function(&self, goroutine: GoroutineId) -> Option<&'t str> {
        self.entry_functions.get(&goroutine).copied()
    }

    /// Whether a GC or STW interval is currently open
    pub fn in_progress(&self, kind: GlobalSpanKind) -> bool {
        match kind {
            GlobalSpanKind::GC => self.gc_in_progress,
            GlobalSpanKind::STW => self.stw_in_progress,
        }
    }

    fn is_background(&self, goroutine: GoroutineId) -> bool {
        self.entry_function(goroutine).is_some_and(|f| BACKGROUND_FUNCTIONS.contains(&f))
    }

    fn toggle(&mut self, kind: GlobalSpanKind, open: bool, id: EventId, ts: Timestamp) -> Result<GlobalOp, TraceError> {
        let flag = match kind {
            GlobalSpanKind::GC => &mut self.gc_in_progress,
            GlobalSpanKind::STW => &mut self.stw_in_progress,
        };
        match (open, *flag) {
            (true, true) => Err(TraceError::AlreadyInProgress { kind, event: id, ts }),
            (false, false) => Err(TraceError::UnmatchedDone { kind, event: id, ts }),
            (open, _) => {
                *flag = open;
                Ok(if open { GlobalOp::Open(kind) } else { GlobalOp::Close(kind) })
            }
        }
    }
}

/// Coarse state of the `GoBlock*` family.
fn blocked_state(ty: EventType) -> Option<SchedulingState> {
    match ty {
        EventType::GoBlock => Some(SchedulingState::Blocked),
        EventType::GoBlockSend => Some(SchedulingState::BlockedSend),
        EventType::GoBlockRecv => Some(SchedulingState::BlockedRecv),
        EventType::GoBlockSelect => Some(SchedulingState::BlockedSelect),
        EventType::GoBlockSync => Some(SchedulingState::BlockedSync),
        EventType::GoBlockCond => Some(SchedulingState::BlockedCond),
        EventType::GoBlockNet => Some(SchedulingState::BlockedNet),
        EventType::GoBlockGC => Some(SchedulingState::BlockedGC),
        _ => None,
    }
}

/// Classify one event, updating the scheduler context.
///
/// # Errors
/// Fails on event types with no rule and on GC/STW start and done events
/// out of order.
pub fn classify<'t>(
    ev: &Event,
    id: EventId,
    tables: &'t EventTables,
    ctx: &mut SchedContext<'t>,
) -> Result<Classified, TraceError> {
    use EventType as E;
    use SchedulingState as S;

    let g = GoroutineId(ev.g);
    let stack = StackId(ev.stk);
    let ts = Timestamp(ev.ts);

    let classified = match ev.ty {
        E::GoCreate => {
            // ev.g creates args[0]
            let created = GoroutineId(ev.args[0]);
            if let Some(function) = u32::try_from(ev.args[1]).ok().and_then(|stk| tables.top_function(stk)) {
                ctx.entry_functions.insert(created, function);
            }
            let side = (!g.is_runtime()).then_some(g);
            Classified { side, ..Classified::change(created, S::Created, stack) }
        }
        E::GoStart => {
            let state = if ctx.in_mark_assist(g) { S::GCMarkAssist } else { S::Active };
            Classified::change(g, state, stack).on_processor(ProcessorEffect::RunG)
        }
        E::GoStartLabel => {
            let label = tables.strings.get(&ev.args[2]).map(String::as_str);
            if label.is_none() {
                warn!("Event {id} labels goroutine {g} with unknown string {}", ev.args[2]);
            }
            let state = match label {
                Some(LABEL_GC_DEDICATED) => S::GCDedicated,
                Some(LABEL_GC_IDLE) => S::GCIdle,
                _ => S::Active,
            };
            Classified::change(g, state, stack).on_processor(ProcessorEffect::RunG)
        }
        E::GoStop => Classified::change(g, S::Stuck, stack).on_processor(ProcessorEffect::StopG),
        E::GoEnd => Classified::change(g, S::Done, stack).on_processor(ProcessorEffect::StopG),
        E::GoSched | E::GoSleep => {
            Classified::change(g, S::Inactive, stack).on_processor(ProcessorEffect::StopG)
        }
        E::GoPreempt => Classified::change(g, S::Ready, stack).on_processor(ProcessorEffect::StopG),
        E::GoBlock
        | E::GoBlockSend
        | E::GoBlockRecv
        | E::GoBlockSelect
        | E::GoBlockSync
        | E::GoBlockCond
        | E::GoBlockNet
        | E::GoBlockGC => {
            let mut state = blocked_state(ev.ty).unwrap_or(S::Blocked);
            if ev.ty == E::GoBlock && ctx.is_background(g) {
                state = S::Inactive;
            }
            Classified::change(g, state, stack).on_processor(ProcessorEffect::StopG)
        }
        E::GoWaiting => {
            // Blocked when tracing started
            let state = if ctx.is_background(g) { S::Inactive } else { S::Blocked };
            Classified::change(g, state, stack)
        }
        E::GoUnblock => {
            let side = (!g.is_runtime()).then_some(g);
            Classified { side, ..Classified::change(GoroutineId(ev.args[0]), S::Ready, stack) }
        }
        E::GoSysCall if g.is_runtime() => Classified::NOTHING,
        E::GoSysCall => {
            // Only becomes a span if the syscall blocks
            ctx.last_syscall.insert(g, stack);
            Classified::side(g)
        }
        E::GoSysBlock => {
            // The stack at syscall entry says more than the retake point
            let entry = ctx.last_syscall.remove(&g).unwrap_or(stack);
            Classified::change(g, S::BlockedSyscall, entry).on_processor(ProcessorEffect::StopG)
        }
        E::GoInSyscall => Classified::change(g, S::BlockedSyscall, stack),
        E::GoSysExit => Classified::change(g, S::Ready, stack),
        E::GCMarkAssistStart => {
            ctx.mark_assist.insert(g);
            Classified::change(g, S::GCMarkAssist, stack)
        }
        E::GCMarkAssistDone => {
            ctx.mark_assist.remove(&g);
            Classified::change(g, S::Active, stack)
        }
        E::GCSweepStart => Classified::change(g, S::GCSweep, stack),
        E::GCSweepDone => Classified::change(g, S::Active, stack),
        E::GCStart => Classified::global(ctx.toggle(GlobalSpanKind::GC, true, id, ts)?),
        E::GCDone => Classified::global(ctx.toggle(GlobalSpanKind::GC, false, id, ts)?),
        E::GCSTWStart => Classified::global(ctx.toggle(GlobalSpanKind::STW, true, id, ts)?),
        E::GCSTWDone => Classified::global(ctx.toggle(GlobalSpanKind::STW, false, id, ts)?),
        E::UserLog if g.is_runtime() => Classified::NOTHING,
        E::UserLog => Classified::side(g),
        E::ProcStart
        | E::ProcStop
        | E::HeapAlloc
        | E::HeapGoal
        | E::Gomaxprocs
        | E::UserTaskCreate
        | E::UserTaskEnd
        | E::UserRegion
        | E::CPUSample => Classified::NOTHING,
        ty => return Err(TraceError::UnsupportedEvent { event: id, ty }),
    };

    Ok(classified)
}
