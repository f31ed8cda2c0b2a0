//! # Span Reconstruction
//!
//! The single sequential pass over the event list. Each event is classified
//! (see [`classify`]) and the result applied to the raw timelines:
//!
//! - **Side event** → appended to the goroutine's side-event list
//! - **State change** → validated against the transition table, then a new
//!   span opened on the subject goroutine
//! - **Processor effect** → a `RunningG` span opened or closed on `ev.p`
//! - **Global op** → a GC or STW interval opened or closed
//!
//! The pass is strictly single-threaded: every rule depends on what the
//! previous events did. Span ends are left for [`crate::finalize`].

pub mod classify;

use goscope_common::{Event, EventTables, EventType};
use log::{debug, warn};
use std::collections::HashMap;

use crate::domain::{EventId, GlobalSpanKind, GoroutineId, ProcessorId, StackId, Timestamp, TraceError};
use crate::model::{Goroutine, Processor, Span};
use crate::progress::Progress;
use crate::state::{is_legal_transition, SchedulingState};

pub use classify::{classify, Classified, GlobalOp, ProcessorEffect, SchedContext, StateChange};

/// Events between two progress reports
const PROGRESS_INTERVAL: usize = 10_000;

/// Output of the sequential pass: spans opened, goroutine spans not yet ended.
#[derive(Debug, Default)]
pub struct RawTimelines {
    /// Goroutines in no particular order
    pub goroutines: Vec<Goroutine>,
    /// Processors in no particular order; every span is ended
    pub processors: Vec<Processor>,
    pub gc: Vec<Span>,
    pub stw: Vec<Span>,
}

/// A processor plus whether its last span is still running.
#[derive(Debug)]
struct ProcessorTimeline {
    processor: Processor,
    running: bool,
}

/// Builds raw timelines from events, one at a time.
pub struct Reconstructor<'t> {
    tables: &'t EventTables,
    ctx: SchedContext<'t>,
    goroutines: HashMap<GoroutineId, Goroutine>,
    processors: HashMap<ProcessorId, ProcessorTimeline>,
    gc: Vec<Span>,
    stw: Vec<Span>,
}

impl<'t> Reconstructor<'t> {
    /// Create a reconstructor, pre-sizing span lists from a counting pass.
    pub fn new(tables: &'t EventTables) -> Self {
        let mut goroutines: HashMap<GoroutineId, Goroutine> = HashMap::new();
        let mut processors: HashMap<ProcessorId, ProcessorTimeline> = HashMap::new();

        let (per_goroutine, per_processor) = count_spans(&tables.events);
        for (id, n) in per_goroutine {
            let mut g = Goroutine::new(id);
            g.spans.reserve_exact(n);
            goroutines.insert(id, g);
        }
        for (id, n) in per_processor {
            let mut p = Processor::new(id);
            p.spans.reserve_exact(n);
            processors.insert(id, ProcessorTimeline { processor: p, running: false });
        }

        let unknown_stacks = tables
            .events
            .iter()
            .filter(|ev| StackId(ev.stk).is_valid() && !tables.stacks.contains_key(&ev.stk))
            .count();
        if unknown_stacks > 0 {
            warn!("{unknown_stacks} events refer to stacks missing from the stack table");
        }

        Self {
            tables,
            ctx: SchedContext::new(),
            goroutines,
            processors,
            gc: Vec::new(),
            stw: Vec::new(),
        }
    }

    /// Run the whole pass, reporting progress as it goes.
    ///
    /// # Errors
    /// Stops at the first event that cannot be applied; see [`TraceError`].
    pub fn run(mut self, progress: &mut Progress) -> Result<RawTimelines, TraceError> {
        let total = self.tables.events.len();
        let stage = progress.reconstruction_stage();
        for index in 0..total {
            if index % PROGRESS_INTERVAL == 0 {
                progress.report(stage, index, total);
            }
            self.process_event(EventId::try_from(index)?)?;
        }
        progress.report(stage, total, total);
        Ok(self.finish())
    }

    /// Apply one event.
    ///
    /// # Errors
    /// See [`TraceError`]; any error leaves the reconstructor unusable.
    pub fn process_event(&mut self, id: EventId) -> Result<(), TraceError> {
        let tables = self.tables;
        let ev = &tables.events[id.index()];

        let classified = classify(ev, id, tables, &mut self.ctx)?;

        if let Some(g) = classified.side {
            self.add_side_event(g, id, ev.ty)?;
        }
        if let Some(change) = classified.subject {
            self.change_state(change, id, ev)?;
        }
        match classified.processor {
            ProcessorEffect::None => {}
            ProcessorEffect::RunG => self.run_goroutine(ProcessorId(ev.p), id, Timestamp(ev.ts)),
            ProcessorEffect::StopG => self.stop_goroutine(ProcessorId(ev.p), id, Timestamp(ev.ts))?,
        }
        match classified.global {
            None => {}
            Some(GlobalOp::Open(kind)) => {
                self.global_spans(kind).push(Span::new(SchedulingState::Active, id, StackId::NONE));
            }
            Some(GlobalOp::Close(kind)) => {
                // The context only allows a close while a span of this kind is open
                if let Some(last) = self.global_spans(kind).last_mut() {
                    last.end = Timestamp(ev.ts);
                }
            }
        }
        Ok(())
    }

    /// Hand over the timelines.
    ///
    /// Processor spans and GC/STW intervals still open at the end of the
    /// trace are ended at the last event. Goroutine spans are left to the
    /// finalizer.
    pub fn finish(self) -> RawTimelines {
        let trace_end = Timestamp(self.tables.last_timestamp());
        let ctx = self.ctx;

        let goroutines: Vec<Goroutine> = self
            .goroutines
            .into_values()
            .map(|mut g| {
                g.function = ctx.entry_function(g.id).map(str::to_owned);
                g
            })
            .collect();

        let processors: Vec<Processor> = self
            .processors
            .into_values()
            .map(|mut timeline| {
                if timeline.running {
                    if let Some(last) = timeline.processor.spans.last_mut() {
                        last.end = trace_end;
                    }
                }
                timeline.processor
            })
            .collect();

        let mut gc = self.gc;
        let mut stw = self.stw;
        for (kind, spans) in [(GlobalSpanKind::GC, &mut gc), (GlobalSpanKind::STW, &mut stw)] {
            if ctx.in_progress(kind) {
                if let Some(last) = spans.last_mut() {
                    last.end = trace_end;
                }
            }
        }

        debug!(
            "Reconstructed {} goroutines, {} processors, {} GC and {} STW spans",
            goroutines.len(),
            processors.len(),
            gc.len(),
            stw.len()
        );

        RawTimelines { goroutines, processors, gc, stw }
    }

    fn add_side_event(&mut self, g: GoroutineId, id: EventId, ty: EventType) -> Result<(), TraceError> {
        if g.is_runtime() {
            return Ok(());
        }
        match self.goroutines.get_mut(&g) {
            Some(goroutine) if !goroutine.spans.is_empty() => {
                goroutine.events.push(id);
                Ok(())
            }
            _ => Err(TraceError::NoOpenSpan { goroutine: g, event: id, ty }),
        }
    }

    fn change_state(&mut self, change: StateChange, id: EventId, ev: &Event) -> Result<(), TraceError> {
        let goroutine = self.goroutines.entry(change.goroutine).or_insert_with(|| Goroutine::new(change.goroutine));

        if let Some(prev) = goroutine.spans.last() {
            // Goroutines blocked when tracing started show up as GoWaiting
            // right after their first span
            let trace_start = goroutine.spans.len() == 1
                && ev.ty == EventType::GoWaiting
                && prev.state == SchedulingState::Inactive;
            if !trace_start && !is_legal_transition(prev.state, change.state) {
                return Err(TraceError::IllegalTransition {
                    goroutine: change.goroutine,
                    from: prev.state,
                    to: change.state,
                    ts: Timestamp(ev.ts),
                    event: id,
                });
            }
        }

        goroutine.spans.push(Span::new(change.state, id, change.stack));
        Ok(())
    }

    fn run_goroutine(&mut self, p: ProcessorId, id: EventId, ts: Timestamp) {
        let timeline = self
            .processors
            .entry(p)
            .or_insert_with(|| ProcessorTimeline { processor: Processor::new(p), running: false });
        if timeline.running {
            // Never saw the previous goroutine stop; it ran until now
            if let Some(last) = timeline.processor.spans.last_mut() {
                last.end = ts;
            }
        }
        timeline.processor.spans.push(Span::new(SchedulingState::RunningG, id, StackId::NONE));
        timeline.running = true;
    }

    fn stop_goroutine(&mut self, p: ProcessorId, id: EventId, ts: Timestamp) -> Result<(), TraceError> {
        match self.processors.get_mut(&p) {
            Some(timeline) if timeline.running => {
                if let Some(last) = timeline.processor.spans.last_mut() {
                    last.end = ts;
                }
                timeline.running = false;
                Ok(())
            }
            _ => Err(TraceError::ProcessorNotRunning { processor: p, event: id, ts }),
        }
    }

    fn global_spans(&mut self, kind: GlobalSpanKind) -> &mut Vec<Span> {
        match kind {
            GlobalSpanKind::GC => &mut self.gc,
            GlobalSpanKind::STW => &mut self.stw,
        }
    }
}

/// Expected number of spans per goroutine and per processor.
fn count_spans(events: &[Event]) -> (HashMap<GoroutineId, usize>, HashMap<ProcessorId, usize>) {
    let mut per_goroutine: HashMap<GoroutineId, usize> = HashMap::new();
    let mut per_processor: HashMap<ProcessorId, usize> = HashMap::new();

    for ev in events {
        let subject = match ev.ty {
            EventType::GoCreate | EventType::GoUnblock => ev.args[0],
            EventType::GoStart | EventType::GoStartLabel => {
                *per_processor.entry(ProcessorId(ev.p)).or_default() += 1;
                ev.g
            }
            EventType::GCStart
            | EventType::GCSTWStart
            | EventType::GCDone
            | EventType::GCSTWDone
            | EventType::HeapAlloc
            | EventType::HeapGoal
            | EventType::Gomaxprocs
            | EventType::UserTaskCreate
            | EventType::UserTaskEnd
            | EventType::UserRegion
            | EventType::UserLog
            | EventType::CPUSample
            | EventType::ProcStart
            | EventType::ProcStop
            | EventType::GoSysCall => continue,
            _ => ev.g,
        };
        *per_goroutine.entry(GoroutineId(subject)).or_default() += 1;
    }

    (per_goroutine, per_processor)
}
