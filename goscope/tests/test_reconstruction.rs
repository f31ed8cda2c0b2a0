mod common;

use std::num::NonZeroUsize;

use common::{assert_goroutines_contiguous, busy_trace, states, TraceBuilder, ACCEPT_STACK, SYSCALL_STACK, TICK};
use goscope::domain::{EventId, GlobalSpanKind, GoroutineId, ProcessorId, StackId, Timestamp, TraceError};
use goscope::model::SpanTags;
use goscope::state::{is_legal_transition, Reason, SchedulingState};
use goscope::{build_trace, LoadOptions};
use goscope_common::EventType;

fn options(workers: usize) -> LoadOptions {
    LoadOptions { workers: NonZeroUsize::new(workers), ..LoadOptions::default() }
}

/// create(0 -> 5), start, block on the network, unblock, start again, end
fn network_round_trip() -> TraceBuilder {
    let mut b = TraceBuilder::with_stacks();
    b.create(0, 5);
    b.push(EventType::GoStart, 5, 0);
    b.push(EventType::GoBlockNet, 5, 0).stk = ACCEPT_STACK;
    b.unblock(0, 5);
    b.push(EventType::GoStart, 5, 0);
    b.push(EventType::GoEnd, 5, 0);
    b
}

#[test]
fn test_network_round_trip_goroutine_spans() {
    let trace = build_trace(network_round_trip().build(), &options(2)).unwrap();

    assert_eq!(trace.goroutines().len(), 1);
    let g = &trace.goroutines()[0];
    assert_eq!(g.id(), GoroutineId(5));
    assert_eq!(g.function(), Some("main.worker"));
    assert_eq!(g.to_string(), "goroutine 5: main.worker");

    // The Done span is dropped; Ready sits between unblock and start
    assert_eq!(
        states(g),
        vec![
            SchedulingState::Created,
            SchedulingState::Active,
            SchedulingState::BlockedNet,
            SchedulingState::Ready,
            SchedulingState::Active,
        ]
    );
    assert_goroutines_contiguous(&trace);

    // The last span ends where the goroutine ended
    let last = g.spans().last().unwrap();
    assert_eq!(last.end(), Timestamp(6 * TICK));
    assert_eq!(trace.reason(&g.spans()[0]), Some(Reason::NewlyCreated));

    let blocked = &g.spans()[2];
    assert_eq!(blocked.tags(), SpanTags::ACCEPT | SpanTags::NETWORK | SpanTags::TCP | SpanTags::HTTP);
    assert_eq!(trace.at_function(blocked), Some("internal/poll.runtime_pollWait"));
}

#[test]
fn test_network_round_trip_processor_spans() {
    let trace = build_trace(network_round_trip().build(), &options(1)).unwrap();

    assert_eq!(trace.processors().len(), 1);
    let p = trace.processor(ProcessorId(0)).unwrap();
    assert_eq!(p.spans().len(), 2);

    let g = trace.goroutine(GoroutineId(5)).unwrap();
    let active: Vec<_> = g.spans().iter().filter(|s| s.state() == SchedulingState::Active).collect();
    for (run, active) in p.spans().iter().zip(active) {
        assert_eq!(run.state(), SchedulingState::RunningG);
        assert_eq!(trace.running_goroutine(run), GoroutineId(5));
        assert_eq!(trace.start(run), trace.start(active));
        assert_eq!(run.end(), active.end());
    }
}

#[test]
fn test_blocking_syscall_keeps_entry_stack() {
    let mut b = TraceBuilder::with_stacks();
    b.create(0, 1);
    b.push(EventType::GoStart, 1, 0);
    b.push(EventType::GoSysCall, 1, 0).stk = SYSCALL_STACK;
    b.push(EventType::GoSysBlock, 1, 0);
    b.push(EventType::GoSysExit, 1, 0);

    let trace = build_trace(b.build(), &options(1)).unwrap();
    let g = trace.goroutine(GoroutineId(1)).unwrap();
    assert_eq!(
        states(g),
        vec![
            SchedulingState::Created,
            SchedulingState::Active,
            SchedulingState::BlockedSyscall,
            SchedulingState::Ready,
        ]
    );

    let syscall = &g.spans()[2];
    assert_eq!(syscall.stack(), StackId(SYSCALL_STACK));
    assert_eq!(trace.event(syscall.event()).ty, EventType::GoSysBlock);

    // The syscall entry is a side event of the Active span
    assert_eq!(g.events(), &[EventId(2)]);
    assert_eq!(trace.span_events(&g.spans()[1], g.events()), &[EventId(2)]);
}

#[test]
fn test_second_gc_start_is_an_error() {
    let mut b = TraceBuilder::new();
    b.push(EventType::GCStart, 0, 0);
    b.push(EventType::GCStart, 0, 0);
    b.push(EventType::GCDone, 0, 0);

    let err = build_trace(b.build(), &options(1)).unwrap_err();
    assert!(
        matches!(err, TraceError::AlreadyInProgress { kind: GlobalSpanKind::GC, event: EventId(1), .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_gc_done_without_start_is_an_error() {
    let mut b = TraceBuilder::new();
    b.push(EventType::GCSTWDone, 0, 0);
    let err = build_trace(b.build(), &options(1)).unwrap_err();
    assert!(matches!(err, TraceError::UnmatchedDone { kind: GlobalSpanKind::STW, .. }));
}

#[test]
fn test_blocked_to_blocked_is_an_error() {
    let mut b = TraceBuilder::with_stacks();
    b.create(0, 3);
    b.push(EventType::GoStart, 3, 0);
    b.push(EventType::GoBlock, 3, 0);
    b.push(EventType::GoBlock, 3, 0);

    match build_trace(b.build(), &options(1)).unwrap_err() {
        TraceError::IllegalTransition { goroutine, from, to, ts, event } => {
            assert_eq!(goroutine, GoroutineId(3));
            assert_eq!(from, SchedulingState::Blocked);
            assert_eq!(to, SchedulingState::Blocked);
            assert_eq!(ts, Timestamp(4 * TICK));
            assert_eq!(event, EventId(3));
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn test_unsupported_event_is_an_error() {
    let mut b = TraceBuilder::new();
    b.push(EventType::TimerGoroutine, 0, 0);
    let err = build_trace(b.build(), &options(1)).unwrap_err();
    assert!(matches!(err, TraceError::UnsupportedEvent { ty: EventType::TimerGoroutine, .. }));
}

#[test]
fn test_gc_and_stw_intervals() {
    let mut b = TraceBuilder::new();
    b.push(EventType::GCStart, 0, 0);
    b.push(EventType::GCSTWStart, 0, 0);
    b.push(EventType::GCSTWDone, 0, 0);
    b.push(EventType::GCDone, 0, 0);
    b.push(EventType::GCSTWStart, 0, 0);
    b.push(EventType::GCSTWDone, 0, 0);
    b.push(EventType::GCStart, 0, 0);
    b.push(EventType::HeapAlloc, 0, 0);

    let trace = build_trace(b.build(), &options(1)).unwrap();
    assert_eq!(trace.gc().len(), 2);
    assert_eq!(trace.stw().len(), 2);
    assert_eq!(trace.gc()[0].end(), Timestamp(4 * TICK));
    // Still running when the trace ends
    assert_eq!(trace.gc()[1].end(), Timestamp(8 * TICK));
    assert_eq!(trace.duration(&trace.stw()[1]), goscope::domain::Duration(TICK));
    assert!(trace.goroutines().is_empty());
}

#[test]
fn test_gc_worker_labels_and_background_goroutines() {
    let mut b = TraceBuilder::new();
    b.stack(9, &["runtime.gcBgMarkWorker"]);
    b.string(1, "GC (dedicated)");
    let ev = b.push(EventType::GoCreate, 0, 0);
    ev.args[0] = 8;
    ev.args[1] = 9;
    b.push(EventType::GoStart, 8, 1);
    // Parking for work is idling, not blocking
    b.push(EventType::GoBlock, 8, 1);
    b.unblock(0, 8);
    b.push(EventType::GoStartLabel, 8, 1).args[2] = 1;
    b.push(EventType::GoBlock, 8, 1);

    let trace = build_trace(b.build(), &options(1)).unwrap();
    let g = trace.goroutine(GoroutineId(8)).unwrap();
    assert_eq!(g.function(), Some("runtime.gcBgMarkWorker"));
    assert_eq!(
        states(g),
        vec![
            SchedulingState::Created,
            SchedulingState::Active,
            SchedulingState::Inactive,
            SchedulingState::Ready,
            SchedulingState::GCDedicated,
            SchedulingState::Inactive,
        ]
    );
}

#[test]
fn test_side_event_for_goroutine_without_spans_is_an_error() {
    let mut b = TraceBuilder::new();
    b.push(EventType::GoSysCall, 1, 0);
    let err = build_trace(b.build(), &options(1)).unwrap_err();
    assert!(matches!(err, TraceError::NoOpenSpan { goroutine: GoroutineId(1), ty: EventType::GoSysCall, .. }));
}

#[test]
fn test_runtime_side_events_are_ignored() {
    let mut b = TraceBuilder::with_stacks();
    b.push(EventType::GoSysCall, 0, 0).stk = SYSCALL_STACK;
    b.create(0, 5);
    b.push(EventType::GoStart, 5, 0);
    b.push(EventType::UserLog, 0, 0);
    b.push(EventType::GoEnd, 5, 0);

    let trace = build_trace(b.build(), &options(1)).unwrap();
    assert_eq!(trace.goroutines().len(), 1);
    let g = trace.goroutine(GoroutineId(5)).unwrap();
    assert_eq!(states(g), vec![SchedulingState::Created, SchedulingState::Active]);
    assert!(g.events().is_empty());
}

#[test]
fn test_start_with_unknown_label_is_active() {
    let mut b = TraceBuilder::with_stacks();
    b.create(0, 5);
    b.push(EventType::GoStartLabel, 5, 0).args[2] = 77;
    b.push(EventType::GoSched, 5, 0);

    let trace = build_trace(b.build(), &options(1)).unwrap();
    let g = trace.goroutine(GoroutineId(5)).unwrap();
    assert_eq!(
        states(g),
        vec![SchedulingState::Created, SchedulingState::Active, SchedulingState::Inactive]
    );
    assert_eq!(trace.processor(ProcessorId(0)).unwrap().spans().len(), 1);
}

#[test]
fn test_busy_trace_invariants() {
    let trace = build_trace(busy_trace(6, 40), &options(3)).unwrap();
    assert_eq!(trace.goroutines().len(), 6);
    assert_eq!(trace.processors().len(), 2);
    assert!(!trace.gc().is_empty());
    assert_goroutines_contiguous(&trace);

    for g in trace.goroutines() {
        for span in g.spans() {
            assert!(span.state().is_goroutine_state(), "{g}: {:?}", span.state());
            assert_ne!(span.state(), SchedulingState::Done, "{g}: Done span retained");
        }
        for pair in g.spans().windows(2) {
            assert!(
                is_legal_transition(pair[0].state(), pair[1].state()),
                "{g}: {:?} -> {:?}",
                pair[0].state(),
                pair[1].state()
            );
        }
    }

    for p in trace.processors() {
        for pair in p.spans().windows(2) {
            assert!(pair[0].end() <= trace.start(&pair[1]), "P{}: overlapping runs", p.id().0);
        }
        for span in p.spans() {
            assert_eq!(span.state(), SchedulingState::RunningG);
        }
    }

    // The sync.Once stack refines BlockedSync
    let g1 = trace.goroutine(GoroutineId(1)).unwrap();
    assert!(g1.spans().iter().any(|s| s.state() == SchedulingState::BlockedSyncOnce));
    assert!(g1.spans().iter().all(|s| s.state() != SchedulingState::BlockedSync));

    // Goroutines sorted by id
    let ids: Vec<_> = trace.goroutines().iter().map(|g| g.id().0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_worker_count_does_not_change_result() {
    let tables = busy_trace(9, 60);
    let one = build_trace(tables.clone(), &options(1)).unwrap();
    let many = build_trace(tables, &options(4)).unwrap();

    assert_eq!(one.goroutines(), many.goroutines());
    assert_eq!(one.processors(), many.processors());
    assert_eq!(one.gc(), many.gc());
    assert_eq!(one.stw(), many.stw());
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let tables = busy_trace(4, 2_000);
    assert!(tables.events.len() > 20_000);

    let options = LoadOptions { progress: Some(tx), parser_stages: 1, ..LoadOptions::default() };
    build_trace(tables, &options).unwrap();
    drop(options);

    let reports: Vec<f32> = rx.iter().collect();
    assert!(reports.len() >= 3, "only {} reports", reports.len());
    assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{reports:?}");
    // Reconstruction is the second of two stages
    assert!(reports[0] >= 0.5);
    assert!((reports.last().unwrap() - 1.0).abs() < f32::EPSILON);
}
