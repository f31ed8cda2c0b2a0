//! Shared helpers for building synthetic traces in memory.

#![allow(dead_code)]

use goscope::model::{Goroutine, Trace};
use goscope::state::SchedulingState;
use goscope_common::{Event, EventTables, EventType, Frame};

/// Nanoseconds between consecutive events
pub const TICK: u64 = 10;

pub const WORKER_STACK: u32 = 1;
pub const ACCEPT_STACK: u32 = 2;
pub const ONCE_STACK: u32 = 3;
pub const SYSCALL_STACK: u32 = 4;

/// Builds an `EventTables` one event at a time.
pub struct TraceBuilder {
    tables: EventTables,
    ts: u64,
    next_pc: u64,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self { tables: EventTables { version: 1019, ..EventTables::default() }, ts: 0, next_pc: 0x1000 }
    }

    /// Builder with the stacks most tests need already registered.
    pub fn with_stacks() -> Self {
        let mut b = Self::new();
        b.stack(WORKER_STACK, &["main.worker"]);
        b.stack(
            ACCEPT_STACK,
            &[
                "runtime.gopark",
                "runtime.netpollblock",
                "internal/poll.runtime_pollWait",
                "internal/poll.(*FD).Accept",
                "net.(*netFD).accept",
                "net.(*TCPListener).accept",
                "net.(*TCPListener).Accept",
                "net/http.(*Server).Serve",
                "main.serve",
            ],
        );
        b.stack(
            ONCE_STACK,
            &[
                "runtime.gopark",
                "runtime.semacquire1",
                "sync.runtime_SemacquireMutex",
                "sync.(*Mutex).lockSlow",
                "sync.(*Mutex).Lock",
                "sync.(*Once).doSlow",
                "sync.(*Once).Do",
                "main.setup",
            ],
        );
        b.stack(SYSCALL_STACK, &["syscall.Syscall", "os.(*File).Read", "main.readConfig"]);
        b
    }

    /// Append an event `TICK` after the previous one.
    pub fn push(&mut self, ty: EventType, g: u64, p: i32) -> &mut Event {
        self.ts += TICK;
        self.tables.events.push(Event::new(ty, self.ts, g, p));
        let last = self.tables.events.len() - 1;
        &mut self.tables.events[last]
    }

    /// `creator` creates goroutine `g`, running `main.worker`
    pub fn create(&mut self, creator: u64, g: u64) -> &mut Event {
        let ev = self.push(EventType::GoCreate, creator, 0);
        ev.args[0] = g;
        ev.args[1] = u64::from(WORKER_STACK);
        ev
    }

    /// `by` makes goroutine `g` runnable
    pub fn unblock(&mut self, by: u64, g: u64) -> &mut Event {
        let ev = self.push(EventType::GoUnblock, by, 0);
        ev.args[0] = g;
        ev
    }

    pub fn stack(&mut self, id: u32, functions: &[&str]) {
        let pcs = functions
            .iter()
            .map(|function| {
                let pc = self.next_pc;
                self.next_pc += 1;
                self.tables.pcs.insert(pc, Frame { function: (*function).to_string(), file: String::new(), line: 0 });
                pc
            })
            .collect();
        self.tables.stacks.insert(id, pcs);
    }

    pub fn string(&mut self, id: u64, s: &str) {
        self.tables.strings.insert(id, s.to_string());
    }

    pub fn build(self) -> EventTables {
        self.tables
    }
}

/// A trace that exercises most event kinds over many rounds.
///
/// Goroutines `1..=goroutines` are created by goroutine 0 and then scheduled
/// round-robin over two processors, each round ending in a different way.
pub fn busy_trace(goroutines: u64, rounds: usize) -> EventTables {
    let mut b = TraceBuilder::with_stacks();
    b.string(1, "GC (dedicated)");
    b.string(2, "GC (idle)");

    for g in 1..=goroutines {
        b.create(0, g);
    }

    for round in 0..rounds {
        if round % 7 == 0 {
            b.push(EventType::GCStart, 0, 0);
            b.push(EventType::GCSTWStart, 0, 0);
            b.push(EventType::GCSTWDone, 0, 0);
        }
        for g in 1..=goroutines {
            let p = i32::from(g % 2 == 0);
            b.push(EventType::GoStart, g, p);
            match (round + g as usize) % 6 {
                0 => {
                    b.push(EventType::GoSched, g, p);
                }
                1 => {
                    b.push(EventType::GoBlockNet, g, p).stk = ACCEPT_STACK;
                    b.unblock(0, g);
                }
                2 => {
                    b.push(EventType::GoPreempt, g, p);
                }
                3 => {
                    b.push(EventType::GoSysCall, g, p).stk = SYSCALL_STACK;
                    b.push(EventType::GoSysBlock, g, p);
                    b.push(EventType::GoSysExit, g, p);
                }
                4 => {
                    b.push(EventType::GCMarkAssistStart, g, p);
                    b.push(EventType::GCMarkAssistDone, g, p);
                    b.push(EventType::GCSweepStart, g, p);
                    b.push(EventType::GCSweepDone, g, p);
                    b.push(EventType::GoSleep, g, p);
                }
                _ => {
                    b.push(EventType::GoBlockSync, g, p).stk = ONCE_STACK;
                    // Unblocked by a goroutine that has spans, recorded as its side event
                    b.unblock(if g == 1 { goroutines } else { 1 }, g);
                }
            }
        }
        if round % 7 == 3 {
            b.push(EventType::GCDone, 0, 0);
        }
    }

    // Half the goroutines finish
    for g in (1..=goroutines).filter(|g| g % 2 == 1) {
        let p = i32::from(g % 2 == 0);
        b.push(EventType::GoStart, g, p);
        b.push(EventType::GoEnd, g, p);
    }

    b.build()
}

pub fn states(g: &Goroutine) -> Vec<SchedulingState> {
    g.spans().iter().map(|s| s.state()).collect()
}

/// Every goroutine's spans touch, and nothing ends before it starts.
pub fn assert_goroutines_contiguous(trace: &Trace) {
    for g in trace.goroutines() {
        for pair in g.spans().windows(2) {
            assert_eq!(pair[0].end(), trace.start(&pair[1]), "{g}: gap or overlap");
        }
        for span in g.spans() {
            assert!(trace.start(span) <= span.end(), "{g}: span ends before it starts");
        }
    }
}
