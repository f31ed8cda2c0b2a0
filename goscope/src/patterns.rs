//! Stack-pattern classification for refining scheduling states.
//!
//! The event that blocks a goroutine only says *how* it blocked (on a
//! mutex, on the network poller, ...). The stack trace at that point usually
//! says *why*: a mutex wait inside `sync.(*Once).doSlow` is somebody waiting
//! for a `sync.Once` to finish, a poller wait under `crypto/tls` is a TLS
//! read. This module turns that knowledge into data.
//!
//! # Classification Strategy
//!
//! 1. **State patterns** - narrow a coarse state to a more specific one
//!    - `BlockedSync` + `sync.(*Once).doSlow` → `BlockedSyncOnce`
//!    - `BlockedSync` + `runtime.gcStart` → `BlockedSyncTriggeringGC`
//!    - `Blocked` + `runtime.ReadTrace` → `BlockedWaitingForTraceData`
//!
//! 2. **Tag markers** - annotate `BlockedNet` spans with what the I/O was
//!    (read/accept/dial, TCP, TLS, HTTP)
//!
//! Classification never widens a state and never fails: an unrecognized
//! stack leaves the state untouched. New patterns only need a table entry.

use crate::model::SpanTags;
use crate::state::SchedulingState;

/// Namespace of the runtime's own functions
pub const RUNTIME_PREFIX: &str = "runtime.";

/// How far down the stack tag markers are searched.
const MAX_TAG_DEPTH: usize = 32;

/// How a pattern recognizes a stack.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// These frames, consecutively, directly below the leading runtime frames
    Sequence(&'static [&'static str]),
    /// This function anywhere in the first `depth` frames
    Within { function: &'static str, depth: usize },
}

impl Matcher {
    fn matches(self, frames: &[&str]) -> bool {
        match self {
            Matcher::Sequence(sequence) => {
                let rest = &frames[runtime_prefix_len(frames)..];
                rest.len() >= sequence.len() && rest.iter().zip(sequence).all(|(f, s)| f == s)
            }
            Matcher::Within { function, depth } => {
                frames.iter().take(depth).any(|&f| f == function)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pattern {
    state: SchedulingState,
    matcher: Matcher,
    refined: SchedulingState,
}

// =============================================================================
// CLASSIFICATION TABLES
// =============================================================================

/// State refinements, tried in order; the first match wins
const STATE_PATTERNS: &[Pattern] = &[
    Pattern {
        state: SchedulingState::BlockedSync,
        matcher: Matcher::Sequence(&[
            "sync.runtime_SemacquireMutex",
            "sync.(*Mutex).lockSlow",
            "sync.(*Mutex).Lock",
            "sync.(*Once).doSlow",
        ]),
        refined: SchedulingState::BlockedSyncOnce,
    },
    Pattern {
        state: SchedulingState::BlockedSync,
        matcher: Matcher::Within { function: "runtime.gcStart", depth: 8 },
        refined: SchedulingState::BlockedSyncTriggeringGC,
    },
    Pattern {
        state: SchedulingState::Blocked,
        matcher: Matcher::Within { function: "runtime.ReadTrace", depth: 8 },
        refined: SchedulingState::BlockedWaitingForTraceData,
    },
];

/// Function-name prefixes that tag a `BlockedNet` span
const TAG_MARKERS: &[(&str, SpanTags)] = &[
    ("internal/poll.(*FD).Read", SpanTags::READ),
    ("internal/poll.(*FD).Accept", SpanTags::ACCEPT),
    ("net.(*netFD).connect", SpanTags::DIAL),
    ("net.(*netFD).", SpanTags::NETWORK),
    ("net.(*TCPConn).", SpanTags::TCP),
    ("net.(*TCPListener).", SpanTags::TCP),
    ("crypto/tls.", SpanTags::TLS),
    ("net/http.", SpanTags::HTTP),
];

// =============================================================================
// CLASSIFIERS
// =============================================================================

/// Narrow `state` using the stack it was entered with (innermost frame first).
#[must_use]
pub fn refine_state(state: SchedulingState, frames: &[&str]) -> SchedulingState {
    STATE_PATTERNS
        .iter()
        .find(|p| p.state == state && p.matcher.matches(frames))
        .map_or(state, |p| p.refined)
}

/// Semantic tags for a span in `state` with the given stack.
#[must_use]
pub fn span_tags(state: SchedulingState, frames: &[&str]) -> SpanTags {
    if state != SchedulingState::BlockedNet {
        return SpanTags::empty();
    }

    frames.iter().take(MAX_TAG_DEPTH).fold(SpanTags::empty(), |tags, frame| {
        TAG_MARKERS
            .iter()
            .filter(|(prefix, _)| frame.starts_with(prefix))
            .fold(tags, |acc, &(_, tag)| acc | tag)
    })
}

/// Refined state and tags in one go.
#[must_use]
pub fn apply_patterns(state: SchedulingState, frames: &[&str]) -> (SchedulingState, SpanTags) {
    (refine_state(state, frames), span_tags(state, frames))
}

/// Returns true for functions in the runtime's own namespace.
pub fn is_runtime_function(function: &str) -> bool {
    function.starts_with(RUNTIME_PREFIX)
}

/// Number of leading runtime frames.
fn runtime_prefix_len(frames: &[&str]) -> usize {
    frames.iter().take_while(|f| is_runtime_function(f)).count()
}
