//! The span: one owner, one state, one time interval.

use bitflags::bitflags;

use crate::domain::{EventId, StackId, Timestamp};
use crate::state::SchedulingState;

bitflags! {
    /// What a network-blocked span was doing, derived from its stack.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpanTags: u8 {
        const READ = 1 << 0;
        const ACCEPT = 1 << 1;
        const DIAL = 1 << 2;
        const NETWORK = 1 << 3;
        const TCP = 1 << 4;
        const TLS = 1 << 5;
        const HTTP = 1 << 6;
    }
}

impl SpanTags {
    /// Display labels of the set tags, in bit order
    pub fn labels(self) -> Vec<&'static str> {
        const LABELS: [(SpanTags, &str); 7] = [
            (SpanTags::READ, "read"),
            (SpanTags::ACCEPT, "accept"),
            (SpanTags::DIAL, "dial"),
            (SpanTags::NETWORK, "network"),
            (SpanTags::TCP, "TCP"),
            (SpanTags::TLS, "TLS"),
            (SpanTags::HTTP, "HTTP"),
        ];
        LABELS.iter().filter(|(tag, _)| self.contains(*tag)).map(|&(_, label)| label).collect()
    }
}

/// Maximum number of frames the "at" offset can skip.
pub const MAX_AT_OFFSET: u8 = u8::MAX;

/// A maximal interval during which one goroutine or processor holds one
/// scheduling state.
///
/// The start time is not stored: it is the timestamp of the originating
/// event, see [`crate::model::Trace::start`]. The end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub(crate) end: Timestamp,
    pub(crate) event: EventId,
    pub(crate) stack: StackId,
    /// Offset from the top of the stack, skipping uninteresting runtime frames
    pub(crate) at: u8,
    pub(crate) state: SchedulingState,
    pub(crate) tags: SpanTags,
}

// Spans are the bulk of the model's memory; keep them at three words.
const _: () = assert!(std::mem::size_of::<Span>() == 24);

impl Span {
    pub(crate) fn new(state: SchedulingState, event: EventId, stack: StackId) -> Self {
        Self { end: Timestamp(0), event, stack, at: 0, state, tags: SpanTags::empty() }
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// The event that opened this span
    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn stack(&self) -> StackId {
        self.stack
    }

    /// Index of the first interesting (non-runtime) frame in the stack
    pub fn at(&self) -> usize {
        usize::from(self.at)
    }

    pub fn state(&self) -> SchedulingState {
        self.state
    }

    pub fn tags(&self) -> SpanTags {
        self.tags
    }
}
