//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a processor id
//! where a goroutine id is expected, and pin down the integer width of every
//! compact field stored in a span.

use std::fmt;

use super::errors::TraceError;

/// Goroutine ID
///
/// Process-unique and stable for the goroutine's lifetime. Id 0 is the
/// runtime itself (no user goroutine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GoroutineId(pub u64);

impl GoroutineId {
    /// The pseudo-goroutine used for events emitted by the runtime itself
    pub const RUNTIME: GoroutineId = GoroutineId(0);

    pub fn is_runtime(self) -> bool {
        self == Self::RUNTIME
    }
}

impl fmt::Display for GoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Processor ID
///
/// One per logical scheduling slot (GOMAXPROCS of them). Not an OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub i32);

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Index into the event table
///
/// 32 bits wide, so a single trace holds at most `u32::MAX` events.
/// Conversion from `usize` fails instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u32);

impl EventId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for EventId {
    type Error = TraceError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        u32::try_from(index).map(EventId).map_err(|_| TraceError::EventIndexOverflow(index))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stack trace ID from the decoder's stack table
///
/// Zero means no stack trace was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StackId(pub u32);

impl StackId {
    pub const NONE: StackId = StackId(goscope_common::NO_STACK);

    /// Returns true if a stack trace was captured
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }
}

/// Timestamp in nanoseconds
///
/// Represents an absolute point in time on the trace clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Duration from `earlier` to `self`, zero if `earlier` is later
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Convert to microseconds (f64), the unit of Chrome trace timestamps
    #[allow(clippy::cast_precision_loss)]
    pub fn as_micros_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Duration in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

// Time conversions intentionally lose precision for display
#[allow(clippy::cast_precision_loss)]
impl Duration {
    /// Convert to milliseconds (f64)
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Convert to seconds (f64)
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (f64)
    pub fn as_micros_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else if ms >= 1.0 {
            write!(f, "{ms:.2}ms")
        } else {
            write!(f, "{:.2}µs", self.as_micros_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(GoroutineId(5).to_string(), "G5");
        assert_eq!(ProcessorId(2).to_string(), "P2");
        assert_eq!(EventId(17).to_string(), "#17");
    }

    #[test]
    fn test_runtime_goroutine() {
        assert!(GoroutineId(0).is_runtime());
        assert!(!GoroutineId(1).is_runtime());
    }

    #[test]
    fn test_event_id_fits_u32() {
        assert_eq!(EventId::try_from(42usize).unwrap(), EventId(42));
        assert_eq!(EventId::try_from(u32::MAX as usize).unwrap().index(), u32::MAX as usize);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_event_id_overflow_is_an_error() {
        let too_big = u32::MAX as usize + 1;
        assert!(matches!(EventId::try_from(too_big), Err(TraceError::EventIndexOverflow(n)) if n == too_big));
    }

    #[test]
    fn test_stack_id_validity() {
        assert!(StackId(5).is_valid());
        assert!(!StackId::NONE.is_valid());
    }

    #[test]
    fn test_timestamp_since_saturates() {
        assert_eq!(Timestamp(150).since(Timestamp(100)), Duration(50));
        assert_eq!(Timestamp(100).since(Timestamp(150)), Duration(0));
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(Duration(5_000_000).to_string(), "5.00ms");
        assert_eq!(Duration(1_500_000_000).to_string(), "1.50s");
        assert_eq!(Duration(2_500).to_string(), "2.50µs");
    }
}
