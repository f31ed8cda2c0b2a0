//! Per-state statistics for one goroutine.
//!
//! Aggregates a goroutine's spans by scheduling state: how often it was in
//! each state and how long each visit lasted.
//!
//! # Output
//!
//! ```text
//! State                    Count      Total       Min       Max      Mean    Median
//! Active                      12    4.21ms    3.10µs    1.92ms  350.83µs   41.00µs
//! Blocked (pollable I/O)      11   98.40ms   12.00µs   40.11ms    8.95ms    2.30ms
//! ```

// Mean and median are reported as fractional nanoseconds
#![allow(clippy::cast_precision_loss)]

use super::{Goroutine, Trace};
use crate::domain::Duration;
use crate::state::SchedulingState;

/// Aggregated durations of one state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStats {
    pub state: SchedulingState,
    pub count: usize,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Mean duration in nanoseconds
    pub mean: f64,
    /// Median (p50) duration in nanoseconds
    pub median: f64,
}

/// Statistics for every state the goroutine visited, ordered by state
/// ordinal. States it never held are omitted.
#[must_use]
pub fn goroutine_stats(trace: &Trace, goroutine: &Goroutine) -> Vec<StateStats> {
    let mut durations: Vec<Vec<u64>> = vec![Vec::new(); SchedulingState::COUNT];
    for span in goroutine.spans() {
        durations[span.state().ordinal()].push(trace.duration(span).0);
    }

    SchedulingState::ALL
        .into_iter()
        .zip(durations)
        .filter(|(_, d)| !d.is_empty())
        .map(|(state, mut d)| {
            d.sort_unstable();
            let total: u64 = d.iter().sum();
            StateStats {
                state,
                count: d.len(),
                total: Duration(total),
                min: Duration(d[0]),
                max: Duration(d[d.len() - 1]),
                mean: total as f64 / d.len() as f64,
                median: median(&d),
            }
        })
        .collect()
}

/// Median of a sorted, non-empty slice.
fn median(sorted: &[u64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}
