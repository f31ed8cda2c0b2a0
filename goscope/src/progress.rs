//! Lossy, monotonic progress reporting.
//!
//! Loading a trace runs in stages: however many the decoder has, plus one for
//! span reconstruction. Each stage covers an equal share of `0.0..=1.0`.
//! Reports go out with `try_send`; a slow observer misses some of them, which
//! is fine since only the latest value matters.

use crossbeam_channel::Sender;

/// Sends overall progress fractions to an observer.
#[derive(Debug, Clone)]
pub struct Progress {
    tx: Option<Sender<f32>>,
    stages: u32,
    last: f32,
}

impl Progress {
    /// `parser_stages` is the number of stages that run before
    /// reconstruction.
    pub fn new(tx: Option<Sender<f32>>, parser_stages: u32) -> Self {
        Self { tx, stages: parser_stages + 1, last: 0.0 }
    }

    /// A reporter nobody listens to.
    pub fn disabled() -> Self {
        Self::new(None, 0)
    }

    /// Index of the reconstruction stage
    pub fn reconstruction_stage(&self) -> u32 {
        self.stages - 1
    }

    /// Report `current` of `total` items done in `stage`.
    ///
    /// Values below the last reported one are suppressed.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&mut self, stage: u32, current: usize, total: usize) {
        let within = if total == 0 { 1.0 } else { current as f32 / total as f32 };
        let fraction = ((stage as f32 + within) / self.stages as f32).clamp(0.0, 1.0);
        self.send(fraction);
    }

    /// Report completion.
    pub fn finish(&mut self) {
        self.send(1.0);
    }

    /// Last value sent or dropped
    pub fn last(&self) -> f32 {
        self.last
    }

    fn send(&mut self, fraction: f32) {
        if fraction < self.last {
            return;
        }
        self.last = fraction;
        if let Some(tx) = &self.tx {
            // Non-blocking send (drop if the observer is slow)
            let _ = tx.try_send(fraction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_share_the_range() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut progress = Progress::new(Some(tx), 3);
        assert_eq!(progress.reconstruction_stage(), 3);

        progress.report(0, 50, 100);
        progress.report(3, 0, 100);
        progress.report(3, 100, 100);

        let sent: Vec<f32> = rx.try_iter().collect();
        assert_eq!(sent, vec![0.125, 0.75, 1.0]);
    }

    #[test]
    fn test_regressions_are_suppressed() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut progress = Progress::new(Some(tx), 0);
        progress.report(0, 60, 100);
        progress.report(0, 30, 100);
        progress.finish();

        let sent: Vec<f32> = rx.try_iter().collect();
        assert_eq!(sent, vec![0.6, 1.0]);
        assert!((progress.last() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_full_channel_drops_reports() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut progress = Progress::new(Some(tx), 0);
        progress.report(0, 1, 4);
        progress.report(0, 2, 4);
        progress.finish();

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0.25]);
        assert!((progress.last() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_stage_counts_as_done() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut progress = Progress::new(Some(tx), 1);
        progress.report(1, 0, 0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1.0]);
    }
}
