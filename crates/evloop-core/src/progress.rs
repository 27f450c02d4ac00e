//! Progress reporting for the record loop.
//!
//! Purely observational: sinks never influence control flow.

use tracing::info;

/// Receives progress updates from the event loop.
pub trait ProgressSink {
    /// Called once before the first record with the number of records that
    /// will be processed.
    fn start(&mut self, planned: u64);

    /// Called after each record with the number processed so far.
    fn advance(&mut self, done: u64);

    /// Called once after the loop.
    fn finish(&mut self, done: u64);
}

/// Discards all updates (muted progress).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _planned: u64) {}
    fn advance(&mut self, _done: u64) {}
    fn finish(&mut self, _done: u64) {}
}

/// Reports progress through `tracing` every `planned / steps` records.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
    steps: u64,
    planned: u64,
    every: u64,
}

impl LogProgress {
    /// Report in 100 steps.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_steps(label, 100)
    }

    pub fn with_steps(label: impl Into<String>, steps: u64) -> Self {
        Self {
            label: label.into(),
            steps: steps.max(1),
            planned: 0,
            every: 1,
        }
    }

    /// Interval (in records) between two reports for the current loop.
    pub fn interval(&self) -> u64 {
        self.every
    }

    /// Whether `done` records warrants a report.
    pub fn should_report(&self, done: u64) -> bool {
        done > 0 && (done % self.every == 0 || done == self.planned)
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, planned: u64) {
        self.planned = planned;
        self.every = (planned / self.steps).max(1);
        info!(engine = %self.label, planned, "Looping over records");
    }

    fn advance(&mut self, done: u64) {
        if self.should_report(done) {
            let percent = if self.planned == 0 {
                100.0
            } else {
                done as f64 * 100.0 / self.planned as f64
            };
            info!(
                engine = %self.label,
                done,
                planned = self.planned,
                "Progress {percent:.0}%"
            );
        }
    }

    fn finish(&mut self, done: u64) {
        info!(engine = %self.label, done, "Record loop finished");
    }
}
