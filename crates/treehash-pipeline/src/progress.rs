//! Pipeline progress reporting.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use treehash_core::PipelineCounters;

/// Snapshots are published every this many written records.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Progress information during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineProgress {
    /// Files handed to the workers so far.
    pub files_dispatched: u64,
    /// Records written so far.
    pub records_written: u64,
    /// Files that failed to hash so far.
    pub files_failed: u64,
    /// Bytes hashed so far.
    pub bytes_hashed: u64,
    /// Time elapsed since the pipeline started.
    pub elapsed: Duration,
}

impl PipelineProgress {
    /// Calculate throughput in records per second.
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.records_written as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_hashed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Publishes progress snapshots to subscribers.
///
/// Sending never blocks; a run with no subscribers simply drops snapshots.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter {
    tx: broadcast::Sender<PipelineProgress>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(tx: broadcast::Sender<PipelineProgress>) -> Self {
        Self {
            tx,
            start_time: Instant::now(),
        }
    }

    pub fn snapshot(&self, counters: &PipelineCounters) -> PipelineProgress {
        PipelineProgress {
            files_dispatched: counters.files_dispatched(),
            records_written: counters.records_written(),
            files_failed: counters.files_failed(),
            bytes_hashed: counters.bytes_hashed(),
            elapsed: self.start_time.elapsed(),
        }
    }

    pub fn publish(&self, counters: &PipelineCounters) {
        let _ = self.tx.send(self.snapshot(counters));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_with_zero_elapsed() {
        let progress = PipelineProgress {
            records_written: 10,
            ..Default::default()
        };
        assert_eq!(progress.records_per_second(), 0.0);
        assert_eq!(progress.bytes_per_second(), 0.0);
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let (tx, mut rx) = broadcast::channel(4);
        let reporter = ProgressReporter::new(tx);
        let counters = PipelineCounters::new();
        counters.record_dispatched();
        counters.record_hashed(2);
        counters.record_written();

        reporter.publish(&counters);

        let progress = rx.try_recv().unwrap();
        assert_eq!(progress.records_written, 1);
        assert_eq!(progress.bytes_hashed, 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        ProgressReporter::new(tx).publish(&PipelineCounters::new());
    }
}
