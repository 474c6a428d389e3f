//! Run summary and statistics.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::barrier::PipelineCounters;
use crate::error::WalkWarning;

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Directories listed successfully.
    pub dirs_visited: u64,
    /// Directories skipped because they could not be listed.
    pub dirs_skipped: u64,
    /// Files handed to the hash workers.
    pub files_dispatched: u64,
    /// Records appended to the output file.
    pub records_written: u64,
    /// Files that could not be hashed.
    pub files_failed: u64,
    /// Bytes streamed through the hasher.
    pub bytes_hashed: u64,
}

impl RunStats {
    /// Snapshot the pipeline counters.
    pub fn from_counters(counters: &PipelineCounters) -> Self {
        Self {
            dirs_visited: counters.dirs_visited(),
            dirs_skipped: counters.dirs_skipped(),
            files_dispatched: counters.files_dispatched(),
            records_written: counters.records_written(),
            files_failed: counters.files_failed(),
            bytes_hashed: counters.bytes_hashed(),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Root directory that was processed.
    pub root: PathBuf,

    /// Output file records were appended to.
    pub output: PathBuf,

    /// Totals.
    pub stats: RunStats,

    /// Wall-clock duration of the run.
    pub duration: Duration,

    /// Directories that were skipped while walking.
    pub warnings: Vec<WalkWarning>,
}

impl RunSummary {
    /// Create a new run summary.
    pub fn new(
        root: PathBuf,
        output: PathBuf,
        stats: RunStats,
        duration: Duration,
        warnings: Vec<WalkWarning>,
    ) -> Self {
        Self {
            root,
            output,
            stats,
            duration,
            warnings,
        }
    }

    /// Check if any directory was skipped or any file failed.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.stats.files_failed > 0
    }

    /// Check if the tree produced nothing to hash.
    pub fn is_empty(&self) -> bool {
        self.stats.files_dispatched == 0
    }
}
