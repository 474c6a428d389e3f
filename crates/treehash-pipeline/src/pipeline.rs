//! Orchestrates the walk, hash and write stages of one run.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::bounded;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use treehash_core::{
    HashConfig, NameFilter, PipelineCounters, RunStats, RunSummary, TreeHashError,
};
use treehash_scan::Walker;

use crate::progress::{PipelineProgress, ProgressReporter};
use crate::worker::WorkerPool;
use crate::writer::RecordWriter;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Checking the root and opening the output.
    Validating,
    /// Writer, workers and walkers are running.
    Running,
    /// The walk has finished; queues are being closed and drained.
    Draining,
    /// Every stage has joined.
    Done,
    /// The run was aborted.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Fingerprints every regular file under a root directory.
///
/// Three stages connected by bounded queues:
///
/// 1. A fixed pool of directory walkers feeds the dispatch queue. A
///    completion barrier over outstanding directory visits decides when
///    the walk is over.
/// 2. A fixed pool of hash workers drains the dispatch queue into the
///    result queue.
/// 3. One writer thread drains the result queue into the output sink.
///
/// Output records are unordered: they appear in completion order, not in
/// traversal or alphabetical order.
pub struct Pipeline {
    config: HashConfig,
    state: PipelineState,
    progress_tx: Option<broadcast::Sender<PipelineProgress>>,
}

impl Pipeline {
    /// Create a pipeline for one run.
    pub fn new(config: HashConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            state: PipelineState::Validating,
            progress_tx: Some(progress_tx),
        }
    }

    /// Subscribe to progress snapshots.
    ///
    /// The channel closes when the run finishes. Subscribing after the run
    /// has started yields an already closed receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineProgress> {
        match &self.progress_tx {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Configuration of this run.
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Run against the configured output file, opened in append mode.
    pub fn run(&mut self) -> Result<RunSummary, TreeHashError> {
        let start = Instant::now();
        let result = self.validate().and_then(|()| {
            let output = open_output(&self.config.output, self.config.truncate_output)?;
            self.execute(output, start)
        });
        self.settle(result).map(|(summary, _)| summary)
    }

    /// Run against an arbitrary append-only sink instead of the output file.
    ///
    /// Returns the sink once the writer has flushed it.
    pub fn run_with_sink<W: Write + Send + 'static>(
        &mut self,
        sink: W,
    ) -> Result<(RunSummary, W), TreeHashError> {
        let start = Instant::now();
        let result = self.validate().and_then(|()| self.execute(sink, start));
        self.settle(result)
    }

    fn settle<T>(&mut self, result: Result<T, TreeHashError>) -> Result<T, TreeHashError> {
        // Subscribers see the channel close however the run ended.
        self.progress_tx = None;
        match &result {
            Ok(_) => self.transition(PipelineState::Done),
            Err(err) => {
                debug!(error = %err, "Run aborted");
                self.transition(PipelineState::Failed);
            }
        }
        result
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }

    /// Check the root before any stage starts.
    fn validate(&self) -> Result<(), TreeHashError> {
        if self.state != PipelineState::Validating {
            return Err(TreeHashError::InvalidConfig {
                message: format!("pipeline cannot start from state {}", self.state),
            });
        }
        validate_root(&self.config.root)
    }

    fn execute<W: Write + Send + 'static>(
        &mut self,
        sink: W,
        start: Instant,
    ) -> Result<(RunSummary, W), TreeHashError> {
        let config = self.config.clone();
        let error_sink = match &config.error_log {
            Some(path) => Some(open_output(path, config.truncate_output)?),
            None => None,
        };

        let filter = NameFilter::try_compile(config.filter.as_deref(), config.filter_syntax)
            .unwrap_or_else(|err| {
                warn!(error = %err, "Ignoring filter");
                NameFilter::disabled()
            });

        let counters = Arc::new(PipelineCounters::new());
        let progress = self
            .progress_tx
            .take()
            .map(ProgressReporter::new);

        let workers = config.worker_count();
        let walkers = config.dir_walker_count();
        info!(
            root = %config.root.display(),
            output = %config.output.display(),
            workers,
            walkers,
            dispatch_depth = config.dispatch_depth(),
            result_depth = config.result_capacity,
            "Starting run"
        );

        self.transition(PipelineState::Running);

        let (task_tx, task_rx) = bounded(config.dispatch_depth());
        let (result_tx, result_rx) = bounded(config.result_capacity);

        let mut writer = RecordWriter::new(sink, &config.output, Arc::clone(&counters));
        if let Some(errors) = error_sink {
            writer = writer.with_error_sink(Box::new(errors));
        }
        if let Some(progress) = progress {
            writer = writer.with_progress(progress);
        }
        let writer = writer.spawn(result_rx)?;

        let pool = WorkerPool::spawn(
            workers,
            &task_rx,
            &result_tx,
            config.buffer_size,
            &counters,
        )?;
        drop(task_rx);
        drop(result_tx);

        let walk = Walker::new(filter)
            .with_walkers(walkers)
            .with_follow_symlinks(config.follow_symlinks)
            .walk_into(&config.root, task_tx, Arc::clone(&counters));

        // The walk has returned, so its sender is gone and the dispatch
        // queue closes once the last directory job unwinds.
        self.transition(PipelineState::Draining);
        let workers_joined = pool.join();
        let writer_joined = writer
            .join()
            .map_err(|_| TreeHashError::StagePanicked { stage: "writer" })
            .and_then(|r| r);

        let report = walk?;
        workers_joined?;
        let sink = writer_joined?;

        let stats = RunStats::from_counters(&counters);
        debug_assert!(!report.completed || counters.is_balanced());
        debug_assert_eq!(report.files_emitted, stats.files_dispatched);
        debug_assert_eq!(report.dirs_visited, stats.dirs_visited);

        if config.fail_on_empty && stats.files_dispatched == 0 {
            return Err(TreeHashError::NoChildren {
                path: config.root.clone(),
            });
        }

        let summary = RunSummary::new(
            config.root.clone(),
            config.output.clone(),
            stats,
            start.elapsed(),
            report.warnings,
        );

        info!(
            records = summary.stats.records_written,
            failed = summary.stats.files_failed,
            skipped_dirs = summary.stats.dirs_skipped,
            elapsed_ms = summary.duration.as_millis() as u64,
            "Run finished"
        );

        Ok((summary, sink))
    }
}

/// Check that `root` names a readable directory.
pub fn validate_root(root: &Path) -> Result<(), TreeHashError> {
    if root.as_os_str().is_empty() {
        return Err(TreeHashError::RootEmpty);
    }

    let metadata = fs::metadata(root).map_err(|e| TreeHashError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(TreeHashError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    fs::read_dir(root).map_err(|e| TreeHashError::io(root, e))?;
    Ok(())
}

/// Open an output file for appending, or truncate it when asked.
pub fn open_output(path: &Path, truncate: bool) -> Result<File, TreeHashError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path).map_err(|e| TreeHashError::output(path, e))
}
