//! Rayon-backed parallel directory walker.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::UNIX_EPOCH;

use crossbeam_channel::{Receiver, Sender, bounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace, warn};

use treehash_core::{
    CompletionBarrier, FileTask, NameFilter, PipelineCounters, TreeHashError, WalkWarning,
};

use crate::visited::{DirId, VisitedDirs};

/// Result of a finished walk.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Directories that could not be listed or entries that could not be read.
    pub warnings: Vec<WalkWarning>,
    /// Files handed to the sink.
    pub files_emitted: u64,
    /// Directories listed successfully.
    pub dirs_visited: u64,
    /// False when the sink closed before the tree was exhausted.
    pub completed: bool,
}

/// Walks a directory tree with a fixed number of directory walkers.
///
/// Every directory becomes one job on a work-stealing pool of `walkers`
/// threads, so a wide or deep tree never raises the thread count. Entries
/// whose base name matches the filter are skipped, and a matching directory
/// is never entered. Directories that cannot be listed are skipped with a
/// warning. Emission order is unspecified.
#[derive(Debug, Clone)]
pub struct Walker {
    filter: Arc<NameFilter>,
    walkers: usize,
    follow_symlinks: bool,
}

impl Walker {
    /// Create a walker with one directory walker per available CPU.
    pub fn new(filter: NameFilter) -> Self {
        let walkers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            filter: Arc::new(filter),
            walkers,
            follow_symlinks: false,
        }
    }

    /// Set the number of concurrent directory walkers.
    pub fn with_walkers(mut self, walkers: usize) -> Self {
        self.walkers = walkers.max(1);
        self
    }

    /// Follow symbolic links to files and directories.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Number of concurrent directory walkers.
    pub fn walkers(&self) -> usize {
        self.walkers
    }

    /// Walk `root`, sending every regular file to `sink`.
    ///
    /// Blocks until every directory reachable from `root` has been fully
    /// processed. A full sink blocks the walkers. If the sink's receiver
    /// goes away the walk stops early and the report is marked incomplete.
    pub fn walk_into(
        &self,
        root: &Path,
        sink: Sender<FileTask>,
        counters: Arc<PipelineCounters>,
    ) -> Result<WalkReport, TreeHashError> {
        let pool = self.build_pool()?;
        let state = Arc::new(WalkState {
            filter: Arc::clone(&self.filter),
            sink,
            barrier: CompletionBarrier::new(),
            counters,
            warnings: Mutex::new(Vec::new()),
            visited: VisitedDirs::new(),
            follow_symlinks: self.follow_symlinks,
            sink_closed: AtomicBool::new(false),
            files_emitted: AtomicU64::new(0),
            dirs_visited: AtomicU64::new(0),
        });

        if self.follow_symlinks {
            if let Some(id) = fs::metadata(root).ok().as_ref().and_then(DirId::from_metadata) {
                state.visited.first_visit(id);
            }
        }

        debug!(root = %root.display(), walkers = self.walkers, "Starting directory walk");

        state.barrier.add(1);
        let root_state = Arc::clone(&state);
        let root = root.to_path_buf();
        pool.spawn(move || visit_dir(root_state, root));

        state.barrier.wait();
        drop(pool);

        let warnings = std::mem::take(
            &mut *state.warnings.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let report = WalkReport {
            warnings,
            files_emitted: state.files_emitted.load(Ordering::Relaxed),
            dirs_visited: state.dirs_visited.load(Ordering::Relaxed),
            completed: !state.sink_closed.load(Ordering::Relaxed),
        };

        debug!(
            files = report.files_emitted,
            dirs = report.dirs_visited,
            skipped = report.warnings.len(),
            "Directory walk finished"
        );

        Ok(report)
    }

    /// Walk `root` on a background thread, yielding files lazily.
    ///
    /// At most `capacity` discovered files are buffered ahead of the
    /// consumer.
    pub fn walk(self, root: impl Into<PathBuf>, capacity: usize) -> Result<WalkStream, TreeHashError> {
        let root = root.into();
        let (tx, rx) = bounded::<FileTask>(capacity);
        let handle = thread::Builder::new()
            .name("treehash-walk".to_string())
            .spawn(move || self.walk_into(&root, tx, Arc::new(PipelineCounters::new())))
            .map_err(|e| TreeHashError::Spawn {
                stage: "walker",
                message: e.to_string(),
            })?;

        Ok(WalkStream {
            receiver: rx,
            handle,
        })
    }

    fn build_pool(&self) -> Result<ThreadPool, TreeHashError> {
        ThreadPoolBuilder::new()
            .num_threads(self.walkers)
            .thread_name(|i| format!("treehash-dir-{i}"))
            .build()
            .map_err(|e| TreeHashError::Spawn {
                stage: "directory walkers",
                message: e.to_string(),
            })
    }
}

/// Lazily yields the files found by a background walk.
#[derive(Debug)]
pub struct WalkStream {
    receiver: Receiver<FileTask>,
    handle: JoinHandle<Result<WalkReport, TreeHashError>>,
}

impl WalkStream {
    /// Stop consuming and wait for the walk to finish.
    ///
    /// Files not yet consumed are discarded and the walk stops early.
    pub fn finish(self) -> Result<WalkReport, TreeHashError> {
        let Self { receiver, handle } = self;
        drop(receiver);
        handle
            .join()
            .map_err(|_| TreeHashError::StagePanicked { stage: "walker" })?
    }
}

impl Iterator for WalkStream {
    type Item = FileTask;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

/// State shared by every directory job of one walk.
struct WalkState {
    filter: Arc<NameFilter>,
    sink: Sender<FileTask>,
    barrier: CompletionBarrier,
    counters: Arc<PipelineCounters>,
    warnings: Mutex<Vec<WalkWarning>>,
    visited: VisitedDirs,
    follow_symlinks: bool,
    sink_closed: AtomicBool,
    files_emitted: AtomicU64,
    dirs_visited: AtomicU64,
}

enum EntryKind {
    Dir,
    File(fs::Metadata),
}

impl WalkState {
    /// Queue a subdirectory on the current pool.
    fn push_dir(self: &Arc<Self>, path: PathBuf) {
        self.barrier.add(1);
        let state = Arc::clone(self);
        rayon::spawn(move || visit_dir(state, path));
    }

    /// Send a file downstream. Returns `false` once the sink has closed.
    fn emit(&self, task: FileTask) -> bool {
        match self.sink.send(task) {
            Ok(()) => {
                self.counters.record_dispatched();
                self.files_emitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                if !self.sink_closed.swap(true, Ordering::Relaxed) {
                    warn!("File sink closed, stopping directory walk");
                }
                false
            }
        }
    }

    /// Decide what an entry is, or `None` to skip it.
    fn classify(&self, entry: &fs::DirEntry, path: &Path) -> Option<EntryKind> {
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                self.warn(WalkWarning::metadata_error(path, &err));
                return None;
            }
        };

        if file_type.is_symlink() && !self.follow_symlinks {
            trace!(path = %path.display(), "Skipping symlink");
            return None;
        }
        if file_type.is_dir() && !self.follow_symlinks {
            return Some(EntryKind::Dir);
        }
        if !file_type.is_dir() && !file_type.is_file() && !file_type.is_symlink() {
            return None;
        }

        let metadata = if file_type.is_symlink() {
            fs::metadata(path)
        } else {
            entry.metadata()
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(err) => {
                self.warn(WalkWarning::metadata_error(path, &err));
                return None;
            }
        };

        if metadata.is_dir() {
            if let Some(id) = DirId::from_metadata(&metadata) {
                if !self.visited.first_visit(id) {
                    debug!(path = %path.display(), "Directory already visited, skipping");
                    return None;
                }
            }
            Some(EntryKind::Dir)
        } else if metadata.is_file() {
            Some(EntryKind::File(metadata))
        } else {
            None
        }
    }

    fn skip_dir(&self, dir: &Path, error: &std::io::Error) {
        self.counters.record_dir_skipped();
        warn!(path = %dir.display(), %error, "Skipping unreadable directory");
        self.warn(WalkWarning::read_error(dir, error));
    }

    fn warn(&self, warning: WalkWarning) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning);
    }
}

/// List one directory, queueing subdirectories and emitting files.
fn visit_dir(state: Arc<WalkState>, dir: PathBuf) {
    let _guard = state.barrier.adopt();

    if state.sink_closed.load(Ordering::Relaxed) {
        return;
    }

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            state.skip_dir(&dir, &err);
            return;
        }
    };
    state.counters.record_dir_visited();
    state.dirs_visited.fetch_add(1, Ordering::Relaxed);

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                state.warn(WalkWarning::read_error(&dir, &err));
                continue;
            }
        };

        let name = entry.file_name();
        if state.filter.matches(&name.to_string_lossy()) {
            debug!(path = %dir.join(&name).display(), "Excluded by filter");
            continue;
        }

        let path = entry.path();
        match state.classify(&entry, &path) {
            Some(EntryKind::Dir) => state.push_dir(path),
            Some(EntryKind::File(metadata)) => {
                let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
                if !state.emit(FileTask::new(path, metadata.len(), modified)) {
                    return;
                }
            }
            None => {}
        }
    }
}
