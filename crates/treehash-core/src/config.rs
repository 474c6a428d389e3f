//! Run configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::filter::{FilterSyntax, NameFilter};

/// Default output file used when no output path is given.
pub const DEFAULT_OUTPUT: &str = "treehash.txt";

/// Default read buffer reused by every hash worker.
pub const DEFAULT_BUFFER_SIZE: usize = 100 * 1024;

/// Default result queue depth.
pub const DEFAULT_RESULT_CAPACITY: usize = 256;

/// Dispatch queue slots per hash worker when no explicit depth is set.
const DISPATCH_SLOTS_PER_WORKER: usize = 4;

/// Hash workers per available CPU when the worker count is auto-detected.
const WORKERS_PER_CPU: usize = 4;

/// Configuration for a hashing run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct HashConfig {
    /// Root directory to fingerprint.
    pub root: PathBuf,

    /// Exclusion pattern applied to every entry's base name.
    #[builder(default)]
    #[serde(default)]
    pub filter: Option<String>,

    /// How `filter` is interpreted.
    #[builder(default)]
    #[serde(default)]
    pub filter_syntax: FilterSyntax,

    /// Output file, opened in append mode.
    #[builder(default = "PathBuf::from(DEFAULT_OUTPUT)")]
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Optional side log receiving one line per file that failed to hash.
    #[builder(default)]
    #[serde(default)]
    pub error_log: Option<PathBuf>,

    /// Number of hash workers (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub workers: usize,

    /// Number of concurrent directory walkers (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub dir_walkers: usize,

    /// Dispatch queue depth (None = workers x 4). Zero means rendezvous handoff.
    #[builder(default)]
    #[serde(default)]
    pub dispatch_capacity: Option<usize>,

    /// Result queue depth. Zero means rendezvous handoff.
    #[builder(default = "DEFAULT_RESULT_CAPACITY")]
    #[serde(default = "default_result_capacity")]
    pub result_capacity: usize,

    /// Size of the per-worker read buffer in bytes.
    #[builder(default = "DEFAULT_BUFFER_SIZE")]
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Follow symbolic links to files and directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Report a "no children" failure when the tree yields no files.
    #[builder(default = "false")]
    #[serde(default)]
    pub fail_on_empty: bool,

    /// Truncate the output file instead of appending to it.
    #[builder(default = "false")]
    #[serde(default)]
    pub truncate_output: bool,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_result_capacity() -> usize {
    DEFAULT_RESULT_CAPACITY
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl HashConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.root.is_none() {
            return Err("Root path is required".to_string());
        }
        if self.buffer_size == Some(0) {
            return Err("Buffer size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl HashConfig {
    /// Create a new config builder.
    pub fn builder() -> HashConfigBuilder {
        HashConfigBuilder::default()
    }

    /// Create a simple config for hashing a tree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: None,
            filter_syntax: FilterSyntax::default(),
            output: default_output(),
            error_log: None,
            workers: 0,
            dir_walkers: 0,
            dispatch_capacity: None,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            follow_symlinks: false,
            fail_on_empty: false,
            truncate_output: false,
        }
    }

    /// Pick the output path: the given one when non-empty, otherwise the default.
    pub fn resolve_output(output: Option<&str>) -> PathBuf {
        match output.map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_output(),
        }
    }

    /// Compile the exclusion filter for this run.
    pub fn compile_filter(&self) -> NameFilter {
        NameFilter::compile(self.filter.as_deref(), self.filter_syntax)
    }

    /// Effective number of hash workers.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => available_cpus() * WORKERS_PER_CPU,
            n => n,
        }
    }

    /// Effective number of directory walkers.
    pub fn dir_walker_count(&self) -> usize {
        match self.dir_walkers {
            0 => available_cpus(),
            n => n,
        }
    }

    /// Effective dispatch queue depth.
    pub fn dispatch_depth(&self) -> usize {
        self.dispatch_capacity
            .unwrap_or_else(|| self.worker_count() * DISPATCH_SLOTS_PER_WORKER)
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
