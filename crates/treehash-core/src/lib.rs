//! Core types and traits for treehash.
//!
//! This crate provides the data model shared by every pipeline stage:
//! file tasks and hash records, the base-name exclusion filter, run
//! configuration, the error taxonomy with its exit codes, and the
//! completion barrier used to detect the end of the directory walk.

mod barrier;
mod config;
mod error;
mod filter;
mod record;
mod summary;

pub use barrier::{BarrierGuard, CompletionBarrier, PipelineCounters};
pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_OUTPUT, DEFAULT_RESULT_CAPACITY, HashConfig, HashConfigBuilder,
};
pub use error::{ExitKind, TreeHashError, WalkWarning, WarningKind};
pub use filter::{FilterSyntax, NameFilter};
pub use record::{DIGEST_LEN, Digest, FileTask, HashFailure, HashOutcome, HashRecord};
pub use summary::{RunStats, RunSummary};
