//! Walk, hash and write pipeline for treehash.
//!
//! Computes a SHA-1 fingerprint and size for every regular file under a
//! directory and appends one `path,hexdigest,size` line per file to an
//! output log.
//!
//! # Overview
//!
//! - **Walker** stage: bounded pool of directory walkers (see `treehash-scan`)
//! - **Dispatch queue**: bounded channel of discovered files
//! - **Worker pool**: fixed number of hash workers, one reusable buffer each
//! - **Result queue**: bounded channel of per-file outcomes
//! - **Writer**: single thread appending records in arrival order
//!
//! Both queues apply backpressure: a full dispatch queue blocks the walkers
//! and a full result queue blocks the workers. Any capacity works,
//! including zero.
//!
//! # Example
//!
//! ```rust,no_run
//! use treehash_pipeline::{HashConfig, Pipeline};
//!
//! let config = HashConfig::builder()
//!     .root("/path/to/tree")
//!     .output("hashes.txt")
//!     .filter(Some("^target$".to_string()))
//!     .build()
//!     .unwrap();
//!
//! let mut pipeline = Pipeline::new(config);
//! let summary = pipeline.run().unwrap();
//! println!("{} files in {:.2}s", summary.stats.records_written, summary.duration.as_secs_f64());
//! ```
//!
//! # Failed files
//!
//! A file that cannot be opened or read produces a `HashOutcome::Failed`
//! instead of a record. Failures are counted in the summary, logged, and
//! optionally written to a separate error log; they never appear in the
//! output.

mod hasher;
mod pipeline;
mod progress;
mod worker;
mod writer;

pub use hasher::{StreamHasher, digest_bytes};
pub use pipeline::{Pipeline, PipelineState, open_output, validate_root};
pub use progress::{PROGRESS_INTERVAL, PipelineProgress};
pub use worker::WorkerPool;
pub use writer::RecordWriter;

// Re-export core types
pub use treehash_core::{
    Digest, ExitKind, FileTask, FilterSyntax, HashConfig, HashConfigBuilder, HashFailure,
    HashOutcome, HashRecord, RunStats, RunSummary, TreeHashError, WalkWarning,
};
