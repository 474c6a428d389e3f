//! Directory walking for treehash.
//!
//! Enumerates every regular file under a root directory using a bounded
//! pool of directory walkers, feeding each discovery into a downstream
//! channel. Key features:
//!
//! - **Bounded concurrency** via a fixed-size rayon pool, one job per directory
//! - **Backpressure** through a bounded sink; a full sink blocks the walkers
//! - **Completion barrier** over outstanding directory visits
//! - **Subtree pruning** with a base-name filter
//!
//! # Example
//!
//! ```rust,no_run
//! use treehash_scan::{NameFilter, Walker};
//!
//! let mut stream = Walker::new(NameFilter::disabled())
//!     .with_walkers(4)
//!     .walk("/path/to/tree", 64)
//!     .unwrap();
//!
//! for task in stream.by_ref() {
//!     println!("{} ({} bytes)", task.path.display(), task.size);
//! }
//! let report = stream.finish().unwrap();
//! println!("{} directories skipped", report.warnings.len());
//! ```

mod visited;
mod walker;

pub use visited::{DirId, VisitedDirs};
pub use walker::{WalkReport, WalkStream, Walker};

// Re-export core types for convenience
pub use treehash_core::{FileTask, FilterSyntax, NameFilter, WalkWarning, WarningKind};
