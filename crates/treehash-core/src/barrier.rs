//! Completion barrier and lifecycle counters shared by pipeline stages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Counts outstanding units of work and lets a coordinator wait for zero.
///
/// Units are added before they are handed off and completed after they are
/// fully processed, so a unit that spawns more units keeps the count above
/// zero until its children are registered.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl CompletionBarrier {
    /// Create a barrier with no outstanding units.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `n` new outstanding units.
    pub fn add(&self, n: usize) {
        let mut count = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        *count += n;
    }

    /// Mark one unit as complete.
    pub fn done(&self) {
        let mut count = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(*count > 0, "completion barrier underflow");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    /// Register one unit and return a guard that completes it on drop.
    pub fn enter(&self) -> BarrierGuard<'_> {
        self.add(1);
        BarrierGuard { barrier: self }
    }

    /// Wrap an already registered unit in a guard that completes it on drop.
    pub fn adopt(&self) -> BarrierGuard<'_> {
        BarrierGuard { barrier: self }
    }

    /// Block until every registered unit has completed.
    pub fn wait(&self) {
        let count = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        let _count = self
            .drained
            .wait_while(count, |c| *c > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Current number of outstanding units.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Completes one barrier unit when dropped, including on unwind.
#[must_use = "dropping the guard completes the unit immediately"]
#[derive(Debug)]
pub struct BarrierGuard<'a> {
    barrier: &'a CompletionBarrier,
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        self.barrier.done();
    }
}

/// Lifecycle counters for one run.
///
/// Stages only ever increment their own counters; the orchestrator reads
/// them after the stages have joined.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    dirs_visited: AtomicU64,
    dirs_skipped: AtomicU64,
    files_dispatched: AtomicU64,
    files_hashed: AtomicU64,
    files_failed: AtomicU64,
    records_written: AtomicU64,
    bytes_hashed: AtomicU64,
}

impl PipelineCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dir_visited(&self) {
        self.dirs_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dir_skipped(&self) {
        self.dirs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.files_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hashed(&self, bytes: u64) {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dirs_visited(&self) -> u64 {
        self.dirs_visited.load(Ordering::Relaxed)
    }

    pub fn dirs_skipped(&self) -> u64 {
        self.dirs_skipped.load(Ordering::Relaxed)
    }

    pub fn files_dispatched(&self) -> u64 {
        self.files_dispatched.load(Ordering::Relaxed)
    }

    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    pub fn files_failed(&self) -> u64 {
        self.files_failed.load(Ordering::Relaxed)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed.load(Ordering::Relaxed)
    }

    /// Every dispatched file has come out of the pipeline one way or the other.
    pub fn is_balanced(&self) -> bool {
        self.files_dispatched() == self.records_written() + self.files_failed()
    }
}
