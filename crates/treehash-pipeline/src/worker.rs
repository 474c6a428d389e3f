//! Fixed-size pool of hash workers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use treehash_core::{
    FileTask, HashFailure, HashOutcome, HashRecord, PipelineCounters, TreeHashError,
};

use crate::hasher::StreamHasher;

/// A running set of hash workers.
///
/// Each worker pulls one task at a time from the dispatch queue, streams the
/// file through its own [`StreamHasher`], and pushes exactly one outcome onto
/// the result queue. Workers exit once the dispatch queue is closed and
/// drained, or when the result queue has no receiver left.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    /// Start `count` workers.
    pub fn spawn(
        count: usize,
        tasks: &Receiver<FileTask>,
        results: &Sender<HashOutcome>,
        buffer_size: usize,
        counters: &Arc<PipelineCounters>,
    ) -> Result<Self, TreeHashError> {
        let count = count.max(1);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let tasks = tasks.clone();
            let results = results.clone();
            let counters = Arc::clone(counters);
            let handle = thread::Builder::new()
                .name(format!("treehash-worker-{id}"))
                .spawn(move || run_worker(tasks, results, buffer_size, &counters))
                .map_err(|e| TreeHashError::Spawn {
                    stage: "hash worker",
                    message: e.to_string(),
                })?;
            handles.push(handle);
        }

        debug!(workers = count, buffer_size, "Hash workers started");
        Ok(Self { handles })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. Returns the number of tasks processed.
    pub fn join(self) -> Result<u64, TreeHashError> {
        let mut processed = 0;
        let mut panicked = false;
        for handle in self.handles {
            match handle.join() {
                Ok(n) => processed += n,
                Err(_) => panicked = true,
            }
        }
        if panicked {
            return Err(TreeHashError::StagePanicked { stage: "hash worker" });
        }
        Ok(processed)
    }
}

fn run_worker(
    tasks: Receiver<FileTask>,
    results: Sender<HashOutcome>,
    buffer_size: usize,
    counters: &PipelineCounters,
) -> u64 {
    let mut hasher = StreamHasher::new(buffer_size);
    let mut processed = 0;

    for task in tasks.iter() {
        let outcome = hash_task(&mut hasher, task, counters);
        processed += 1;
        if results.send(outcome).is_err() {
            warn!("Result queue closed, hash worker stopping");
            break;
        }
    }

    processed
}

/// Hash a single task. The file handle does not outlive this call.
pub(crate) fn hash_task(
    hasher: &mut StreamHasher,
    task: FileTask,
    counters: &PipelineCounters,
) -> HashOutcome {
    match hasher.hash_file(&task.path) {
        Ok((digest, size)) => {
            counters.record_hashed(size);
            HashOutcome::Hashed(HashRecord::new(task.path, digest, size))
        }
        Err(err) => {
            debug!(path = %task.path.display(), error = %err, "Failed to hash file");
            HashOutcome::Failed(HashFailure::new(task.path, &err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn task(path: std::path::PathBuf) -> FileTask {
        FileTask::new(path, 0, SystemTime::now())
    }

    #[test]
    fn test_hash_task_success() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "hi").unwrap();
        let counters = PipelineCounters::new();

        let outcome = hash_task(&mut StreamHasher::new(1), task(path.clone()), &counters);

        match outcome {
            HashOutcome::Hashed(record) => {
                assert_eq!(record.path, path);
                assert_eq!(record.size, 2);
                assert_eq!(record.digest.to_hex(), "c22b5f9178342609428d6f51b2c5af4c0bde6a42");
            }
            HashOutcome::Failed(f) => panic!("unexpected failure: {f}"),
        }
        assert_eq!(counters.bytes_hashed(), 2);
    }

    #[test]
    fn test_hash_task_failure_is_explicit() {
        let temp = TempDir::new().unwrap();
        let counters = PipelineCounters::new();

        let outcome = hash_task(
            &mut StreamHasher::new(8),
            task(temp.path().join("vanished.bin")),
            &counters,
        );

        assert!(!outcome.is_hashed());
        assert_eq!(counters.files_hashed(), 0);
    }

    #[test]
    fn test_pool_processes_each_task_once() {
        let temp = TempDir::new().unwrap();
        for i in 0..50 {
            fs::write(temp.path().join(format!("f{i}")), i.to_string()).unwrap();
        }

        let (task_tx, task_rx) = bounded(0);
        let (result_tx, result_rx) = bounded(0);
        let counters = Arc::new(PipelineCounters::new());

        let pool = WorkerPool::spawn(4, &task_rx, &result_tx, 16, &counters).unwrap();
        assert_eq!(pool.len(), 4);
        drop(task_rx);
        drop(result_tx);

        let collector = thread::spawn(move || result_rx.iter().collect::<Vec<_>>());
        for i in 0..50 {
            task_tx.send(task(temp.path().join(format!("f{i}")))).unwrap();
        }
        drop(task_tx);

        assert_eq!(pool.join().unwrap(), 50);
        let outcomes = collector.join().unwrap();
        assert_eq!(outcomes.len(), 50);

        let mut paths: Vec<_> = outcomes.iter().map(|o| o.path().to_path_buf()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 50);
    }
}
