//! Single serial consumer of hash outcomes.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use treehash_core::{HashOutcome, PipelineCounters, TreeHashError};

use crate::progress::{PROGRESS_INTERVAL, ProgressReporter};

/// Appends one `path,hexdigest,size` line per hashed file to the output sink.
///
/// Records are written in arrival order. Files that failed to hash are
/// never written to the output; they are counted, logged, and appended to
/// the optional error sink as `path,cause` lines.
pub struct RecordWriter<W: Write> {
    sink: BufWriter<W>,
    sink_path: PathBuf,
    errors: Option<BufWriter<Box<dyn Write + Send>>>,
    counters: Arc<PipelineCounters>,
    progress: Option<ProgressReporter>,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer over `sink`. `sink_path` is only used in error messages.
    pub fn new(sink: W, sink_path: impl Into<PathBuf>, counters: Arc<PipelineCounters>) -> Self {
        Self {
            sink: BufWriter::new(sink),
            sink_path: sink_path.into(),
            errors: None,
            counters,
            progress: None,
        }
    }

    /// Record failed files to a secondary sink.
    pub fn with_error_sink(mut self, errors: Box<dyn Write + Send>) -> Self {
        self.errors = Some(BufWriter::new(errors));
        self
    }

    pub(crate) fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Drain `results` until it is closed and empty, then flush.
    ///
    /// Returns the underlying sink so callers can inspect or reuse it.
    pub fn run(mut self, results: Receiver<HashOutcome>) -> Result<W, TreeHashError> {
        for outcome in results.iter() {
            match outcome {
                HashOutcome::Hashed(record) => {
                    writeln!(self.sink, "{record}").map_err(|e| self.write_error(e))?;
                    self.counters.record_written();
                    if self.counters.records_written() % PROGRESS_INTERVAL == 0 {
                        self.publish();
                    }
                }
                HashOutcome::Failed(failure) => {
                    self.counters.record_failed();
                    warn!(path = %failure.path.display(), cause = %failure.cause, "File could not be hashed");
                    if let Some(errors) = self.errors.as_mut() {
                        if let Err(e) = writeln!(errors, "{failure}") {
                            warn!(error = %e, "Failed to write to error log");
                        }
                    }
                }
            }
        }

        if let Some(errors) = self.errors.as_mut() {
            if let Err(e) = errors.flush() {
                warn!(error = %e, "Failed to flush error log");
            }
        }
        self.publish();

        debug!(
            written = self.counters.records_written(),
            failed = self.counters.files_failed(),
            "Writer drained"
        );

        let path = self.sink_path;
        self.sink.into_inner().map_err(|e| TreeHashError::Write {
            path,
            source: e.into_error(),
        })
    }

    fn publish(&self) {
        if let Some(progress) = &self.progress {
            progress.publish(&self.counters);
        }
    }

    fn write_error(&self, source: std::io::Error) -> TreeHashError {
        TreeHashError::Write {
            path: self.sink_path.clone(),
            source,
        }
    }
}

impl<W: Write + Send + 'static> RecordWriter<W> {
    /// Run the writer on its own thread.
    pub fn spawn(
        self,
        results: Receiver<HashOutcome>,
    ) -> Result<JoinHandle<Result<W, TreeHashError>>, TreeHashError> {
        thread::Builder::new()
            .name("treehash-writer".to_string())
            .spawn(move || self.run(results))
            .map_err(|e| TreeHashError::Spawn {
                stage: "writer",
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io;
    use std::sync::Mutex;
    use treehash_core::{DIGEST_LEN, Digest, HashFailure, HashRecord};

    /// Error sink that can be inspected after the writer drops its handle.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_writes_records_and_diverts_failures() {
        let counters = Arc::new(PipelineCounters::new());
        let errors = SharedBuf::default();
        let (tx, rx) = bounded(4);

        tx.send(HashOutcome::Hashed(HashRecord::new(
            "root/a.txt",
            Digest::new([0x11; DIGEST_LEN]),
            2,
        )))
        .unwrap();
        tx.send(HashOutcome::Failed(HashFailure::new(
            "root/locked",
            &io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )))
        .unwrap();
        drop(tx);

        let output = RecordWriter::new(Vec::new(), "out.txt", Arc::clone(&counters))
            .with_error_sink(Box::new(errors.clone()))
            .run(rx)
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, format!("root/a.txt,{},2\n", "11".repeat(DIGEST_LEN)));
        assert_eq!(counters.records_written(), 1);
        assert_eq!(counters.files_failed(), 1);

        let logged = String::from_utf8(errors.0.lock().unwrap().clone()).unwrap();
        assert!(logged.starts_with("root/locked,"));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let counters = Arc::new(PipelineCounters::new());
        let (tx, rx) = bounded(1);
        tx.send(HashOutcome::Hashed(HashRecord::new(
            "a",
            Digest::new([0; DIGEST_LEN]),
            0,
        )))
        .unwrap();
        drop(tx);

        let result = RecordWriter::new(FailingSink, "out.txt", counters).run(rx);
        assert!(matches!(result, Err(TreeHashError::Write { .. })));
    }

    #[test]
    fn test_empty_queue_produces_empty_output() {
        let (tx, rx) = bounded::<HashOutcome>(0);
        drop(tx);
        let output = RecordWriter::new(Vec::new(), "out.txt", Arc::new(PipelineCounters::new()))
            .run(rx)
            .unwrap();
        assert!(output.is_empty());
    }
}
