//! Units of work flowing through the pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Length in bytes of a SHA-1 digest.
pub const DIGEST_LEN: usize = 20;

/// SHA-1 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// Create a new Digest from raw bytes.
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a lower-case hex string.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A regular file discovered by the walker, awaiting hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Path joined onto the root exactly as the root was given.
    pub path: PathBuf,
    /// Size reported by the directory listing.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl FileTask {
    /// Create a new file task.
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }
}

/// A completed fingerprint, written as one output line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashRecord {
    /// Path of the hashed file.
    pub path: PathBuf,
    /// Digest of the full content.
    pub digest: Digest,
    /// Number of bytes hashed.
    pub size: u64,
}

impl HashRecord {
    /// Create a new hash record.
    pub fn new(path: impl Into<PathBuf>, digest: Digest, size: u64) -> Self {
        Self {
            path: path.into(),
            digest,
            size,
        }
    }
}

/// Formats the record as `path,hexdigest,size` without a trailing newline.
impl fmt::Display for HashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.path.display(), self.digest, self.size)
    }
}

/// A file that could not be opened or read to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFailure {
    /// Path of the file.
    pub path: PathBuf,
    /// Description of the I/O failure.
    pub cause: String,
}

impl HashFailure {
    /// Create a failure from an I/O error.
    pub fn new(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self {
            path: path.into(),
            cause: error.to_string(),
        }
    }
}

impl fmt::Display for HashFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.path.display(), self.cause)
    }
}

/// Per-file result produced by a hash worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    /// The whole file was hashed.
    Hashed(HashRecord),
    /// Opening or reading the file failed; no digest is reported.
    Failed(HashFailure),
}

impl HashOutcome {
    /// Path of the file this outcome describes.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Hashed(record) => &record.path,
            Self::Failed(failure) => &failure.path,
        }
    }

    /// Check if hashing succeeded.
    pub fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}
