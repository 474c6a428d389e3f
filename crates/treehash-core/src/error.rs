//! Error types, exit codes and walk warnings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process outcome classes. Each class has exactly one exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitKind {
    /// The whole tree was processed.
    Success,
    /// No root path was given.
    RootEmpty,
    /// The root path does not exist or cannot be reached.
    RootInvalid,
    /// The root path is a file, not a directory.
    RootNotDirectory,
    /// The output file cannot be opened.
    OutputPath,
    /// Permission denied on the root or the output file.
    Permission,
    /// The tree contained nothing to process.
    NoChildren,
    /// A pipeline stage could not be started or failed mid-run.
    Internal,
    /// The command line could not be parsed.
    Usage,
}

impl ExitKind {
    /// Integer process exit code for this class.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RootEmpty => 1,
            Self::RootInvalid => 2,
            Self::RootNotDirectory => 3,
            Self::OutputPath => 4,
            Self::Permission => 5,
            Self::NoChildren => 6,
            Self::Internal => 7,
            Self::Usage => 8,
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum TreeHashError {
    /// No root path was given.
    #[error("Root path cannot be empty")]
    RootEmpty,

    /// Root path does not exist or is unreachable.
    #[error("Not a valid path: {path}: {source}")]
    RootInvalid {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Output file could not be opened.
    #[error("Cannot open output file {path}: {source}")]
    OutputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// The tree yielded no files.
    #[error("No files found under {path}")]
    NoChildren { path: PathBuf },

    /// Filter pattern failed to compile.
    #[error("Invalid filter pattern {pattern:?}: {message}")]
    InvalidFilter { pattern: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A pipeline thread could not be started.
    #[error("Failed to start {stage}: {message}")]
    Spawn { stage: &'static str, message: String },

    /// Writing to the output sink failed mid-run.
    #[error("Write error on {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline thread panicked.
    #[error("{stage} thread panicked")]
    StagePanicked { stage: &'static str },
}

impl TreeHashError {
    /// Create a root-path error from an I/O failure, classified by kind.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::RootInvalid { path, source },
        }
    }

    /// Create an output-path error from an I/O failure, classified by kind.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::OutputPath { path, source },
        }
    }

    /// Create a filter compilation error.
    pub fn invalid_filter(pattern: &str, error: impl std::fmt::Display) -> Self {
        Self::InvalidFilter {
            pattern: pattern.to_string(),
            message: error.to_string(),
        }
    }

    /// Exit class for this error.
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            Self::RootEmpty => ExitKind::RootEmpty,
            Self::RootInvalid { .. } => ExitKind::RootInvalid,
            Self::NotADirectory { .. } => ExitKind::RootNotDirectory,
            Self::OutputPath { .. } => ExitKind::OutputPath,
            Self::PermissionDenied { .. } => ExitKind::Permission,
            Self::NoChildren { .. } => ExitKind::NoChildren,
            Self::InvalidFilter { .. }
            | Self::InvalidConfig { .. }
            | Self::Spawn { .. }
            | Self::Write { .. }
            | Self::StagePanicked { .. } => ExitKind::Internal,
        }
    }

    /// Whether this error was raised before any pipeline stage started.
    pub fn is_startup(&self) -> bool {
        !matches!(self.exit_kind(), ExitKind::Internal | ExitKind::NoChildren)
    }
}

/// Kind of walk warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error listing a directory.
    ReadError,
    /// Error reading entry metadata.
    MetadataError,
}

/// Non-fatal problem encountered while walking; the entry is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl WalkWarning {
    /// Create a new walk warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a directory that could not be listed.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self {
                message: format!("Permission denied: {}", path.display()),
                path,
                kind: WarningKind::PermissionDenied,
            };
        }
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }

    /// Create a warning for an entry whose metadata could not be read.
    pub fn metadata_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(path, format!("Metadata error: {error}"), WarningKind::MetadataError)
    }
}
