//! Directory identity tracking for symlink loop detection.

use std::fs::Metadata;

use dashmap::DashSet;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Identity of a directory on disk: (device, inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId {
    /// Device ID.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
}

impl DirId {
    /// Create a new directory identity.
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Read the identity from metadata, if the platform exposes one.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Tracks directories already entered when symlinks are followed.
///
/// A symlink pointing back up the tree would otherwise make the walk
/// endless. Uses a concurrent set because every walker consults it.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: DashSet<DirId>,
}

impl VisitedDirs {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track a directory. Returns `true` if this is the first time seeing it.
    pub fn first_visit(&self, id: DirId) -> bool {
        self.seen.insert(id)
    }
}
