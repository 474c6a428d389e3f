//! Streaming SHA-1 hashing with a reusable buffer.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use sha1::{Digest as _, Sha1};

use treehash_core::{DIGEST_LEN, Digest};

/// Hashes byte streams in fixed-size chunks.
///
/// The buffer is allocated once and reused for every stream, so peak
/// memory does not depend on file size.
#[derive(Debug)]
pub struct StreamHasher {
    buffer: Vec<u8>,
}

impl StreamHasher {
    /// Create a hasher reading `buffer_size` bytes per chunk.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![0u8; buffer_size.max(1)],
        }
    }

    /// Size of the reusable read buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Hash everything `reader` yields. Returns the digest and byte count.
    pub fn hash_reader<R: Read>(&mut self, mut reader: R) -> io::Result<(Digest, u64)> {
        let mut hasher = Sha1::new();
        let mut total: u64 = 0;

        loop {
            let bytes_read = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&self.buffer[..bytes_read]);
            total += bytes_read as u64;
        }

        Ok((finish(hasher), total))
    }

    /// Open, hash and close one file.
    pub fn hash_file(&mut self, path: &Path) -> io::Result<(Digest, u64)> {
        let file = File::open(path)?;
        self.hash_reader(file)
    }
}

/// Digest of an in-memory byte slice.
pub fn digest_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha1::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Sha1) -> Digest {
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&hasher.finalize());
    Digest::new(bytes)
}
