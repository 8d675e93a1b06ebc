//! Content hashing for freshness detection using blake3.
//!
//! Hashes are memoized by (path, mtime) so repeated staleness checks during
//! a build do not re-read unchanged files.

use dashmap::DashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::utils::fs::{maybe_stat, mtime_millis};

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash of empty input; used when the backing file is missing.
    pub fn of_empty() -> Self {
        Self(*blake3::Hasher::new().finalize().as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

/// Global hash memo, keyed by path with the mtime as the validity stamp.
static HASH_CACHE: LazyLock<DashMap<PathBuf, (u128, ContentHash)>> = LazyLock::new(DashMap::new);

/// Compute the blake3 hash of a file's contents, or `None` when the file is
/// missing or unreadable.
pub fn compute_file_hash(path: &Path) -> Option<ContentHash> {
    let meta = maybe_stat(path).ok().flatten()?;
    let stamp = mtime_millis(&meta);

    if let Some(cached) = HASH_CACHE.get(path) {
        if cached.0 == stamp {
            return Some(cached.1);
        }
    }

    let hash = hash_reader(File::open(path).ok()?)?;
    HASH_CACHE.insert(path.to_path_buf(), (stamp, hash));
    Some(hash)
}

fn hash_reader(file: File) -> Option<ContentHash> {
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }

    Some(ContentHash::new(*hasher.finalize().as_bytes()))
}
