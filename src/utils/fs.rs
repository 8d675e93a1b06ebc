//! Filesystem helpers shared by the resolver and the execution cache.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Stat a path, mapping "not found" to `None`.
pub fn maybe_stat(path: &Path) -> io::Result<Option<Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create the parent directories of an output path.
pub fn prepare_output(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Modification time, defaulting to the epoch when the platform does not
/// report one.
pub fn mtime(meta: &Metadata) -> SystemTime {
    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Modification time in whole milliseconds since the epoch.
pub fn mtime_millis(meta: &Metadata) -> u128 {
    mtime(meta)
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_maybe_stat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");

        assert!(maybe_stat(&path).unwrap().is_none());

        fs::write(&path, "x").unwrap();
        assert!(maybe_stat(&path).unwrap().is_some());
    }

    #[test]
    fn test_prepare_output_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");

        prepare_output(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());

        // idempotent
        prepare_output(&path).unwrap();
    }

    #[test]
    fn test_prepare_output_bare_name() {
        prepare_output(Path::new("bare.txt")).unwrap();
    }
}
