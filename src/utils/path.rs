//! Logical path helpers.
//!
//! Logical target paths are slash-separated and relative to the source root;
//! these helpers mirror posix `dirname`/`extname` semantics on such strings
//! without touching the filesystem.

/// Parent directory of a logical path (`"."` when there is none).
#[inline]
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or(".", |(dir, _)| dir)
}

/// Final segment of a logical path.
#[inline]
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Extension of the final segment, with its leading dot (`""` when absent).
///
/// A leading dot alone (`.hidden`) does not count as an extension.
#[inline]
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i..],
        _ => "",
    }
}
