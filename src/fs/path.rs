//! Drive path helpers.
//!
//! Two spellings are used throughout the crate:
//! - a *path* is drive-relative with no leading or trailing slash
//!   (`""` is the root, `"docs/a.txt"` a file);
//! - a *key* is a path as stored in the [`FileList`](crate::fs::FileList),
//!   where directories carry a trailing slash (`"docs/"`).

use crate::error::{DriveError, Result};

/// Normalize user input into a drive path.
///
/// Leading, trailing and doubled slashes are dropped. `.` and `..` segments
/// are rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" => continue,
            "." | ".." => {
                return Err(DriveError::InvalidPath(format!(
                    "relative segment in {}",
                    path
                )))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Join a directory path and an entry name.
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    let name = name.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Key prefix for entries inside `dir` (`""` for the root, `"docs/"` otherwise).
pub fn dir_key(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}

/// Convert a key back into a path (drops the directory slash).
pub fn key_to_path(key: &str) -> &str {
    key.trim_end_matches('/')
}

/// Split a path into its parent directory and final name.
pub fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// URL path segments for a drive path (`drive`, then each component).
pub(crate) fn drive_segments(path: &str) -> Vec<&str> {
    std::iter::once("drive")
        .chain(path.split('/').filter(|s| !s.is_empty()))
        .collect()
}
