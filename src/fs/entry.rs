//! File list entry types.

use serde::{Deserialize, Serialize};

use super::path::key_to_path;

/// Whether an entry is a directory or a leaf file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One cached file record: a drive-relative key, directories ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
}

impl FileEntry {
    /// Build an entry from a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Build the key for `name` inside the directory key prefix `dir_key`.
    pub fn in_dir(dir_key: &str, name: &str, is_directory: bool) -> Self {
        let mut key = format!("{}{}", dir_key, name.trim_matches('/'));
        if is_directory {
            key.push('/');
        }
        Self { key }
    }

    pub fn kind(&self) -> EntryKind {
        if self.is_directory() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    pub fn is_directory(&self) -> bool {
        self.key.ends_with('/')
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    /// Final path component, without the directory slash.
    pub fn name(&self) -> &str {
        let path = key_to_path(&self.key);
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Path of this entry (key without the directory slash).
    pub fn path(&self) -> &str {
        key_to_path(&self.key)
    }

    /// Key prefix of the containing directory (`""` at the root).
    pub fn parent_key(&self) -> &str {
        let path = key_to_path(&self.key);
        match path.rfind('/') {
            Some(idx) => &self.key[..idx + 1],
            None => "",
        }
    }

    /// Number of directories above this entry.
    pub fn depth(&self) -> usize {
        key_to_path(&self.key).matches('/').count()
    }
}
