//! Drive entries, the cached file list, and drive operations.

pub(crate) mod entry;
pub(crate) mod listing;
mod operations;
pub mod path;

pub use entry::{EntryKind, FileEntry};
pub use listing::FileList;
