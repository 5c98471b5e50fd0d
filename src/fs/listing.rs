//! Flat cache of drive entries, merged one directory level at a time.
//!
//! The drive is browsed lazily: opening a directory fetches only its direct
//! children. Merging a fresh listing must not clobber deeper levels that were
//! loaded earlier, so reconciliation is scoped to the direct children of the
//! listed directory.

use super::entry::FileEntry;
use super::path::dir_key;
use crate::api::ListedFile;
use crate::error::{DriveError, Result};

/// Ordered list of cached entries. No two entries share a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList {
    entries: Vec<FileEntry>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Insert an entry, replacing an existing entry with the same key in place.
    ///
    /// Returns `true` if the key was new.
    pub fn push(&mut self, entry: FileEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => {
                *existing = entry;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    /// Merge one directory level returned by the backend.
    ///
    /// Listed entries are inserted or replaced. Direct children of `dir` that
    /// the backend no longer lists are removed along with everything below
    /// them. Subtrees of directories that are still listed are untouched.
    ///
    /// Returns the number of new keys.
    pub fn merge_listing(&mut self, dir: &str, listing: &[ListedFile]) -> usize {
        let prefix = dir_key(dir);
        let fresh: Vec<FileEntry> = listing
            .iter()
            .filter(|f| !f.name.trim_matches('/').is_empty())
            .map(|f| FileEntry::in_dir(&prefix, &f.name, f.is_directory))
            .collect();

        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.parent_key() == prefix && !fresh.iter().any(|f| f.key == e.key))
            .map(|e| e.key.clone())
            .collect();
        for key in &stale {
            self.remove(key);
        }

        fresh.into_iter().filter(|e| self.push(e.clone())).count()
    }

    /// Whether anything below the directory key `dir_key` is cached.
    pub fn children_loaded(&self, dir_key: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.key.len() > dir_key.len() && e.key.starts_with(dir_key))
    }

    /// Direct children of the directory path `dir`, in list order.
    pub fn children(&self, dir: &str) -> Vec<&FileEntry> {
        let prefix = dir_key(dir);
        self.entries
            .iter()
            .filter(|e| e.parent_key() == prefix)
            .collect()
    }

    /// Every cached entry below the directory path `dir`.
    pub fn descendants(&self, dir: &str) -> Vec<&FileEntry> {
        let prefix = dir_key(dir);
        self.entries
            .iter()
            .filter(|e| e.key.len() > prefix.len() && e.key.starts_with(&prefix))
            .collect()
    }

    /// Remove `key`, and everything below it when it is a directory.
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        if key.ends_with('/') {
            self.entries.retain(|e| !e.key.starts_with(key));
        } else {
            self.entries.retain(|e| e.key != key);
        }
        before - self.entries.len()
    }

    /// Rewrite `old_key` to `new_key`, carrying a directory's subtree along.
    ///
    /// Both keys must be of the same kind. Returns the number of rewritten
    /// entries.
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> Result<usize> {
        if old_key.ends_with('/') != new_key.ends_with('/') {
            return Err(DriveError::InvalidPath(format!(
                "cannot rename {} to {}: entry kinds differ",
                old_key, new_key
            )));
        }
        if old_key == new_key {
            return Ok(0);
        }
        if !self.contains(old_key) {
            return Err(DriveError::NotFound(old_key.to_string()));
        }
        if self.contains(new_key) {
            return Err(DriveError::AlreadyExists(new_key.to_string()));
        }
        if old_key.ends_with('/') && new_key.starts_with(old_key) {
            return Err(DriveError::InvalidPath(format!(
                "cannot move {} inside itself",
                old_key
            )));
        }

        let is_dir = old_key.ends_with('/');
        let moves = |key: &str| {
            if is_dir {
                key.starts_with(old_key)
            } else {
                key == old_key
            }
        };
        // A cached descendant of the target can exist without the target
        // itself, so every rewritten key is checked before anything changes.
        for entry in self.entries.iter().filter(|e| moves(&e.key)) {
            let target = format!("{}{}", new_key, &entry.key[old_key.len()..]);
            if self.entries.iter().any(|e| e.key == target && !moves(&e.key)) {
                return Err(DriveError::AlreadyExists(target));
            }
        }

        let mut renamed = 0;
        for entry in &mut self.entries {
            if moves(&entry.key) {
                entry.key = format!("{}{}", new_key, &entry.key[old_key.len()..]);
                renamed += 1;
            }
        }
        Ok(renamed)
    }

    /// Directory path a new upload or folder should go to, given the current
    /// selection.
    ///
    /// Nothing selected or a root-level file selects the root. A selected
    /// directory is used as is; a selected file yields its parent directory.
    pub fn upload_dir_for(selection: Option<&str>) -> String {
        let Some(selected) = selection else {
            return String::new();
        };
        // Cutting at the last slash covers both cases: "docs/" -> "docs",
        // "docs/a.txt" -> "docs".
        selected
            .rfind('/')
            .map(|idx| selected[..idx].to_string())
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &FileList) -> Vec<&str> {
        list.iter().map(|e| e.key.as_str()).collect()
    }

    fn root_listing() -> Vec<ListedFile> {
        vec![
            ListedFile::dir("docs"),
            ListedFile::file("readme.md"),
            ListedFile::dir("pics"),
        ]
    }

    #[test]
    fn test_push_replaces_in_place() {
        let mut list = FileList::new();
        assert!(list.push(FileEntry::new("a.txt")));
        assert!(list.push(FileEntry::new("b.txt")));
        assert!(!list.push(FileEntry::new("a.txt")));
        assert_eq!(keys(&list), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_merge_root_listing() {
        let mut list = FileList::new();
        let added = list.merge_listing("", &root_listing());
        assert_eq!(added, 3);
        assert_eq!(keys(&list), vec!["docs/", "readme.md", "pics/"]);
    }

    #[test]
    fn test_merge_keeps_loaded_subtrees() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        list.merge_listing(
            "docs",
            &[ListedFile::file("a.txt"), ListedFile::dir("notes")],
        );
        list.merge_listing("docs/notes", &[ListedFile::file("todo.md")]);

        // Re-listing the root must not drop anything under docs/.
        let added = list.merge_listing("", &root_listing());
        assert_eq!(added, 0);
        assert_eq!(
            keys(&list),
            vec![
                "docs/",
                "readme.md",
                "pics/",
                "docs/a.txt",
                "docs/notes/",
                "docs/notes/todo.md"
            ]
        );
    }

    #[test]
    fn test_merge_prunes_vanished_children_only() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        list.merge_listing("docs", &[ListedFile::file("a.txt")]);
        list.merge_listing("pics", &[ListedFile::file("cat.png")]);

        // pics/ disappeared on the server.
        list.merge_listing("", &[ListedFile::dir("docs"), ListedFile::file("readme.md")]);
        assert_eq!(keys(&list), vec!["docs/", "readme.md", "docs/a.txt"]);
    }

    #[test]
    fn test_merge_never_duplicates() {
        let mut list = FileList::new();
        for _ in 0..3 {
            list.merge_listing("", &root_listing());
            list.merge_listing("docs", &[ListedFile::file("a.txt")]);
        }
        let mut all = keys(&list);
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_children_loaded() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        assert!(!list.children_loaded("docs/"));
        list.merge_listing("docs", &[ListedFile::file("a.txt")]);
        assert!(list.children_loaded("docs/"));
        assert!(!list.children_loaded("pics/"));
        // Prefix match is literal, not a pattern.
        list.push(FileEntry::new("a+b/"));
        assert!(!list.children_loaded("a+b/"));
    }

    #[test]
    fn test_children_and_descendants() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        list.merge_listing("docs", &[ListedFile::file("a.txt"), ListedFile::dir("notes")]);
        list.merge_listing("docs/notes", &[ListedFile::file("todo.md")]);

        let children: Vec<&str> = list.children("docs").iter().map(|e| e.name()).collect();
        assert_eq!(children, vec!["a.txt", "notes"]);
        assert_eq!(list.descendants("docs").len(), 3);
        assert_eq!(list.children("").len(), 3);
    }

    #[test]
    fn test_remove_directory_subtree() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        list.merge_listing("docs", &[ListedFile::file("a.txt")]);
        assert_eq!(list.remove("docs/"), 2);
        assert_eq!(keys(&list), vec!["readme.md", "pics/"]);
        assert_eq!(list.remove("missing.txt"), 0);
    }

    #[test]
    fn test_rename_directory_moves_subtree() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        list.merge_listing("docs", &[ListedFile::file("a.txt"), ListedFile::dir("notes")]);

        let renamed = list.rename("docs/", "papers/").unwrap();
        assert_eq!(renamed, 3);
        assert!(list.contains("papers/"));
        assert!(list.contains("papers/a.txt"));
        assert!(list.contains("papers/notes/"));
        assert!(!list.children_loaded("docs/"));
    }

    #[test]
    fn test_rename_file_is_exact() {
        let mut list = FileList::new();
        list.push(FileEntry::new("a.txt"));
        list.push(FileEntry::new("a.txt.bak"));
        assert_eq!(list.rename("a.txt", "b.txt").unwrap(), 1);
        assert_eq!(keys(&list), vec!["b.txt", "a.txt.bak"]);
    }

    #[test]
    fn test_rename_errors() {
        let mut list = FileList::new();
        list.merge_listing("", &root_listing());
        assert!(matches!(
            list.rename("docs/", "readme.md"),
            Err(DriveError::InvalidPath(_))
        ));
        assert!(matches!(
            list.rename("docs/", "pics/"),
            Err(DriveError::AlreadyExists(_))
        ));
        assert!(matches!(
            list.rename("nope/", "other/"),
            Err(DriveError::NotFound(_))
        ));
        assert!(matches!(
            list.rename("docs/", "docs/inner/"),
            Err(DriveError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_rename_onto_cached_descendant_is_rejected() {
        let mut list = FileList::new();
        list.push(FileEntry::new("a/"));
        list.push(FileEntry::new("a/x"));
        list.push(FileEntry::new("b/x"));

        assert!(matches!(
            list.rename("a/", "b/"),
            Err(DriveError::AlreadyExists(key)) if key == "b/x"
        ));
        assert_eq!(keys(&list), vec!["a/", "a/x", "b/x"]);

        // No overlap below the target, so the move goes through.
        list.push(FileEntry::new("a/y"));
        list.remove("a/x");
        assert_eq!(list.rename("a/", "b/").unwrap(), 2);
        assert_eq!(keys(&list), vec!["b/", "b/x", "b/y"]);
    }

    #[test]
    fn test_upload_dir_for_selection() {
        assert_eq!(FileList::upload_dir_for(None), "");
        assert_eq!(FileList::upload_dir_for(Some("readme.md")), "");
        assert_eq!(FileList::upload_dir_for(Some("docs/")), "docs");
        assert_eq!(FileList::upload_dir_for(Some("docs/notes/")), "docs/notes");
        assert_eq!(FileList::upload_dir_for(Some("docs/a.txt")), "docs");
    }
}
