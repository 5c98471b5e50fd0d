//! Directory browsing.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::{DriveError, Result};
use crate::fs::entry::FileEntry;
use crate::fs::path::{dir_key, key_to_path, normalize_path};
use crate::session::Session;

impl Session {
    /// List a directory.
    ///
    /// Fetches one level from the server, merges it into the cached file
    /// list, and returns the directory's direct children.
    ///
    /// # Arguments
    /// * `dir` - Directory path (`""` or `"/"` for the root, `"docs"`, ...)
    pub async fn list(&mut self, dir: &str) -> Result<Vec<FileEntry>> {
        let dir = normalize_path(dir)?;
        self.fetch_dir(&dir).await?;
        Ok(self.files.children(&dir).into_iter().cloned().collect())
    }

    /// List a directory and every directory below it.
    ///
    /// Returns all entries under `dir`, fetched level by level. A
    /// subdirectory that cannot be listed is skipped with a warning; the
    /// backend answers an empty subdirectory with a server error.
    pub async fn list_recursive(&mut self, dir: &str) -> Result<Vec<FileEntry>> {
        let dir = normalize_path(dir)?;
        self.fetch_dir(&dir).await?;
        let mut pending = VecDeque::from([dir.clone()]);

        while let Some(next) = pending.pop_front() {
            if next != dir {
                match self.fetch_dir(&next).await {
                    Ok(_) => {}
                    Err(DriveError::Unauthorized) => return Err(DriveError::Unauthorized),
                    Err(e) => {
                        warn!("Skipping /{}: {}", next, e);
                        continue;
                    }
                }
            }
            for child in self.files.children(&next) {
                if child.is_directory() {
                    pending.push_back(child.path().to_string());
                }
            }
        }

        Ok(self.files.descendants(&dir).into_iter().cloned().collect())
    }

    /// Open a folder by key.
    ///
    /// The folder is fetched only when none of its children are cached yet.
    /// Returns `true` if a request was made.
    pub async fn open_folder(&mut self, key: &str) -> Result<bool> {
        if !key.is_empty() && !key.ends_with('/') {
            return Err(DriveError::InvalidPath(format!("{} is not a folder", key)));
        }
        if self.files.children_loaded(key) {
            debug!("Children of /{} already cached", key);
            return Ok(false);
        }
        self.fetch_dir(key_to_path(key)).await?;
        Ok(true)
    }

    /// Look up a cached entry by path. Tries the file key, then the
    /// directory key.
    pub fn stat(&self, path: &str) -> Option<&FileEntry> {
        let path = normalize_path(path).ok()?;
        if path.is_empty() {
            return None;
        }
        self.files
            .get(&path)
            .or_else(|| self.files.get(&dir_key(&path)))
    }

    /// Direct children of `dir` from the cache, without a request.
    pub fn cached_children(&self, dir: &str) -> Vec<&FileEntry> {
        match normalize_path(dir) {
            Ok(dir) => self.files.children(&dir),
            Err(_) => Vec::new(),
        }
    }

    /// Refresh the token if due, then fetch and merge one level.
    pub(crate) async fn fetch_dir(&mut self, dir: &str) -> Result<usize> {
        self.refresh_auth().await?;
        let res = self.api.list_dir(dir).await;
        let listing = self.check_auth(res)?;
        let added = self.files.merge_listing(dir, &listing);
        debug!("Merged /{}: {} entries, {} new", dir, listing.len(), added);
        Ok(added)
    }

    /// Re-fetch a directory after a mutation. Failures are logged, not
    /// returned, since the mutation itself already succeeded.
    pub(crate) async fn resync_dir(&mut self, dir: &str) {
        let res = self.api.list_dir(dir).await;
        match self.check_auth(res) {
            Ok(listing) => {
                self.files.merge_listing(dir, &listing);
            }
            Err(e) => warn!("Could not re-list /{}: {}", dir, e),
        }
    }
}
