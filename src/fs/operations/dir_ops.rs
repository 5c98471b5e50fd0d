//! Directory and entry mutation operations.

use tracing::info;

use crate::error::{DriveError, Result};
use crate::fs::entry::FileEntry;
use crate::fs::path::{dir_key, join_path, normalize_path, split_path};
use crate::session::Session;

impl Session {
    /// Create a new directory `name` inside `dir`.
    ///
    /// # Example
    /// ```no_run
    /// # use efsdrive::{ClientConfig, Session};
    /// # async fn example() -> efsdrive::Result<()> {
    /// let mut session = Session::signin(ClientConfig::default(), "alice", "password").await?;
    /// let entry = session.mkdir("docs", "invoices").await?;
    /// assert_eq!(entry.key, "docs/invoices/");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn mkdir(&mut self, dir: &str, name: &str) -> Result<FileEntry> {
        let dir = normalize_path(dir)?;
        let name = valid_name(name)?;

        self.refresh_auth().await?;
        let res = self.api.create_dir(&dir, name).await;
        self.check_auth(res)?;
        info!("Created directory /{}", join_path(&dir, name));

        let entry = FileEntry::in_dir(&dir_key(&dir), name, true);
        self.files.push(entry.clone());
        self.resync_dir(&dir).await;
        Ok(entry)
    }

    /// Create a directory from a full path (`"docs/invoices"`).
    pub async fn mkdir_path(&mut self, path: &str) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        let (dir, name) = split_path(&path);
        if name.is_empty() {
            return Err(DriveError::InvalidPath("empty directory name".to_string()));
        }
        let (dir, name) = (dir.to_string(), name.to_string());
        self.mkdir(&dir, &name).await
    }

    /// Remove a file or directory.
    pub async fn rm(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(DriveError::InvalidPath("cannot remove the root".to_string()));
        }

        self.refresh_auth().await?;
        let res = self.api.delete(&path).await;
        self.check_auth(res)?;
        info!("Removed /{}", path);

        self.files.remove(&path);
        self.files.remove(&dir_key(&path));
        let parent = split_path(&path).0.to_string();
        self.resync_dir(&parent).await;
        Ok(())
    }

    /// Rename an entry in the cached file list.
    ///
    /// Keys follow the file list convention: directories end with `/`.
    /// Renaming a directory rewrites every cached key below it. The backend
    /// offers no rename endpoint, so nothing is sent to the server.
    ///
    /// # Returns
    /// The number of rewritten entries
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> Result<usize> {
        let renamed = self.files.rename(old_key, new_key)?;
        info!("Renamed {} to {} ({} entries)", old_key, new_key, renamed);
        Ok(renamed)
    }
}

/// Check a single path component.
pub(super) fn valid_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(DriveError::InvalidPath(format!("invalid name: {:?}", name)));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name() {
        assert_eq!(valid_name(" report.pdf ").unwrap(), "report.pdf");
        assert!(valid_name("").is_err());
        assert!(valid_name("..").is_err());
        assert!(valid_name("a/b").is_err());
    }
}
