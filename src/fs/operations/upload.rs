//! Upload operations.

use std::path::Path;

use tracing::info;

use super::dir_ops::valid_name;
use crate::error::{DriveError, Result};
use crate::fs::entry::FileEntry;
use crate::fs::path::{dir_key, join_path, normalize_path};
use crate::progress::TransferProgress;
use crate::session::{sleep_until_opt, Session};

impl Session {
    /// Upload a local file into the drive directory `remote_dir`.
    ///
    /// The remote file keeps the local file name.
    ///
    /// # Example
    /// ```no_run
    /// # use efsdrive::{ClientConfig, Session};
    /// # async fn example() -> efsdrive::Result<()> {
    /// let mut session = Session::signin(ClientConfig::default(), "alice", "password").await?;
    /// let entry = session.upload("report.pdf", "docs").await?;
    /// assert_eq!(entry.key, "docs/report.pdf");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn upload<P: AsRef<Path>>(&mut self, local: P, remote_dir: &str) -> Result<FileEntry> {
        let local = local.as_ref();
        let filename = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DriveError::InvalidPath(format!("no file name in {}", local.display()))
            })?
            .to_string();
        let data = tokio::fs::read(local).await?;
        self.upload_from_bytes(data, &filename, remote_dir).await
    }

    /// Upload an in-memory buffer as `filename` into `remote_dir`.
    ///
    /// The token is refreshed if the request outlasts the refresh deadline.
    pub async fn upload_from_bytes(
        &mut self,
        data: Vec<u8>,
        filename: &str,
        remote_dir: &str,
    ) -> Result<FileEntry> {
        let dir = normalize_path(remote_dir)?;
        let filename = valid_name(filename)?.to_string();
        let size = data.len() as u64;

        if !self.report_progress(&TransferProgress::new(0, Some(size), &filename)) {
            return Err(DriveError::Cancelled);
        }

        self.refresh_auth().await?;
        let http = self.api.http().clone();
        let request = self.api.upload_request(&dir, &filename, data)?;
        let send = http.send(request);
        tokio::pin!(send);
        let mut wake = self.next_refresh_due();
        let response = loop {
            tokio::select! {
                res = &mut send => break res,
                _ = sleep_until_opt(wake) => {
                    wake = self.keep_alive().await?;
                }
            }
        };
        let res = self.api.finish_upload(response, &dir, &filename).await;
        self.check_auth(res)?;
        info!("Uploaded {} bytes to /{}", size, join_path(&dir, &filename));

        self.report_progress(&TransferProgress::new(size, Some(size), &filename));

        let entry = FileEntry::in_dir(&dir_key(&dir), &filename, false);
        self.files.push(entry.clone());
        self.resync_dir(&dir).await;
        Ok(entry)
    }

    /// Upload into the directory implied by a file list selection.
    ///
    /// See [`crate::fs::FileList::upload_dir_for`].
    pub async fn upload_to_selection<P: AsRef<Path>>(
        &mut self,
        local: P,
        selection: Option<&str>,
    ) -> Result<FileEntry> {
        let dir = crate::fs::FileList::upload_dir_for(selection);
        self.upload(local, &dir).await
    }
}
