//! Download operations.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use futures::StreamExt;
use tracing::info;

use crate::error::{DriveError, Result};
use crate::fs::path::{normalize_path, split_path};
use crate::progress::TransferProgress;
use crate::session::{sleep_until_opt, Session};

impl Session {
    /// Download a drive file to a writer.
    ///
    /// The response body is streamed; the progress callback is called after
    /// every chunk and may cancel the transfer. The token is refreshed while
    /// the body is still arriving.
    ///
    /// # Returns
    /// Number of bytes written
    pub async fn download<W: Write + ?Sized>(&mut self, path: &str, writer: &mut W) -> Result<u64> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(DriveError::InvalidPath("the root is a directory".to_string()));
        }
        let filename = split_path(&path).1.to_string();

        self.refresh_auth().await?;
        let res = self.api.download(&path).await;
        let response = self.check_auth(res)?;
        let total = response.content_length();

        let mut done = 0u64;
        let mut stream = response.bytes_stream();
        let mut wake = self.next_refresh_due();
        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = sleep_until_opt(wake) => {
                    wake = self.keep_alive().await?;
                    continue;
                }
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            done += chunk.len() as u64;

            let progress = TransferProgress::new(done, total, &filename);
            if !self.report_progress(&progress) {
                return Err(DriveError::Cancelled);
            }
        }
        writer.flush()?;

        info!("Downloaded /{} ({} bytes)", path, done);
        Ok(done)
    }

    /// Download a drive file to a local path.
    ///
    /// A partially written file is removed if the transfer fails.
    pub async fn download_to_file<P: AsRef<Path>>(&mut self, path: &str, local: P) -> Result<u64> {
        let local = local.as_ref();
        let file = File::create(local)?;
        let mut writer = BufWriter::new(file);

        match self.download(path, &mut writer).await {
            Ok(n) => Ok(n),
            Err(e) => {
                drop(writer);
                let _ = std::fs::remove_file(local);
                Err(e)
            }
        }
    }

    /// Absolute URL of a drive file, for opening it in another program.
    ///
    /// The URL only works with the session cookie attached.
    pub fn download_url(&self, path: &str) -> Result<String> {
        self.api.download_url(&normalize_path(path)?)
    }
}
