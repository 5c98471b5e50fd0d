//! Actor-based session runtime with background token refresh.
//!
//! The actor owns the [`Session`]. Callers talk to it through a cloneable
//! [`SessionHandle`]. Between commands the actor refreshes the token shortly
//! before it would expire, so an idle handle stays signed in.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{DriveError, Result};
use crate::fs::{FileEntry, FileList};
use crate::progress::ProgressCallback;
use crate::session::session::{remove_session_file, sleep_until_opt, Session};
use crate::session::token::SessionToken;

/// Destination for [`SessionHandle::download_to_writer`].
pub type BoxedWriter = Box<dyn Write + Send>;

/// First retry delay after a failed background refresh.
const RETRY_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub username: Option<String>,
    pub signed_in: bool,
    pub token_expires_in: Option<Duration>,
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

enum SessionCommand {
    AccountInfo {
        reply: oneshot::Sender<Result<AccountInfo>>,
    },
    Token {
        reply: oneshot::Sender<Result<Option<SessionToken>>>,
    },
    RefreshAuth {
        reply: oneshot::Sender<Result<bool>>,
    },
    List {
        dir: String,
        recursive: bool,
        reply: oneshot::Sender<Result<Vec<FileEntry>>>,
    },
    OpenFolder {
        key: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    Files {
        reply: oneshot::Sender<Result<FileList>>,
    },
    Stat {
        path: String,
        reply: oneshot::Sender<Result<Option<FileEntry>>>,
    },
    Mkdir {
        dir: String,
        name: String,
        reply: oneshot::Sender<Result<FileEntry>>,
    },
    Rm {
        path: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Rename {
        old_key: String,
        new_key: String,
        reply: oneshot::Sender<Result<usize>>,
    },
    Upload {
        local: PathBuf,
        remote_dir: String,
        reply: oneshot::Sender<Result<FileEntry>>,
    },
    UploadFromBytes {
        data: Vec<u8>,
        filename: String,
        remote_dir: String,
        reply: oneshot::Sender<Result<FileEntry>>,
    },
    DownloadToFile {
        path: String,
        local: PathBuf,
        reply: oneshot::Sender<Result<u64>>,
    },
    DownloadToWriter {
        path: String,
        writer: BoxedWriter,
        reply: oneshot::Sender<Result<u64>>,
    },
    DownloadUrl {
        path: String,
        reply: oneshot::Sender<Result<String>>,
    },
    WatchStatus {
        callback: ProgressCallback,
        reply: oneshot::Sender<Result<()>>,
    },
    ClearStatus {
        reply: oneshot::Sender<Result<()>>,
    },
    Save {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Autosave {
        path: Option<PathBuf>,
        reply: oneshot::Sender<Result<()>>,
    },
    Logout {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct SessionActor {
    session: Session,
    rx: mpsc::Receiver<SessionCommand>,
    /// File rewritten whenever the token changes and removed on sign-out
    autosave: Option<PathBuf>,
    /// Token value last written to `autosave`
    saved_token: Option<String>,
    retry_at: Option<Instant>,
    retry_delay: Duration,
}

impl SessionHandle {
    pub async fn signup(config: &ClientConfig, username: &str, password: &str) -> Result<()> {
        Session::signup(config, username, password).await
    }

    pub async fn signin(config: ClientConfig, username: &str, password: &str) -> Result<Self> {
        let session = Session::signin(config, username, password).await?;
        Ok(SessionActor::spawn(session, None))
    }

    /// Resume a saved session. The file is kept up to date with every token
    /// refresh and removed on sign-out.
    pub async fn load<P: AsRef<Path>>(config: ClientConfig, path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let session = Session::load(config, &path).await?;
        Ok(session.map(|s| SessionActor::spawn(s, Some(path))))
    }

    /// Wrap an existing session.
    pub fn spawn(session: Session) -> Self {
        SessionActor::spawn(session, None)
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<R>>) -> SessionCommand,
    ) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        let cmd = build(tx);
        self.tx
            .send(cmd)
            .await
            .map_err(|_| DriveError::SessionClosed)?;
        rx.await.map_err(|_| DriveError::SessionClosed)?
    }

    pub async fn account_info(&self) -> Result<AccountInfo> {
        self.request(|reply| SessionCommand::AccountInfo { reply })
            .await
    }

    pub async fn token(&self) -> Result<Option<SessionToken>> {
        self.request(|reply| SessionCommand::Token { reply }).await
    }

    /// Run the refresh gate now. Returns `true` if a request was made.
    pub async fn refresh_auth(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::RefreshAuth { reply })
            .await
    }

    pub async fn list(&self, dir: &str) -> Result<Vec<FileEntry>> {
        self.request(|reply| SessionCommand::List {
            dir: dir.to_string(),
            recursive: false,
            reply,
        })
        .await
    }

    pub async fn list_recursive(&self, dir: &str) -> Result<Vec<FileEntry>> {
        self.request(|reply| SessionCommand::List {
            dir: dir.to_string(),
            recursive: true,
            reply,
        })
        .await
    }

    pub async fn open_folder(&self, key: &str) -> Result<bool> {
        self.request(|reply| SessionCommand::OpenFolder {
            key: key.to_string(),
            reply,
        })
        .await
    }

    /// Snapshot of the cached file list.
    pub async fn files(&self) -> Result<FileList> {
        self.request(|reply| SessionCommand::Files { reply }).await
    }

    pub async fn stat(&self, path: &str) -> Result<Option<FileEntry>> {
        self.request(|reply| SessionCommand::Stat {
            path: path.to_string(),
            reply,
        })
        .await
    }

    pub async fn mkdir(&self, dir: &str, name: &str) -> Result<FileEntry> {
        self.request(|reply| SessionCommand::Mkdir {
            dir: dir.to_string(),
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn rm(&self, path: &str) -> Result<()> {
        self.request(|reply| SessionCommand::Rm {
            path: path.to_string(),
            reply,
        })
        .await
    }

    pub async fn rename(&self, old_key: &str, new_key: &str) -> Result<usize> {
        self.request(|reply| SessionCommand::Rename {
            old_key: old_key.to_string(),
            new_key: new_key.to_string(),
            reply,
        })
        .await
    }

    pub async fn upload<P: AsRef<Path>>(&self, local: P, remote_dir: &str) -> Result<FileEntry> {
        self.request(|reply| SessionCommand::Upload {
            local: local.as_ref().to_path_buf(),
            remote_dir: remote_dir.to_string(),
            reply,
        })
        .await
    }

    pub async fn upload_from_bytes(
        &self,
        data: &[u8],
        filename: &str,
        remote_dir: &str,
    ) -> Result<FileEntry> {
        self.request(|reply| SessionCommand::UploadFromBytes {
            data: data.to_vec(),
            filename: filename.to_string(),
            remote_dir: remote_dir.to_string(),
            reply,
        })
        .await
    }

    pub async fn download_to_file<P: AsRef<Path>>(&self, path: &str, local: P) -> Result<u64> {
        self.request(|reply| SessionCommand::DownloadToFile {
            path: path.to_string(),
            local: local.as_ref().to_path_buf(),
            reply,
        })
        .await
    }

    pub async fn download_to_writer(&self, path: &str, writer: BoxedWriter) -> Result<u64> {
        self.request(|reply| SessionCommand::DownloadToWriter {
            path: path.to_string(),
            writer,
            reply,
        })
        .await
    }

    pub async fn download_url(&self, path: &str) -> Result<String> {
        self.request(|reply| SessionCommand::DownloadUrl {
            path: path.to_string(),
            reply,
        })
        .await
    }

    pub async fn watch_status(&self, callback: ProgressCallback) -> Result<()> {
        self.request(|reply| SessionCommand::WatchStatus { callback, reply })
            .await
    }

    pub async fn clear_status(&self) -> Result<()> {
        self.request(|reply| SessionCommand::ClearStatus { reply })
            .await
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.request(|reply| SessionCommand::Save {
            path: path.as_ref().to_path_buf(),
            reply,
        })
        .await
    }

    /// Keep `path` in sync with the token (or stop doing so with `None`).
    pub async fn autosave<P: AsRef<Path>>(&self, path: Option<P>) -> Result<()> {
        self.request(|reply| SessionCommand::Autosave {
            path: path.map(|p| p.as_ref().to_path_buf()),
            reply,
        })
        .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Logout { reply }).await
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(SessionCommand::Shutdown { reply: tx }).await;
        let _ = rx.await;
    }
}

impl SessionActor {
    fn spawn(session: Session, autosave: Option<PathBuf>) -> SessionHandle {
        let (tx, rx) = mpsc::channel(64);
        let saved_token = autosave
            .as_ref()
            .and(session.token())
            .map(|t| t.value.clone());
        let actor = SessionActor {
            session,
            rx,
            autosave,
            saved_token,
            retry_at: None,
            retry_delay: RETRY_BASE,
        };
        tokio::spawn(actor.run());
        SessionHandle { tx }
    }

    async fn run(mut self) {
        loop {
            let wake = self.retry_at.or_else(|| self.session.next_refresh_due());

            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    let stop = self.handle_command(cmd).await;
                    self.after_activity();
                    if stop {
                        break;
                    }
                }
                _ = sleep_until_opt(wake) => {
                    self.background_refresh().await;
                    self.after_activity();
                }
            }
        }
    }

    async fn background_refresh(&mut self) {
        match self.session.refresh_now().await {
            Ok(()) => {
                debug!("Background refresh succeeded");
                self.retry_at = None;
                self.retry_delay = RETRY_BASE;
            }
            Err(DriveError::Unauthorized) => {
                warn!("Session expired during background refresh");
                self.retry_at = None;
            }
            Err(e) => {
                let cap = self.session.config().refresh_margin.max(RETRY_BASE);
                warn!(
                    "Background refresh failed: {}; retrying in {:?}",
                    e, self.retry_delay
                );
                self.retry_at = Some(Instant::now() + self.retry_delay);
                self.retry_delay = (self.retry_delay * 2).min(cap);
            }
        }
    }

    /// Sync the autosave file with the token and drop stale retries.
    fn after_activity(&mut self) {
        if !self.session.is_signed_in() {
            self.retry_at = None;
            self.retry_delay = RETRY_BASE;
        } else if self.retry_at.is_some()
            && self.session.next_refresh_due() > Some(Instant::now())
        {
            // A command refreshed the token in the meantime.
            self.retry_at = None;
            self.retry_delay = RETRY_BASE;
        }

        let Some(path) = self.autosave.as_ref() else {
            return;
        };
        let current = self.session.token().map(|t| t.value.clone());
        if current == self.saved_token {
            return;
        }
        let res = match current {
            Some(_) => self.session.save(path),
            None => {
                if remove_session_file(path) {
                    self.saved_token = None;
                }
                return;
            }
        };
        match res {
            Ok(()) => self.saved_token = current,
            Err(e) => warn!("Could not update session file {}: {}", path.display(), e),
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::AccountInfo { reply } => {
                let info = AccountInfo {
                    username: self.session.username().map(|s| s.to_string()),
                    signed_in: self.session.is_signed_in(),
                    token_expires_in: self.session.token_remaining(),
                };
                let _ = reply.send(Ok(info));
            }
            SessionCommand::Token { reply } => {
                let _ = reply.send(Ok(self.session.token().cloned()));
            }
            SessionCommand::RefreshAuth { reply } => {
                let res = self.session.refresh_auth().await;
                let _ = reply.send(res);
            }
            SessionCommand::List {
                dir,
                recursive,
                reply,
            } => {
                let res = if recursive {
                    self.session.list_recursive(&dir).await
                } else {
                    self.session.list(&dir).await
                };
                let _ = reply.send(res);
            }
            SessionCommand::OpenFolder { key, reply } => {
                let res = self.session.open_folder(&key).await;
                let _ = reply.send(res);
            }
            SessionCommand::Files { reply } => {
                let _ = reply.send(Ok(self.session.files().clone()));
            }
            SessionCommand::Stat { path, reply } => {
                let _ = reply.send(Ok(self.session.stat(&path).cloned()));
            }
            SessionCommand::Mkdir { dir, name, reply } => {
                let res = self.session.mkdir(&dir, &name).await;
                let _ = reply.send(res);
            }
            SessionCommand::Rm { path, reply } => {
                let res = self.session.rm(&path).await;
                let _ = reply.send(res);
            }
            SessionCommand::Rename {
                old_key,
                new_key,
                reply,
            } => {
                let res = self.session.rename(&old_key, &new_key);
                let _ = reply.send(res);
            }
            SessionCommand::Upload {
                local,
                remote_dir,
                reply,
            } => {
                let res = self.session.upload(&local, &remote_dir).await;
                let _ = reply.send(res);
            }
            SessionCommand::UploadFromBytes {
                data,
                filename,
                remote_dir,
                reply,
            } => {
                let res = self
                    .session
                    .upload_from_bytes(data, &filename, &remote_dir)
                    .await;
                let _ = reply.send(res);
            }
            SessionCommand::DownloadToFile { path, local, reply } => {
                let res = self.session.download_to_file(&path, &local).await;
                let _ = reply.send(res);
            }
            SessionCommand::DownloadToWriter {
                path,
                mut writer,
                reply,
            } => {
                let res = self.session.download(&path, writer.as_mut()).await;
                let _ = reply.send(res);
            }
            SessionCommand::DownloadUrl { path, reply } => {
                let _ = reply.send(self.session.download_url(&path));
            }
            SessionCommand::WatchStatus { callback, reply } => {
                self.session.watch_status(callback);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::ClearStatus { reply } => {
                self.session.clear_status();
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Save { path, reply } => {
                let _ = reply.send(self.session.save(path));
            }
            SessionCommand::Autosave { path, reply } => {
                self.autosave = path;
                self.saved_token = None;
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Logout { reply } => {
                let res = self.session.logout().await;
                let _ = reply.send(res);
            }
            SessionCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }
}
