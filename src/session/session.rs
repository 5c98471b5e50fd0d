//! Session management and authentication.
//!
//! This module handles sign-up, sign-in, token refresh, persistence, and
//! logout. Drive operations live in [`crate::fs`] as further `impl Session`
//! blocks.

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::token::{SessionFile, SessionToken};
use crate::api::{ApiClient, Credentials};
use crate::config::ClientConfig;
use crate::error::{DriveError, Result};
use crate::fs::FileList;
use crate::progress::{ProgressCallback, TransferProgress};

/// Retry delay for a refresh that failed in the middle of a transfer.
const TRANSFER_REFRESH_RETRY: Duration = Duration::from_secs(1);

/// Drive user session.
///
/// This holds the authentication state and the cached file list.
pub struct Session {
    /// API client for making requests
    pub(crate) api: ApiClient,
    config: ClientConfig,
    /// Signed-in user name, when known
    username: Option<String>,
    /// Cached drive entries
    pub(crate) files: FileList,
    /// When the token was last issued or refreshed
    last_refresh: Option<Instant>,
    /// Progress callback for transfer progress
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api", &self.api)
            .field("config", &self.config)
            .field("username", &self.username)
            .field("files", &self.files)
            .field("last_refresh", &self.last_refresh)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Session {
    /// Create a session that is not signed in.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config)?,
            config,
            username: None,
            files: FileList::new(),
            last_refresh: None,
            progress_callback: None,
        })
    }

    /// Register a new account.
    ///
    /// The account is not signed in afterwards; call [`Session::signin`].
    pub async fn signup(config: &ClientConfig, username: &str, password: &str) -> Result<()> {
        let mut api = ApiClient::new(config)?;
        api.signup(&Credentials::new(username, password)).await?;
        info!("Created account {}", username);
        Ok(())
    }

    /// Sign in with user name and password.
    ///
    /// # Example
    /// ```no_run
    /// use efsdrive::{ClientConfig, Session};
    ///
    /// # async fn example() -> efsdrive::Result<()> {
    /// let session = Session::signin(ClientConfig::default(), "alice", "password").await?;
    /// println!("Signed in as: {}", session.username().unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn signin(config: ClientConfig, username: &str, password: &str) -> Result<Self> {
        let mut session = Self::new(config)?;
        session
            .api
            .signin(&Credentials::new(username, password))
            .await?;
        session.username = Some(username.to_string());
        session.last_refresh = Some(Instant::now());
        info!("Signed in as {}", username);
        Ok(session)
    }

    /// Resume a session from a token without contacting the server.
    pub fn from_token(
        config: ClientConfig,
        username: Option<String>,
        token: SessionToken,
    ) -> Result<Self> {
        let mut session = Self::new(config)?;
        session.api.set_token(token);
        session.username = username;
        Ok(session)
    }

    /// Load a session saved with [`Session::save`].
    ///
    /// The token is refreshed once to check it is still accepted. An expired
    /// or rejected token deletes the file and yields `Ok(None)`.
    pub async fn load<P: AsRef<Path>>(config: ClientConfig, path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let Some(saved) = SessionFile::load(path)? else {
            return Ok(None);
        };

        if saved.token.is_expired() {
            debug!("Saved session in {} has expired", path.display());
            remove_session_file(path);
            return Ok(None);
        }

        let mut session = Self::from_token(config, saved.username, saved.token)?;
        match session.refresh_now().await {
            Ok(()) => {
                session.save(path)?;
                Ok(Some(session))
            }
            Err(DriveError::Unauthorized) => {
                remove_session_file(path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Save the current token so a later run can [`Session::load`] it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let token = self.api.token().cloned().ok_or(DriveError::Unauthorized)?;
        SessionFile::new(self.username.clone(), token).save(path)
    }

    /// Get the signed-in user name, if known.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Get the current session token.
    pub fn token(&self) -> Option<&SessionToken> {
        self.api.token()
    }

    pub fn is_signed_in(&self) -> bool {
        self.api.has_token()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cached drive entries.
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// When the token was last issued or refreshed.
    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    /// Refresh the token unless it was refreshed within
    /// `min_refresh_interval`.
    ///
    /// Every drive operation calls this first. Returns `true` when a
    /// `/refresh` request was made. A rejected token signs the session out
    /// and returns [`DriveError::Unauthorized`].
    pub async fn refresh_auth(&mut self) -> Result<bool> {
        if !self.api.has_token() {
            return Err(DriveError::Unauthorized);
        }
        if let Some(last) = self.last_refresh {
            if last.elapsed() < self.config.min_refresh_interval {
                return Ok(false);
            }
        }
        self.refresh_now().await?;
        Ok(true)
    }

    /// Refresh the token unconditionally.
    pub async fn refresh_now(&mut self) -> Result<()> {
        match self.api.refresh().await {
            Ok(token) => {
                debug!("Session token refreshed, valid for {:?}", token.remaining());
                self.last_refresh = Some(Instant::now());
                Ok(())
            }
            Err(DriveError::Unauthorized) => {
                info!("Session rejected by server, signing out");
                self.sign_out_locally();
                Err(DriveError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    /// When the background refresh should next fire, if signed in.
    pub(crate) fn next_refresh_due(&self) -> Option<Instant> {
        if !self.api.has_token() {
            return None;
        }
        let delay = self.config.background_refresh_delay();
        Some(match self.last_refresh {
            Some(last) => last + delay,
            None => Instant::now(),
        })
    }

    /// Refresh while a transfer is in flight, so the token outlives it.
    ///
    /// Returns the next deadline. A rejected token signs out and fails the
    /// transfer; other failures are logged and retried shortly.
    pub(crate) async fn keep_alive(&mut self) -> Result<Option<Instant>> {
        match self.refresh_now().await {
            Ok(()) => Ok(self.next_refresh_due()),
            Err(DriveError::Unauthorized) => Err(DriveError::Unauthorized),
            Err(e) => {
                warn!("Refresh during transfer failed: {}", e);
                Ok(Some(Instant::now() + TRANSFER_REFRESH_RETRY))
            }
        }
    }

    /// Sign out on the server and drop all local state.
    pub async fn logout(&mut self) -> Result<()> {
        let res = self.api.logout().await;
        if let Some(name) = self.username.as_deref() {
            info!("Signed out {}", name);
        }
        self.sign_out_locally();
        res
    }

    /// Forget the token and everything cached under it.
    pub(crate) fn sign_out_locally(&mut self) {
        self.api.clear_token();
        self.files.clear();
        self.last_refresh = None;
    }

    /// Pass a drive call's result through, signing out locally if the server
    /// rejected the token.
    pub(crate) fn check_auth<T>(&mut self, res: Result<T>) -> Result<T> {
        if matches!(res, Err(DriveError::Unauthorized)) {
            self.sign_out_locally();
        }
        res
    }

    /// Set a progress callback for upload/download status.
    ///
    /// Return `false` from the callback to cancel the transfer.
    pub fn watch_status(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    /// Remove the progress callback.
    pub fn clear_status(&mut self) {
        self.progress_callback = None;
    }

    /// Report progress to the callback, if set. Returns `false` to cancel.
    pub(crate) fn report_progress(&mut self, progress: &TransferProgress) -> bool {
        match self.progress_callback.as_mut() {
            Some(cb) => cb(progress),
            None => true,
        }
    }

    /// Time until the current token expires.
    pub fn token_remaining(&self) -> Option<Duration> {
        self.api.token().map(|t| t.remaining())
    }
}

/// Delete a saved session file. A file that is already gone is fine.
pub(crate) fn remove_session_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Could not remove session file {}: {}", path.display(), e);
            false
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
