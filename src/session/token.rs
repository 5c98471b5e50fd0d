//! Session token handling and persistence.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// A `session_token` cookie issued by `/signin` or `/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Opaque token value
    pub value: String,
    /// Unix timestamp the token was received
    pub issued_at: u64,
    /// Unix timestamp the token stops being valid
    pub expires_at: u64,
}

impl SessionToken {
    /// Create a token. Without an explicit cookie expiry the token is assumed
    /// to live for `ttl`.
    pub fn new(value: impl Into<String>, expires: Option<SystemTime>, ttl: Duration) -> Self {
        let now = SystemTime::now();
        let expires = expires.unwrap_or(now + ttl);
        Self {
            value: value.into(),
            issued_at: unix_secs(now),
            expires_at: unix_secs(expires),
        }
    }

    /// `Cookie` header value for authenticated requests.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.value)
    }

    pub fn is_expired(&self) -> bool {
        unix_secs(SystemTime::now()) >= self.expires_at
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.expires_at.saturating_sub(unix_secs(SystemTime::now())))
    }
}

/// On-disk form of a signed-in session, so later runs can skip sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    pub username: Option<String>,
    pub token: SessionToken,
}

impl SessionFile {
    pub fn new(username: Option<String>, token: SessionToken) -> Self {
        Self { username, token }
    }

    /// Write the session as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Read a session written by [`SessionFile::save`].
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        let data = data.trim();
        if data.is_empty() {
            return Err(DriveError::Custom("Empty session file".to_string()));
        }
        Ok(Some(serde_json::from_str(data)?))
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
