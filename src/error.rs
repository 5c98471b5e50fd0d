//! Error types for the efsdrive library.

use thiserror::Error;

/// Main error type for efsdrive operations.
#[derive(Error, Debug)]
pub enum DriveError {
    /// HTTP request failed with a status code the client does not map.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Network request error.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Local I/O error (session file, upload source, download target).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server rejected the session token. The caller must sign in again.
    #[error("Session expired or missing, sign in again")]
    Unauthorized,

    /// Sign-in was rejected.
    #[error("Wrong login or password")]
    InvalidCredentials,

    /// Sign-up was rejected because the name is in use.
    #[error("Username already exists")]
    UsernameTaken,

    /// A file or directory with that name already exists on the drive.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Path does not exist on the drive.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path is malformed or refers to the wrong kind of entry.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid or unexpected response from server.
    #[error("Invalid response from server")]
    InvalidResponse,

    /// A request did not complete within the configured timeout.
    #[error("HTTP request timed out")]
    Timeout,

    /// The session actor is no longer running.
    #[error("Session actor stopped")]
    SessionClosed,

    /// A transfer was cancelled by its progress callback.
    #[error("Transfer cancelled by user")]
    Cancelled,

    /// Custom error message.
    #[error("{0}")]
    Custom(String),
}

impl DriveError {
    /// Whether this error means the session is gone and a new sign-in is needed.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DriveError::Unauthorized)
    }
}

/// Result type alias for efsdrive operations.
pub type Result<T> = std::result::Result<T, DriveError>;
