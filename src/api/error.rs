//! Drive API status classification.

use serde::Deserialize;

use crate::error::DriveError;

/// HTTP status codes the drive backend uses to signal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Request succeeded (2xx)
    Success,
    /// Malformed request or missing cookie
    BadRequest,
    /// Wrong credentials or expired session
    Unauthorized,
    /// Path does not exist
    NotFound,
    /// Name already taken
    Conflict,
    /// Server failure
    Internal,
    /// Anything else
    Other,
}

impl From<u16> for StatusKind {
    fn from(status: u16) -> Self {
        match status {
            200..=299 => StatusKind::Success,
            400 => StatusKind::BadRequest,
            401 => StatusKind::Unauthorized,
            404 => StatusKind::NotFound,
            409 => StatusKind::Conflict,
            500 => StatusKind::Internal,
            _ => StatusKind::Other,
        }
    }
}

impl StatusKind {
    /// Default message the backend sends for this status.
    pub fn description(&self) -> &'static str {
        match self {
            StatusKind::Success => "OK",
            StatusKind::BadRequest => "Bad Request",
            StatusKind::Unauthorized => "Unauthorized",
            StatusKind::NotFound => "Content not found",
            StatusKind::Conflict => "Conflict",
            StatusKind::Internal => "Internal server error",
            StatusKind::Other => "Unexpected status",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == StatusKind::Success
    }
}

/// Error body returned by the backend: `{"error": "..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
}

/// Pick the message for a failed response: the body's `error` field if the
/// body is JSON and non-empty, the status description otherwise.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| StatusKind::from(status).description().to_string())
}

/// Map a non-success status to a [`DriveError`].
///
/// `subject` names the path or account the request was about, used for
/// `NotFound`/`AlreadyExists`.
pub(crate) fn status_error(status: u16, body: &str, subject: &str) -> DriveError {
    match StatusKind::from(status) {
        StatusKind::Unauthorized => DriveError::Unauthorized,
        StatusKind::NotFound => DriveError::NotFound(subject.to_string()),
        StatusKind::Conflict => DriveError::AlreadyExists(subject.to_string()),
        _ => DriveError::HttpError {
            status,
            message: error_message(status, body),
        },
    }
}
