//! Drive API client and types.

pub mod client;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use error::{ErrorBody, StatusKind};
pub use types::{Credentials, ListFilesResponse, ListedFile};
