//! # efsdrive
//!
//! Rust client library for a personal file-storage drive service.
//!
//! ## Features
//!
//! - **Authentication**: Sign up, sign in and log out with username/password.
//!   The session token cookie is refreshed automatically, never more than once
//!   per refresh interval, and a background timer keeps idle sessions alive.
//! - **Filesystem Operations**:
//!   - List directories (optionally recursive) into a flat, merged key list.
//!   - Create directories (`mkdir`), delete (`rm`) and rename entries.
//!   - Look up cached entries (`stat`) and open folders on demand.
//! - **File Transfers**:
//!   - Multipart upload of local files or in-memory buffers.
//!   - Streaming download to a file or any writer.
//!   - Progress tracking with cancellable callbacks.
//! - **Session persistence**: save the token to disk and resume it later.
//!
//! Entries are identified by keys: files are `dir/name`, directories end in
//! `/`. Renaming only rewrites cached keys, so it is not visible to other
//! clients.
//!
//! ## Example: Basic Usage
//!
//! ```no_run
//! use efsdrive::{ClientConfig, SessionHandle};
//!
//! # async fn example() -> efsdrive::Result<()> {
//! let config = ClientConfig::from_env();
//! let session = SessionHandle::signin(config, "alice", "password").await?;
//!
//! for entry in session.list("").await? {
//!     println!("{}", entry.key);
//! }
//!
//! session.mkdir("", "docs").await?;
//! session.upload("report.pdf", "docs").await?;
//! session.download_to_file("docs/report.pdf", "report_copy.pdf").await?;
//!
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Resuming a Saved Session
//!
//! ```no_run
//! use efsdrive::{ClientConfig, SessionHandle};
//!
//! # async fn example() -> efsdrive::Result<()> {
//! let config = ClientConfig::from_env();
//! let session = match SessionHandle::load(config.clone(), ".efsdrive_session").await? {
//!     Some(session) => session,
//!     None => {
//!         let session = SessionHandle::signin(config, "alice", "password").await?;
//!         session.save(".efsdrive_session").await?;
//!         session
//!     }
//! };
//! println!("{:?}", session.account_info().await?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod progress;
pub mod session;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{DriveError, Result};
pub use fs::{EntryKind, FileEntry, FileList};
pub use progress::{ProgressCallback, TransferProgress};
pub use session::{AccountInfo, Session, SessionHandle, SessionToken};
