//! Session management: sign-in, token refresh, and the session actor.

pub mod actor;
mod session;
pub mod token;

pub use actor::{AccountInfo, BoxedWriter, SessionHandle};
pub use session::Session;
pub(crate) use session::sleep_until_opt;
pub use token::{SessionFile, SessionToken, SESSION_COOKIE};
