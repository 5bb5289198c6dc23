//! Sessions and login for Embermud.
//!
//! A [`Session`] is one connected client: login phase, bound
//! character, capability flags and the output buffer the gateway
//! flushes once per loop. The [`SessionDirectory`] tracks them all,
//! with a name index so a second login for an online name can be
//! routed to the reconnect flow. [`advance`] is the login state
//! machine itself, and [`Credentials`] is the trait seam for account
//! passwords.

mod credentials;
mod directory;
mod error;
mod login;
mod session;

pub use credentials::{Credentials, FileCredentials, MemoryCredentials};
pub use directory::SessionDirectory;
pub use error::SessionError;
pub use login::{EnterWorld, LoginLookup, LoginOutcome, LoginPhase, NAME_PROMPT, advance};
pub use session::Session;
