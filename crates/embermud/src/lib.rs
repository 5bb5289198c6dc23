//! Embermud: a small telnet MUD server.
//!
//! A single world loop owns all mutable game state; connection tasks
//! only decode input into events and write buffered output. The game
//! rules live in the `embermud-world` and `embermud-combat` crates,
//! login and session bookkeeping in `embermud-session`, the wire
//! protocol in `embermud-proto`, and the pulse schedule in
//! `embermud-tick`.

mod dispatch;
mod error;
mod gateway;
mod server;

pub use dispatch::{Command, parse};
pub use error::MudError;
pub use gateway::{Engine, Event};
pub use server::{Server, ServerConfig, starter_world};
