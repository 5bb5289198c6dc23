//! Wire protocol for Embermud.
//!
//! This crate defines the "language" spoken on a client connection:
//!
//! - **Types** ([`Vnum`], [`CharId`], [`ObjectId`], [`SessionId`]) — the
//!   identity newtypes shared by every layer above.
//! - **Telnet framing** ([`TelnetDecoder`], [`Frame`]) — an incremental
//!   decoder that separates newline-delimited command lines from telnet
//!   IAC sequences and GMCP sub-negotiation blocks.
//! - **GMCP payloads** ([`GmcpFrame`], [`CharVitals`], [`RoomInfo`]) — the
//!   structured out-of-band messages pushed to capable clients.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the raw socket and the session layer.
//! It doesn't know about characters or rooms — it only knows how to turn
//! bytes into frames and structured payloads back into bytes.
//!
//! ```text
//! Socket (bytes) → Protocol (Frame) → Session / Dispatch (game context)
//! ```

mod error;
mod gmcp;
mod telnet;
mod types;

pub use error::ProtocolError;
pub use gmcp::{CharVitals, GmcpFrame, RoomInfo};
pub use telnet::{Frame, TelnetDecoder, encode_gmcp, gmcp_offer};
pub use types::{CharId, ObjectId, SessionId, Vnum};
