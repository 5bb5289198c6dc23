//! GMCP message parsing and the payload structs the server emits.
//!
//! A GMCP payload is `Package.Message` optionally followed by a space
//! and a JSON body, e.g. `Char.Vitals {"hp":42,"maxhp":50}`. The bytes
//! arrive via [`Frame::Subneg`](crate::Frame::Subneg) after the telnet
//! layer has stripped the sub-negotiation framing.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// A parsed GMCP message from either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct GmcpFrame {
    pub package: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl GmcpFrame {
    /// Parses the raw payload bytes of a GMCP sub-negotiation block.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(payload)?;
        let (head, body) = match text.split_once(' ') {
            Some((head, body)) => (head, Some(body)),
            None => (text, None),
        };
        let (package, message) = head.split_once('.').ok_or_else(|| {
            ProtocolError::MalformedGmcp(format!("missing package separator in {head:?}"))
        })?;
        if package.is_empty() || message.is_empty() {
            return Err(ProtocolError::MalformedGmcp(format!(
                "empty package or message in {head:?}"
            )));
        }
        let data = match body {
            Some(body) => Some(serde_json::from_str(body)?),
            None => None,
        };
        Ok(Self {
            package: package.to_owned(),
            message: message.to_owned(),
            data,
        })
    }
}

/// Body of `Char.Vitals`, pushed whenever a character's pools change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharVitals {
    pub hp: i32,
    pub maxhp: i32,
    pub mp: i32,
    pub maxmp: i32,
    pub sp: i32,
    pub maxsp: i32,
    /// Experience still needed for the next level.
    pub tnl: i64,
}

/// Body of `Room.Info`, pushed on every successful room change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub num: u32,
    pub name: String,
    pub zone: String,
    pub environment: String,
    /// Exit direction letter to `"O"` (open) or `"C"` (closed).
    pub exits: std::collections::BTreeMap<String, String>,
}
