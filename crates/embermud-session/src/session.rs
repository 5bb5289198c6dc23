//! One connected client.

use embermud_proto::{CharId, CharVitals, SessionId, Vnum};

use crate::login::LoginPhase;

/// Per-connection state. Created on accept, destroyed on disconnect.
///
/// Output is buffered here and flushed once per world-loop iteration;
/// nothing writes to the socket synchronously.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Where this connection is in the login flow. `Playing` once a
    /// character is bound.
    pub phase: LoginPhase,
    /// The character this session controls, once logged in.
    pub character: Option<CharId>,
    /// The client negotiated the out-of-band status channel.
    pub gmcp: bool,
    /// Text accumulated since the last flush.
    pub output: String,
    /// Last vitals pushed over the status channel; pushes are diffed
    /// against this so unchanged pools stay quiet.
    pub last_vitals: Option<CharVitals>,
    /// Last room announced over the status channel.
    pub last_room: Option<Vnum>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            phase: LoginPhase::AwaitingName,
            character: None,
            gmcp: false,
            output: String::new(),
            last_vitals: None,
            last_room: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.character.is_some()
    }

    /// Appends text to the output buffer.
    pub fn push(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Empties and returns the output buffer.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}
