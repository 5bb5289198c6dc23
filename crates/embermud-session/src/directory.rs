//! The session directory: every live connection, with a name index.
//!
//! Owned by the world task and never shared, so it is a plain
//! `HashMap` with no locking. The name index answers the login
//! machine's "is this name already online" question and is kept in
//! sync with the session map.

use std::collections::HashMap;

use embermud_proto::{CharId, SessionId};
use tracing::info;

use crate::error::SessionError;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<SessionId, Session>,
    /// Lowercased character name → the session bound to it.
    names: HashMap<String, SessionId>,
    next_id: u64,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            names: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a fresh connection and returns its id.
    pub fn create(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, Session::new(id));
        info!(%id, "session created");
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Binds a session to a named character after login.
    pub fn bind(
        &mut self,
        id: SessionId,
        name: &str,
        character: CharId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;
        session.character = Some(character);
        session.phase = crate::login::LoginPhase::Playing;
        self.names.insert(name.to_ascii_lowercase(), id);
        info!(%id, name, %character, "session bound");
        Ok(())
    }

    /// The session currently holding a name, if any.
    pub fn session_for_name(&self, name: &str) -> Option<SessionId> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    /// Removes a session, returning it for teardown. The name index
    /// entry goes with it unless the name was already rebound to a
    /// newer session (reconnect takeover).
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.names.retain(|_, bound| *bound != id);
        info!(%id, "session removed");
        Some(session)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// The session bound to a character, if it is connected.
    pub fn session_for_char(&self, character: CharId) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| s.character == Some(character))
            .map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
