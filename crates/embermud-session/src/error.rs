//! Session-layer errors.

use embermud_proto::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("credential store i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential row: {0}")]
    Row(#[from] serde_json::Error),
}
