//! Unified error type for the server binary.

use embermud_combat::CombatError;
use embermud_proto::ProtocolError;
use embermud_session::SessionError;
use embermud_world::WorldError;

/// Top-level error wrapping each layer's error type, so the server and
/// binary code can use `?` across all of them.
#[derive(Debug, thiserror::Error)]
pub enum MudError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error("world data: {0}")]
    WorldData(#[from] serde_json::Error),
}
