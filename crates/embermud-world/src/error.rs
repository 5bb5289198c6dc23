//! Error types for the entity store and object lifecycle.

use embermud_proto::{CharId, ObjectId, Vnum};

use crate::object::ObjectState;
use crate::room::Direction;

/// Errors from world operations.
///
/// Lookup misses and illegal transitions are logical invariant
/// violations: callers log them and turn the operation into a no-op, or
/// translate them into in-world denial text. They never reach players
/// as anything else.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("room {0} not found")]
    RoomNotFound(Vnum),

    #[error("mob template {0} not found")]
    MobTemplateNotFound(Vnum),

    #[error("object template {0} not found")]
    ObjectTemplateNotFound(Vnum),

    #[error("character {0} not found")]
    CharacterNotFound(CharId),

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("no exit {direction} from room {room}")]
    NoExit { room: Vnum, direction: Direction },

    #[error("exit {direction} from room {room} is locked")]
    ExitLocked { room: Vnum, direction: Direction },

    #[error("object {id} cannot go from {from} to {to}")]
    IllegalTransition {
        id: ObjectId,
        from: ObjectState,
        to: ObjectState,
    },

    #[error("store i/o: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("store row: {0}")]
    StoreRow(#[from] serde_json::Error),
}
