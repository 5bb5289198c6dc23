//! Combat errors.

use embermud_proto::CharId;
use embermud_world::WorldError;

#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    #[error("{0} is not fighting anyone")]
    NotEngaged(CharId),

    #[error("{0} is dead")]
    DeadCombatant(CharId),

    #[error(transparent)]
    World(#[from] WorldError),
}
