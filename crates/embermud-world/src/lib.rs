//! The shared entity store for Embermud.
//!
//! Everything that exists in the game lives here: rooms and their
//! exits, characters (durable [`Player`]s and ephemeral [`Mob`]s behind
//! the [`Combatant`] trait), object instances with their durability
//! state machine, and the persistence stores. One explicitly
//! constructed [`World`] owns the whole graph; the server's single
//! world-owning task is the only mutator, so the graph itself needs no
//! locking.
//!
//! # Key types
//!
//! - [`World`] — the context object: entity graph, repop queues, decay
//!   candidates, id allocators
//! - [`Character`] / [`Combatant`] — the player/mob union and its
//!   capability surface
//! - [`ObjectInstance`] / [`ObjectState`] / [`Location`] — the object
//!   lifecycle state machine
//! - [`DiceRoller`] — the randomness seam (scriptable in tests)
//! - [`PlayerStore`] / [`ObjectStore`] — keyed JSON persistence

mod character;
mod dice;
mod error;
mod lifecycle;
mod object;
mod room;
mod store;
mod templates;
mod world;

pub use character::{
    Character, Combatant, Mob, ORIGINS, Player, Position, RACES, Race, find_race,
};
pub use dice::{Dice, DiceRoller, ScriptedDice, ThreadDice, dice_roll};
pub use error::WorldError;
pub use lifecycle::DecayReport;
pub use object::{Location, ObjectInstance, ObjectState};
pub use room::{Direction, Exit, Room};
pub use store::{ObjectRecord, ObjectStore, PlayerStore};
pub use templates::{MobReset, MobTemplate, ObjectReset, ObjectTemplate, WorldData};
pub use world::{Audience, Outbox, World};
