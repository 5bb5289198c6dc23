//! The combat engine for Embermud.
//!
//! Combat is two layers:
//!
//! - [`CombatManager`] — pure bookkeeping: who is engaged with whom,
//!   and each character's current focus. Engagement is always
//!   symmetric; a focus is always inside its owner's engagement set.
//! - [`Combat`] — the engine: attack resolution, the fixed-cadence
//!   round driver, death and experience settlement, fleeing. It
//!   mutates the world through `&mut World` on the world task, like
//!   every other mutation.
//!
//! Randomness comes in through the world's `DiceRoller` seam, so every
//! rule here is testable with scripted rolls.

mod error;
mod manager;
mod round;

pub use error::CombatError;
pub use manager::CombatManager;
pub use round::{
    AttackOutcome, Combat, CombatConfig, flee_chance, health_band, resolve_attack, victory_xp,
};
