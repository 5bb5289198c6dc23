//! Immutable world-definition records.
//!
//! Templates and reset records are supplied by the world-file loader
//! (an external collaborator) through one bulk [`WorldData`] hand-off.
//! The engine never mutates them; live instances reference them through
//! `Arc` and roll their own mutable state at spawn time.

use serde::{Deserialize, Serialize};

use embermud_proto::Vnum;

use crate::dice::Dice;
use crate::room::Room;

/// Blueprint for a mob. One template spawns any number of instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobTemplate {
    pub vnum: Vnum,
    /// Targeting keywords ("guard", "city guard").
    pub keywords: Vec<String>,
    /// Name used in messages ("the city guard").
    pub short_desc: String,
    /// Line shown in room listings.
    pub long_desc: String,
    pub level: i32,
    pub hitroll: i32,
    pub armor_class: i32,
    /// Rolled once per spawn for max hitpoints.
    pub hit_dice: Dice,
    pub damage_dice: Dice,
    pub gold: i64,
    /// Sentinel mobs never wander.
    pub sentinel: bool,
}

/// Blueprint for an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTemplate {
    pub vnum: Vnum,
    pub keywords: Vec<String>,
    /// Name used in messages ("a rusty sword").
    pub short_desc: String,
    /// Line shown when the object lies in a room.
    pub long_desc: String,
    pub weight: i32,
    pub cost: i64,
}

/// One mob placement: which template spawns where, with what gear.
///
/// A reset is a single replenishment slot. When its instance dies the
/// reset is queued and the next repop drain spawns exactly one
/// replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobReset {
    pub mob_vnum: Vnum,
    pub room_vnum: Vnum,
    /// Object templates equipped on spawn.
    #[serde(default)]
    pub equipment: Vec<Vnum>,
    /// Object templates carried on spawn.
    #[serde(default)]
    pub inventory: Vec<Vnum>,
}

/// One object placement in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReset {
    pub object_vnum: Vnum,
    pub room_vnum: Vnum,
}

/// Bulk load payload from the world-definition collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldData {
    pub rooms: Vec<Room>,
    pub mob_templates: Vec<MobTemplate>,
    pub object_templates: Vec<ObjectTemplate>,
    pub mob_resets: Vec<MobReset>,
    pub object_resets: Vec<ObjectReset>,
    /// Where new characters enter and defeated players respawn.
    pub respawn_room: Vnum,
}
