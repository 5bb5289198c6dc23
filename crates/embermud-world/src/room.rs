//! Rooms: static identity and exits plus mutable membership sets.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use embermud_proto::{CharId, ObjectId, Vnum};

/// The six cardinal movement directions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    /// Matches a full word or its single-letter shortcut, case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        let lower = input.to_ascii_lowercase();
        Direction::ALL
            .into_iter()
            .find(|d| lower == d.word() || lower == d.letter())
    }

    pub fn word(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::East => "e",
            Direction::South => "s",
            Direction::West => "w",
            Direction::Up => "u",
            Direction::Down => "d",
        }
    }

    /// The direction an arrival comes from, as seen by the destination room.
    pub fn reverse(&self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.word())
    }
}

/// One exit edge. Locked exits block movement, wander and flee alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub to_room: Vnum,
    #[serde(default)]
    pub locked: bool,
}

/// A room: static identity plus the live membership sets.
///
/// Membership is kept in sync with each member's own room field by the
/// world context; nothing else touches these sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub vnum: Vnum,
    pub name: String,
    pub description: String,
    pub zone: String,
    /// Terrain tag pushed over the out-of-band channel ("city", "forest").
    pub environment: String,
    /// Haven rooms double regeneration.
    #[serde(default)]
    pub haven: bool,
    #[serde(default)]
    pub exits: BTreeMap<Direction, Exit>,

    #[serde(skip)]
    pub players: HashSet<CharId>,
    #[serde(skip)]
    pub mobs: HashSet<CharId>,
    #[serde(skip)]
    pub objects: HashSet<ObjectId>,
}

impl Room {
    pub fn exit(&self, direction: Direction) -> Option<&Exit> {
        self.exits.get(&direction)
    }

    /// Exits a character can actually take, in direction order.
    pub fn unlocked_exits(&self) -> Vec<(Direction, Exit)> {
        self.exits
            .iter()
            .filter(|(_, e)| !e.locked)
            .map(|(d, e)| (*d, *e))
            .collect()
    }

    /// Every character present, players first.
    pub fn occupants(&self) -> impl Iterator<Item = CharId> + '_ {
        self.players.iter().chain(self.mobs.iter()).copied()
    }
}
