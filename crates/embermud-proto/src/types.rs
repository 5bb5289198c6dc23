//! Identity newtypes shared by every layer of the server.
//!
//! Each id wraps a primitive in a named struct so a `Vnum` can never be
//! passed where a `CharId` is expected, and so log lines read as
//! `ch-42 entered #3001` instead of two bare numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable numeric identifier for a world template, room, or reset record.
///
/// Vnums come from the world-definition collaborator and never change at
/// runtime. `#[serde(transparent)]` keeps them as plain numbers in
/// persistence rows and GMCP payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vnum(pub u32);

impl fmt::Display for Vnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unique identifier for a live character instance, player or mob.
///
/// Allocated by the world when the character enters the live graph.
/// Mob ids are never reused; a repop produces a fresh `CharId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharId(pub u64);

impl fmt::Display for CharId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// A unique identifier for an object instance.
///
/// Unlike a [`Vnum`] (which names the template), an `ObjectId` names one
/// concrete instance and is the persistence key in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

/// An opaque identifier for one client connection.
///
/// Sessions are transient: the id is allocated on accept and dies with
/// the connection. It is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}
