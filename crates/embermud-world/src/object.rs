//! Object instances and their durability state machine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use embermud_proto::{CharId, ObjectId, Vnum};

use crate::templates::ObjectTemplate;

/// Durability state of an object instance.
///
/// `Special` and `Quest` objects never change state; they can still be
/// carried, dropped and given, but the decay sweep ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    /// Freshly placed by a world reset; not yet touched by anyone.
    Normal,
    /// Lying in a room and subject to decay.
    Dropped,
    /// Carried by a character.
    Inventory,
    /// Stowed in a locker.
    Locker,
    /// Worn or wielded by a character.
    Equipped,
    Special,
    Quest,
}

impl ObjectState {
    /// Whether the decay sweep may consider this state at all.
    pub fn decays(&self) -> bool {
        matches!(self, ObjectState::Dropped)
    }

    /// Legal transitions of the durability state machine.
    pub fn can_become(&self, next: ObjectState) -> bool {
        use ObjectState::*;
        match self {
            // Pinned states never transition.
            Special | Quest => *self == next,
            Normal => matches!(next, Inventory | Dropped),
            Dropped => matches!(next, Inventory),
            Inventory => matches!(next, Inventory | Dropped | Equipped | Locker),
            Equipped => matches!(next, Inventory),
            Locker => matches!(next, Inventory),
        }
    }
}

impl std::fmt::Display for ObjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            ObjectState::Normal => "normal",
            ObjectState::Dropped => "dropped",
            ObjectState::Inventory => "inventory",
            ObjectState::Locker => "locker",
            ObjectState::Equipped => "equipped",
            ObjectState::Special => "special",
            ObjectState::Quest => "quest",
        };
        f.write_str(word)
    }
}

/// Where an object instance currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Room(Vnum),
    Character(CharId),
    Container(ObjectId),
    Nowhere,
}

impl Location {
    pub fn room(&self) -> Option<Vnum> {
        match self {
            Location::Room(v) => Some(*v),
            _ => None,
        }
    }
}

/// A live object: immutable template plus mutable durability state.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    pub id: ObjectId,
    pub template: Arc<ObjectTemplate>,
    pub state: ObjectState,
    pub location: Location,
    /// Insured objects are exempt from decay. Nothing sets this yet;
    /// the hook is honored by the sweep regardless.
    pub insured: bool,
}

impl ObjectInstance {
    pub fn new(id: ObjectId, template: Arc<ObjectTemplate>, location: Location) -> Self {
        Self {
            id,
            template,
            state: ObjectState::Normal,
            location,
            insured: false,
        }
    }

    /// Whether the next decay sweep may delete this instance.
    pub fn decay_eligible(&self) -> bool {
        self.state.decays() && !self.insured
    }

    pub fn matches_keyword(&self, word: &str) -> bool {
        let lower = word.to_ascii_lowercase();
        self.template
            .keywords
            .iter()
            .any(|k| k.to_ascii_lowercase().starts_with(&lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_object(state: ObjectState) -> ObjectInstance {
        let template = Arc::new(ObjectTemplate {
            vnum: Vnum(8001),
            keywords: vec!["sword".into(), "rusty".into()],
            short_desc: "a rusty sword".into(),
            long_desc: "A rusty sword lies here.".into(),
            weight: 5,
            cost: 10,
        });
        let mut obj = ObjectInstance::new(ObjectId(1), template, Location::Room(Vnum(3001)));
        obj.state = state;
        obj
    }

    #[test]
    fn test_can_become_normal_to_inventory_and_dropped() {
        assert!(ObjectState::Normal.can_become(ObjectState::Inventory));
        assert!(ObjectState::Normal.can_become(ObjectState::Dropped));
        assert!(!ObjectState::Normal.can_become(ObjectState::Equipped));
    }

    #[test]
    fn test_can_become_dropped_only_returns_to_inventory() {
        assert!(ObjectState::Dropped.can_become(ObjectState::Inventory));
        assert!(!ObjectState::Dropped.can_become(ObjectState::Equipped));
        assert!(!ObjectState::Dropped.can_become(ObjectState::Normal));
    }

    #[test]
    fn test_can_become_pinned_states_never_move() {
        for next in [
            ObjectState::Normal,
            ObjectState::Dropped,
            ObjectState::Inventory,
            ObjectState::Equipped,
        ] {
            assert!(!ObjectState::Special.can_become(next));
            assert!(!ObjectState::Quest.can_become(next));
        }
        assert!(ObjectState::Special.can_become(ObjectState::Special));
    }

    #[test]
    fn test_decay_eligible_only_dropped_uninsured() {
        assert!(test_object(ObjectState::Dropped).decay_eligible());
        assert!(!test_object(ObjectState::Inventory).decay_eligible());
        assert!(!test_object(ObjectState::Special).decay_eligible());

        let mut insured = test_object(ObjectState::Dropped);
        insured.insured = true;
        assert!(!insured.decay_eligible());
    }

    #[test]
    fn test_matches_keyword_prefix() {
        let obj = test_object(ObjectState::Normal);
        assert!(obj.matches_keyword("swo"));
        assert!(obj.matches_keyword("RUSTY"));
        assert!(!obj.matches_keyword("shield"));
    }
}
