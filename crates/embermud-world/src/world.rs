//! The world context: one explicitly constructed object owning the
//! whole entity graph.
//!
//! There are no global registries. The server builds a `World` from a
//! bulk [`WorldData`] load and hands it to the single world-owning
//! task; tests build small throwaway worlds the same way. All mutation
//! goes through `&mut World` on that one task.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use embermud_proto::{CharId, ObjectId, Vnum};
use tracing::{debug, error, info};

use crate::character::{Character, Combatant, Player};
use crate::dice::DiceRoller;
use crate::error::WorldError;
use crate::object::ObjectInstance;
use crate::room::{Direction, Room};
use crate::templates::{MobReset, MobTemplate, ObjectReset, ObjectTemplate, WorldData};

/// Chance per fast tick that an unrestrained mob wanders.
const WANDER_CHANCE: f64 = 0.05;

/// Who a piece of output text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// One character (delivered only if it is a connected player).
    Char(CharId),
    /// Everyone in a room, optionally excluding one character.
    Room { room: Vnum, except: Option<CharId> },
    /// Everyone in a room except a pair, for combat observer messages.
    RoomExceptPair { room: Vnum, exclude: [CharId; 2] },
    /// Every connected player.
    All,
}

/// Output produced by a world mutation, dispatched by the gateway.
pub type Outbox = Vec<(Audience, String)>;

/// The shared entity graph plus the lifecycle queues that feed the
/// scheduler's sweeps.
pub struct World {
    pub rooms: HashMap<Vnum, Room>,
    mob_templates: HashMap<Vnum, Arc<MobTemplate>>,
    object_templates: HashMap<Vnum, Arc<ObjectTemplate>>,
    pub characters: HashMap<CharId, Character>,
    pub objects: HashMap<ObjectId, ObjectInstance>,

    pub(crate) mob_repop: VecDeque<MobReset>,
    pub(crate) object_repop: VecDeque<ObjectReset>,
    pub(crate) decay_candidates: HashSet<ObjectId>,

    pub respawn_room: Vnum,
    next_char_id: u64,
    next_object_id: u64,
}

impl World {
    /// Builds the world from a bulk load and runs the initial reset
    /// pass, spawning one instance per reset record.
    pub fn load(data: WorldData, roller: &mut dyn DiceRoller) -> Self {
        let mut world = Self {
            rooms: data.rooms.into_iter().map(|r| (r.vnum, r)).collect(),
            mob_templates: data
                .mob_templates
                .into_iter()
                .map(|t| (t.vnum, Arc::new(t)))
                .collect(),
            object_templates: data
                .object_templates
                .into_iter()
                .map(|t| (t.vnum, Arc::new(t)))
                .collect(),
            characters: HashMap::new(),
            objects: HashMap::new(),
            mob_repop: data.mob_resets.into(),
            object_repop: data.object_resets.into(),
            decay_candidates: HashSet::new(),
            respawn_room: data.respawn_room,
            next_char_id: 1,
            next_object_id: 1,
        };
        let (mobs, objects) = world.repop_drain(roller);
        info!(
            rooms = world.rooms.len(),
            mobs, objects, "world loaded"
        );
        world
    }

    pub fn next_char_id(&mut self) -> CharId {
        let id = CharId(self.next_char_id);
        self.next_char_id += 1;
        id
    }

    pub fn next_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        id
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    pub fn room(&self, vnum: Vnum) -> Result<&Room, WorldError> {
        self.rooms.get(&vnum).ok_or(WorldError::RoomNotFound(vnum))
    }

    pub fn room_mut(&mut self, vnum: Vnum) -> Result<&mut Room, WorldError> {
        self.rooms
            .get_mut(&vnum)
            .ok_or(WorldError::RoomNotFound(vnum))
    }

    pub fn character(&self, id: CharId) -> Result<&Character, WorldError> {
        self.characters
            .get(&id)
            .ok_or(WorldError::CharacterNotFound(id))
    }

    pub fn character_mut(&mut self, id: CharId) -> Result<&mut Character, WorldError> {
        self.characters
            .get_mut(&id)
            .ok_or(WorldError::CharacterNotFound(id))
    }

    pub fn object(&self, id: ObjectId) -> Result<&ObjectInstance, WorldError> {
        self.objects.get(&id).ok_or(WorldError::ObjectNotFound(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectInstance, WorldError> {
        self.objects
            .get_mut(&id)
            .ok_or(WorldError::ObjectNotFound(id))
    }

    pub(crate) fn mob_template(&self, vnum: Vnum) -> Result<Arc<MobTemplate>, WorldError> {
        self.mob_templates
            .get(&vnum)
            .cloned()
            .ok_or(WorldError::MobTemplateNotFound(vnum))
    }

    pub(crate) fn object_template(
        &self,
        vnum: Vnum,
    ) -> Result<Arc<ObjectTemplate>, WorldError> {
        self.object_templates
            .get(&vnum)
            .cloned()
            .ok_or(WorldError::ObjectTemplateNotFound(vnum))
    }

    /// First mob in the room matching a targeting keyword.
    pub fn find_mob_in_room(&self, room: Vnum, keyword: &str) -> Option<CharId> {
        let room = self.rooms.get(&room)?;
        let mut ids: Vec<CharId> = room.mobs.iter().copied().collect();
        ids.sort_unstable_by_key(|id| id.0);
        ids.into_iter().find(|id| {
            self.characters
                .get(id)
                .and_then(|c| c.as_mob())
                .is_some_and(|m| m.matches_keyword(keyword))
        })
    }

    /// First object on the room floor matching a keyword.
    pub fn find_object_in_room(&self, room: Vnum, keyword: &str) -> Option<ObjectId> {
        let room = self.rooms.get(&room)?;
        let mut ids: Vec<ObjectId> = room.objects.iter().copied().collect();
        ids.sort_unstable_by_key(|id| id.0);
        ids.into_iter().find(|id| {
            self.objects
                .get(id)
                .is_some_and(|o| o.matches_keyword(keyword))
        })
    }

    /// First carried object matching a keyword.
    pub fn find_object_in_inventory(&self, holder: CharId, keyword: &str) -> Option<ObjectId> {
        let ch = self.characters.get(&holder)?;
        ch.inventory()
            .iter()
            .copied()
            .find(|id| {
                self.objects
                    .get(id)
                    .is_some_and(|o| o.matches_keyword(keyword))
            })
    }

    /// Connected-or-not player characters, for the periodic store flush.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.characters.values().filter_map(|c| c.as_player())
    }

    // -----------------------------------------------------------------
    // Entering and leaving the graph
    // -----------------------------------------------------------------

    /// Inserts a player character and adds it to its room, falling back
    /// to the respawn room if its saved room no longer exists.
    pub fn enter_player(&mut self, mut player: Player) -> Result<CharId, WorldError> {
        if !self.rooms.contains_key(&player.room) {
            debug!(name = %player.name, room = %player.room, "saved room missing, using respawn room");
            player.room = self.respawn_room;
        }
        let id = player.id;
        let room = player.room;
        self.room_mut(room)?.players.insert(id);
        info!(%id, name = %player.name, %room, "player entered world");
        self.characters.insert(id, Character::Player(player));
        Ok(id)
    }

    /// Removes a player from the graph, returning it for saving.
    pub fn remove_player(&mut self, id: CharId) -> Option<Player> {
        let ch = self.characters.remove(&id)?;
        if let Some(room) = self.rooms.get_mut(&ch.room()) {
            room.players.remove(&id);
        }
        match ch {
            Character::Player(p) => {
                info!(%id, name = %p.name, "player left world");
                Some(p)
            }
            Character::Mob(m) => {
                // Wrong index entry; put it back and report the miss.
                error!(%id, "remove_player hit a mob");
                self.characters.insert(id, Character::Mob(m));
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------

    /// Moves a character through an exit, with departure and arrival
    /// broadcasts. Locked or missing exits fail without side effects.
    pub fn move_char(
        &mut self,
        id: CharId,
        direction: Direction,
    ) -> Result<Outbox, WorldError> {
        let ch = self.character(id)?;
        let from = ch.room();
        let name = ch.name().to_owned();
        let is_player = ch.is_player();

        let exit = *self
            .room(from)?
            .exit(direction)
            .ok_or(WorldError::NoExit {
                room: from,
                direction,
            })?;
        if exit.locked {
            return Err(WorldError::ExitLocked {
                room: from,
                direction,
            });
        }
        let to = exit.to_room;
        // Destination must exist before we touch anything.
        self.room(to)?;

        {
            let from_room = self.room_mut(from)?;
            from_room.players.remove(&id);
            from_room.mobs.remove(&id);
        }
        {
            let to_room = self.room_mut(to)?;
            if is_player {
                to_room.players.insert(id);
            } else {
                to_room.mobs.insert(id);
            }
        }
        self.character_mut(id)?.set_room(to);

        debug!(%id, %from, %to, %direction, "character moved");
        Ok(vec![
            (
                Audience::Room {
                    room: from,
                    except: Some(id),
                },
                format!("{name} leaves {direction}.\r\n"),
            ),
            (
                Audience::Room {
                    room: to,
                    except: Some(id),
                },
                format!("{name} arrives from the {}.\r\n", direction.reverse()),
            ),
        ])
    }

    /// Moves a character straight to a room, ignoring exits. Used for
    /// respawn and recall rather than normal movement.
    pub fn relocate(&mut self, id: CharId, to: Vnum) -> Result<(), WorldError> {
        let ch = self.character(id)?;
        let from = ch.room();
        let is_player = ch.is_player();
        self.room(to)?;
        {
            let from_room = self.room_mut(from)?;
            from_room.players.remove(&id);
            from_room.mobs.remove(&id);
        }
        {
            let to_room = self.room_mut(to)?;
            if is_player {
                to_room.players.insert(id);
            } else {
                to_room.mobs.insert(id);
            }
        }
        self.character_mut(id)?.set_room(to);
        debug!(%id, %from, %to, "character relocated");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scheduled passes
    // -----------------------------------------------------------------

    /// Main-tick regeneration. Rate scales with position (full asleep,
    /// half resting, a tenth standing), doubled in haven rooms. Returns
    /// the characters whose pools changed.
    pub fn regen_tick(&mut self) -> Vec<CharId> {
        let mut changed = Vec::new();
        let ids: Vec<CharId> = self.characters.keys().copied().collect();
        for id in ids {
            let Some(ch) = self.characters.get(&id) else {
                continue;
            };
            if ch.is_dead() {
                continue;
            }
            let mut factor = ch.position().regen_factor();
            if self
                .rooms
                .get(&ch.room())
                .is_some_and(|r| r.haven)
            {
                factor *= 2.0;
            }
            let Some(ch) = self.characters.get_mut(&id) else {
                continue;
            };
            let mut touched = false;

            let hp_gain = regen_amount(ch.max_hitpoints(), factor);
            if ch.hitpoints() < ch.max_hitpoints() {
                ch.heal(hp_gain);
                touched = true;
            }
            if let Some(p) = ch.as_player_mut() {
                if p.mana < p.max_mana {
                    p.mana = (p.mana + regen_amount(p.max_mana, factor)).min(p.max_mana);
                    touched = true;
                }
                if p.stamina < p.max_stamina {
                    p.stamina =
                        (p.stamina + regen_amount(p.max_stamina, factor)).min(p.max_stamina);
                    touched = true;
                }
            }
            if touched {
                changed.push(id);
            }
        }
        changed
    }

    /// Fast-tick mob wandering: each non-sentinel mob has a small
    /// chance to step through a random unlocked exit.
    pub fn wander_tick(&mut self, roller: &mut dyn DiceRoller) -> Outbox {
        let mut outbox = Outbox::new();
        let mob_ids: Vec<CharId> = self
            .characters
            .values()
            .filter_map(|c| c.as_mob())
            .filter(|m| !m.template.sentinel)
            .map(|m| m.id)
            .collect();

        for id in mob_ids {
            if roller.percent() >= WANDER_CHANCE {
                continue;
            }
            let Some(room) = self
                .characters
                .get(&id)
                .map(|c| c.room())
                .and_then(|v| self.rooms.get(&v))
            else {
                continue;
            };
            let open = room.unlocked_exits();
            if open.is_empty() {
                continue;
            }
            let (direction, _) = open[roller.choose(open.len())];
            match self.move_char(id, direction) {
                Ok(msgs) => outbox.extend(msgs),
                Err(err) => error!(%id, %err, "mob wander failed"),
            }
        }
        outbox
    }
}

/// Base regeneration is a tenth of the pool per main tick, scaled by
/// the position/haven factor, never below 1.
fn regen_amount(max: i32, factor: f64) -> i32 {
    let base = (max / 10).max(1) as f64;
    (base * factor).round().max(1.0) as i32
}
