//! Object lifecycle manager: pickup/drop/give transitions, the
//! two-phase decay sweep, and the single-slot repop queues.
//!
//! Decay runs in two phases so a dropped object always survives at
//! least one full sweep interval: phase A deletes last sweep's
//! candidates that are still dropped, phase B records the current crop
//! of dropped objects as the next candidates. Repop is replenishment,
//! not spawning: every queued reset record produces exactly one fresh
//! instance.

use embermud_proto::{CharId, ObjectId};
use tracing::{debug, error, info, warn};

use crate::character::{Character, Combatant, Mob};
use crate::error::WorldError;
use crate::object::{Location, ObjectInstance, ObjectState};
use crate::templates::{MobReset, ObjectReset};
use crate::world::{Audience, Outbox, World};

/// Result of one decay sweep.
#[derive(Debug, Default)]
pub struct DecayReport {
    /// Room-visible disappearance messages.
    pub outbox: Outbox,
    /// Instances permanently removed; callers also delete their store rows.
    pub imped: Vec<ObjectId>,
}

impl World {
    // -----------------------------------------------------------------
    // Spawning
    // -----------------------------------------------------------------

    /// Creates one mob instance from a reset record, with its scripted
    /// equipment and inventory.
    pub fn spawn_mob_from_reset(
        &mut self,
        reset: MobReset,
        roller: &mut dyn crate::dice::DiceRoller,
    ) -> Result<CharId, WorldError> {
        let template = self.mob_template(reset.mob_vnum)?;
        self.room(reset.room_vnum)?;

        let id = self.next_char_id();
        let mut mob = Mob::spawn(id, template, reset.clone(), roller);

        for &vnum in &reset.equipment {
            match self.materialize_object(vnum, Location::Character(id), ObjectState::Equipped)
            {
                Ok(obj_id) => mob.equipped.push(obj_id),
                Err(err) => error!(%vnum, %err, "mob equipment skipped"),
            }
        }
        for &vnum in &reset.inventory {
            match self.materialize_object(vnum, Location::Character(id), ObjectState::Inventory)
            {
                Ok(obj_id) => mob.inventory.push(obj_id),
                Err(err) => error!(%vnum, %err, "mob inventory skipped"),
            }
        }

        self.room_mut(reset.room_vnum)?.mobs.insert(id);
        debug!(%id, vnum = %reset.mob_vnum, room = %reset.room_vnum, "mob spawned");
        self.characters.insert(id, Character::Mob(mob));
        Ok(id)
    }

    /// Creates one object instance from a reset record, placed on the
    /// room floor in Normal state.
    pub fn spawn_object_from_reset(
        &mut self,
        reset: ObjectReset,
    ) -> Result<ObjectId, WorldError> {
        self.room(reset.room_vnum)?;
        let id =
            self.materialize_object(reset.object_vnum, Location::Room(reset.room_vnum), ObjectState::Normal)?;
        self.room_mut(reset.room_vnum)?.objects.insert(id);
        debug!(%id, vnum = %reset.object_vnum, room = %reset.room_vnum, "object spawned");
        Ok(id)
    }

    fn materialize_object(
        &mut self,
        vnum: embermud_proto::Vnum,
        location: Location,
        state: ObjectState,
    ) -> Result<ObjectId, WorldError> {
        let template = self.object_template(vnum)?;
        let id = self.next_object_id();
        let mut obj = ObjectInstance::new(id, template, location);
        obj.state = state;
        self.objects.insert(id, obj);
        Ok(id)
    }

    // -----------------------------------------------------------------
    // Death and the repop queues
    // -----------------------------------------------------------------

    /// Removes a dead mob from the graph and requeues its reset record
    /// for the next repop drain. Carried instances vanish with it.
    pub fn despawn_mob(&mut self, id: CharId) -> Result<(), WorldError> {
        let mob = match self.characters.get(&id) {
            Some(Character::Mob(m)) => m.clone(),
            Some(Character::Player(_)) => return Err(WorldError::CharacterNotFound(id)),
            None => return Err(WorldError::CharacterNotFound(id)),
        };
        for obj_id in mob.inventory.iter().chain(mob.equipped.iter()) {
            self.objects.remove(obj_id);
            self.decay_candidates.remove(obj_id);
        }
        if let Some(room) = self.rooms.get_mut(&mob.room) {
            room.mobs.remove(&id);
        }
        self.characters.remove(&id);
        self.mob_repop.push_back(mob.reset.clone());
        debug!(%id, vnum = %mob.reset.mob_vnum, "mob despawned, reset queued");
        Ok(())
    }

    /// Drains both repop queues: exactly one fresh instance per queued
    /// record. Returns (mobs spawned, objects spawned).
    pub fn repop_drain(&mut self, roller: &mut dyn crate::dice::DiceRoller) -> (usize, usize) {
        let mut mobs = 0;
        while let Some(reset) = self.mob_repop.pop_front() {
            match self.spawn_mob_from_reset(reset, roller) {
                Ok(_) => mobs += 1,
                Err(err) => error!(%err, "mob repop skipped"),
            }
        }
        let mut objects = 0;
        while let Some(reset) = self.object_repop.pop_front() {
            match self.spawn_object_from_reset(reset) {
                Ok(_) => objects += 1,
                Err(err) => error!(%err, "object repop skipped"),
            }
        }
        if mobs + objects > 0 {
            info!(mobs, objects, "repop drain");
        }
        (mobs, objects)
    }

    // -----------------------------------------------------------------
    // Pickup / drop / give
    // -----------------------------------------------------------------

    /// Picks an object up off the room floor into a character's
    /// inventory. Picking up a Normal object queues its replenishment.
    pub fn pickup(&mut self, taker: CharId, object_id: ObjectId) -> Result<Outbox, WorldError> {
        let room = self.character(taker)?.room();
        let obj = self.object(object_id)?;
        if obj.location != Location::Room(room) {
            return Err(WorldError::ObjectNotFound(object_id));
        }
        let short = obj.template.short_desc.clone();
        let state = obj.state;

        match state {
            ObjectState::Normal => {
                // Replenish the room slot this instance came from.
                self.object_repop.push_back(ObjectReset {
                    object_vnum: obj.template.vnum,
                    room_vnum: room,
                });
                self.transition(object_id, ObjectState::Inventory)?;
            }
            ObjectState::Dropped => {
                self.transition(object_id, ObjectState::Inventory)?;
                self.decay_candidates.remove(&object_id);
            }
            ObjectState::Special | ObjectState::Quest => {}
            other => {
                return Err(WorldError::IllegalTransition {
                    id: object_id,
                    from: other,
                    to: ObjectState::Inventory,
                });
            }
        }

        self.room_mut(room)?.objects.remove(&object_id);
        self.object_mut(object_id)?.location = Location::Character(taker);
        let ch = self.character_mut(taker)?;
        let name = ch.name().to_owned();
        ch.inventory_mut().push(object_id);

        Ok(vec![
            (Audience::Char(taker), format!("You pick up {short}.\r\n")),
            (
                Audience::Room { room, except: Some(taker) },
                format!("{name} picks up {short}.\r\n"),
            ),
        ])
    }

    /// Drops a carried object onto the room floor. Decay candidacy is
    /// picked up by the next sweep's phase B.
    pub fn drop_object(
        &mut self,
        dropper: CharId,
        object_id: ObjectId,
    ) -> Result<Outbox, WorldError> {
        let ch = self.character(dropper)?;
        let room = ch.room();
        let name = ch.name().to_owned();
        if !ch.inventory().contains(&object_id) {
            return Err(WorldError::ObjectNotFound(object_id));
        }
        let obj = self.object(object_id)?;
        let short = obj.template.short_desc.clone();

        match obj.state {
            ObjectState::Special | ObjectState::Quest => {}
            _ => self.transition(object_id, ObjectState::Dropped)?,
        }

        self.character_mut(dropper)?
            .inventory_mut()
            .retain(|id| *id != object_id);
        self.object_mut(object_id)?.location = Location::Room(room);
        self.room_mut(room)?.objects.insert(object_id);

        Ok(vec![
            (Audience::Char(dropper), format!("You drop {short}.\r\n")),
            (
                Audience::Room { room, except: Some(dropper) },
                format!("{name} drops {short}.\r\n"),
            ),
        ])
    }

    /// Hands a carried object to another character in the same room.
    /// Gifts to mobs count as dropped for decay purposes.
    pub fn give(
        &mut self,
        giver: CharId,
        object_id: ObjectId,
        receiver: CharId,
    ) -> Result<Outbox, WorldError> {
        let giver_ch = self.character(giver)?;
        let room = giver_ch.room();
        let giver_name = giver_ch.name().to_owned();
        if !giver_ch.inventory().contains(&object_id) {
            return Err(WorldError::ObjectNotFound(object_id));
        }
        let receiver_ch = self.character(receiver)?;
        if receiver_ch.room() != room {
            return Err(WorldError::CharacterNotFound(receiver));
        }
        let receiver_name = receiver_ch.name().to_owned();
        let receiver_is_player = receiver_ch.is_player();

        let obj = self.object(object_id)?;
        let short = obj.template.short_desc.clone();
        match obj.state {
            ObjectState::Special | ObjectState::Quest => {}
            _ if receiver_is_player => self.transition(object_id, ObjectState::Inventory)?,
            _ => self.transition(object_id, ObjectState::Dropped)?,
        }

        self.character_mut(giver)?
            .inventory_mut()
            .retain(|id| *id != object_id);
        self.character_mut(receiver)?.inventory_mut().push(object_id);
        self.object_mut(object_id)?.location = Location::Character(receiver);

        Ok(vec![
            (
                Audience::Char(giver),
                format!("You give {short} to {receiver_name}.\r\n"),
            ),
            (
                Audience::Char(receiver),
                format!("{giver_name} gives you {short}.\r\n"),
            ),
            (
                Audience::Room { room, except: Some(giver) },
                format!("{giver_name} gives {short} to {receiver_name}.\r\n"),
            ),
        ])
    }

    fn transition(&mut self, id: ObjectId, to: ObjectState) -> Result<(), WorldError> {
        let obj = self.object_mut(id)?;
        let from = obj.state;
        if !from.can_become(to) {
            warn!(%id, %from, %to, "illegal object transition");
            return Err(WorldError::IllegalTransition { id, from, to });
        }
        obj.state = to;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Decay
    // -----------------------------------------------------------------

    /// One two-phase decay sweep. An object dropped at sweep T is imped
    /// at sweep T+2 at the latest, and never before T+1.
    pub fn decay_sweep(&mut self) -> DecayReport {
        let mut report = DecayReport::default();

        // Phase A: imp last sweep's survivors.
        let candidates: Vec<ObjectId> = self.decay_candidates.drain().collect();
        for id in candidates {
            let Some(obj) = self.objects.get(&id) else {
                continue;
            };
            if !obj.decay_eligible() {
                continue;
            }
            let short = obj.template.short_desc.clone();
            match obj.location {
                Location::Room(vnum) => {
                    if let Some(room) = self.rooms.get_mut(&vnum) {
                        room.objects.remove(&id);
                    }
                    report.outbox.push((
                        Audience::Room { room: vnum, except: None },
                        format!("{short} crumbles into dust.\r\n"),
                    ));
                }
                Location::Character(holder) => {
                    if let Some(ch) = self.characters.get_mut(&holder) {
                        ch.inventory_mut().retain(|o| *o != id);
                    }
                }
                Location::Container(_) | Location::Nowhere => {}
            }
            self.objects.remove(&id);
            debug!(%id, "object imped");
            report.imped.push(id);
        }

        // Phase B: everything dropped right now is next sweep's crop.
        self.decay_candidates = self
            .objects
            .values()
            .filter(|o| o.decay_eligible())
            .map(|o| o.id)
            .collect();

        if !report.imped.is_empty() || !self.decay_candidates.is_empty() {
            info!(
                imped = report.imped.len(),
                candidates = self.decay_candidates.len(),
                "decay sweep"
            );
        }
        report
    }
}
