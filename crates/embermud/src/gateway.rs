//! The gateway: the single world-owning engine behind the event channel.
//!
//! Reader tasks decode telnet into [`Event`]s; the server loop feeds
//! them here one at a time, so every mutation of the world, the combat
//! state and the session directory happens on one task. Output is
//! buffered per session and flushed once per loop iteration, with the
//! status prompt appended for logged-in players and GMCP pushes for
//! capable clients.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use embermud_combat::{Combat, CombatError};
use embermud_proto::{CharId, CharVitals, GmcpFrame, RoomInfo, SessionId, Vnum, encode_gmcp, gmcp_offer};
use embermud_session::{
    Credentials, EnterWorld, LoginLookup, LoginOutcome, LoginPhase, NAME_PROMPT, SessionDirectory,
    advance,
};
use embermud_world::{
    Audience, Combatant, ObjectRecord, ObjectStore, Outbox, Player, PlayerStore, Position,
    ThreadDice, World, WorldError,
};

use crate::dispatch::{Command, parse};

/// One decoded unit of client activity, produced by the connection
/// tasks and consumed by the world loop.
#[derive(Debug)]
pub enum Event {
    Line { session: SessionId, line: String },
    GmcpAccept { session: SessionId },
    GmcpRefuse { session: SessionId },
    Gmcp { session: SessionId, frame: GmcpFrame },
    Disconnected { session: SessionId },
}

const GREETING: &str = "Welcome to Embermud.\r\n\r\n";

/// Everything the world loop owns.
pub struct Engine {
    pub world: World,
    pub combat: Combat,
    pub directory: SessionDirectory,
    writers: HashMap<SessionId, UnboundedSender<Vec<u8>>>,
    players: PlayerStore,
    objects: ObjectStore,
    credentials: Box<dyn Credentials>,
    roller: ThreadDice,
}

/// Read-only view the login machine queries.
struct Lookup<'a> {
    directory: &'a SessionDirectory,
    players: &'a PlayerStore,
}

impl LoginLookup for Lookup<'_> {
    fn is_online(&self, name: &str) -> bool {
        self.directory.session_for_name(name).is_some()
    }

    fn has_saved(&self, name: &str) -> bool {
        self.players.exists(name)
    }
}

impl Engine {
    pub fn new(
        world: World,
        players: PlayerStore,
        objects: ObjectStore,
        credentials: Box<dyn Credentials>,
    ) -> Self {
        Self {
            world,
            combat: Combat::default(),
            directory: SessionDirectory::new(),
            writers: HashMap::new(),
            players,
            objects,
            credentials,
            roller: ThreadDice,
        }
    }

    /// Registers a new connection: greeting, GMCP offer, name prompt.
    pub fn accept(&mut self, writer: UnboundedSender<Vec<u8>>) -> SessionId {
        let id = self.directory.create();
        // The capability offer goes out raw; the decoder on the other
        // end answers with WILL or WONT.
        let _ = writer.send(gmcp_offer().to_vec());
        self.writers.insert(id, writer);
        self.push_to(id, GREETING);
        self.push_to(id, NAME_PROMPT);
        id
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Line { session, line } => self.handle_line(session, line),
            Event::GmcpAccept { session } => {
                if let Some(s) = self.directory.get_mut(session) {
                    s.gmcp = true;
                    debug!(%session, "gmcp enabled");
                }
            }
            Event::GmcpRefuse { session } => {
                if let Some(s) = self.directory.get_mut(session) {
                    s.gmcp = false;
                }
            }
            Event::Gmcp { session, frame } => {
                // Core.Hello and friends carry no server-side behavior.
                debug!(%session, package = %frame.package, message = %frame.message, "gmcp frame");
            }
            Event::Disconnected { session } => self.close_session(session, false),
        }
    }

    fn handle_line(&mut self, session: SessionId, line: String) {
        let (playing, character) = match self.directory.get(session) {
            Some(s) => (matches!(s.phase, LoginPhase::Playing), s.character),
            None => return,
        };
        match character {
            Some(ch) if playing => self.dispatch_line(session, ch, &line),
            _ => self.login_step(session, &line),
        }
    }

    // -----------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------

    fn login_step(&mut self, session: SessionId, line: &str) {
        let Some(s) = self.directory.get_mut(session) else {
            return;
        };
        let phase = std::mem::replace(&mut s.phase, LoginPhase::AwaitingName);
        let (next, outcome) = {
            let lookup = Lookup {
                directory: &self.directory,
                players: &self.players,
            };
            advance(phase, line, &lookup, self.credentials.as_mut())
        };
        if let Some(s) = self.directory.get_mut(session) {
            s.phase = next;
        }
        match outcome {
            LoginOutcome::Prompt(text) => self.push_to(session, &text),
            LoginOutcome::Enter(order) => self.enter_world(session, order),
        }
    }

    fn enter_world(&mut self, session: SessionId, order: EnterWorld) {
        if order.takeover {
            if let Some(ch) = self.takeover_character(&order.name) {
                self.bind_and_announce(session, &order.name, ch, None);
                return;
            }
            // The prior session vanished between prompt and confirm;
            // fall through to a normal load.
        }

        if order.new_character {
            let (Some(race), Some(origin)) = (order.race, order.origin) else {
                error!(name = %order.name, "onboarding finished without race or origin");
                self.restart_login(session);
                return;
            };
            let id = self.world.next_char_id();
            let player = Player::new(id, &order.name, race, origin, self.world.respawn_room);
            if let Err(err) = self.players.save(&player) {
                error!(name = %order.name, %err, "saving new character failed");
            }
            match self.world.enter_player(player) {
                Ok(ch) => {
                    let motd = format!(
                        "\r\nWelcome to Embermud, {} the {}!\r\nMay your torch stay lit and your blade stay sharp.\r\n",
                        order.name, race.name
                    );
                    self.bind_and_announce(session, &order.name, ch, Some(motd));
                }
                Err(err) => {
                    error!(name = %order.name, %err, "entering world failed");
                    self.restart_login(session);
                }
            }
            return;
        }

        match self.players.load(&order.name) {
            Ok(Some(mut player)) => {
                player.id = self.world.next_char_id();
                match self.world.enter_player(player) {
                    Ok(ch) => {
                        let motd = format!("\r\nWelcome back, {}.\r\n", order.name);
                        self.bind_and_announce(session, &order.name, ch, Some(motd));
                    }
                    Err(err) => {
                        error!(name = %order.name, %err, "entering world failed");
                        self.restart_login(session);
                    }
                }
            }
            Ok(None) => {
                error!(name = %order.name, "character file missing after password check");
                self.restart_login(session);
            }
            Err(err) => {
                error!(name = %order.name, %err, "loading character failed");
                self.restart_login(session);
            }
        }
    }

    /// Detaches the character from the session currently holding the
    /// name and tears that connection down with a notice.
    fn takeover_character(&mut self, name: &str) -> Option<CharId> {
        let old = self.directory.session_for_name(name)?;
        let ch = self.directory.get_mut(old).and_then(|s| s.character.take())?;
        self.push_to(old, "\r\nReconnected from another location.\r\n");
        self.flush_one(old);
        self.close_session(old, true);
        info!(name, %ch, "session taken over");
        Some(ch)
    }

    fn bind_and_announce(
        &mut self,
        session: SessionId,
        name: &str,
        ch: CharId,
        motd: Option<String>,
    ) {
        if let Err(err) = self.directory.bind(session, name, ch) {
            error!(%session, %err, "binding session failed");
            return;
        }
        if let Some(motd) = motd {
            self.push_to(session, &motd);
        }
        let glance = self.room_glance(ch);
        self.push_to(session, &glance);
        let room = self.world.character(ch).map(|c| c.room()).ok();
        let mut outbox: Outbox = vec![(
            Audience::All,
            format!("{name} has entered the realm.\r\n"),
        )];
        if let Some(room) = room {
            outbox.push((
                Audience::Room { room, except: Some(ch) },
                format!("{name} appears in the room.\r\n"),
            ));
        }
        self.deliver(outbox);
    }

    fn restart_login(&mut self, session: SessionId) {
        if let Some(s) = self.directory.get_mut(session) {
            s.phase = LoginPhase::AwaitingName;
        }
        self.push_to(session, &format!("Something went wrong.\r\n{NAME_PROMPT}"));
    }

    // -----------------------------------------------------------------
    // Command dispatch
    // -----------------------------------------------------------------

    fn dispatch_line(&mut self, session: SessionId, ch: CharId, line: &str) {
        let cmd = match parse(line) {
            Ok(cmd) => cmd,
            Err(denial) => {
                if !denial.is_empty() {
                    self.push_to(session, &format!("{denial}\r\n"));
                }
                return;
            }
        };

        let position = self
            .world
            .character(ch)
            .map(|c| c.position())
            .unwrap_or_default();
        if position == Position::Sleeping
            && !matches!(cmd, Command::Stand | Command::Save | Command::Quit)
        {
            self.push_to(session, "In your dreams, or what?\r\n");
            return;
        }

        match cmd {
            Command::Move(direction) => {
                if self.combat.manager.in_combat(ch) {
                    self.push_to(session, "No way! You are still fighting!\r\n");
                    return;
                }
                if position != Position::Standing {
                    self.push_to(session, "You'd better stand up first.\r\n");
                    return;
                }
                match self.world.move_char(ch, direction) {
                    Ok(outbox) => {
                        self.deliver(outbox);
                        let glance = self.room_glance(ch);
                        self.push_to(session, &glance);
                    }
                    Err(WorldError::NoExit { .. }) => {
                        self.push_to(session, "Alas, you cannot go that way.\r\n");
                    }
                    Err(WorldError::ExitLocked { .. }) => {
                        self.push_to(session, "It's locked.\r\n");
                    }
                    Err(err) => error!(%ch, %err, "move failed"),
                }
            }

            Command::Kill(target) => {
                if position != Position::Standing {
                    self.push_to(session, "You'd better stand up first.\r\n");
                    return;
                }
                let room = match self.world.character(ch) {
                    Ok(c) => c.room(),
                    Err(_) => return,
                };
                let Some(victim) = self.world.find_mob_in_room(room, &target) else {
                    self.push_to(session, "They aren't here.\r\n");
                    return;
                };
                match self.combat.initiate(&mut self.world, ch, victim, &mut self.roller) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(CombatError::DeadCombatant(_)) => {
                        self.push_to(session, "They are already dead.\r\n");
                    }
                    Err(err) => error!(%ch, %err, "kill failed"),
                }
            }

            Command::Flee => {
                match self.combat.attempt_flee(&mut self.world, ch, &mut self.roller) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(CombatError::NotEngaged(_)) => {
                        self.push_to(session, "You aren't fighting anyone.\r\n");
                    }
                    Err(err) => error!(%ch, %err, "flee failed"),
                }
            }

            Command::Get(keyword) => {
                let room = match self.world.character(ch) {
                    Ok(c) => c.room(),
                    Err(_) => return,
                };
                let Some(object) = self.world.find_object_in_room(room, &keyword) else {
                    self.push_to(session, "You do not see that here.\r\n");
                    return;
                };
                match self.world.pickup(ch, object) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(WorldError::IllegalTransition { .. }) => {
                        self.push_to(session, "You can't take that.\r\n");
                    }
                    Err(err) => error!(%ch, %err, "pickup failed"),
                }
            }

            Command::Drop(keyword) => {
                let Some(object) = self.world.find_object_in_inventory(ch, &keyword) else {
                    self.push_to(session, "You aren't carrying that.\r\n");
                    return;
                };
                match self.world.drop_object(ch, object) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(err) => error!(%ch, %err, "drop failed"),
                }
            }

            Command::Give { item, target } => {
                let Some(object) = self.world.find_object_in_inventory(ch, &item) else {
                    self.push_to(session, "You aren't carrying that.\r\n");
                    return;
                };
                let room = match self.world.character(ch) {
                    Ok(c) => c.room(),
                    Err(_) => return,
                };
                let Some(receiver) = self.find_char_in_room(room, &target, ch) else {
                    self.push_to(session, "They aren't here.\r\n");
                    return;
                };
                match self.world.give(ch, object, receiver) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(err) => error!(%ch, %err, "give failed"),
                }
            }

            Command::Rest => {
                if self.combat.manager.in_combat(ch) {
                    self.push_to(session, "No way! You are still fighting!\r\n");
                    return;
                }
                self.change_position(session, ch, Position::Resting, "You sit down and rest.", "sits down and rests");
            }

            Command::Sleep => {
                if self.combat.manager.in_combat(ch) {
                    self.push_to(session, "No way! You are still fighting!\r\n");
                    return;
                }
                self.change_position(session, ch, Position::Sleeping, "You go to sleep.", "lies down and sleeps");
            }

            Command::Stand => {
                if position == Position::Standing {
                    self.push_to(session, "You are already standing.\r\n");
                    return;
                }
                self.change_position(session, ch, Position::Standing, "You stand up.", "stands up");
            }

            Command::Say(message) => {
                let (name, room) = match self.world.character(ch) {
                    Ok(c) => (c.name().to_owned(), c.room()),
                    Err(_) => return,
                };
                self.push_to(session, &format!("You say '{message}'\r\n"));
                self.deliver(vec![(
                    Audience::Room { room, except: Some(ch) },
                    format!("{name} says '{message}'\r\n"),
                )]);
            }

            Command::Save => {
                let saved = self
                    .world
                    .character(ch)
                    .ok()
                    .and_then(|c| c.as_player())
                    .map(|p| self.players.save(p));
                match saved {
                    Some(Ok(())) => self.push_to(session, "Saved.\r\n"),
                    Some(Err(err)) => {
                        error!(%ch, %err, "save failed");
                        self.push_to(session, "Your save failed; it will be retried.\r\n");
                    }
                    None => {}
                }
            }

            Command::Quit => {
                self.push_to(session, "Goodbye.\r\n");
                self.flush_one(session);
                self.close_session(session, false);
            }
        }
    }

    fn change_position(
        &mut self,
        session: SessionId,
        ch: CharId,
        position: Position,
        own: &str,
        room_verb: &str,
    ) {
        let (name, room) = match self.world.character_mut(ch) {
            Ok(c) => {
                c.set_position(position);
                (c.name().to_owned(), c.room())
            }
            Err(_) => return,
        };
        self.push_to(session, &format!("{own}\r\n"));
        self.deliver(vec![(
            Audience::Room { room, except: Some(ch) },
            format!("{name} {room_verb}.\r\n"),
        )]);
    }

    /// A mob by keyword, or another player by name prefix.
    fn find_char_in_room(&self, room: Vnum, keyword: &str, asker: CharId) -> Option<CharId> {
        if let Some(mob) = self.world.find_mob_in_room(room, keyword) {
            return Some(mob);
        }
        let lower = keyword.to_ascii_lowercase();
        let room = self.world.rooms.get(&room)?;
        let mut ids: Vec<CharId> = room.players.iter().copied().collect();
        ids.sort_unstable_by_key(|id| id.0);
        ids.into_iter().filter(|id| *id != asker).find(|id| {
            self.world
                .characters
                .get(id)
                .is_some_and(|c| c.name().to_ascii_lowercase().starts_with(&lower))
        })
    }

    /// What a character sees on arriving in its room.
    fn room_glance(&self, viewer: CharId) -> String {
        let Ok(ch) = self.world.character(viewer) else {
            return String::new();
        };
        let Ok(room) = self.world.room(ch.room()) else {
            return String::new();
        };
        let mut text = format!("\r\n{}\r\n{}\r\n", room.name, room.description);
        let exits: Vec<&str> = room.exits.keys().map(|d| d.word()).collect();
        text.push_str(&format!("[Exits: {}]\r\n", exits.join(" ")));
        for id in &room.objects {
            if let Some(obj) = self.world.objects.get(id) {
                text.push_str(&format!("{}\r\n", obj.template.long_desc));
            }
        }
        for id in &room.mobs {
            if let Some(mob) = self.world.characters.get(id).and_then(|c| c.as_mob()) {
                text.push_str(&format!("{}\r\n", mob.template.long_desc));
            }
        }
        for id in &room.players {
            if *id == viewer {
                continue;
            }
            if let Some(other) = self.world.characters.get(id) {
                text.push_str(&format!("{} is here.\r\n", other.name()));
            }
        }
        text
    }

    // -----------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------

    fn push_to(&mut self, session: SessionId, text: &str) {
        if let Some(s) = self.directory.get_mut(session) {
            s.push(text);
        }
    }

    /// Routes world output to session buffers.
    pub fn deliver(&mut self, outbox: Outbox) {
        for (audience, text) in outbox {
            match audience {
                Audience::Char(ch) => {
                    if let Some(sid) = self.directory.session_for_char(ch) {
                        self.push_to(sid, &text);
                    }
                }
                Audience::Room { room, except } => {
                    self.deliver_room(room, &text, &[except]);
                }
                Audience::RoomExceptPair { room, exclude } => {
                    self.deliver_room(room, &text, &[Some(exclude[0]), Some(exclude[1])]);
                }
                Audience::All => {
                    for sid in self.directory.ids() {
                        if self.directory.get(sid).is_some_and(|s| s.is_playing()) {
                            self.push_to(sid, &text);
                        }
                    }
                }
            }
        }
    }

    fn deliver_room(&mut self, room: Vnum, text: &str, skip: &[Option<CharId>]) {
        let ids: Vec<CharId> = self
            .world
            .rooms
            .get(&room)
            .map(|r| {
                r.players
                    .iter()
                    .copied()
                    .filter(|p| !skip.contains(&Some(*p)))
                    .collect()
            })
            .unwrap_or_default();
        for ch in ids {
            if let Some(sid) = self.directory.session_for_char(ch) {
                self.push_to(sid, text);
            }
        }
    }

    /// Flushes every session's buffered output, with the status prompt
    /// for logged-in players and GMCP pushes for capable clients.
    pub fn flush_all(&mut self) {
        for sid in self.directory.ids() {
            self.flush_one(sid);
        }
    }

    fn flush_one(&mut self, sid: SessionId) {
        let mut vitals = None;
        let mut room_info = None;
        let mut prompt = None;
        if let Some(s) = self.directory.get(sid) {
            if let Some(ch) = s.character {
                if let Some(p) = self.world.characters.get(&ch).and_then(|c| c.as_player()) {
                    prompt = Some(p.prompt());
                    if s.gmcp {
                        vitals = Some(CharVitals {
                            hp: p.hitpoints,
                            maxhp: p.max_hitpoints,
                            mp: p.mana,
                            maxmp: p.max_mana,
                            sp: p.stamina,
                            maxsp: p.max_stamina,
                            tnl: p.tnl - p.xp,
                        });
                        if s.last_room != Some(p.room) {
                            if let Ok(room) = self.world.room(p.room) {
                                room_info = Some((
                                    p.room,
                                    RoomInfo {
                                        num: room.vnum.0,
                                        name: room.name.clone(),
                                        zone: room.zone.clone(),
                                        environment: room.environment.clone(),
                                        exits: room
                                            .exits
                                            .iter()
                                            .map(|(d, e)| {
                                                let state = if e.locked { "C" } else { "O" };
                                                (d.letter().to_owned(), state.to_owned())
                                            })
                                            .collect(),
                                    },
                                ));
                            }
                        }
                    }
                }
            }
        }

        let Some(s) = self.directory.get_mut(sid) else {
            return;
        };
        let mut payload = Vec::new();
        if let Some(v) = vitals {
            if s.last_vitals.as_ref() != Some(&v) {
                if let Ok(value) = serde_json::to_value(&v) {
                    payload.extend(encode_gmcp("Char", "Vitals", &value));
                }
                s.last_vitals = Some(v);
            }
        }
        if let Some((vnum, info)) = room_info {
            if let Ok(value) = serde_json::to_value(&info) {
                payload.extend(encode_gmcp("Room", "Info", &value));
            }
            s.last_room = Some(vnum);
        }
        let text = s.take_output();
        if !text.is_empty() {
            payload.extend(text.as_bytes());
            if let Some(prompt) = prompt {
                payload.extend(prompt.as_bytes());
            }
        }
        if payload.is_empty() {
            return;
        }
        if let Some(tx) = self.writers.get(&sid) {
            if tx.send(payload).is_err() {
                debug!(%sid, "writer task gone");
            }
        }
    }

    // -----------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------

    /// Removes a session. Unless `keep_character` (reconnect takeover),
    /// the bound character is saved and leaves the world.
    pub fn close_session(&mut self, id: SessionId, keep_character: bool) {
        let Some(s) = self.directory.remove(id) else {
            return;
        };
        self.writers.remove(&id);
        let Some(ch) = s.character else {
            return;
        };
        if keep_character {
            return;
        }

        let partners = self.combat.manager.engaged_with(ch);
        self.combat.manager.disengage_all(ch);
        for partner in partners {
            self.combat.manager.refocus(partner);
        }

        if let Some(player) = self.world.remove_player(ch) {
            if let Err(err) = self.players.save(&player) {
                error!(name = %player.name, %err, "save on disconnect failed");
            }
            self.deliver(vec![(
                Audience::Room { room: player.room, except: None },
                format!("{} has left the realm.\r\n", player.name),
            )]);
        }
    }

    /// Saves everyone and says goodbye; the caller stops the loop.
    pub fn shutdown(&mut self) {
        info!("shutting down");
        for player in self.world.players() {
            if let Err(err) = self.players.save(player) {
                error!(name = %player.name, %err, "save on shutdown failed");
            }
        }
        self.deliver(vec![(
            Audience::All,
            "\r\nThe world fades away. Come back soon.\r\n".to_owned(),
        )]);
        self.flush_all();
    }

    // -----------------------------------------------------------------
    // Scheduled passes
    // -----------------------------------------------------------------

    /// Fast tick: mob wandering.
    pub fn fast_tick(&mut self) {
        let outbox = self.world.wander_tick(&mut self.roller);
        self.deliver(outbox);
    }

    /// Main tick: regeneration plus the player-store flush. Vitals
    /// changes reach GMCP clients through the flush diff.
    pub fn main_tick(&mut self) {
        self.world.regen_tick();
        for player in self.world.players() {
            if let Err(err) = self.players.save(player) {
                error!(name = %player.name, %err, "player flush failed");
            }
        }
    }

    pub fn combat_tick(&mut self) {
        let outbox = self.combat.round(&mut self.world, &mut self.roller);
        self.deliver(outbox);
    }

    pub fn repop_tick(&mut self) {
        self.world.repop_drain(&mut self.roller);
    }

    /// Decay tick: the two-phase sweep, plus store rows for the imped.
    pub fn decay_tick(&mut self) {
        let report = self.world.decay_sweep();
        for id in &report.imped {
            if let Err(err) = self.objects.delete(*id) {
                warn!(%id, %err, "deleting imped object row failed");
            }
        }
        self.deliver(report.outbox);
    }

    pub fn object_flush_tick(&mut self) {
        for obj in self.world.objects.values() {
            if let Err(err) = self.objects.save(&ObjectRecord::from(obj)) {
                error!(id = %obj.id, %err, "object flush failed");
            }
        }
    }
}
