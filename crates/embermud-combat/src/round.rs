//! Attack resolution, death handling, fleeing and the round driver.

use embermud_proto::CharId;
use embermud_world::{Audience, Combatant, DiceRoller, Outbox, Position, World, dice_roll};
use tracing::{debug, error, info};

use crate::error::CombatError;
use crate::manager::CombatManager;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable combat parameters.
#[derive(Debug, Clone)]
pub struct CombatConfig {
    /// Cascading extra attacks. Off by default; the hook stays wired so
    /// enabling it is a config change, not a code change.
    pub multi_attack: bool,
    /// Independent chances for the second, third and fourth attack.
    pub extra_attack_chances: [f64; 3],
    /// Base flee success chance before stat adjustments.
    pub flee_base: f64,
    /// Flee chance gained per point of dex advantage or wisdom above 10.
    pub flee_stat_weight: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            multi_attack: false,
            extra_attack_chances: [0.50, 0.25, 0.125],
            flee_base: 0.50,
            flee_stat_weight: 0.02,
        }
    }
}

// ---------------------------------------------------------------------------
// Attack resolution
// ---------------------------------------------------------------------------

/// Result of one swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Miss,
    Hit(i32),
    Critical(i32),
}

/// Resolves a single swing.
///
/// Target number = defender's armor class minus attacker's hit bonus,
/// floored at 1. A d20 hits iff it rolls over the target; a natural 1
/// always misses and a natural 20 always hits, critically, adding half
/// of one extra damage roll. Non-positive rolled damage is a miss;
/// positive damage is floored at 1.
pub fn resolve_attack(
    attacker: &dyn Combatant,
    defender: &dyn Combatant,
    roller: &mut dyn DiceRoller,
) -> AttackOutcome {
    let target = (defender.armor_class() - attacker.hitroll()).max(1);
    let roll = roller.die(20) as i32;

    if roll == 1 {
        return AttackOutcome::Miss;
    }
    let critical = roll == 20;
    if !critical && roll <= target {
        return AttackOutcome::Miss;
    }

    let dice = attacker.damage_dice();
    let mut damage = dice.roll(roller);
    if critical {
        damage += dice.roll(roller) / 2;
    }
    if damage <= 0 {
        return AttackOutcome::Miss;
    }
    let damage = damage.max(1);
    if critical {
        AttackOutcome::Critical(damage)
    } else {
        AttackOutcome::Hit(damage)
    }
}

/// Experience for defeating `loser_level` at `victor_level`.
///
/// count = max(0, 5 − levelDiff)·2 plus (20 − victorLevel)/4 below
/// level 20; rolled as `count`d10 + base·5.
pub fn victory_xp(
    roller: &mut dyn DiceRoller,
    victor_level: i32,
    loser_level: i32,
) -> i64 {
    let diff = (victor_level - loser_level).max(0);
    let base = (5 - diff).max(0) * 2;
    let extra = if victor_level < 20 {
        (20 - victor_level) / 4
    } else {
        0
    };
    dice_roll(roller, (base + extra) as u32, 10, base * 5) as i64
}

/// Flee success chance: base plus a weighted dex advantage and wisdom
/// above 10, clamped to [0, 1].
pub fn flee_chance(config: &CombatConfig, flee_dex: i32, opp_dex: i32, flee_wis: i32) -> f64 {
    let raw = config.flee_base
        + config.flee_stat_weight * (flee_dex - opp_dex) as f64
        + config.flee_stat_weight * (flee_wis - 10) as f64;
    raw.clamp(0.0, 1.0)
}

/// Health-band summary shown to players after each combat round.
pub fn health_band(hitpoints: i32, max_hitpoints: i32) -> &'static str {
    let pct = if max_hitpoints > 0 {
        hitpoints * 100 / max_hitpoints
    } else {
        0
    };
    if pct >= 100 {
        "is in full health"
    } else if pct >= 80 {
        "has some light wounds"
    } else if pct >= 50 {
        "has some bad wounds"
    } else if pct >= 20 {
        "is bleeding badly"
    } else {
        "is near death"
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The combat engine: engagement bookkeeping plus round resolution
/// against the world.
#[derive(Debug, Default)]
pub struct Combat {
    pub manager: CombatManager,
    pub config: CombatConfig,
}

impl Combat {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            manager: CombatManager::new(),
            config,
        }
    }

    /// Starts a fight and resolves the aggressor's opening attack.
    pub fn initiate(
        &mut self,
        world: &mut World,
        aggressor: CharId,
        victim: CharId,
        roller: &mut dyn DiceRoller,
    ) -> Result<Outbox, CombatError> {
        let attacker = world.character(aggressor)?;
        if attacker.is_dead() {
            return Err(CombatError::DeadCombatant(aggressor));
        }
        let target = world.character(victim)?;
        if target.is_dead() {
            return Err(CombatError::DeadCombatant(victim));
        }
        self.manager.start_combat(aggressor, victim);
        Ok(self.attack_series(world, aggressor, victim, roller))
    }

    /// One combat-round tick: every engaged character with a live focus
    /// resolves one attack (or cascade), then each surviving player
    /// participant gets a health-band summary of its target.
    pub fn round(&mut self, world: &mut World, roller: &mut dyn DiceRoller) -> Outbox {
        let mut outbox = Outbox::new();

        for (attacker, target) in self.manager.focus_pairs() {
            // A focus torn down earlier in this same round (death,
            // flee) skips the character entirely.
            if self.manager.current_target(attacker) != Some(target) {
                continue;
            }
            let alive = world
                .characters
                .get(&attacker)
                .is_some_and(|c| !c.is_dead());
            if !alive || !world.characters.contains_key(&target) {
                continue;
            }
            outbox.extend(self.attack_series(world, attacker, target, roller));
        }

        for ch in self.manager.combatants() {
            let Some(target) = self.manager.current_target(ch) else {
                continue;
            };
            let is_live_player = world
                .characters
                .get(&ch)
                .is_some_and(|c| c.is_player() && !c.is_dead());
            if !is_live_player {
                continue;
            }
            if let Some(foe) = world.characters.get(&target) {
                outbox.push((
                    Audience::Char(ch),
                    format!(
                        "{} {}.\r\n",
                        foe.name(),
                        health_band(foe.hitpoints(), foe.max_hitpoints())
                    ),
                ));
            }
        }

        outbox
    }

    /// Tries to run from the current fight. The experience penalty
    /// applies whether or not the escape works.
    pub fn attempt_flee(
        &mut self,
        world: &mut World,
        fleeing: CharId,
        roller: &mut dyn DiceRoller,
    ) -> Result<Outbox, CombatError> {
        let opponent = self
            .manager
            .current_target(fleeing)
            .ok_or(CombatError::NotEngaged(fleeing))?;
        let ch = world.character(fleeing)?;
        if ch.is_dead() {
            return Err(CombatError::DeadCombatant(fleeing));
        }
        let name = ch.name().to_owned();
        let room = ch.room();
        let (flee_dex, flee_wis, level) = (ch.dexterity(), ch.wisdom(), ch.level());
        let opp_dex = world
            .characters
            .get(&opponent)
            .map(|c| c.dexterity())
            .unwrap_or(10);

        let mut outbox = Outbox::new();
        let penalty = dice_roll(roller, level.max(0) as u32, 10, 0) as i64;
        if let Some(p) = world.character_mut(fleeing)?.as_player_mut() {
            p.lose_xp(penalty);
            outbox.push((
                Audience::Char(fleeing),
                format!("You lose {penalty} experience.\r\n"),
            ));
        }

        let open = world.room(room)?.unlocked_exits();
        let chance = flee_chance(&self.config, flee_dex, opp_dex, flee_wis);
        if open.is_empty() || roller.percent() >= chance {
            debug!(%fleeing, chance, "flee failed");
            outbox.push((Audience::Char(fleeing), "You fail to flee!\r\n".into()));
            outbox.push((
                Audience::Room { room, except: Some(fleeing) },
                format!("{name} tries to flee but fails!\r\n"),
            ));
            return Ok(outbox);
        }

        let partners = self.manager.engaged_with(fleeing);
        self.manager.disengage_all(fleeing);
        for partner in partners {
            self.manager.refocus(partner);
        }

        let (direction, _) = open[roller.choose(open.len())];
        outbox.push((
            Audience::Char(fleeing),
            format!("You flee {direction} head over heels!\r\n"),
        ));
        outbox.extend(world.move_char(fleeing, direction)?);
        info!(%fleeing, %direction, "fled combat");
        Ok(outbox)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// One primary attack plus the optional multi-attack cascade.
    fn attack_series(
        &mut self,
        world: &mut World,
        attacker: CharId,
        defender: CharId,
        roller: &mut dyn DiceRoller,
    ) -> Outbox {
        let mut outbox = self.attack_once(world, attacker, defender, roller);
        if !self.config.multi_attack {
            return outbox;
        }
        for chance in self.config.extra_attack_chances {
            if self.manager.current_target(attacker) != Some(defender) {
                break;
            }
            if roller.percent() < chance {
                outbox.extend(self.attack_once(world, attacker, defender, roller));
            }
        }
        outbox
    }

    fn attack_once(
        &mut self,
        world: &mut World,
        attacker: CharId,
        defender: CharId,
        roller: &mut dyn DiceRoller,
    ) -> Outbox {
        let (Some(att), Some(def)) = (
            world.characters.get(&attacker),
            world.characters.get(&defender),
        ) else {
            error!(%attacker, %defender, "attack against missing character");
            return Outbox::new();
        };
        if att.is_dead() || def.is_dead() {
            error!(%attacker, %defender, "attack involving a dead character");
            return Outbox::new();
        }
        let att_name = att.name().to_owned();
        let def_name = def.name().to_owned();
        let room = att.room();

        let outcome = resolve_attack(att, def, roller);
        let mut outbox = match outcome {
            AttackOutcome::Miss => vec![
                (
                    Audience::Char(attacker),
                    format!("You miss {def_name}.\r\n"),
                ),
                (
                    Audience::Char(defender),
                    format!("{att_name} misses you.\r\n"),
                ),
                (
                    Audience::RoomExceptPair { room, exclude: [attacker, defender] },
                    format!("{att_name} misses {def_name}!\r\n"),
                ),
            ],
            AttackOutcome::Hit(damage) => vec![
                (
                    Audience::Char(attacker),
                    format!("You hit {def_name} for {damage} damage!\r\n"),
                ),
                (
                    Audience::Char(defender),
                    format!("{att_name} hits you for {damage} damage!\r\n"),
                ),
                (
                    Audience::RoomExceptPair { room, exclude: [attacker, defender] },
                    format!("{att_name} hits {def_name} for {damage} damage!\r\n"),
                ),
            ],
            AttackOutcome::Critical(damage) => vec![
                (
                    Audience::Char(attacker),
                    format!("You score a CRITICAL HIT on {def_name} for {damage} damage!\r\n"),
                ),
                (
                    Audience::Char(defender),
                    format!("{att_name} scores a CRITICAL HIT on you for {damage} damage!\r\n"),
                ),
                (
                    Audience::RoomExceptPair { room, exclude: [attacker, defender] },
                    format!("{att_name} scores a CRITICAL HIT on {def_name} for {damage} damage!\r\n"),
                ),
            ],
        };

        let damage = match outcome {
            AttackOutcome::Hit(d) | AttackOutcome::Critical(d) => d,
            AttackOutcome::Miss => return outbox,
        };

        if let Ok(def) = world.character_mut(defender) {
            def.take_damage(damage);
            if def.is_dead() {
                outbox.extend(self.handle_death(world, attacker, defender, roller));
            }
        }
        outbox
    }

    /// Tears down the dead character's fights and settles the spoils.
    fn handle_death(
        &mut self,
        world: &mut World,
        victor: CharId,
        loser: CharId,
        roller: &mut dyn DiceRoller,
    ) -> Outbox {
        let mut outbox = Outbox::new();
        let partners = self.manager.engaged_with(loser);
        self.manager.disengage_all(loser);
        for partner in partners {
            self.manager.refocus(partner);
        }

        let Ok(dead) = world.character(loser) else {
            return outbox;
        };
        let dead_name = dead.name().to_owned();
        let dead_level = dead.level();
        let room = dead.room();
        let was_player = dead.is_player();

        outbox.push((
            Audience::Char(victor),
            format!("You have slain {dead_name}!\r\n"),
        ));
        outbox.push((
            Audience::RoomExceptPair { room, exclude: [victor, loser] },
            format!("{dead_name} is DEAD!!\r\n"),
        ));
        info!(%victor, %loser, name = %dead_name, "combat death");

        if was_player {
            // Defeated players respawn at half health with an xp penalty.
            let respawn = world.respawn_room;
            let penalty = dice_roll(roller, dead_level.max(0) as u32, 50, 0) as i64;
            if let Ok(ch) = world.character_mut(loser) {
                if let Some(p) = ch.as_player_mut() {
                    p.lose_xp(penalty);
                    p.hitpoints = (p.max_hitpoints / 2).max(1);
                    p.position = Position::Standing;
                }
            }
            if let Err(err) = world.relocate(loser, respawn) {
                error!(%loser, %err, "respawn relocation failed");
            }
            outbox.push((
                Audience::Char(loser),
                "You have been DEFEATED!\r\nYou awaken somewhere safe, aching all over.\r\n"
                    .into(),
            ));
        } else {
            let victor_level = world
                .characters
                .get(&victor)
                .map(|c| c.level())
                .unwrap_or(0);
            let xp = victory_xp(roller, victor_level, dead_level);
            if let Ok(ch) = world.character_mut(victor) {
                if let Some(p) = ch.as_player_mut() {
                    let before = p.level;
                    p.gain_xp(xp);
                    outbox.push((
                        Audience::Char(victor),
                        format!("You gain {xp} experience.\r\n"),
                    ));
                    for level in (before + 1)..=p.level {
                        outbox.push((
                            Audience::Char(victor),
                            format!("You are now level {level}!\r\n"),
                        ));
                    }
                }
            }
            if let Err(err) = world.despawn_mob(loser) {
                error!(%loser, %err, "despawn after death failed");
            }
        }
        outbox
    }
}
