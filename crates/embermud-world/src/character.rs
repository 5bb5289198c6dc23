//! Characters: durable players and ephemeral mob instances.
//!
//! Combat and regeneration only care about the capability surface, so
//! both variants implement [`Combatant`] and the entity graph stores
//! them behind the [`Character`] enum.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use embermud_proto::{CharId, ObjectId, Vnum};

use crate::dice::{Dice, DiceRoller};
use crate::templates::{MobReset, MobTemplate};

// ---------------------------------------------------------------------------
// Races and origins
// ---------------------------------------------------------------------------

/// A playable race: starting stats and the experience-per-level cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Race {
    pub name: &'static str,
    /// str, dex, con, int, wis, cha.
    pub stats: [i32; 6],
    pub tnl: i64,
    pub racials: &'static [&'static str],
}

pub const RACES: [Race; 6] = [
    Race {
        name: "Cragkin",
        stats: [13, 11, 12, 10, 10, 10],
        tnl: 1000,
        racials: &["merge"],
    },
    Race {
        name: "Moonshade",
        stats: [10, 13, 11, 12, 10, 10],
        tnl: 1000,
        racials: &["nightvision", "silent"],
    },
    Race {
        name: "Etherial",
        stats: [12, 13, 10, 11, 10, 10],
        tnl: 1000,
        racials: &["ethereal", "hide"],
    },
    Race {
        name: "Starfolk",
        stats: [10, 10, 12, 13, 10, 11],
        tnl: 1000,
        racials: &["starlight", "heal"],
    },
    Race {
        name: "Frostling",
        stats: [11, 10, 12, 13, 10, 10],
        tnl: 1000,
        racials: &["blizzard", "ice wall"],
    },
    Race {
        name: "Auroran",
        stats: [10, 10, 12, 11, 13, 10],
        tnl: 1000,
        racials: &["holy light", "holy shield"],
    },
];

/// Case-insensitive prefix match after stripping one trailing `s`
/// ("moonshades", "MOON" and "moonshade" all find Moonshade).
pub fn find_race(input: &str) -> Option<&'static Race> {
    let mut lower = input.trim().to_ascii_lowercase();
    if lower.ends_with('s') {
        lower.pop();
    }
    if lower.is_empty() {
        return None;
    }
    RACES
        .iter()
        .find(|r| r.name.to_ascii_lowercase().starts_with(&lower))
}

pub const ORIGINS: [&str; 6] = [
    "Warrior of the Forgotten Legion",
    "Elemental Envoy",
    "Spiritual Wanderer",
    "Shadow Guild Operative",
    "Borderland Sentinel",
    "Wandering Bard",
];

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Standing,
    Resting,
    Sleeping,
}

impl Position {
    /// Fraction of the base regeneration rate earned in this position.
    pub fn regen_factor(&self) -> f64 {
        match self {
            Position::Sleeping => 1.0,
            Position::Resting => 0.5,
            Position::Standing => 0.1,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Position::Standing => "standing",
            Position::Resting => "resting",
            Position::Sleeping => "sleeping",
        };
        f.write_str(word)
    }
}

// ---------------------------------------------------------------------------
// Combatant capability surface
// ---------------------------------------------------------------------------

/// What the combat engine needs from any character.
pub trait Combatant {
    fn name(&self) -> &str;
    fn level(&self) -> i32;
    fn hitroll(&self) -> i32;
    fn armor_class(&self) -> i32;
    fn damage_dice(&self) -> Dice;
    fn hitpoints(&self) -> i32;
    fn max_hitpoints(&self) -> i32;
    fn dexterity(&self) -> i32;
    fn wisdom(&self) -> i32;
    fn position(&self) -> Position;

    fn is_dead(&self) -> bool {
        self.hitpoints() <= 0
    }

    /// Reduces hitpoints. Negative amounts are ignored; hitpoints may
    /// go below zero (dead).
    fn take_damage(&mut self, amount: i32);

    /// Raises hitpoints, clamped at max.
    fn heal(&mut self, amount: i32);
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A durable player character. Persisted by name across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    #[serde(skip)]
    pub id: CharId,
    pub name: String,
    pub race: String,
    pub origin: String,

    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub xp: i64,
    /// Experience needed per level, fixed by race.
    #[serde(default = "default_tnl", skip_serializing_if = "is_default_tnl")]
    pub tnl: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub gold: i64,

    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,

    pub hitpoints: i32,
    pub max_hitpoints: i32,
    #[serde(default = "default_pool", skip_serializing_if = "is_default_pool")]
    pub mana: i32,
    #[serde(default = "default_pool", skip_serializing_if = "is_default_pool")]
    pub max_mana: i32,
    #[serde(default = "default_pool", skip_serializing_if = "is_default_pool")]
    pub stamina: i32,
    #[serde(default = "default_pool", skip_serializing_if = "is_default_pool")]
    pub max_stamina: i32,

    #[serde(default)]
    pub position: Position,
    pub room: Vnum,
    pub recall: Vnum,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipped: Vec<ObjectId>,
}

// Character-template defaults: rows matching these are omitted from
// storage and resolved back on load.
fn default_level() -> i32 {
    1
}
fn default_tnl() -> i64 {
    1000
}
fn is_default_tnl(v: &i64) -> bool {
    *v == default_tnl()
}
fn default_pool() -> i32 {
    100
}
fn is_default_pool(v: &i32) -> bool {
    *v == default_pool()
}
fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

impl Player {
    /// A fresh level-1 character with racial stats applied.
    pub fn new(id: CharId, name: &str, race: &Race, origin: &str, start_room: Vnum) -> Self {
        let [strength, dexterity, constitution, intelligence, wisdom, charisma] = race.stats;
        Self {
            id,
            name: name.to_owned(),
            race: race.name.to_owned(),
            origin: origin.to_owned(),
            level: 1,
            xp: 0,
            tnl: race.tnl,
            gold: 0,
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
            hitpoints: 30,
            max_hitpoints: 30,
            mana: 100,
            max_mana: 100,
            stamina: 100,
            max_stamina: 100,
            position: Position::Standing,
            room: start_room,
            recall: start_room,
            inventory: Vec::new(),
            equipped: Vec::new(),
        }
    }

    /// Awards experience, applying any level-ups crossed. Returns the
    /// number of levels gained.
    pub fn gain_xp(&mut self, amount: i64) -> u32 {
        self.xp += amount.max(0);
        let mut levels = 0;
        while self.xp >= self.tnl {
            self.xp -= self.tnl;
            self.level += 1;
            self.max_hitpoints += self.constitution / 3 + 5;
            self.max_mana += 10;
            self.max_stamina += 10;
            levels += 1;
            tracing::info!(name = %self.name, level = self.level, "level up");
        }
        levels
    }

    /// Takes experience away, floored at zero.
    pub fn lose_xp(&mut self, amount: i64) {
        self.xp = (self.xp - amount.max(0)).max(0);
    }

    /// Unarmed/base damage scales with strength and level.
    pub fn damage_dice(&self) -> Dice {
        Dice::new(1, 4 + (self.strength / 4) as u32, self.level / 2)
    }

    pub fn hitroll(&self) -> i32 {
        self.strength / 4 + self.level / 3
    }

    pub fn armor_class(&self) -> i32 {
        10 + self.dexterity / 4
    }

    /// The status line appended to every flush for logged-in sessions.
    pub fn prompt(&self) -> String {
        format!(
            "\r\n<HP: {}/{} MP: {}/{} SP: {}/{}> ",
            self.hitpoints,
            self.max_hitpoints,
            self.mana,
            self.max_mana,
            self.stamina,
            self.max_stamina
        )
    }
}

// ---------------------------------------------------------------------------
// Mob
// ---------------------------------------------------------------------------

/// An ephemeral mob instance: rolled from its template, recreated by
/// repop after death.
#[derive(Debug, Clone)]
pub struct Mob {
    pub id: CharId,
    pub template: Arc<MobTemplate>,
    /// The replenishment slot this instance fills; requeued on death.
    pub reset: MobReset,
    pub hitpoints: i32,
    pub max_hitpoints: i32,
    pub position: Position,
    pub room: Vnum,
    pub inventory: Vec<ObjectId>,
    pub equipped: Vec<ObjectId>,
}

impl Mob {
    /// Spawns an instance with max hitpoints rolled from the template's
    /// hit dice.
    pub fn spawn(
        id: CharId,
        template: Arc<MobTemplate>,
        reset: MobReset,
        roller: &mut dyn DiceRoller,
    ) -> Self {
        let max_hitpoints = template.hit_dice.roll(roller).max(1);
        let room = reset.room_vnum;
        Self {
            id,
            template,
            reset,
            hitpoints: max_hitpoints,
            max_hitpoints,
            position: Position::Standing,
            room,
            inventory: Vec::new(),
            equipped: Vec::new(),
        }
    }

    pub fn matches_keyword(&self, word: &str) -> bool {
        let lower = word.to_ascii_lowercase();
        self.template
            .keywords
            .iter()
            .any(|k| k.to_ascii_lowercase().starts_with(&lower))
    }
}

// ---------------------------------------------------------------------------
// Character union
// ---------------------------------------------------------------------------

/// A live character in the entity graph.
#[derive(Debug, Clone)]
pub enum Character {
    Player(Player),
    Mob(Mob),
}

impl Character {
    pub fn id(&self) -> CharId {
        match self {
            Character::Player(p) => p.id,
            Character::Mob(m) => m.id,
        }
    }

    pub fn room(&self) -> Vnum {
        match self {
            Character::Player(p) => p.room,
            Character::Mob(m) => m.room,
        }
    }

    pub fn set_room(&mut self, room: Vnum) {
        match self {
            Character::Player(p) => p.room = room,
            Character::Mob(m) => m.room = room,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Character::Player(_))
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Character::Player(p) => Some(p),
            Character::Mob(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Character::Player(p) => Some(p),
            Character::Mob(_) => None,
        }
    }

    pub fn as_mob(&self) -> Option<&Mob> {
        match self {
            Character::Mob(m) => Some(m),
            Character::Player(_) => None,
        }
    }

    pub fn inventory(&self) -> &[ObjectId] {
        match self {
            Character::Player(p) => &p.inventory,
            Character::Mob(m) => &m.inventory,
        }
    }

    pub fn inventory_mut(&mut self) -> &mut Vec<ObjectId> {
        match self {
            Character::Player(p) => &mut p.inventory,
            Character::Mob(m) => &mut m.inventory,
        }
    }

    pub fn set_position(&mut self, position: Position) {
        match self {
            Character::Player(p) => p.position = position,
            Character::Mob(m) => m.position = position,
        }
    }
}

impl Combatant for Character {
    fn name(&self) -> &str {
        match self {
            Character::Player(p) => &p.name,
            Character::Mob(m) => &m.template.short_desc,
        }
    }

    fn level(&self) -> i32 {
        match self {
            Character::Player(p) => p.level,
            Character::Mob(m) => m.template.level,
        }
    }

    fn hitroll(&self) -> i32 {
        match self {
            Character::Player(p) => p.hitroll(),
            Character::Mob(m) => m.template.hitroll,
        }
    }

    fn armor_class(&self) -> i32 {
        match self {
            Character::Player(p) => p.armor_class(),
            Character::Mob(m) => m.template.armor_class,
        }
    }

    fn damage_dice(&self) -> Dice {
        match self {
            Character::Player(p) => p.damage_dice(),
            Character::Mob(m) => m.template.damage_dice,
        }
    }

    fn hitpoints(&self) -> i32 {
        match self {
            Character::Player(p) => p.hitpoints,
            Character::Mob(m) => m.hitpoints,
        }
    }

    fn max_hitpoints(&self) -> i32 {
        match self {
            Character::Player(p) => p.max_hitpoints,
            Character::Mob(m) => m.max_hitpoints,
        }
    }

    fn dexterity(&self) -> i32 {
        match self {
            Character::Player(p) => p.dexterity,
            // Mobs have no stat block; treat them as average.
            Character::Mob(_) => 10,
        }
    }

    fn wisdom(&self) -> i32 {
        match self {
            Character::Player(p) => p.wisdom,
            Character::Mob(_) => 10,
        }
    }

    fn position(&self) -> Position {
        match self {
            Character::Player(p) => p.position,
            Character::Mob(m) => m.position,
        }
    }

    fn take_damage(&mut self, amount: i32) {
        let amount = amount.max(0);
        match self {
            Character::Player(p) => p.hitpoints -= amount,
            Character::Mob(m) => m.hitpoints -= amount,
        }
    }

    fn heal(&mut self, amount: i32) {
        let amount = amount.max(0);
        match self {
            Character::Player(p) => {
                p.hitpoints = (p.hitpoints + amount).min(p.max_hitpoints);
            }
            Character::Mob(m) => {
                m.hitpoints = (m.hitpoints + amount).min(m.max_hitpoints);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ThreadDice;

    fn test_race() -> &'static Race {
        &RACES[0]
    }

    fn test_player(name: &str) -> Player {
        Player::new(CharId(1), name, test_race(), ORIGINS[0], Vnum(3001))
    }

    fn test_template() -> Arc<MobTemplate> {
        Arc::new(MobTemplate {
            vnum: Vnum(7001),
            keywords: vec!["guard".into(), "city".into()],
            short_desc: "the city guard".into(),
            long_desc: "A city guard stands here.".into(),
            level: 10,
            hitroll: 5,
            armor_class: 10,
            hit_dice: Dice::new(2, 8, 4),
            damage_dice: Dice::new(1, 6, 1),
            gold: 10,
            sentinel: false,
        })
    }

    #[test]
    fn test_find_race_prefix_and_plural() {
        assert_eq!(find_race("Moonshades").unwrap().name, "Moonshade");
        assert_eq!(find_race("moon").unwrap().name, "Moonshade");
        assert_eq!(find_race("CRAG").unwrap().name, "Cragkin");
        assert!(find_race("human").is_none());
        assert!(find_race("").is_none());
    }

    #[test]
    fn test_new_player_applies_racial_stats() {
        let p = test_player("Ember");
        assert_eq!(p.strength, 13);
        assert_eq!(p.dexterity, 11);
        assert_eq!(p.tnl, 1000);
        assert_eq!(p.level, 1);
        assert_eq!(p.hitpoints, 30);
    }

    #[test]
    fn test_gain_xp_below_tnl_no_level() {
        let mut p = test_player("Ember");
        assert_eq!(p.gain_xp(999), 0);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp, 999);
    }

    #[test]
    fn test_gain_xp_crossing_tnl_levels_up() {
        let mut p = test_player("Ember");
        let before_hp = p.max_hitpoints;
        assert_eq!(p.gain_xp(1250), 1);
        assert_eq!(p.level, 2);
        assert_eq!(p.xp, 250);
        assert!(p.max_hitpoints > before_hp);
    }

    #[test]
    fn test_gain_xp_multiple_levels_in_one_award() {
        let mut p = test_player("Ember");
        assert_eq!(p.gain_xp(2100), 2);
        assert_eq!(p.level, 3);
        assert_eq!(p.xp, 100);
    }

    #[test]
    fn test_lose_xp_floors_at_zero() {
        let mut p = test_player("Ember");
        p.gain_xp(100);
        p.lose_xp(5000);
        assert_eq!(p.xp, 0);
    }

    #[test]
    fn test_mob_spawn_hitpoints_within_hit_dice_bounds() {
        // 2d8+4: always in [6, 20].
        let mut roller = ThreadDice;
        for _ in 0..100 {
            let mob = Mob::spawn(
                CharId(2),
                test_template(),
                MobReset {
                    mob_vnum: Vnum(7001),
                    room_vnum: Vnum(3001),
                    equipment: vec![],
                    inventory: vec![],
                },
                &mut roller,
            );
            assert!((6..=20).contains(&mob.max_hitpoints));
            assert_eq!(mob.hitpoints, mob.max_hitpoints);
        }
    }

    #[test]
    fn test_mob_matches_keyword_prefix() {
        let mut roller = ThreadDice;
        let mob = Mob::spawn(
            CharId(2),
            test_template(),
            MobReset {
                mob_vnum: Vnum(7001),
                room_vnum: Vnum(3001),
                equipment: vec![],
                inventory: vec![],
            },
            &mut roller,
        );
        assert!(mob.matches_keyword("gua"));
        assert!(mob.matches_keyword("CITY"));
        assert!(!mob.matches_keyword("dragon"));
    }

    #[test]
    fn test_take_damage_kills_at_zero() {
        let mut ch = Character::Player(test_player("Ember"));
        ch.take_damage(30);
        assert!(ch.is_dead());
        assert_eq!(ch.hitpoints(), 0);
    }

    #[test]
    fn test_take_damage_ignores_negative() {
        let mut ch = Character::Player(test_player("Ember"));
        ch.take_damage(-10);
        assert_eq!(ch.hitpoints(), 30);
    }

    #[test]
    fn test_heal_clamps_at_max() {
        let mut ch = Character::Player(test_player("Ember"));
        ch.take_damage(10);
        ch.heal(500);
        assert_eq!(ch.hitpoints(), ch.max_hitpoints());
    }

    #[test]
    fn test_regen_factor_ordering() {
        assert!(Position::Sleeping.regen_factor() > Position::Resting.regen_factor());
        assert!(Position::Resting.regen_factor() > Position::Standing.regen_factor());
    }

    #[test]
    fn test_prompt_shows_all_three_pools() {
        let p = test_player("Ember");
        let prompt = p.prompt();
        assert!(prompt.contains("HP: 30/30"));
        assert!(prompt.contains("MP: 100/100"));
        assert!(prompt.contains("SP: 100/100"));
    }
}
