//! Combat engine tests against a small two-room world.
//!
//! Every roll is scripted, so each test pins exact outcomes instead of
//! asserting on distributions.

use std::sync::Arc;

use embermud_combat::{
    AttackOutcome, Combat, CombatConfig, CombatError, flee_chance, health_band, resolve_attack,
    victory_xp,
};
use embermud_proto::{CharId, Vnum};
use embermud_world::{
    Character, Combatant, Dice, Direction, Exit, Mob, MobReset, MobTemplate, ORIGINS,
    ObjectReset, ObjectTemplate, Player, Position, RACES, Room, ScriptedDice, ThreadDice, World,
    WorldData,
};

fn guard_template() -> MobTemplate {
    MobTemplate {
        vnum: Vnum(7001),
        keywords: vec!["guard".into()],
        short_desc: "the city guard".into(),
        long_desc: "A city guard stands here.".into(),
        level: 10,
        hitroll: 5,
        armor_class: 10,
        hit_dice: Dice::new(2, 8, 4),
        damage_dice: Dice::new(1, 6, 1),
        gold: 10,
        sentinel: true,
    }
}

fn two_room_data() -> WorldData {
    let mut square = Room {
        vnum: Vnum(3001),
        name: "Temple Square".into(),
        description: String::new(),
        zone: "Midtown".into(),
        environment: "city".into(),
        haven: true,
        exits: Default::default(),
        players: Default::default(),
        mobs: Default::default(),
        objects: Default::default(),
    };
    square
        .exits
        .insert(Direction::North, Exit { to_room: Vnum(3002), locked: false });
    let mut north = Room {
        vnum: Vnum(3002),
        name: "North Road".into(),
        description: String::new(),
        zone: "Midtown".into(),
        environment: "city".into(),
        haven: false,
        exits: Default::default(),
        players: Default::default(),
        mobs: Default::default(),
        objects: Default::default(),
    };
    north
        .exits
        .insert(Direction::South, Exit { to_room: Vnum(3001), locked: false });

    WorldData {
        rooms: vec![square, north],
        mob_templates: vec![guard_template()],
        object_templates: Vec::<ObjectTemplate>::new(),
        mob_resets: vec![MobReset {
            mob_vnum: Vnum(7001),
            room_vnum: Vnum(3002),
            equipment: vec![],
            inventory: vec![],
        }],
        object_resets: Vec::<ObjectReset>::new(),
        respawn_room: Vnum(3001),
    }
}

/// World with one guard in room 3002 and one fresh Cragkin player
/// beside it. Cragkin: str 13, dex 11, so hitroll 3, armor class 12,
/// damage 1d7. Against the guard's armor class 10 the player's attack
/// target is 7; against the player the guard's target is 7 too.
fn arena() -> (World, CharId, CharId) {
    let mut world = World::load(two_room_data(), &mut ThreadDice);
    let guard = *world
        .room(Vnum(3002))
        .unwrap()
        .mobs
        .iter()
        .next()
        .unwrap();
    let id = world.next_char_id();
    let player = Player::new(id, "Ember", &RACES[0], ORIGINS[0], Vnum(3002));
    let player = world.enter_player(player).unwrap();
    (world, player, guard)
}

fn set_hitpoints(world: &mut World, id: CharId, hp: i32, max: i32) {
    match world.character_mut(id).unwrap() {
        Character::Player(p) => {
            p.hitpoints = hp;
            p.max_hitpoints = max;
        }
        Character::Mob(m) => {
            m.hitpoints = hp;
            m.max_hitpoints = max;
        }
    }
}

fn text_of(outbox: &[(embermud_world::Audience, String)]) -> String {
    outbox.iter().map(|(_, s)| s.as_str()).collect()
}

/// A standalone combatant with exact numbers, for resolve_attack tests.
fn dummy(hitroll: i32, armor_class: i32, damage_dice: Dice) -> Mob {
    let template = Arc::new(MobTemplate {
        hitroll,
        armor_class,
        damage_dice,
        hit_dice: Dice::new(1, 1, 9),
        ..guard_template()
    });
    let reset = MobReset {
        mob_vnum: Vnum(7001),
        room_vnum: Vnum(3002),
        equipment: vec![],
        inventory: vec![],
    };
    Mob::spawn(CharId(99), template, reset, &mut ScriptedDice::new())
}

// ---------------------------------------------------------------------------
// resolve_attack
// ---------------------------------------------------------------------------

#[test]
fn test_resolve_attack_roll_at_target_misses() {
    // Target = 10 - 5 = 5; a 5 is not over the target.
    let attacker = dummy(5, 10, Dice::new(1, 6, 1));
    let defender = dummy(0, 10, Dice::new(1, 6, 1));
    let mut roller = ScriptedDice::new().queue_die(5);
    let ch_a = Character::Mob(attacker);
    let ch_d = Character::Mob(defender);
    assert_eq!(resolve_attack(&ch_a, &ch_d, &mut roller), AttackOutcome::Miss);
}

#[test]
fn test_resolve_attack_roll_over_target_hits() {
    let ch_a = Character::Mob(dummy(5, 10, Dice::new(1, 6, 1)));
    let ch_d = Character::Mob(dummy(0, 10, Dice::new(1, 6, 1)));
    let mut roller = ScriptedDice::new().queue_dies(&[6, 3]);
    assert_eq!(
        resolve_attack(&ch_a, &ch_d, &mut roller),
        AttackOutcome::Hit(4)
    );
}

#[test]
fn test_resolve_attack_natural_one_always_misses() {
    // Overwhelming hitroll, trivial armor: a 1 still misses.
    let ch_a = Character::Mob(dummy(50, 10, Dice::new(1, 6, 1)));
    let ch_d = Character::Mob(dummy(0, 1, Dice::new(1, 6, 1)));
    let mut roller = ScriptedDice::new().queue_die(1);
    assert_eq!(resolve_attack(&ch_a, &ch_d, &mut roller), AttackOutcome::Miss);
}

#[test]
fn test_resolve_attack_natural_twenty_crits_any_armor() {
    // Target is 100, unreachable, but a 20 hits anyway and adds half of
    // one extra damage roll: 1d6+1 rolls 3 -> 4, extra 6 -> 7/2 = 3.
    let ch_a = Character::Mob(dummy(0, 10, Dice::new(1, 6, 1)));
    let ch_d = Character::Mob(dummy(0, 100, Dice::new(1, 6, 1)));
    let mut roller = ScriptedDice::new().queue_dies(&[20, 3, 6]);
    assert_eq!(
        resolve_attack(&ch_a, &ch_d, &mut roller),
        AttackOutcome::Critical(7)
    );
}

#[test]
fn test_resolve_attack_non_positive_damage_is_miss() {
    let ch_a = Character::Mob(dummy(5, 10, Dice::new(1, 1, -1)));
    let ch_d = Character::Mob(dummy(0, 10, Dice::new(1, 6, 1)));
    let mut roller = ScriptedDice::new().queue_dies(&[19, 1]);
    assert_eq!(resolve_attack(&ch_a, &ch_d, &mut roller), AttackOutcome::Miss);
}

// ---------------------------------------------------------------------------
// victory_xp / flee_chance / health_band
// ---------------------------------------------------------------------------

#[test]
fn test_victory_xp_even_match_at_ten_in_range() {
    // Level 10 vs 10: 12d10 + 50, so [62, 170].
    let mut roller = ThreadDice;
    for _ in 0..200 {
        let xp = victory_xp(&mut roller, 10, 10);
        assert!((62..=170).contains(&xp), "xp {xp} out of range");
    }
}

#[test]
fn test_victory_xp_much_higher_victor_gets_nothing_from_dice() {
    // Level diff 5 zeroes the base; at level 25 there is no low-level
    // bonus either, so the roll is 0d10 + 0.
    let mut roller = ThreadDice;
    assert_eq!(victory_xp(&mut roller, 25, 20), 0);
}

#[test]
fn test_flee_chance_scales_with_dex_and_wis() {
    let config = CombatConfig::default();
    let even = flee_chance(&config, 10, 10, 10);
    assert!((even - 0.50).abs() < 1e-9);
    assert!(flee_chance(&config, 12, 10, 10) > even);
    assert!(flee_chance(&config, 10, 12, 10) < even);
    assert!(flee_chance(&config, 10, 10, 14) > even);
}

#[test]
fn test_flee_chance_clamped_to_unit_interval() {
    let config = CombatConfig::default();
    assert_eq!(flee_chance(&config, 40, 10, 40), 1.0);
    assert_eq!(flee_chance(&config, 0, 40, 0), 0.0);
}

#[test]
fn test_health_band_thresholds() {
    assert_eq!(health_band(100, 100), "is in full health");
    assert_eq!(health_band(99, 100), "has some light wounds");
    assert_eq!(health_band(80, 100), "has some light wounds");
    assert_eq!(health_band(79, 100), "has some bad wounds");
    assert_eq!(health_band(50, 100), "has some bad wounds");
    assert_eq!(health_band(49, 100), "is bleeding badly");
    assert_eq!(health_band(20, 100), "is bleeding badly");
    assert_eq!(health_band(19, 100), "is near death");
    assert_eq!(health_band(1, 100), "is near death");
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[test]
fn test_initiate_engages_both_and_swings() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 20, 20);
    let mut combat = Combat::default();

    // 19 over target 7 hits; 1d7 rolls 5.
    let mut roller = ScriptedDice::new().queue_dies(&[19, 5]);
    let outbox = combat.initiate(&mut world, player, guard, &mut roller).unwrap();

    assert!(combat.manager.in_combat(player));
    assert!(combat.manager.in_combat(guard));
    assert_eq!(combat.manager.current_target(player), Some(guard));
    assert_eq!(combat.manager.current_target(guard), Some(player));
    assert!(text_of(&outbox).contains("You hit the city guard for 5 damage!"));
    assert_eq!(world.character(guard).unwrap().hitpoints(), 15);
}

#[test]
fn test_initiate_dead_target_refused() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 0, 20);
    let mut combat = Combat::default();
    let err = combat
        .initiate(&mut world, player, guard, &mut ScriptedDice::new())
        .unwrap_err();
    assert!(matches!(err, CombatError::DeadCombatant(id) if id == guard));
    assert!(!combat.manager.in_combat(player));
}

#[test]
fn test_mob_death_awards_xp_despawns_and_requeues() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 1, 20);
    let mut combat = Combat::default();

    // Kill on the opening swing. Victory xp at level 1 vs 10 is
    // 14d10 + 50; the exhausted queue rolls all ones, so 64.
    let mut roller = ScriptedDice::new().queue_dies(&[19, 5]);
    let outbox = combat.initiate(&mut world, player, guard, &mut roller).unwrap();
    let text = text_of(&outbox);

    assert!(text.contains("You have slain the city guard!"));
    assert!(text.contains("You gain 64 experience."));
    assert!(!world.characters.contains_key(&guard));
    assert!(world.room(Vnum(3002)).unwrap().mobs.is_empty());
    assert!(!combat.manager.in_combat(player));
    assert_eq!(
        world.character(player).unwrap().as_player().unwrap().xp,
        64
    );

    // The guard's replenishment slot went back on the queue.
    let (mobs, objects) = world.repop_drain(&mut ThreadDice);
    assert_eq!((mobs, objects), (1, 0));
    assert_eq!(world.room(Vnum(3002)).unwrap().mobs.len(), 1);
}

#[test]
fn test_player_death_respawns_at_half_health() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, player, 1, 30);
    let mut combat = Combat::default();

    // Guard hits for 4 and the penalty die falls back to 1.
    let mut roller = ScriptedDice::new().queue_dies(&[19, 3]);
    let outbox = combat.initiate(&mut world, guard, player, &mut roller).unwrap();
    let text = text_of(&outbox);

    assert!(text.contains("You have been DEFEATED!"));
    assert!(!combat.manager.in_combat(player));
    assert!(!combat.manager.in_combat(guard));
    let ch = world.character(player).unwrap();
    assert_eq!(ch.room(), Vnum(3001));
    assert_eq!(ch.hitpoints(), 15);
    assert_eq!(ch.position(), Position::Standing);
    assert!(world.room(Vnum(3001)).unwrap().players.contains(&player));
    assert!(!world.room(Vnum(3002)).unwrap().players.contains(&player));
}

#[test]
fn test_round_swings_both_ways_and_reports_bands() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 20, 20);
    let mut combat = Combat::default();
    combat.manager.start_combat(player, guard);

    // Guard spawned first so it attacks first: hit for 4, then the
    // player hits back for 5, leaving the guard at 15/20.
    let mut roller = ScriptedDice::new().queue_dies(&[19, 3, 19, 5]);
    let outbox = combat.round(&mut world, &mut roller);
    let text = text_of(&outbox);

    assert_eq!(world.character(player).unwrap().hitpoints(), 26);
    assert_eq!(world.character(guard).unwrap().hitpoints(), 15);
    assert!(text.contains("the city guard hits you for 4 damage!"));
    assert!(text.contains("the city guard has some bad wounds."));
}

#[test]
fn test_round_with_no_engagements_is_quiet() {
    let (mut world, _player, _guard) = arena();
    let mut combat = Combat::default();
    assert!(combat.round(&mut world, &mut ScriptedDice::new()).is_empty());
}

#[test]
fn test_attempt_flee_failure_keeps_engagement_and_charges_xp() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 20, 20);
    let mut combat = Combat::default();
    combat.manager.start_combat(player, guard);
    world
        .character_mut(player)
        .unwrap()
        .as_player_mut()
        .unwrap()
        .xp = 10;

    // Penalty die 4; 0.99 is over the 0.52 flee chance.
    let mut roller = ScriptedDice::new().queue_die(4).queue_percent(0.99);
    let outbox = combat.attempt_flee(&mut world, player, &mut roller).unwrap();
    let text = text_of(&outbox);

    assert!(text.contains("You lose 4 experience."));
    assert!(text.contains("You fail to flee!"));
    assert!(combat.manager.in_combat(player));
    assert_eq!(world.character(player).unwrap().room(), Vnum(3002));
    assert_eq!(
        world.character(player).unwrap().as_player().unwrap().xp,
        6
    );
}

#[test]
fn test_attempt_flee_success_disengages_and_moves() {
    let (mut world, player, guard) = arena();
    set_hitpoints(&mut world, guard, 20, 20);
    let mut combat = Combat::default();
    combat.manager.start_combat(player, guard);

    let mut roller = ScriptedDice::new()
        .queue_die(2)
        .queue_percent(0.01)
        .queue_choice(0);
    let outbox = combat.attempt_flee(&mut world, player, &mut roller).unwrap();
    let text = text_of(&outbox);

    assert!(text.contains("You flee south head over heels!"));
    assert!(!combat.manager.in_combat(player));
    assert!(!combat.manager.in_combat(guard));
    assert_eq!(world.character(player).unwrap().room(), Vnum(3001));
}

#[test]
fn test_attempt_flee_not_engaged_refused() {
    let (mut world, player, _guard) = arena();
    let mut combat = Combat::default();
    let err = combat
        .attempt_flee(&mut world, player, &mut ScriptedDice::new())
        .unwrap_err();
    assert!(matches!(err, CombatError::NotEngaged(id) if id == player));
}
