//! Dice rolls behind a trait seam.
//!
//! Everything random in the game (hit dice, attack rolls, wander and
//! flee chances) goes through [`DiceRoller`], so combat and lifecycle
//! tests can script exact rolls instead of asserting on distributions.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A dice expression: `count` dice of `size` faces plus `bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dice {
    pub count: u32,
    pub size: u32,
    pub bonus: i32,
}

impl Dice {
    pub fn new(count: u32, size: u32, bonus: i32) -> Self {
        Self { count, size, bonus }
    }

    /// Minimum possible roll.
    pub fn min(&self) -> i32 {
        self.count as i32 + self.bonus
    }

    /// Maximum possible roll.
    pub fn max(&self) -> i32 {
        (self.count * self.size) as i32 + self.bonus
    }

    pub fn roll(&self, roller: &mut dyn DiceRoller) -> i32 {
        dice_roll(roller, self.count, self.size, self.bonus)
    }
}

impl std::fmt::Display for Dice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bonus >= 0 {
            write!(f, "{}d{}+{}", self.count, self.size, self.bonus)
        } else {
            write!(f, "{}d{}{}", self.count, self.size, self.bonus)
        }
    }
}

/// Source of randomness for game rules.
pub trait DiceRoller: Send {
    /// One die: uniform in `1..=size`. `size` 0 rolls 0.
    fn die(&mut self, size: u32) -> u32;

    /// Uniform in `[0, 1)`.
    fn percent(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn choose(&mut self, len: usize) -> usize;
}

/// Sum of `count` dice of `size` faces, plus `bonus`.
pub fn dice_roll(roller: &mut dyn DiceRoller, count: u32, size: u32, bonus: i32) -> i32 {
    let mut total = 0i32;
    for _ in 0..count {
        total += roller.die(size) as i32;
    }
    total + bonus
}

/// Production roller backed by the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDice;

impl DiceRoller for ThreadDice {
    fn die(&mut self, size: u32) -> u32 {
        if size == 0 {
            return 0;
        }
        rand::rng().random_range(1..=size)
    }

    fn percent(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }

    fn choose(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Deterministic roller for tests: plays back queued values.
///
/// `die` pops from the die queue, `percent` from the percent queue,
/// `choose` from the choice queue. An exhausted queue falls back to the
/// lowest legal value so a test that only scripts the rolls it cares
/// about still runs.
#[derive(Debug, Default)]
pub struct ScriptedDice {
    dies: std::collections::VecDeque<u32>,
    percents: std::collections::VecDeque<f64>,
    choices: std::collections::VecDeque<usize>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_die(mut self, value: u32) -> Self {
        self.dies.push_back(value);
        self
    }

    pub fn queue_dies(mut self, values: &[u32]) -> Self {
        self.dies.extend(values.iter().copied());
        self
    }

    pub fn queue_percent(mut self, value: f64) -> Self {
        self.percents.push_back(value);
        self
    }

    pub fn queue_choice(mut self, value: usize) -> Self {
        self.choices.push_back(value);
        self
    }
}

impl DiceRoller for ScriptedDice {
    fn die(&mut self, size: u32) -> u32 {
        self.dies.pop_front().unwrap_or(1).min(size)
    }

    fn percent(&mut self) -> f64 {
        self.percents.pop_front().unwrap_or(0.0)
    }

    fn choose(&mut self, len: usize) -> usize {
        self.choices.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dice_roll_bounds_2d8_plus_4() {
        let mut roller = ThreadDice;
        for _ in 0..500 {
            let total = dice_roll(&mut roller, 2, 8, 4);
            assert!((6..=20).contains(&total), "2d8+4 rolled {total}");
        }
    }

    #[test]
    fn test_dice_min_max() {
        let d = Dice::new(2, 8, 4);
        assert_eq!(d.min(), 6);
        assert_eq!(d.max(), 20);
    }

    #[test]
    fn test_dice_display() {
        assert_eq!(Dice::new(2, 8, 4).to_string(), "2d8+4");
        assert_eq!(Dice::new(1, 6, -2).to_string(), "1d6-2");
    }

    #[test]
    fn test_dice_roll_zero_count_is_bonus() {
        let mut roller = ThreadDice;
        assert_eq!(dice_roll(&mut roller, 0, 8, 4), 4);
    }

    #[test]
    fn test_scripted_dice_plays_back_in_order() {
        let mut roller = ScriptedDice::new().queue_dies(&[20, 3]).queue_percent(0.75);
        assert_eq!(roller.die(20), 20);
        assert_eq!(roller.die(8), 3);
        assert_eq!(roller.percent(), 0.75);
    }

    #[test]
    fn test_scripted_dice_exhausted_queue_falls_back() {
        let mut roller = ScriptedDice::new();
        assert_eq!(roller.die(6), 1);
        assert_eq!(roller.percent(), 0.0);
        assert_eq!(roller.choose(4), 0);
    }

    #[test]
    fn test_thread_dice_die_in_range() {
        let mut roller = ThreadDice;
        for _ in 0..200 {
            let v = roller.die(20);
            assert!((1..=20).contains(&v));
        }
    }
}
