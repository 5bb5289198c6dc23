//! Engagement and focus tracking.
//!
//! Two maps kept in sync:
//! - the engagement map: for each character, the set of characters it is
//!   hostile-engaged with;
//! - the focus map: for each character, at most one current target.
//!
//! Invariants, restored before any public call returns:
//! - engagement is symmetric: `a` engages `b` ⇔ `b` engages `a`;
//! - a focus is always a member of its owner's engagement set, or absent.

use std::collections::{HashMap, HashSet};

use embermud_proto::CharId;
use tracing::debug;

/// The engagement/focus bookkeeping for every fight in the world.
#[derive(Debug, Default)]
pub struct CombatManager {
    engagements: HashMap<CharId, HashSet<CharId>>,
    focus: HashMap<CharId, CharId>,
}

impl CombatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or re-asserts) a fight between two characters.
    ///
    /// Idempotent. Engagement is inserted in both directions; each
    /// side's focus is set only if it currently has none, so an
    /// already-busy character keeps its target.
    pub fn start_combat(&mut self, a: CharId, b: CharId) {
        if a == b {
            return;
        }
        let fresh = self.engagements.entry(a).or_default().insert(b);
        self.engagements.entry(b).or_default().insert(a);
        self.focus.entry(a).or_insert(b);
        self.focus.entry(b).or_insert(a);
        if fresh {
            debug!(%a, %b, "combat started");
        }
    }

    /// Ends the fight between two characters, both directions. Clears
    /// either side's focus if it pointed at the other.
    pub fn end_combat(&mut self, a: CharId, b: CharId) {
        self.remove_edge(a, b);
        self.remove_edge(b, a);
    }

    /// Tears down every engagement a character is part of.
    pub fn disengage_all(&mut self, ch: CharId) {
        let partners: Vec<CharId> = self
            .engagements
            .get(&ch)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for partner in partners {
            self.end_combat(ch, partner);
        }
    }

    /// Retargets a character onto any remaining engagement, or clears
    /// its focus if none remain. Returns the new focus.
    pub fn refocus(&mut self, ch: CharId) -> Option<CharId> {
        let next = self
            .engagements
            .get(&ch)
            .and_then(|s| s.iter().min_by_key(|id| id.0))
            .copied();
        match next {
            Some(target) => {
                self.focus.insert(ch, target);
            }
            None => {
                self.focus.remove(&ch);
            }
        }
        next
    }

    pub fn in_combat(&self, ch: CharId) -> bool {
        self.engagements
            .get(&ch)
            .is_some_and(|s| !s.is_empty())
    }

    pub fn engaged_with(&self, ch: CharId) -> Vec<CharId> {
        self.engagements
            .get(&ch)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn current_target(&self, ch: CharId) -> Option<CharId> {
        self.focus.get(&ch).copied()
    }

    /// Every (character, focus) pair, for the round driver.
    pub fn focus_pairs(&self) -> Vec<(CharId, CharId)> {
        let mut pairs: Vec<(CharId, CharId)> =
            self.focus.iter().map(|(a, b)| (*a, *b)).collect();
        pairs.sort_unstable_by_key(|(a, _)| a.0);
        pairs
    }

    /// Every character currently in at least one fight.
    pub fn combatants(&self) -> Vec<CharId> {
        let mut ids: Vec<CharId> = self
            .engagements
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable_by_key(|id| id.0);
        ids
    }

    fn remove_edge(&mut self, from: CharId, to: CharId) {
        if let Some(set) = self.engagements.get_mut(&from) {
            set.remove(&to);
            if set.is_empty() {
                self.engagements.remove(&from);
            }
        }
        if self.focus.get(&from) == Some(&to) {
            self.focus.remove(&from);
        }
    }

    /// Panics if either invariant is broken. Test-support only.
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        for (a, set) in &self.engagements {
            for b in set {
                assert!(
                    self.engagements
                        .get(b)
                        .is_some_and(|back| back.contains(a)),
                    "asymmetric engagement {a} -> {b}"
                );
            }
        }
        for (owner, target) in &self.focus {
            assert!(
                self.engagements
                    .get(owner)
                    .is_some_and(|set| set.contains(target)),
                "focus {owner} -> {target} outside engagement set"
            );
        }
    }
}
