//! Initiative tracker.

use crate::ids::RecordId;
use crate::party::PartyMember;
use serde::{Deserialize, Serialize};

/// Where a combatant's numbers came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatSource {
    /// Monster reference API.
    Reference,
    /// AI generated.
    Generated,
    /// Fixed fallback statblock, or entered by hand.
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub initiative: i32,
    #[serde(default)]
    pub is_player: bool,
    #[serde(default)]
    pub source: StatSource,
}

impl Combatant {
    pub fn new(name: impl Into<String>, max_hp: i32, ac: i32, initiative: i32) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            hp: max_hp,
            max_hp,
            ac,
            initiative,
            is_player: false,
            source: StatSource::Default,
        }
    }

    pub fn with_source(mut self, source: StatSource) -> Self {
        self.source = source;
        self
    }

    /// A party member joining the fight with a rolled initiative.
    pub fn from_member(member: &PartyMember, initiative: i32) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            hp: member.hp,
            max_hp: member.max_hp,
            ac: member.ac as i32,
            initiative,
            is_player: true,
            source: StatSource::Default,
        }
    }

    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }
}

/// Encounter state: combatants in initiative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatTracker {
    #[serde(default)]
    combatants: Vec<Combatant>,
    #[serde(default = "first_round")]
    round: u32,
    #[serde(default)]
    turn: usize,
}

fn first_round() -> u32 {
    1
}

impl Default for CombatTracker {
    fn default() -> Self {
        Self {
            combatants: Vec::new(),
            round: 1,
            turn: 0,
        }
    }
}

impl CombatTracker {
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// Whose turn it is.
    pub fn current(&self) -> Option<&Combatant> {
        self.combatants.get(self.turn)
    }

    pub fn get(&self, id: RecordId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Insert in descending initiative order. Later arrivals go after
    /// existing combatants with the same initiative.
    pub fn add(&mut self, combatant: Combatant) {
        let index = self
            .combatants
            .iter()
            .position(|c| c.initiative < combatant.initiative)
            .unwrap_or(self.combatants.len());
        // Keep the current turn pointing at the same combatant.
        if index <= self.turn && !self.combatants.is_empty() {
            self.turn += 1;
        }
        self.combatants.insert(index, combatant);
    }

    /// Advance to the next combatant, wrapping into a new round.
    pub fn next_turn(&mut self) -> Option<&Combatant> {
        if self.combatants.is_empty() {
            return None;
        }
        self.turn += 1;
        if self.turn >= self.combatants.len() {
            self.turn = 0;
            self.round += 1;
        }
        self.current()
    }

    /// Apply damage; hp never drops below 0. Returns the new hp.
    pub fn damage(&mut self, id: RecordId, amount: i32) -> Option<i32> {
        let combatant = self.combatants.iter_mut().find(|c| c.id == id)?;
        combatant.hp = combatant.hp.saturating_sub(amount.max(0)).clamp(0, combatant.max_hp.max(0));
        Some(combatant.hp)
    }

    /// Heal; hp never exceeds max. Returns the new hp.
    pub fn heal(&mut self, id: RecordId, amount: i32) -> Option<i32> {
        let combatant = self.combatants.iter_mut().find(|c| c.id == id)?;
        combatant.hp = combatant.hp.saturating_add(amount.max(0)).clamp(0, combatant.max_hp.max(0));
        Some(combatant.hp)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<Combatant> {
        let index = self.combatants.iter().position(|c| c.id == id)?;
        let removed = self.combatants.remove(index);
        if index < self.turn {
            self.turn -= 1;
        }
        if self.turn >= self.combatants.len() {
            self.turn = 0;
        }
        Some(removed)
    }

    /// End the encounter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
