//! Non-player characters known to the campaign.

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

/// Whether an NPC is still around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpcStatus {
    #[default]
    Alive,
    Dead,
    Missing,
}

/// How an NPC feels about the party.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attitude {
    Friendly,
    #[default]
    Neutral,
    Hostile,
}

impl std::str::FromStr for Attitude {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "friendly" => Ok(Self::Friendly),
            "neutral" => Ok(Self::Neutral),
            "hostile" => Ok(Self::Hostile),
            other => Err(format!("unknown attitude '{other}'")),
        }
    }
}

/// A tracked NPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignNpc {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: NpcStatus,
    #[serde(default)]
    pub attitude: Attitude,
    /// Image object id in the gallery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<RecordId>,
}

impl CampaignNpc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            race: String::new(),
            role: String::new(),
            description: String::new(),
            location: String::new(),
            status: NpcStatus::Alive,
            attitude: Attitude::Neutral,
            portrait: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_attitude(mut self, attitude: Attitude) -> Self {
        self.attitude = attitude;
        self
    }

    fn same_identity(&self, other: &CampaignNpc) -> bool {
        self.name.trim().to_lowercase() == other.name.trim().to_lowercase()
            && self.location.trim().to_lowercase() == other.location.trim().to_lowercase()
    }
}

/// Result of merging an NPC into the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    Replaced,
}

/// All NPCs in the campaign, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NpcRoster {
    npcs: Vec<CampaignNpc>,
}

impl NpcRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[CampaignNpc] {
        &self.npcs
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&CampaignNpc> {
        self.npcs.iter().find(|n| n.id == id)
    }

    /// Merge an NPC: same id replaces, then same name and location
    /// (case-insensitive), otherwise append.
    ///
    /// A name+location match keeps the stored id.
    pub fn upsert(&mut self, mut npc: CampaignNpc) -> Merge {
        if let Some(existing) = self.npcs.iter_mut().find(|n| n.id == npc.id) {
            *existing = npc;
            return Merge::Replaced;
        }
        if let Some(existing) = self.npcs.iter_mut().find(|n| n.same_identity(&npc)) {
            npc.id = existing.id;
            *existing = npc;
            return Merge::Replaced;
        }
        self.npcs.push(npc);
        Merge::Inserted
    }

    pub fn set_status(&mut self, id: RecordId, status: NpcStatus) -> bool {
        match self.npcs.iter_mut().find(|n| n.id == id) {
            Some(npc) => {
                npc.status = status;
                true
            }
            None => false,
        }
    }

    pub fn set_attitude(&mut self, id: RecordId, attitude: Attitude) -> bool {
        match self.npcs.iter_mut().find(|n| n.id == id) {
            Some(npc) => {
                npc.attitude = attitude;
                true
            }
            None => false,
        }
    }

    pub fn set_portrait(&mut self, id: RecordId, image: RecordId) -> bool {
        match self.npcs.iter_mut().find(|n| n.id == id) {
            Some(npc) => {
                npc.portrait = Some(image);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: RecordId) -> Option<CampaignNpc> {
        let index = self.npcs.iter().position(|n| n.id == id)?;
        Some(self.npcs.remove(index))
    }

    /// NPCs whose location matches `location` (case-insensitive).
    pub fn at_location<'a>(&'a self, location: &'a str) -> impl Iterator<Item = &'a CampaignNpc> {
        let wanted = location.trim().to_lowercase();
        self.npcs
            .iter()
            .filter(move |n| n.location.trim().to_lowercase() == wanted)
    }
}
