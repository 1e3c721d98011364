//! Locations, lore regions and tactical maps.

mod lore;
mod map;

pub use lore::{Lore, LoreLocation, LoreRegion};
pub use map::{CellType, MapData, MapError, MapLevel, MapMarker, MarkerKind};

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};

/// An NPC as described inside a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationNpc {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
}

/// A fully described location, the content of the active-location slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub atmosphere: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub npcs: Vec<LocationNpc>,
    #[serde(default)]
    pub quests: Vec<String>,
    #[serde(default)]
    pub loot: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub monsters: Vec<String>,
    #[serde(default)]
    pub is_breach: bool,
}

impl LocationData {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            kind: kind.into(),
            description: String::new(),
            atmosphere: String::new(),
            region: None,
            npcs: Vec::new(),
            quests: Vec::new(),
            loot: Vec::new(),
            secrets: Vec::new(),
            monsters: Vec::new(),
            is_breach: false,
        }
    }

    /// Put `text` in front of the description, separated by a blank line.
    pub fn prefix_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.description = if self.description.trim().is_empty() {
            text.to_string()
        } else {
            format!("{text}\n\n{}", self.description)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_description() {
        let mut location = LocationData::new("Old Mill", "ruin");
        location.prefix_description("After three days on the road...");
        assert_eq!(location.description, "After three days on the road...");

        location.description = "Broken wheel.".to_string();
        location.prefix_description("Fog rolls in.");
        assert_eq!(location.description, "Fog rolls in.\n\nBroken wheel.");
    }

    #[test]
    fn test_type_field_on_the_wire() {
        let location: LocationData =
            serde_json::from_str(r#"{"name": "Gate", "type": "fortress", "isBreach": true}"#)
                .unwrap();
        assert_eq!(location.kind, "fortress");
        assert!(location.is_breach);
        assert!(location.npcs.is_empty());
    }
}
