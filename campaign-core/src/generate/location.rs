use super::{lenient_names, GenerationError, Generator};
use crate::location::{LocationData, LocationNpc};
use ai_gateway::{lenient_string, lenient_vec};
use serde::Deserialize;

const LOCATION_ROLE: &str = "You design locations for a tabletop RPG game master: \
    places the party can explore, with people, hooks and hidden things.";

const BREACH_ROLE: &str = "You design multiversal breaches for a tabletop RPG game master. \
    A breach is a wound in reality where another world leaks through: physics \
    behave wrongly, creatures from elsewhere roam, and the place itself is \
    unstable and dangerous.";

/// What to base a generated location on. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationBrief {
    /// Fixed name; the model invents one when absent.
    pub name: Option<String>,
    pub kind: Option<String>,
    pub region: Option<String>,
    /// Extra narrative context, e.g. the travel event that led here.
    pub context: Option<String>,
}

impl LocationBrief {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn describe(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.name {
            lines.push(format!("Name: {name} (use exactly this name)"));
        }
        if let Some(kind) = &self.kind {
            lines.push(format!("Kind of place: {kind}"));
        }
        if let Some(region) = &self.region {
            lines.push(format!("Region: {region}"));
        }
        if let Some(context) = &self.context {
            lines.push(format!("Context: {context}"));
        }
        if lines.is_empty() {
            lines.push("Anything that fits a classic fantasy world.".to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct LocationWire {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    atmosphere: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    npcs: Vec<NpcWire>,
    #[serde(default, deserialize_with = "lenient_names")]
    quests: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    loot: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    secrets: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    monsters: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NpcWire {
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
}

const SHAPE: &str = r#"{
  "name": "Location name",
  "type": "village | dungeon | ruin | forest | city | ...",
  "description": "What the party sees, two or three paragraphs",
  "atmosphere": "Sounds, smells, mood in one or two sentences",
  "npcs": [{"name": "...", "role": "...", "description": "..."}],
  "quests": ["Hook the party could pick up"],
  "loot": ["Item that can be found here"],
  "secrets": ["Something hidden the GM can reveal"],
  "monsters": ["Common monster name"]
}"#;

impl Generator {
    /// A full location for the active-location slot.
    pub async fn generate_location(
        &self,
        brief: &LocationBrief,
    ) -> Result<LocationData, GenerationError> {
        let prompt = format!(
            "Create a location.\n\n{}\n\nRespond with JSON in exactly this shape:\n{SHAPE}",
            brief.describe()
        );
        let wire: LocationWire = self.request_json("location", LOCATION_ROLE, prompt).await?;
        Ok(into_location(wire, brief, false))
    }

    /// A breach location. Generated with its own rules and flagged `is_breach`.
    pub async fn generate_breach(
        &self,
        brief: &LocationBrief,
    ) -> Result<LocationData, GenerationError> {
        let prompt = format!(
            "Create a multiversal breach. Say which other reality bleeds through, \
             list creatures that came from it under \"monsters\", and put the \
             rules of its broken physics under \"secrets\".\n\n{}\n\n\
             Respond with JSON in exactly this shape:\n{SHAPE}",
            brief.describe()
        );
        let wire: LocationWire = self.request_json("breach", BREACH_ROLE, prompt).await?;
        Ok(into_location(wire, brief, true))
    }
}

fn into_location(wire: LocationWire, brief: &LocationBrief, is_breach: bool) -> LocationData {
    let name = brief
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| Some(wire.name.trim().to_string()).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| if is_breach { "The Breach" } else { "Unnamed place" }.to_string());
    let kind = Some(wire.kind)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| brief.kind.clone())
        .unwrap_or_else(|| if is_breach { "breach" } else { "location" }.to_string());

    let mut location = LocationData::new(name, kind);
    location.description = wire.description;
    location.atmosphere = wire.atmosphere;
    location.region = brief.region.clone();
    location.npcs = wire
        .npcs
        .into_iter()
        .filter(|n| !n.name.trim().is_empty())
        .map(|n| LocationNpc {
            name: n.name,
            role: n.role,
            description: n.description,
        })
        .collect();
    location.quests = wire.quests;
    location.loot = wire.loot;
    location.secrets = wire.secrets;
    location.monsters = wire.monsters;
    location.is_breach = is_breach;
    location
}
