//! Monster stat lookup against the public D&D 5e reference API.

use crate::combat::{Combatant, StatSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://www.dnd5eapi.co";

/// Fallback statblock when neither the reference nor generation works.
pub const DEFAULT_HP: i32 = 20;
pub const DEFAULT_AC: i32 = 12;
pub const DEFAULT_INITIATIVE: i32 = 10;

#[derive(Debug, Clone, Error)]
pub enum BestiaryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Reference API error (status {0})")]
    Api(u16),

    #[error("Failed to parse monster: {0}")]
    Parse(String),
}

/// Combat-relevant numbers for a monster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterStats {
    pub name: String,
    pub hp: i32,
    pub ac: i32,
    pub initiative: i32,
    #[serde(default)]
    pub challenge_rating: f32,
}

impl MonsterStats {
    /// The fixed fallback statblock.
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hp: DEFAULT_HP,
            ac: DEFAULT_AC,
            initiative: DEFAULT_INITIATIVE,
            challenge_rating: 0.0,
        }
    }

    pub fn into_combatant(self, source: StatSource) -> Combatant {
        Combatant::new(self.name, self.hp.max(1), self.ac, self.initiative).with_source(source)
    }
}

/// Entry of a challenge-rating listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonsterSummary {
    pub index: String,
    pub name: String,
}

/// A source of canonical monster statblocks.
#[async_trait]
pub trait MonsterReference: Send + Sync {
    /// Look a monster up by name. `Ok(None)` when it is unknown.
    async fn lookup(&self, name: &str) -> Result<Option<MonsterStats>, BestiaryError>;

    /// Monsters of a given challenge rating.
    async fn by_challenge(
        &self,
        challenge_rating: f32,
    ) -> Result<Vec<MonsterSummary>, BestiaryError>;
}

/// Client for `dnd5eapi.co`.
pub struct Dnd5eApi {
    client: reqwest::Client,
    base_url: String,
}

impl Default for Dnd5eApi {
    fn default() -> Self {
        Self::new()
    }
}

impl Dnd5eApi {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<reqwest::Response>, BestiaryError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "monster reference request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BestiaryError::Network(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(BestiaryError::Api(status.as_u16())),
        }
    }
}

#[async_trait]
impl MonsterReference for Dnd5eApi {
    async fn lookup(&self, name: &str) -> Result<Option<MonsterStats>, BestiaryError> {
        let index = monster_index(name);
        if index.is_empty() {
            return Ok(None);
        }

        let Some(response) = self.get(&format!("/api/monsters/{index}")).await? else {
            return Ok(None);
        };
        let monster: ApiMonster = response
            .json()
            .await
            .map_err(|e| BestiaryError::Parse(e.to_string()))?;
        Ok(Some(monster.into()))
    }

    async fn by_challenge(
        &self,
        challenge_rating: f32,
    ) -> Result<Vec<MonsterSummary>, BestiaryError> {
        let path = format!("/api/monsters?challenge_rating={challenge_rating}");
        let Some(response) = self.get(&path).await? else {
            return Ok(Vec::new());
        };
        let list: ApiList = response
            .json()
            .await
            .map_err(|e| BestiaryError::Parse(e.to_string()))?;
        Ok(list.results)
    }
}

/// Reference API index for a monster name: "Adult Red Dragon" -> "adult-red-dragon".
pub fn monster_index(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Initiative bonus from a dexterity score, as a flat initiative value.
fn initiative_from_dex(dexterity: i32) -> i32 {
    10 + (dexterity - 10).div_euclid(2)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ApiMonster {
    name: String,
    hit_points: i32,
    #[serde(default)]
    armor_class: ArmorClass,
    #[serde(default = "average_dex")]
    dexterity: i32,
    #[serde(default)]
    challenge_rating: f32,
}

fn average_dex() -> i32 {
    10
}

/// Newer API versions return a list of armor entries; older ones a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArmorClass {
    List(Vec<ArmorEntry>),
    Flat(i32),
}

impl Default for ArmorClass {
    fn default() -> Self {
        ArmorClass::Flat(DEFAULT_AC)
    }
}

#[derive(Deserialize)]
struct ArmorEntry {
    value: i32,
}

impl ArmorClass {
    fn value(&self) -> i32 {
        match self {
            ArmorClass::List(entries) => entries.first().map_or(DEFAULT_AC, |e| e.value),
            ArmorClass::Flat(value) => *value,
        }
    }
}

impl From<ApiMonster> for MonsterStats {
    fn from(monster: ApiMonster) -> Self {
        Self {
            name: monster.name,
            hp: monster.hit_points,
            ac: monster.armor_class.value(),
            initiative: initiative_from_dex(monster.dexterity),
            challenge_rating: monster.challenge_rating,
        }
    }
}

#[derive(Deserialize)]
struct ApiList {
    #[serde(default)]
    results: Vec<MonsterSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monster_index() {
        assert_eq!(monster_index("Adult Red Dragon"), "adult-red-dragon");
        assert_eq!(monster_index("  Goblin "), "goblin");
        assert_eq!(monster_index("Will-o'-Wisp"), "will-o-wisp");
        assert_eq!(monster_index("   "), "");
    }

    #[test]
    fn test_initiative_from_dex() {
        assert_eq!(initiative_from_dex(10), 10);
        assert_eq!(initiative_from_dex(14), 12);
        assert_eq!(initiative_from_dex(9), 9);
        assert_eq!(initiative_from_dex(1), 5);
    }

    #[test]
    fn test_parse_current_api_shape() {
        let json = r#"{
            "index": "goblin",
            "name": "Goblin",
            "hit_points": 7,
            "armor_class": [{"type": "armor", "value": 15}],
            "dexterity": 14,
            "challenge_rating": 0.25
        }"#;
        let stats: MonsterStats = serde_json::from_str::<ApiMonster>(json).unwrap().into();
        assert_eq!(
            stats,
            MonsterStats {
                name: "Goblin".to_string(),
                hp: 7,
                ac: 15,
                initiative: 12,
                challenge_rating: 0.25,
            }
        );
    }

    #[test]
    fn test_parse_flat_armor_class() {
        let json = r#"{"name": "Ogre", "hit_points": 59, "armor_class": 11}"#;
        let stats: MonsterStats = serde_json::from_str::<ApiMonster>(json).unwrap().into();
        assert_eq!(stats.ac, 11);
        assert_eq!(stats.initiative, 10);
    }

    #[test]
    fn test_fallback_statblock() {
        let combatant = MonsterStats::fallback("Shadow Thing").into_combatant(StatSource::Default);
        assert_eq!(combatant.hp, 20);
        assert_eq!(combatant.ac, 12);
        assert_eq!(combatant.initiative, 10);
        assert_eq!(combatant.source, StatSource::Default);
    }
}
