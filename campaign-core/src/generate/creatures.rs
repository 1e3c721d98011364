use super::{lenient_number, GenerationError, Generator};
use crate::bestiary::{MonsterStats, DEFAULT_AC, DEFAULT_INITIATIVE};
use crate::npc::{Attitude, CampaignNpc};
use ai_gateway::lenient_string;
use serde::Deserialize;

const MONSTER_ROLE: &str = "You are a tabletop RPG rules reference. Give combat \
    statistics in the style of fifth edition statblocks.";

const NPC_ROLE: &str = "You create memorable non-player characters for a \
    tabletop RPG game master.";

#[derive(Debug, Deserialize)]
struct MonsterWire {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(
        default,
        alias = "hit_points",
        alias = "hitPoints",
        deserialize_with = "lenient_number"
    )]
    hp: Option<f64>,
    #[serde(
        default,
        alias = "armor_class",
        alias = "armorClass",
        deserialize_with = "lenient_number"
    )]
    ac: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    initiative: Option<f64>,
    #[serde(
        default,
        alias = "challenge_rating",
        alias = "challengeRating",
        alias = "cr",
        deserialize_with = "lenient_number"
    )]
    challenge_rating: Option<f64>,
}

/// What to base a generated NPC on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpcBrief {
    /// Where the NPC is met. Copied onto the result.
    pub location: Option<String>,
    /// Free-text request ("a nervous innkeeper").
    pub hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NpcWire {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    race: String,
    #[serde(default, deserialize_with = "lenient_string")]
    role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    attitude: String,
}

impl Generator {
    /// Statblock numbers for a named monster. An answer without usable hit
    /// points is malformed.
    pub async fn generate_monster_stats(
        &self,
        name: &str,
    ) -> Result<MonsterStats, GenerationError> {
        let prompt = format!(
            r#"Give combat statistics for the monster "{name}".

Respond with JSON in exactly this shape:
{{"name": "{name}", "hp": 22, "ac": 13, "initiative": 12, "challengeRating": 1}}

"initiative" is 10 plus the creature's dexterity modifier."#
        );
        let wire: MonsterWire = self.request_json("monster-stats", MONSTER_ROLE, prompt).await?;

        let hp = wire
            .hp
            .filter(|hp| *hp >= 1.0)
            .ok_or_else(|| GenerationError::Malformed(format!("no hit points for '{name}'")))?;

        Ok(MonsterStats {
            name: Some(wire.name.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| name.to_string()),
            hp: hp.round() as i32,
            ac: wire.ac.map_or(DEFAULT_AC, |ac| ac.round() as i32),
            initiative: wire
                .initiative
                .map_or(DEFAULT_INITIATIVE, |i| i.round() as i32),
            challenge_rating: wire.challenge_rating.unwrap_or(0.0) as f32,
        })
    }

    pub async fn generate_npc(&self, brief: &NpcBrief) -> Result<CampaignNpc, GenerationError> {
        let mut details = Vec::new();
        if let Some(location) = &brief.location {
            details.push(format!("They can be found at: {location}"));
        }
        if let Some(hint) = &brief.hint {
            details.push(format!("Request: {hint}"));
        }
        let prompt = format!(
            r#"Create one NPC.
{}

Respond with JSON in exactly this shape:
{{"name": "...", "race": "...", "role": "...", "description": "Appearance, manner and a secret", "attitude": "friendly | neutral | hostile"}}"#,
            details.join("\n")
        );
        let wire: NpcWire = self.request_json("npc", NPC_ROLE, prompt).await?;

        if wire.name.trim().is_empty() {
            return Err(GenerationError::Malformed("NPC has no name".to_string()));
        }

        let mut npc = CampaignNpc::new(wire.name.trim());
        npc.race = wire.race;
        npc.role = wire.role;
        npc.description = wire.description;
        npc.attitude = wire.attitude.parse().unwrap_or(Attitude::Neutral);
        npc.location = brief.location.clone().unwrap_or_default();
        Ok(npc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GeneratorConfig;
    use crate::testing::ScriptedModel;
    use ai_gateway::RetryPolicy;
    use std::sync::Arc;

    fn generator(model: Arc<ScriptedModel>) -> Generator {
        let config = GeneratorConfig {
            retry: RetryPolicy::none(),
            ..GeneratorConfig::default()
        };
        Generator::new(model, config)
    }

    #[tokio::test]
    async fn test_monster_stats_with_aliases() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text(
            r#"{"hit_points": "45 (6d10+12)", "armor_class": "14 (hide)", "cr": "1/2"}"#,
        );

        let stats = generator(model)
            .generate_monster_stats("Mire Troll")
            .await
            .unwrap();
        assert_eq!(stats.name, "Mire Troll");
        assert_eq!(stats.hp, 45);
        assert_eq!(stats.ac, 14);
        assert_eq!(stats.initiative, 10);
        assert_eq!(stats.challenge_rating, 0.5);
    }

    #[tokio::test]
    async fn test_monster_without_hp_is_malformed() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text(r#"{"name": "Ghost", "ac": 11}"#);

        let err = generator(model)
            .generate_monster_stats("Ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_generate_npc() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text(
            r#"{"name": "Brannoc", "race": "Dwarf", "role": "Ferryman", "attitude": "Hostile"}"#,
        );

        let npc = generator(model)
            .generate_npc(&NpcBrief {
                location: Some("Black River".to_string()),
                hint: None,
            })
            .await
            .unwrap();
        assert_eq!(npc.name, "Brannoc");
        assert_eq!(npc.attitude, Attitude::Hostile);
        assert_eq!(npc.location, "Black River");
    }
}
