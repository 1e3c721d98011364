use super::{lenient_number, GenerationError, Generator};
use crate::party::InventoryItem;
use ai_gateway::{lenient_string, lenient_vec};
use serde::Deserialize;

const ROLE: &str = "You hand out treasure for a tabletop RPG game master. \
    Rewards are flavorful and fit the party's level.";

/// What the loot is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootBrief {
    /// Where or from whom it was found.
    pub source: String,
    pub party_level: u8,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
struct LootWire {
    #[serde(default, deserialize_with = "lenient_vec")]
    items: Vec<ItemWire>,
}

#[derive(Debug, Deserialize)]
struct ItemWire {
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    value: String,
}

impl Generator {
    pub async fn generate_loot(
        &self,
        brief: &LootBrief,
    ) -> Result<Vec<InventoryItem>, GenerationError> {
        let prompt = format!(
            r#"Create {count} item(s) of loot found at or on: {source}.
The party is level {level}.

Respond with JSON in exactly this shape:
{{"items": [{{"name": "...", "quantity": 1, "description": "...", "value": "25 gp"}}]}}"#,
            count = brief.count.max(1),
            source = brief.source,
            level = brief.party_level.max(1),
        );
        let wire: LootWire = self.request_json("loot", ROLE, prompt).await?;

        Ok(wire
            .items
            .into_iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| {
                let quantity = i.quantity.map_or(1, |q| q.round().max(1.0) as u32);
                InventoryItem::new(i.name.trim())
                    .with_quantity(quantity)
                    .with_description(i.description)
                    .with_value(i.value)
            })
            .collect())
    }
}
