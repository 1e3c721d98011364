use super::{lenient_names, lenient_number, GenerationError, Generator};
use crate::travel::{DestinationChoice, TravelEvent, TravelEventKind, TravelPlan, TravelResult};
use ai_gateway::{lenient_string, lenient_vec};
use serde::Deserialize;

const ROLE: &str = "You plan overland journeys for a tabletop RPG game master. \
    Each day of travel gets an event that the GM can run at the table.";

#[derive(Debug, Deserialize)]
struct ItineraryWire {
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    summary: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    events: Vec<EventWire>,
}

#[derive(Debug, Deserialize)]
struct EventWire {
    #[serde(default, deserialize_with = "lenient_number")]
    day: Option<f64>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(
        default,
        alias = "suggestedLocation",
        alias = "location",
        deserialize_with = "lenient_string"
    )]
    suggested_location: String,
    #[serde(default, deserialize_with = "lenient_names")]
    threats: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    loot: Vec<String>,
}

impl Generator {
    /// Day-by-day itinerary for a journey. Every event's day lies in
    /// `1..=plan.days` and there is at least one event per journey.
    pub async fn generate_itinerary(
        &self,
        plan: &TravelPlan,
    ) -> Result<TravelResult, GenerationError> {
        let days = plan.days.max(1);
        let destination = match &plan.destination {
            DestinationChoice::Lore { name, .. } | DestinationChoice::Custom { name } => {
                format!("\"{name}\"")
            }
            DestinationChoice::Generic { kind } => {
                format!("a {kind} of your choosing (invent its name)")
            }
            DestinationChoice::Breach => {
                "a multiversal breach, a tear where another reality bleeds through".to_string()
            }
        };

        let prompt = format!(
            r#"Plan a journey to {destination}.

Travel method: {method}
Pace: {pace}
Duration: {days} day(s)

Give one event per day, days numbered 1 to {days}. Event types are
"combat", "social", "discovery", "weather" or "quiet". Combat events list
the creatures in "threats" by their common monster names. Discovery events
may list found items in "loot". "suggestedLocation" names a place the
party could explore that day, or is empty.

Respond with JSON in exactly this shape:
{{
  "title": "Journey title",
  "summary": "Two or three sentences about the whole trip",
  "events": [
    {{
      "day": 1,
      "type": "combat",
      "title": "Short title",
      "description": "What happens, written for the GM",
      "suggestedLocation": "",
      "threats": ["Goblin", "Goblin"],
      "loot": []
    }}
  ]
}}"#,
            method = plan.method,
            pace = plan.pace,
        );

        let wire: ItineraryWire = self.request_json("itinerary", ROLE, prompt).await?;
        tracing::debug!(events = wire.events.len(), days, "itinerary received");

        let events = wire
            .events
            .into_iter()
            .map(|e| TravelEvent {
                day: e.day.map(|d| d.round().clamp(0.0, u32::MAX as f64) as u32).unwrap_or(0),
                kind: e.kind.parse().unwrap_or(TravelEventKind::Quiet),
                title: e.title,
                description: e.description,
                suggested_location: Some(e.suggested_location.trim().to_string())
                    .filter(|s| !s.is_empty()),
                threats: e.threats,
                loot: e.loot,
            })
            .collect();

        Ok(TravelResult {
            title: non_empty_or(wire.title, || format!("Journey to {}", plan.destination)),
            summary: wire.summary,
            events: normalize_events(events, days),
        })
    }
}

fn non_empty_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value
    }
}

/// Pin every event to a day in `1..=days`.
///
/// A missing day (0) takes the event's position; out-of-range days are
/// clamped. An empty list becomes one quiet day per day of travel. The
/// result is sorted by day, keeping the model's order within a day.
pub(crate) fn normalize_events(events: Vec<TravelEvent>, days: u32) -> Vec<TravelEvent> {
    let days = days.max(1);
    if events.is_empty() {
        return (1..=days).map(quiet_day).collect();
    }

    let mut events: Vec<TravelEvent> = events
        .into_iter()
        .enumerate()
        .map(|(position, mut event)| {
            let day = if event.day == 0 {
                position as u32 + 1
            } else {
                event.day
            };
            event.day = day.clamp(1, days);
            event
        })
        .collect();
    events.sort_by_key(|e| e.day);
    events
}

fn quiet_day(day: u32) -> TravelEvent {
    TravelEvent {
        day,
        kind: TravelEventKind::Quiet,
        title: "A quiet day on the road".to_string(),
        description: "The journey continues without incident.".to_string(),
        suggested_location: None,
        threats: Vec::new(),
        loot: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GeneratorConfig;
    use crate::testing::ScriptedModel;
    use crate::travel::{Pace, TravelMethod};
    use std::sync::Arc;

    fn event(day: u32, title: &str) -> TravelEvent {
        TravelEvent {
            day,
            title: title.to_string(),
            ..quiet_day(day)
        }
    }

    #[test]
    fn test_normalize_fills_empty_itinerary() {
        let events = normalize_events(Vec::new(), 3);
        let days: Vec<u32> = events.iter().map(|e| e.day).collect();
        assert_eq!(days, [1, 2, 3]);

        let events = normalize_events(Vec::new(), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].day, 1);
    }

    #[test]
    fn test_normalize_missing_and_out_of_range_days() {
        let events = normalize_events(
            vec![event(0, "a"), event(9, "b"), event(0, "c"), event(2, "d")],
            3,
        );
        let days: Vec<(u32, &str)> = events.iter().map(|e| (e.day, e.title.as_str())).collect();
        assert_eq!(days, [(1, "a"), (2, "d"), (3, "b"), (3, "c")]);
    }

    #[tokio::test]
    async fn test_generate_itinerary_decodes_loose_json() {
        let model = Arc::new(ScriptedModel::new());
        model.push_text(
            r#"Here is your trip:
```json
{
  "title": "Road to the Tower",
  "summary": "Three days through fog.",
  "events": [
    {"day": "1", "type": "Combat", "title": "Ambush", "description": "Goblins!",
     "threats": ["Goblin", {"name": "Wolf"}], "loot": "none"},
    {"day": 2, "type": "discovery", "title": "Shrine", "description": "Old shrine",
     "suggestedLocation": "Mossy Shrine", "loot": ["Silver Idol"]},
    "garbage"
  ]
}
```"#,
        );

        let generator = Generator::new(model.clone(), GeneratorConfig::default());
        let plan = TravelPlan::new(
            DestinationChoice::Custom {
                name: "Таинственная башня".to_string(),
            },
            TravelMethod::Foot,
            Pace::Normal,
            3,
        );
        let result = generator.generate_itinerary(&plan).await.unwrap();

        assert_eq!(result.title, "Road to the Tower");
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].kind, TravelEventKind::Combat);
        assert_eq!(result.events[0].threats, ["Goblin", "Wolf"]);
        assert!(result.events[0].loot.is_empty());
        assert_eq!(
            result.events[1].suggested_location.as_deref(),
            Some("Mossy Shrine")
        );

        let prompt = model.last_request().unwrap().last_user_text().unwrap().to_string();
        assert!(prompt.contains("Таинственная башня"));
        assert!(prompt.contains("3 day(s)"));
    }
}
