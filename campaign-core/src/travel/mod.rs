//! Journeys: plans, generated itineraries and the orchestrator that walks
//! the GM through them.

mod orchestrator;

pub use orchestrator::{
    LoadingTask, RetryOutcome, TravelError, TravelFailure, TravelOrchestrator, TravelPhase,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Where the party is headed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DestinationChoice {
    /// A known location from the lore.
    #[serde(rename_all = "camelCase")]
    Lore { region_id: String, name: String },
    /// A kind of place; the model picks the specifics.
    Generic { kind: String },
    /// A multiversal anomaly.
    Breach,
    /// Free text.
    Custom { name: String },
}

impl DestinationChoice {
    pub fn mode(&self) -> DestinationMode {
        match self {
            DestinationChoice::Lore { .. } => DestinationMode::Lore,
            DestinationChoice::Generic { .. } => DestinationMode::Generic,
            DestinationChoice::Breach => DestinationMode::Breach,
            DestinationChoice::Custom { .. } => DestinationMode::Custom,
        }
    }
}

impl fmt::Display for DestinationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationChoice::Lore { name, .. } | DestinationChoice::Custom { name } => {
                f.write_str(name)
            }
            DestinationChoice::Generic { kind } => write!(f, "a {kind}"),
            DestinationChoice::Breach => f.write_str("the Breach"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationMode {
    Lore,
    Generic,
    Breach,
    Custom,
}

macro_rules! word_enum {
    ($name:ident { $($variant:ident => $word:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $word),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($word => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{other}'", stringify!($name))),
                }
            }
        }
    };
}

/// How the party travels. Context for the itinerary only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMethod {
    #[default]
    Foot,
    Horse,
    Cart,
    Ship,
    Flying,
    Teleport,
}

word_enum!(TravelMethod {
    Foot => "foot",
    Horse => "horse",
    Cart => "cart",
    Ship => "ship",
    Flying => "flying",
    Teleport => "teleport",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Slow,
    #[default]
    Normal,
    Fast,
}

word_enum!(Pace {
    Slow => "slow",
    Normal => "normal",
    Fast => "fast",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelEventKind {
    Combat,
    Social,
    Discovery,
    Weather,
    #[default]
    Quiet,
}

word_enum!(TravelEventKind {
    Combat => "combat",
    Social => "social",
    Discovery => "discovery",
    Weather => "weather",
    Quiet => "quiet",
});

/// What the GM chose on the planning screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub destination: DestinationChoice,
    pub method: TravelMethod,
    pub pace: Pace,
    pub days: u32,
}

impl TravelPlan {
    /// `days` is raised to at least 1.
    pub fn new(
        destination: DestinationChoice,
        method: TravelMethod,
        pace: Pace,
        days: u32,
    ) -> Self {
        Self {
            destination,
            method,
            pace,
            days: days.max(1),
        }
    }
}

/// One day's happening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelEvent {
    /// 1-based.
    pub day: u32,
    #[serde(rename = "type")]
    pub kind: TravelEventKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_location: Option<String>,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub loot: Vec<String>,
}

/// A generated itinerary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelResult {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub events: Vec<TravelEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    pub mode: DestinationMode,
}

impl Destination {
    pub fn from_plan(plan: &TravelPlan) -> Self {
        let (name, region_id) = match &plan.destination {
            DestinationChoice::Lore { region_id, name } => (name.clone(), Some(region_id.clone())),
            DestinationChoice::Custom { name } => (name.clone(), None),
            DestinationChoice::Generic { kind } => (kind.clone(), None),
            DestinationChoice::Breach => ("Breach".to_string(), None),
        };
        Self {
            name,
            region_id,
            mode: plan.destination.mode(),
        }
    }
}

/// A journey in progress. Persisted under `travel_state` and removed on
/// arrival or abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelState {
    pub plan: TravelPlan,
    pub result: TravelResult,
    #[serde(default)]
    pub completed_days: BTreeSet<u32>,
    pub destination: Destination,
}

impl TravelState {
    pub fn new(plan: TravelPlan, result: TravelResult) -> Self {
        let destination = Destination::from_plan(&plan);
        Self {
            plan,
            result,
            completed_days: BTreeSet::new(),
            destination,
        }
    }

    /// The event for a day (the first one, if the model doubled up).
    pub fn event(&self, day: u32) -> Option<&TravelEvent> {
        self.result.events.iter().find(|e| e.day == day)
    }

    pub fn is_resolved(&self, day: u32) -> bool {
        self.completed_days.contains(&day)
    }

    /// Mark a day resolved. Idempotent.
    pub fn resolve(&mut self, day: u32) {
        self.completed_days.insert(day);
    }

    /// Days with an event that has not been resolved yet.
    pub fn pending_days(&self) -> Vec<u32> {
        let mut days: Vec<u32> = self
            .result
            .events
            .iter()
            .map(|e| e.day)
            .filter(|d| !self.completed_days.contains(d))
            .collect();
        days.dedup();
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TravelState {
        let plan = TravelPlan::new(
            DestinationChoice::Lore {
                region_id: "north".to_string(),
                name: "Frostgate".to_string(),
            },
            TravelMethod::Horse,
            Pace::Fast,
            2,
        );
        let result = TravelResult {
            title: "North".to_string(),
            summary: String::new(),
            events: vec![
                TravelEvent {
                    day: 1,
                    kind: TravelEventKind::Weather,
                    title: "Snow".to_string(),
                    description: String::new(),
                    suggested_location: None,
                    threats: vec![],
                    loot: vec![],
                },
                TravelEvent {
                    day: 2,
                    kind: TravelEventKind::Social,
                    title: "Pilgrims".to_string(),
                    description: String::new(),
                    suggested_location: None,
                    threats: vec![],
                    loot: vec![],
                },
            ],
        };
        TravelState::new(plan, result)
    }

    #[test]
    fn test_days_clamped_to_one() {
        let plan = TravelPlan::new(DestinationChoice::Breach, TravelMethod::Ship, Pace::Slow, 0);
        assert_eq!(plan.days, 1);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut state = state();
        state.resolve(1);
        let once = state.completed_days.clone();
        state.resolve(1);
        assert_eq!(state.completed_days, once);
        assert_eq!(state.pending_days(), [2]);
    }

    #[test]
    fn test_destination_from_plan() {
        let state = state();
        assert_eq!(state.destination.name, "Frostgate");
        assert_eq!(state.destination.region_id.as_deref(), Some("north"));
        assert_eq!(state.destination.mode, DestinationMode::Lore);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(state()).unwrap();
        assert_eq!(json["plan"]["destination"]["mode"], "lore");
        assert_eq!(json["plan"]["destination"]["regionId"], "north");
        assert_eq!(json["result"]["events"][0]["type"], "weather");
        assert_eq!(json["completedDays"], serde_json::json!([]));
    }

    #[test]
    fn test_word_enums_parse() {
        assert_eq!("Foot".parse::<TravelMethod>(), Ok(TravelMethod::Foot));
        assert_eq!(" fast ".parse::<Pace>(), Ok(Pace::Fast));
        assert_eq!("COMBAT".parse::<TravelEventKind>(), Ok(TravelEventKind::Combat));
        assert!("rocket".parse::<TravelMethod>().is_err());
    }
}
