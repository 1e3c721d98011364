//! Campaign companion for tabletop game masters.
//!
//! This crate provides:
//! - Campaign state (party, stash, NPCs, quests, notes, lore, maps,
//!   soundboard, combat) persisted as JSON documents
//! - A signal bus that lets one panel ask another to act
//! - AI generators for itineraries, locations, NPCs, monsters and loot
//! - The travel orchestrator that turns a plan into a day-by-day journey
//!
//! # Quick Start
//!
//! ```ignore
//! use campaign_core::headless::{open_campaign, HeadlessConfig};
//! use campaign_core::travel::{DestinationChoice, Pace, TravelMethod, TravelPlan};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut campaign = open_campaign(HeadlessConfig::new("./campaign")).await?;
//!
//!     let plan = TravelPlan::new(
//!         DestinationChoice::Custom { name: "The Sunken Abbey".to_string() },
//!         TravelMethod::Horse,
//!         Pace::Normal,
//!         3,
//!     );
//!     let journey = campaign.plan_journey(plan).await?;
//!     for event in &journey.result.events {
//!         println!("Day {}: {}", event.day, event.title);
//!     }
//!
//!     let location = campaign.arrive().await?;
//!     println!("{}", location.description);
//!     Ok(())
//! }
//! ```

pub mod bestiary;
pub mod campaign;
pub mod combat;
pub mod events;
pub mod generate;
pub mod headless;
pub mod ids;
pub mod journal;
pub mod location;
pub mod npc;
pub mod party;
pub mod quest;
pub mod settings;
pub mod soundboard;
pub mod store;
pub mod testing;
pub mod travel;

// Primary public API
pub use campaign::{Campaign, CampaignError, CampaignServices};
pub use events::{EventBus, Signal, SignalReceiver};
pub use generate::{GenerationError, Generator, GeneratorConfig};
pub use ids::RecordId;
pub use settings::Settings;
pub use store::{Collection, PersistError};
pub use testing::{ScriptedModel, StubBestiary, TestHarness};
pub use travel::{TravelOrchestrator, TravelPhase, TravelPlan, TravelState};
