//! Integration tests that call a real provider and the public bestiary.
//!
//! These tests require AI_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p campaign-core --test api_integration -- --ignored`

use campaign_core::bestiary::{Dnd5eApi, MonsterReference};
use campaign_core::headless::{open_campaign, HeadlessConfig};
use campaign_core::travel::{DestinationChoice, Pace, TravelMethod, TravelPlan};
use campaign_core::TravelPhase;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("AI_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p campaign-core --test api_integration -- --ignored
async fn test_real_journey() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: AI_API_KEY not set");
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut campaign = open_campaign(HeadlessConfig::new(dir.path()))
        .await
        .expect("campaign should open");

    let plan = TravelPlan::new(
        DestinationChoice::Generic {
            kind: "mountain monastery".to_string(),
        },
        TravelMethod::Horse,
        Pace::Normal,
        2,
    );
    let journey = campaign.plan_journey(plan).await.expect("itinerary");
    assert!(!journey.result.events.is_empty());
    assert!(journey.result.events.iter().all(|e| (1..=2).contains(&e.day)));

    let location = campaign.arrive().await.expect("arrival");
    assert!(location.description.starts_with("After 2 days of travel by horse"));
    assert_eq!(campaign.travel_phase(), &TravelPhase::Plan);
}

#[tokio::test]
#[ignore]
async fn test_reference_goblin() {
    let api = Dnd5eApi::new();
    let goblin = api
        .lookup("Goblin")
        .await
        .expect("reference should answer")
        .expect("goblin should exist");
    assert_eq!(goblin.ac, 15);
    assert!(goblin.hp > 0);

    assert!(api.lookup("Definitely Not A Monster").await.unwrap().is_none());
}
