//! Testing utilities for campaigns.
//!
//! This module provides tools for integration testing:
//! - `ScriptedModel`, `StubImages` and `StubBestiary` for deterministic
//!   runs without network calls
//! - `TestHarness` for a campaign in a throwaway directory
//! - Assertion helpers for verifying campaign state

use crate::bestiary::{BestiaryError, MonsterReference, MonsterStats, MonsterSummary};
use crate::campaign::{Campaign, CampaignError, CampaignServices};
use crate::events::{Signal, SignalReceiver};
use crate::travel::TravelPhase;
use ai_gateway::{
    AspectRatio, ChatRequest, Error, GeneratedImage, ImageModel, RetryPolicy, TextModel,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A text model that answers from a queue of scripted replies.
///
/// Every request is recorded. An empty queue answers with a network error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, Error>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        self.push(Err(error));
    }

    fn push(&self, reply: Result<String, Error>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().ok()?.last().cloned()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replies still queued.
    pub fn pending(&self) -> usize {
        self.replies.lock().map_or(0, |r| r.len())
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete_text(&self, request: ChatRequest) -> Result<String, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Err(Error::Network("no scripted response".to_string())))
    }
}

/// One transparent pixel, base64-encoded PNG.
pub const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// An image model that always returns the same picture.
#[derive(Default)]
pub struct StubImages {
    prompts: Mutex<Vec<String>>,
}

impl StubImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageModel for StubImages {
    async fn generate_image(
        &self,
        prompt: &str,
        _aspect: AspectRatio,
    ) -> Result<GeneratedImage, Error> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(GeneratedImage {
            base64: PIXEL_PNG_BASE64.to_string(),
            revised_prompt: None,
        })
    }
}

/// A monster reference backed by a fixed table.
///
/// Unknown names return `Ok(None)`, like the real API's 404.
#[derive(Default)]
pub struct StubBestiary {
    monsters: HashMap<String, MonsterStats>,
    offline: bool,
    lookups: Mutex<Vec<String>>,
}

impl StubBestiary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monster(mut self, stats: MonsterStats) -> Self {
        self.monsters.insert(stats.name.to_lowercase(), stats);
        self
    }

    /// Every lookup fails as if the service were unreachable.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MonsterReference for StubBestiary {
    async fn lookup(&self, name: &str) -> Result<Option<MonsterStats>, BestiaryError> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(name.to_string());
        }
        if self.offline {
            return Err(BestiaryError::Network("bestiary offline".to_string()));
        }
        Ok(self.monsters.get(&name.trim().to_lowercase()).cloned())
    }

    async fn by_challenge(
        &self,
        challenge_rating: f32,
    ) -> Result<Vec<MonsterSummary>, BestiaryError> {
        if self.offline {
            return Err(BestiaryError::Network("bestiary offline".to_string()));
        }
        let mut found: Vec<MonsterSummary> = self
            .monsters
            .iter()
            .filter(|(_, m)| m.challenge_rating == challenge_rating)
            .map(|(index, m)| MonsterSummary {
                index: index.clone(),
                name: m.name.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.index.cmp(&b.index));
        Ok(found)
    }
}

/// A campaign in a temporary directory with scripted services.
pub struct TestHarness {
    pub campaign: Campaign,
    pub model: Arc<ScriptedModel>,
    pub images: Arc<StubImages>,
    pub bestiary: Arc<StubBestiary>,
    /// Everything the campaign emitted since the harness was built.
    pub signals: SignalReceiver,
    dir: TempDir,
}

impl TestHarness {
    /// A fresh campaign that never retries AI calls.
    pub async fn new() -> Result<Self, CampaignError> {
        Self::build(StubBestiary::new(), RetryPolicy::none()).await
    }

    pub async fn with_bestiary(bestiary: StubBestiary) -> Result<Self, CampaignError> {
        Self::build(bestiary, RetryPolicy::none()).await
    }

    pub async fn with_retry(policy: RetryPolicy) -> Result<Self, CampaignError> {
        Self::build(StubBestiary::new(), policy).await
    }

    async fn build(bestiary: StubBestiary, retry: RetryPolicy) -> Result<Self, CampaignError> {
        let dir = TempDir::new().map_err(crate::store::PersistError::from)?;
        let model = Arc::new(ScriptedModel::new());
        let images = Arc::new(StubImages::new());
        let bestiary = Arc::new(bestiary);
        let services = Self::services(&model, &images, &bestiary, retry);
        let campaign = Campaign::open(dir.path(), services).await?;
        let signals = campaign.subscribe();
        Ok(Self {
            campaign,
            model,
            images,
            bestiary,
            signals,
            dir,
        })
    }

    fn services(
        model: &Arc<ScriptedModel>,
        images: &Arc<StubImages>,
        bestiary: &Arc<StubBestiary>,
        retry: RetryPolicy,
    ) -> CampaignServices {
        CampaignServices::new(model.clone(), bestiary.clone())
            .with_images(images.clone())
            .with_retry(retry)
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Drop the campaign and open it again from disk, as after a restart.
    pub async fn reopen(&mut self) -> Result<(), CampaignError> {
        let retry = self.campaign.generator().config().retry;
        let services = Self::services(&self.model, &self.images, &self.bestiary, retry);
        self.campaign = Campaign::open(self.dir.path(), services).await?;
        self.signals = self.campaign.subscribe();
        Ok(())
    }

    /// Drain the signals emitted so far.
    pub fn take_signals(&mut self) -> Vec<Signal> {
        self.signals.drain()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

#[track_caller]
pub fn assert_phase(harness: &TestHarness, expected: &TravelPhase) {
    let actual = harness.campaign.travel_phase();
    assert_eq!(actual, expected, "Expected travel phase {expected:?}, got {actual:?}");
}

#[track_caller]
pub fn assert_no_journey(harness: &TestHarness) {
    assert!(
        harness.campaign.travel_state().is_none(),
        "Expected no journey in progress"
    );
    assert_eq!(harness.campaign.travel_phase(), &TravelPhase::Plan);
}

#[track_caller]
pub fn assert_completed_days(harness: &TestHarness, expected: &[u32]) {
    let state = harness
        .campaign
        .travel_state()
        .unwrap_or_else(|| panic!("Expected a journey with days {expected:?} completed"));
    let actual: Vec<u32> = state.completed_days.iter().copied().collect();
    assert_eq!(actual, expected, "Completed days differ");
}

#[track_caller]
pub fn assert_combatant(harness: &TestHarness, name: &str, hp: i32, ac: i32) {
    let combatant = harness
        .campaign
        .combat()
        .combatants()
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("Expected combatant '{name}' in the tracker"));
    assert_eq!(
        (combatant.hp, combatant.ac),
        (hp, ac),
        "Combatant '{name}' has wrong stats"
    );
}

/// Assert a signal with the given wire name is among `signals`.
#[track_caller]
pub fn assert_signal(signals: &[Signal], name: &str) {
    assert!(
        signals.iter().any(|s| s.name() == name),
        "Expected a '{name}' signal, got {:?}",
        signals.iter().map(Signal::name).collect::<Vec<_>>()
    );
}

#[track_caller]
pub fn assert_no_signal(signals: &[Signal], name: &str) {
    assert!(
        !signals.iter().any(|s| s.name() == name),
        "Did not expect a '{name}' signal"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_model_answers_in_order() {
        let model = ScriptedModel::new();
        model.push_text("one");
        model.push_error(Error::Api {
            status: 500,
            message: "boom".to_string(),
        });

        let request = || ChatRequest::new(vec![ai_gateway::Message::user("hi")]);
        assert_eq!(model.complete_text(request()).await.unwrap(), "one");
        assert!(model.complete_text(request()).await.is_err());
        assert!(matches!(
            model.complete_text(request()).await,
            Err(Error::Network(_))
        ));
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn test_stub_bestiary_lookup() {
        let bestiary = StubBestiary::new().with_monster(MonsterStats::fallback("Goblin"));
        assert!(bestiary.lookup("goblin").await.unwrap().is_some());
        assert!(bestiary.lookup("Dragon").await.unwrap().is_none());
        assert_eq!(bestiary.lookups(), ["goblin", "Dragon"]);
        assert!(StubBestiary::offline().lookup("goblin").await.is_err());
    }

    #[tokio::test]
    async fn test_harness_reopens() {
        let mut harness = TestHarness::new().await.unwrap();
        harness.campaign.add_note("Session 1", "The party met").await.unwrap();
        harness.reopen().await.unwrap();
        assert_eq!(harness.campaign.notes().all().len(), 1);
    }
}
