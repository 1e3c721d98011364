//! The travel state machine.
//!
//! ```text
//! Plan -> Loading(Itinerary) -> Journey -> Loading(Arrival) -> Plan
//!                \                  |  \            |
//!                 `-> Error <-------'   `-- actions  `-> Error
//! ```
//!
//! Every method that talks to the model takes `&mut self` for the whole
//! request, so a second request cannot start while one is in flight.

use super::{DestinationChoice, DestinationMode, TravelEventKind, TravelPlan, TravelState};
use crate::bestiary::{MonsterReference, MonsterStats};
use crate::combat::{Combatant, StatSource};
use crate::events::{EventBus, Signal, Tab, Toast};
use crate::generate::{GenerationError, Generator, LocationBrief};
use crate::ids::RecordId;
use crate::location::{LocationData, Lore};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TravelError {
    #[error("No journey in progress")]
    NoJourney,

    #[error("A journey is already in progress")]
    JourneyInProgress,

    #[error("No event on day {0}")]
    UnknownDay(u32),

    #[error("Cannot {action} on day {day}")]
    ActionUnavailable { day: u32, action: &'static str },

    #[error("Nothing to retry")]
    NothingToRetry,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// The request a loading or failed phase belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadingTask {
    Itinerary(TravelPlan),
    Arrival,
}

/// A blocking failure shown on the travel screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelFailure {
    pub message: String,
    /// The provider rejected the credential.
    pub unauthorized: bool,
    /// What [`TravelOrchestrator::retry`] will replay.
    pub task: LoadingTask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TravelPhase {
    Plan,
    Loading(LoadingTask),
    Journey,
    Error(TravelFailure),
}

/// Result of [`TravelOrchestrator::retry`].
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Planned,
    Arrived(LocationData),
}

/// Drives a journey from planning to arrival.
pub struct TravelOrchestrator {
    phase: TravelPhase,
    state: Option<TravelState>,
    generator: Generator,
    bestiary: Arc<dyn MonsterReference>,
    bus: EventBus,
}

impl TravelOrchestrator {
    pub fn new(generator: Generator, bestiary: Arc<dyn MonsterReference>, bus: EventBus) -> Self {
        Self {
            phase: TravelPhase::Plan,
            state: None,
            generator,
            bestiary,
            bus,
        }
    }

    /// Continue a journey restored from storage.
    pub fn resume(&mut self, state: TravelState) {
        self.state = Some(state);
        self.phase = TravelPhase::Journey;
    }

    pub fn phase(&self) -> &TravelPhase {
        &self.phase
    }

    pub fn state(&self) -> Option<&TravelState> {
        self.state.as_ref()
    }

    pub fn set_generator(&mut self, generator: Generator) {
        self.generator = generator;
    }

    fn journey(&self) -> Result<&TravelState, TravelError> {
        self.state.as_ref().ok_or(TravelError::NoJourney)
    }

    fn resolve(&mut self, day: u32) {
        if let Some(state) = self.state.as_mut() {
            state.resolve(day);
            tracing::debug!(day, "travel day resolved");
        }
    }

    /// Move to the error phase. A rejected credential also asks the front
    /// end to open the settings panel.
    fn fail(&mut self, task: LoadingTask, error: &GenerationError) {
        let unauthorized = error.is_unauthorized();
        tracing::error!(error = %error, ?task, "travel generation failed");
        if unauthorized {
            self.bus.emit(Signal::OpenSettings);
        }
        self.phase = TravelPhase::Error(TravelFailure {
            message: error.to_string(),
            unauthorized,
            task,
        });
    }

    /// Generate an itinerary and start the journey.
    pub async fn plan(&mut self, plan: TravelPlan) -> Result<&TravelState, TravelError> {
        if self.state.is_some() {
            return Err(TravelError::JourneyInProgress);
        }
        let plan = TravelPlan::new(plan.destination, plan.method, plan.pace, plan.days);
        let task = LoadingTask::Itinerary(plan.clone());
        self.phase = TravelPhase::Loading(task.clone());
        tracing::info!(destination = %plan.destination, days = plan.days, "planning journey");

        match self.generator.generate_itinerary(&plan).await {
            Ok(result) => {
                self.phase = TravelPhase::Journey;
                let state = self.state.insert(TravelState::new(plan, result));
                Ok(&*state)
            }
            Err(e) => {
                self.fail(task, &e);
                Err(e.into())
            }
        }
    }

    /// Bring the threats of a combat day into the initiative tracker.
    ///
    /// Stats come from the reference, then from the model, then from the
    /// fixed default statblock, decided per threat. Each combatant is sent
    /// as `add-combatant`, then the view switches to combat.
    pub async fn start_combat(&mut self, day: u32) -> Result<Vec<Combatant>, TravelError> {
        let event = self
            .journey()?
            .event(day)
            .ok_or(TravelError::UnknownDay(day))?;
        if event.kind != TravelEventKind::Combat {
            return Err(TravelError::ActionUnavailable {
                day,
                action: "start combat",
            });
        }
        let threats = event.threats.clone();

        let mut combatants = Vec::with_capacity(threats.len());
        for name in &threats {
            let (stats, source) = self.monster_stats(name).await;
            combatants.push(stats.into_combatant(source));
        }

        for combatant in &combatants {
            self.bus.emit(Signal::AddCombatant(combatant.clone()));
        }
        self.bus.emit(Signal::SwitchTab(Tab::Combat));
        self.resolve(day);
        Ok(combatants)
    }

    async fn monster_stats(&self, name: &str) -> (MonsterStats, StatSource) {
        match self.bestiary.lookup(name).await {
            Ok(Some(mut stats)) => {
                stats.name = name.to_string();
                return (stats, StatSource::Reference);
            }
            Ok(None) => tracing::debug!(monster = name, "not in the reference"),
            Err(e) => tracing::warn!(monster = name, error = %e, "monster reference failed"),
        }

        match self.generator.generate_monster_stats(name).await {
            Ok(mut stats) => {
                stats.name = name.to_string();
                (stats, StatSource::Generated)
            }
            Err(e) => {
                tracing::warn!(monster = name, error = %e, "using default statblock");
                (MonsterStats::fallback(name), StatSource::Default)
            }
        }
    }

    /// Note the loot of a day. Nothing is added to any inventory.
    pub fn take_loot(&mut self, day: u32) -> Result<Vec<String>, TravelError> {
        let event = self
            .journey()?
            .event(day)
            .ok_or(TravelError::UnknownDay(day))?;
        if event.loot.is_empty() {
            return Err(TravelError::ActionUnavailable {
                day,
                action: "take loot",
            });
        }
        let loot = event.loot.clone();

        self.bus.emit(Signal::Toast(Toast::success(format!(
            "Found: {}",
            loot.join(", ")
        ))));
        self.resolve(day);
        Ok(loot)
    }

    /// Generate the place a day's event points at. The caller makes it the
    /// active location.
    pub async fn explore(&mut self, day: u32) -> Result<LocationData, TravelError> {
        let state = self.journey()?;
        let event = state.event(day).ok_or(TravelError::UnknownDay(day))?;

        let name = event
            .suggested_location
            .clone()
            .unwrap_or_else(|| event.title.clone());
        let narrative = if event.description.trim().is_empty() {
            event.title.clone()
        } else {
            event.description.clone()
        };
        let brief = LocationBrief {
            name: Some(name),
            kind: None,
            region: state.destination.region_id.clone(),
            context: Some(narrative.clone()),
        };

        let mut location = match self.generator.generate_location(&brief).await {
            Ok(location) => location,
            Err(e) => {
                if e.is_unauthorized() {
                    self.bus.emit(Signal::OpenSettings);
                }
                self.bus
                    .emit(Signal::Toast(Toast::error(format!("Exploration failed: {e}"))));
                return Err(e.into());
            }
        };
        location.id = RecordId::new();
        location.prefix_description(&narrative);

        self.resolve(day);
        Ok(location)
    }

    /// Resolve a day without doing anything.
    pub fn skip(&mut self, day: u32) -> Result<(), TravelError> {
        self.journey()?
            .event(day)
            .ok_or(TravelError::UnknownDay(day))?;
        self.resolve(day);
        Ok(())
    }

    /// End the journey at its destination. Unresolved days do not matter.
    ///
    /// A destination found in the lore is used as is; anything else is
    /// generated. On success the travel state is gone and the phase is back
    /// to planning.
    pub async fn arrive(&mut self, lore: &Lore) -> Result<LocationData, TravelError> {
        let state = self.journey()?.clone();
        self.phase = TravelPhase::Loading(LoadingTask::Arrival);

        let destination = &state.destination;
        let known = lore
            .find(&destination.name, destination.region_id.as_deref())
            .map(|(region, entry)| entry.to_location(region));

        let mut location = match known {
            Some(location) => location,
            None => {
                let brief = match &state.plan.destination {
                    DestinationChoice::Generic { kind } => LocationBrief::of_kind(kind.clone()),
                    DestinationChoice::Breach => LocationBrief::default(),
                    _ => LocationBrief::named(destination.name.clone()),
                }
                .with_context(state.result.summary.clone());
                let brief = LocationBrief {
                    region: destination.region_id.clone(),
                    ..brief
                };

                let generated = if destination.mode == DestinationMode::Breach {
                    self.generator.generate_breach(&brief).await
                } else {
                    self.generator.generate_location(&brief).await
                };
                match generated {
                    Ok(location) => location,
                    Err(e) => {
                        self.fail(LoadingTask::Arrival, &e);
                        return Err(e.into());
                    }
                }
            }
        };

        location.id = RecordId::new();
        location.prefix_description(&arrival_line(&state, &location.name));

        tracing::info!(destination = %location.name, "journey complete");
        self.state = None;
        self.phase = TravelPhase::Plan;
        Ok(location)
    }

    /// Throw the journey away. Returns whether there was one.
    pub fn abort(&mut self) -> bool {
        let had_journey = self.state.take().is_some();
        self.phase = TravelPhase::Plan;
        if had_journey {
            tracing::info!("journey aborted");
        }
        had_journey
    }

    /// Replay the request that put the orchestrator in the error phase.
    pub async fn retry(&mut self, lore: &Lore) -> Result<RetryOutcome, TravelError> {
        let TravelPhase::Error(failure) = &self.phase else {
            return Err(TravelError::NothingToRetry);
        };
        match failure.task.clone() {
            LoadingTask::Itinerary(plan) => {
                self.phase = TravelPhase::Plan;
                self.plan(plan).await?;
                Ok(RetryOutcome::Planned)
            }
            LoadingTask::Arrival => self.arrive(lore).await.map(RetryOutcome::Arrived),
        }
    }

    /// Leave the error phase without retrying.
    pub fn dismiss_error(&mut self) {
        if matches!(self.phase, TravelPhase::Error(_)) {
            self.phase = if self.state.is_some() {
                TravelPhase::Journey
            } else {
                TravelPhase::Plan
            };
        }
    }
}

fn arrival_line(state: &TravelState, name: &str) -> String {
    let days = state.plan.days;
    let plural = if days == 1 { "" } else { "s" };
    format!(
        "After {days} day{plural} of travel by {}, the party arrives at {name}.",
        state.plan.method
    )
}
