//! The campaign: one owned state object over the store, the signal bus and
//! the AI services.
//!
//! Every mutation goes through `&mut self`, writes the affected collection
//! back to disk and announces it with [`Signal::Updated`]. Signals other
//! panels emit (`add-npc`, `give-item`, ...) are applied by
//! [`Campaign::process_signals`].

use crate::bestiary::MonsterReference;
use crate::combat::{Combatant, CombatTracker};
use crate::events::{
    EventBus, GeneratedImageRef, GiveItem, Signal, SignalReceiver, StashDeposit, Tab, Toast,
    XpAward,
};
use crate::generate::{GenerationError, Generator, LootBrief, NpcBrief};
use crate::ids::RecordId;
use crate::journal::{CampaignLog, LogEntry, LogKind, Note, Notebook};
use crate::location::{LocationData, Lore, LoreRegion, MapData, MapError};
use crate::npc::{Attitude, CampaignNpc, NpcRoster, NpcStatus};
use crate::party::{
    Holder, InventoryItem, Party, PartyMember, Stash, TransferError, Wallet, WalletError,
};
use crate::quest::{FullQuest, QuestLog, QuestStatus};
use crate::settings::{Settings, SettingsOverrides};
use crate::soundboard::{Mood, Soundboard, Track};
use crate::store::{Bucket, CampaignStore, Collection, PersistError, RawDocument};
use crate::travel::{
    RetryOutcome, TravelError, TravelOrchestrator, TravelPhase, TravelPlan, TravelState,
};
use ai_gateway::{AspectRatio, ImageModel, RetryPolicy, TextModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Travel(#[from] TravelError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Gateway(#[from] ai_gateway::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("No image model configured")]
    NoImageModel,
}

/// External services a campaign talks to.
#[derive(Clone)]
pub struct CampaignServices {
    pub text: Arc<dyn TextModel>,
    pub images: Option<Arc<dyn ImageModel>>,
    pub bestiary: Arc<dyn MonsterReference>,
    pub retry: RetryPolicy,
}

impl CampaignServices {
    pub fn new(text: Arc<dyn TextModel>, bestiary: Arc<dyn MonsterReference>) -> Self {
        Self {
            text,
            images: None,
            bestiary,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageModel>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

pub struct Campaign {
    store: CampaignStore,
    bus: EventBus,
    inbox: SignalReceiver,
    services: CampaignServices,
    generator: Generator,
    travel: TravelOrchestrator,
    corrupt: BTreeSet<Collection>,
    overrides: SettingsOverrides,

    settings: Settings,
    party: Party,
    stash: Stash,
    npcs: NpcRoster,
    quests: QuestLog,
    notes: Notebook,
    log: CampaignLog,
    lore: Lore,
    soundboard: Soundboard,
    combat: CombatTracker,
    active_location: Option<LocationData>,
}

/// Load a collection, falling back to its default when missing or corrupt.
async fn load_or_default<T: DeserializeOwned + Default>(
    store: &CampaignStore,
    key: Collection,
    corrupt: &mut BTreeSet<Collection>,
) -> Result<T, PersistError> {
    match store.load::<T>(key).await {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(PersistError::Corrupt { key, message }) => {
            tracing::warn!(%key, %message, "stored document is corrupt, using defaults");
            corrupt.insert(key);
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

impl Campaign {
    /// Open the campaign stored in `dir`, creating it if needed.
    ///
    /// Corrupt documents do not fail the open: the collection starts empty,
    /// the key is listed in [`Campaign::corrupt_keys`], and the file is
    /// left untouched until that collection is next changed.
    pub async fn open(
        dir: impl AsRef<Path>,
        services: CampaignServices,
    ) -> Result<Self, CampaignError> {
        let store = CampaignStore::open(dir).await?;
        let mut corrupt = BTreeSet::new();

        let settings: Settings = load_or_default(&store, Collection::Settings, &mut corrupt).await?;
        let party = load_or_default(&store, Collection::Party, &mut corrupt).await?;
        let stash = load_or_default(&store, Collection::Stash, &mut corrupt).await?;
        let npcs = load_or_default(&store, Collection::Npcs, &mut corrupt).await?;
        let quests = load_or_default(&store, Collection::Quests, &mut corrupt).await?;
        let notes = load_or_default(&store, Collection::Notes, &mut corrupt).await?;
        let log = load_or_default(&store, Collection::Logs, &mut corrupt).await?;
        let lore = load_or_default(&store, Collection::Lore, &mut corrupt).await?;
        let soundboard = load_or_default(&store, Collection::Playlists, &mut corrupt).await?;
        let combat = load_or_default(&store, Collection::Combat, &mut corrupt).await?;
        let active_location: Option<LocationData> =
            load_or_default(&store, Collection::ActiveLocation, &mut corrupt).await?;
        let travel_state: Option<TravelState> =
            load_or_default(&store, Collection::TravelState, &mut corrupt).await?;

        let bus = EventBus::default();
        let inbox = bus.subscribe();
        let generator = Generator::new(
            Arc::clone(&services.text),
            generator_config(&settings, services.retry),
        );
        let mut travel =
            TravelOrchestrator::new(generator.clone(), Arc::clone(&services.bestiary), bus.clone());
        if let Some(state) = travel_state {
            tracing::info!(destination = %state.destination.name, "resuming journey");
            travel.resume(state);
        }

        tracing::info!(dir = %store.dir().display(), corrupt = corrupt.len(), "campaign opened");

        Ok(Self {
            store,
            bus,
            inbox,
            services,
            generator,
            travel,
            corrupt,
            overrides: SettingsOverrides::default(),
            settings,
            party,
            stash,
            npcs,
            quests,
            notes,
            log,
            lore,
            soundboard,
            combat,
            active_location,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> SignalReceiver {
        self.bus.subscribe()
    }

    pub fn store(&self) -> &CampaignStore {
        &self.store
    }

    /// Collections whose stored document failed to parse at open.
    pub fn corrupt_keys(&self) -> Vec<Collection> {
        self.corrupt.iter().copied().collect()
    }

    /// Settings as stored in `settings.json`.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stored settings with this session's overrides applied.
    pub fn effective_settings(&self) -> Settings {
        self.overrides.apply(self.settings.clone())
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    pub fn npcs(&self) -> &NpcRoster {
        &self.npcs
    }

    pub fn quests(&self) -> &QuestLog {
        &self.quests
    }

    pub fn notes(&self) -> &Notebook {
        &self.notes
    }

    pub fn log(&self) -> &CampaignLog {
        &self.log
    }

    pub fn lore(&self) -> &Lore {
        &self.lore
    }

    pub fn soundboard(&self) -> &Soundboard {
        &self.soundboard
    }

    pub fn combat(&self) -> &CombatTracker {
        &self.combat
    }

    pub fn active_location(&self) -> Option<&LocationData> {
        self.active_location.as_ref()
    }

    pub fn travel_phase(&self) -> &TravelPhase {
        self.travel.phase()
    }

    pub fn travel_state(&self) -> Option<&TravelState> {
        self.travel.state()
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    async fn write<T: Serialize>(
        &mut self,
        key: Collection,
        value: &T,
    ) -> Result<(), PersistError> {
        self.store.save(key, value).await?;
        if self.corrupt.remove(&key) {
            tracing::info!(%key, "corrupt document replaced");
        }
        self.bus.emit(Signal::Updated(key));
        Ok(())
    }

    async fn write_optional<T: Serialize>(
        &mut self,
        key: Collection,
        value: Option<&T>,
    ) -> Result<(), PersistError> {
        match value {
            Some(value) => self.write(key, value).await,
            None => {
                self.store.remove(key).await?;
                self.corrupt.remove(&key);
                self.bus.emit(Signal::Updated(key));
                Ok(())
            }
        }
    }

    /// Write one collection from memory to disk.
    pub async fn persist(&mut self, key: Collection) -> Result<(), PersistError> {
        match key {
            Collection::Party => self.write(key, &self.party.clone()).await,
            Collection::Stash => self.write(key, &self.stash.clone()).await,
            Collection::Npcs => self.write(key, &self.npcs.clone()).await,
            Collection::Quests => self.write(key, &self.quests.clone()).await,
            Collection::Notes => self.write(key, &self.notes.clone()).await,
            Collection::Logs => self.write(key, &self.log.clone()).await,
            Collection::Lore => self.write(key, &self.lore.clone()).await,
            Collection::Playlists => self.write(key, &self.soundboard.clone()).await,
            Collection::Combat => self.write(key, &self.combat.clone()).await,
            Collection::Settings => self.write(key, &self.settings.clone()).await,
            Collection::ActiveLocation => {
                let location = self.active_location.clone();
                self.write_optional(key, location.as_ref()).await
            }
            Collection::TravelState => {
                let state = self.travel.state().cloned();
                self.write_optional(key, state.as_ref()).await
            }
        }
    }

    async fn record(&mut self, kind: LogKind, text: impl Into<String>) -> Result<(), PersistError> {
        self.log.record(kind, text);
        self.persist(Collection::Logs).await
    }

    async fn push_log(&mut self, entry: LogEntry) -> Result<(), PersistError> {
        self.log.push(entry);
        self.persist(Collection::Logs).await
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    /// Put a signal on the bus. Apply it with [`Campaign::process_signals`].
    pub fn emit(&self, signal: Signal) -> usize {
        self.bus.emit(signal)
    }

    /// Apply every queued signal that changes campaign state. View-only
    /// signals (tab switches, toasts, refresh notices) are ignored here.
    ///
    /// Returns how many signals changed state.
    pub async fn process_signals(&mut self) -> Result<usize, CampaignError> {
        let signals = self.inbox.drain();
        let mut applied = 0;
        for signal in signals {
            if self.apply(signal).await? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    async fn apply(&mut self, signal: Signal) -> Result<bool, CampaignError> {
        match signal {
            Signal::AddNpc(npc) => self.upsert_npc(npc).await?,
            Signal::AddQuest(quest) => self.add_quest(quest).await?,
            Signal::AddToStash(StashDeposit { items, coins }) => {
                self.deposit_to_stash(items, coins).await?
            }
            Signal::GiveItem(GiveItem {
                from,
                to,
                item,
                quantity,
            }) => {
                if let Err(e) = self.give_item(from, to, &item, quantity).await {
                    tracing::warn!(error = %e, "give-item rejected");
                    self.bus.emit(Signal::Toast(Toast::warning(e.to_string())));
                    return Ok(false);
                }
            }
            Signal::AddXp(XpAward { amount, targets }) => {
                self.award_xp(amount, &targets).await?;
            }
            Signal::AddCombatant(combatant) => self.add_combatant(combatant).await?,
            Signal::ImageGenerated(_)
            | Signal::SwitchTab(_)
            | Signal::OpenSettings
            | Signal::Toast(_)
            | Signal::Updated(_) => return Ok(false),
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Party and stash
    // ------------------------------------------------------------------

    /// Add a member, or replace the one with the same id.
    pub async fn upsert_member(&mut self, member: PartyMember) -> Result<(), CampaignError> {
        self.party.upsert(member);
        self.persist(Collection::Party).await?;
        Ok(())
    }

    pub async fn remove_member(&mut self, id: RecordId) -> Result<PartyMember, CampaignError> {
        let member = self
            .party
            .remove(id)
            .ok_or_else(|| CampaignError::NotFound(format!("party member {id}")))?;
        self.persist(Collection::Party).await?;
        Ok(member)
    }

    /// XP for the listed members, or everyone when `targets` is empty.
    pub async fn award_xp(
        &mut self,
        amount: u32,
        targets: &[RecordId],
    ) -> Result<usize, CampaignError> {
        let awarded = self.party.award_xp(amount, targets);
        if awarded > 0 {
            self.persist(Collection::Party).await?;
            self.record(LogKind::Party, format!("{awarded} member(s) gained {amount} XP"))
                .await?;
        }
        Ok(awarded)
    }

    pub async fn give_item(
        &mut self,
        from: Holder,
        to: Holder,
        name: &str,
        quantity: u32,
    ) -> Result<InventoryItem, CampaignError> {
        let item = self.party.transfer(&mut self.stash, from, to, name, quantity)?;
        if from == Holder::Stash || to == Holder::Stash {
            self.persist(Collection::Stash).await?;
        }
        self.persist(Collection::Party).await?;
        Ok(item)
    }

    pub async fn deposit_to_stash(
        &mut self,
        items: Vec<InventoryItem>,
        coins: Wallet,
    ) -> Result<(), CampaignError> {
        for item in items {
            self.stash.add_item(item);
        }
        self.stash.wallet.deposit(coins);
        self.persist(Collection::Stash).await?;
        Ok(())
    }

    /// Generate loot and put it in the stash.
    pub async fn generate_loot(
        &mut self,
        brief: &LootBrief,
    ) -> Result<Vec<InventoryItem>, CampaignError> {
        let items = self.ai_call(self.generator.generate_loot(brief)).await?;
        self.deposit_to_stash(items.clone(), Wallet::default()).await?;
        Ok(items)
    }

    pub async fn withdraw_from_stash(&mut self, coins: Wallet) -> Result<(), CampaignError> {
        self.stash.wallet.withdraw(coins)?;
        self.persist(Collection::Stash).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // NPCs
    // ------------------------------------------------------------------

    pub async fn upsert_npc(&mut self, npc: CampaignNpc) -> Result<(), CampaignError> {
        self.npcs.upsert(npc);
        self.persist(Collection::Npcs).await?;
        Ok(())
    }

    pub async fn set_npc_status(
        &mut self,
        id: RecordId,
        status: NpcStatus,
    ) -> Result<(), CampaignError> {
        if !self.npcs.set_status(id, status) {
            return Err(CampaignError::NotFound(format!("NPC {id}")));
        }
        self.persist(Collection::Npcs).await?;
        Ok(())
    }

    pub async fn set_npc_attitude(
        &mut self,
        id: RecordId,
        attitude: Attitude,
    ) -> Result<(), CampaignError> {
        if !self.npcs.set_attitude(id, attitude) {
            return Err(CampaignError::NotFound(format!("NPC {id}")));
        }
        self.persist(Collection::Npcs).await?;
        Ok(())
    }

    pub async fn remove_npc(&mut self, id: RecordId) -> Result<CampaignNpc, CampaignError> {
        let npc = self
            .npcs
            .remove(id)
            .ok_or_else(|| CampaignError::NotFound(format!("NPC {id}")))?;
        self.persist(Collection::Npcs).await?;
        Ok(npc)
    }

    /// Generate an NPC and merge it into the roster.
    pub async fn generate_npc(&mut self, brief: &NpcBrief) -> Result<CampaignNpc, CampaignError> {
        let npc = self.ai_call(self.generator.generate_npc(brief)).await?;
        self.upsert_npc(npc.clone()).await?;
        Ok(npc)
    }

    // ------------------------------------------------------------------
    // Quests
    // ------------------------------------------------------------------

    pub async fn add_quest(&mut self, quest: FullQuest) -> Result<(), CampaignError> {
        let title = quest.title.clone();
        self.quests.add(quest);
        self.persist(Collection::Quests).await?;
        self.record(LogKind::Quest, format!("New quest: {title}")).await?;
        Ok(())
    }

    /// Change a quest's status; a real transition is written to the log.
    pub async fn set_quest_status(
        &mut self,
        id: RecordId,
        status: QuestStatus,
    ) -> Result<bool, CampaignError> {
        let quest = self
            .quests
            .get_mut(id)
            .ok_or_else(|| CampaignError::NotFound(format!("quest {id}")))?;
        let Some(entry) = quest.set_status(status) else {
            return Ok(false);
        };
        self.persist(Collection::Quests).await?;
        self.push_log(entry).await?;
        Ok(true)
    }

    pub async fn toggle_objective(
        &mut self,
        id: RecordId,
        index: usize,
    ) -> Result<bool, CampaignError> {
        let done = self
            .quests
            .get_mut(id)
            .and_then(|q| q.toggle_objective(index))
            .ok_or_else(|| CampaignError::NotFound(format!("objective {index} of quest {id}")))?;
        self.persist(Collection::Quests).await?;
        Ok(done)
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub async fn add_note(&mut self, title: &str, body: &str) -> Result<RecordId, CampaignError> {
        let id = self.notes.add(Note::new(title, body));
        self.persist(Collection::Notes).await?;
        Ok(id)
    }

    pub async fn edit_note(
        &mut self,
        id: RecordId,
        title: &str,
        body: &str,
    ) -> Result<(), CampaignError> {
        if !self.notes.edit(id, title, body) {
            return Err(CampaignError::NotFound(format!("note {id}")));
        }
        self.persist(Collection::Notes).await?;
        Ok(())
    }

    pub async fn remove_note(&mut self, id: RecordId) -> Result<Note, CampaignError> {
        let note = self
            .notes
            .remove(id)
            .ok_or_else(|| CampaignError::NotFound(format!("note {id}")))?;
        self.persist(Collection::Notes).await?;
        Ok(note)
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    pub async fn add_combatant(&mut self, combatant: Combatant) -> Result<(), CampaignError> {
        self.combat.add(combatant);
        self.persist(Collection::Combat).await?;
        Ok(())
    }

    pub async fn next_turn(&mut self) -> Result<Option<Combatant>, CampaignError> {
        let current = self.combat.next_turn().cloned();
        self.persist(Collection::Combat).await?;
        Ok(current)
    }

    pub async fn damage(&mut self, id: RecordId, amount: i32) -> Result<i32, CampaignError> {
        let hp = self
            .combat
            .damage(id, amount)
            .ok_or_else(|| CampaignError::NotFound(format!("combatant {id}")))?;
        self.persist(Collection::Combat).await?;
        Ok(hp)
    }

    pub async fn heal(&mut self, id: RecordId, amount: i32) -> Result<i32, CampaignError> {
        let hp = self
            .combat
            .heal(id, amount)
            .ok_or_else(|| CampaignError::NotFound(format!("combatant {id}")))?;
        self.persist(Collection::Combat).await?;
        Ok(hp)
    }

    pub async fn remove_combatant(&mut self, id: RecordId) -> Result<Combatant, CampaignError> {
        let combatant = self
            .combat
            .remove(id)
            .ok_or_else(|| CampaignError::NotFound(format!("combatant {id}")))?;
        self.persist(Collection::Combat).await?;
        Ok(combatant)
    }

    pub async fn end_combat(&mut self) -> Result<(), CampaignError> {
        let rounds = self.combat.round();
        self.combat.clear();
        self.persist(Collection::Combat).await?;
        self.record(LogKind::Combat, format!("Combat ended after {rounds} round(s)"))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Locations, lore and maps
    // ------------------------------------------------------------------

    pub async fn set_active_location(
        &mut self,
        location: LocationData,
    ) -> Result<(), CampaignError> {
        tracing::info!(location = %location.name, "active location changed");
        self.active_location = Some(location);
        self.persist(Collection::ActiveLocation).await?;
        Ok(())
    }

    pub async fn add_lore_region(&mut self, region: LoreRegion) -> Result<(), CampaignError> {
        self.lore.add_region(region);
        self.persist(Collection::Lore).await?;
        Ok(())
    }

    pub async fn save_map(&mut self, map: &MapData) -> Result<(), CampaignError> {
        self.store
            .objects()
            .put_json(Bucket::Maps, map.location_id, map)
            .await?;
        Ok(())
    }

    pub async fn load_map(&self, location_id: RecordId) -> Result<Option<MapData>, CampaignError> {
        Ok(self.store.objects().get_json(Bucket::Maps, location_id).await?)
    }

    // ------------------------------------------------------------------
    // Soundboard and gallery
    // ------------------------------------------------------------------

    pub async fn add_track(&mut self, mood: Mood, track: Track) -> Result<RecordId, CampaignError> {
        let id = self.soundboard.add_track(mood, track);
        self.persist(Collection::Playlists).await?;
        Ok(id)
    }

    /// Store an uploaded audio file and add it as a track.
    pub async fn upload_track(
        &mut self,
        mood: Mood,
        title: &str,
        audio: &[u8],
    ) -> Result<RecordId, CampaignError> {
        let object = RecordId::new();
        self.store.objects().put(Bucket::Audio, object, audio).await?;
        self.add_track(mood, Track::blob(title, object)).await
    }

    pub async fn remove_track(&mut self, id: RecordId) -> Result<(), CampaignError> {
        let removed = self
            .soundboard
            .remove_track(id)
            .ok_or_else(|| CampaignError::NotFound(format!("track {id}")))?;
        if let crate::soundboard::TrackSource::Blob(object) = removed.track.source {
            self.store.objects().delete(Bucket::Audio, object).await?;
        }
        self.persist(Collection::Playlists).await?;
        Ok(())
    }

    /// Save image bytes to the gallery and announce them.
    pub async fn store_image(
        &mut self,
        bytes: &[u8],
        prompt: &str,
    ) -> Result<RecordId, CampaignError> {
        let id = RecordId::new();
        self.store.objects().put(Bucket::Images, id, bytes).await?;
        self.bus.emit(Signal::ImageGenerated(GeneratedImageRef {
            id,
            prompt: prompt.to_string(),
        }));
        Ok(id)
    }

    pub async fn generate_image(
        &mut self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> Result<RecordId, CampaignError> {
        let images = self.services.images.clone().ok_or(CampaignError::NoImageModel)?;
        let policy = self.services.retry;
        let generated =
            ai_gateway::retry(&policy, "image", || images.generate_image(prompt, aspect)).await;
        let image = match generated {
            Ok(image) => image,
            Err(e) => {
                self.report_ai_failure(&GenerationError::from(e.clone()));
                return Err(e.into());
            }
        };
        let bytes = image.decode()?;
        self.store_image(&bytes, prompt).await
    }

    /// Attach a gallery image to an NPC.
    pub async fn set_portrait(
        &mut self,
        npc: RecordId,
        image: RecordId,
    ) -> Result<(), CampaignError> {
        if !self.npcs.set_portrait(npc, image) {
            return Err(CampaignError::NotFound(format!("NPC {npc}")));
        }
        self.persist(Collection::Npcs).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Travel
    // ------------------------------------------------------------------

    /// Toast the failure; a rejected credential also opens settings.
    fn report_ai_failure(&self, error: &GenerationError) {
        if error.is_unauthorized() {
            self.bus.emit(Signal::OpenSettings);
        }
        self.bus.emit(Signal::Toast(Toast::error(error.to_string())));
    }

    async fn ai_call<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, GenerationError>>,
    ) -> Result<T, CampaignError> {
        call.await.map_err(|e| {
            self.report_ai_failure(&e);
            e.into()
        })
    }

    pub async fn plan_journey(&mut self, plan: TravelPlan) -> Result<TravelState, CampaignError> {
        let state = self.travel.plan(plan).await?.clone();
        self.persist(Collection::TravelState).await?;
        self.record(
            LogKind::Travel,
            format!("Set out for {} ({} day(s))", state.destination.name, state.plan.days),
        )
        .await?;
        Ok(state)
    }

    /// Start the combat of a travel day and apply the resulting signals.
    pub async fn start_combat(&mut self, day: u32) -> Result<Vec<Combatant>, CampaignError> {
        let combatants = self.travel.start_combat(day).await?;
        self.persist(Collection::TravelState).await?;
        self.process_signals().await?;
        Ok(combatants)
    }

    pub async fn take_loot(&mut self, day: u32) -> Result<Vec<String>, CampaignError> {
        let loot = self.travel.take_loot(day)?;
        self.persist(Collection::TravelState).await?;
        Ok(loot)
    }

    /// Explore a travel day's location and make it the active location.
    pub async fn explore(&mut self, day: u32) -> Result<LocationData, CampaignError> {
        let location = self.travel.explore(day).await?;
        self.persist(Collection::TravelState).await?;
        self.set_active_location(location.clone()).await?;
        self.bus.emit(Signal::SwitchTab(Tab::Location));
        Ok(location)
    }

    pub async fn skip_day(&mut self, day: u32) -> Result<(), CampaignError> {
        self.travel.skip(day)?;
        self.persist(Collection::TravelState).await?;
        Ok(())
    }

    /// Finish the journey and make the destination the active location.
    pub async fn arrive(&mut self) -> Result<LocationData, CampaignError> {
        let lore = self.lore.clone();
        let location = self.travel.arrive(&lore).await?;
        self.finish_arrival(&location).await?;
        Ok(location)
    }

    async fn finish_arrival(&mut self, location: &LocationData) -> Result<(), CampaignError> {
        self.persist(Collection::TravelState).await?;
        self.set_active_location(location.clone()).await?;
        self.record(LogKind::Travel, format!("Arrived at {}", location.name))
            .await?;
        self.bus.emit(Signal::SwitchTab(Tab::Location));
        Ok(())
    }

    pub async fn abort_journey(&mut self) -> Result<bool, CampaignError> {
        let aborted = self.travel.abort();
        if aborted {
            self.persist(Collection::TravelState).await?;
            self.record(LogKind::Travel, "Journey abandoned").await?;
        }
        Ok(aborted)
    }

    /// Replay the failed travel request.
    pub async fn retry_travel(&mut self) -> Result<RetryOutcome, CampaignError> {
        let lore = self.lore.clone();
        let outcome = self.travel.retry(&lore).await?;
        match &outcome {
            RetryOutcome::Planned => self.persist(Collection::TravelState).await?,
            RetryOutcome::Arrived(location) => self.finish_arrival(location).await?,
        }
        Ok(outcome)
    }

    pub fn dismiss_travel_error(&mut self) {
        self.travel.dismiss_error();
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Store new settings and rebuild the generator with them.
    pub async fn update_settings(&mut self, settings: Settings) -> Result<(), CampaignError> {
        self.settings = settings;
        self.rebuild_generator();
        self.persist(Collection::Settings).await?;
        Ok(())
    }

    /// Layer `overrides` over the stored settings for this session only.
    pub fn set_overrides(&mut self, overrides: SettingsOverrides) {
        self.overrides = overrides;
        self.rebuild_generator();
    }

    /// Swap the text model, e.g. after the API key changed.
    pub fn set_text_model(&mut self, model: Arc<dyn TextModel>) {
        self.services.text = model;
        self.rebuild_generator();
    }

    pub fn set_image_model(&mut self, model: Arc<dyn ImageModel>) {
        self.services.images = Some(model);
    }

    fn rebuild_generator(&mut self) {
        self.generator = Generator::new(
            Arc::clone(&self.services.text),
            generator_config(&self.effective_settings(), self.services.retry),
        );
        self.travel.set_generator(self.generator.clone());
    }

    // ------------------------------------------------------------------
    // Data editor
    // ------------------------------------------------------------------

    pub async fn keys(&self) -> Result<Vec<Collection>, CampaignError> {
        Ok(self.store.keys().await?)
    }

    pub async fn raw(&self, key: Collection) -> Result<Option<RawDocument>, CampaignError> {
        Ok(self.store.raw(key).await?)
    }

    /// Replace a stored document with hand-edited JSON and reload it.
    ///
    /// Invalid JSON, or JSON that does not fit the collection, is refused
    /// and nothing changes.
    pub async fn write_raw(&mut self, key: Collection, text: &str) -> Result<(), CampaignError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(PersistError::from)?;
        self.reload_from_value(key, value)?;
        self.store.write_raw(key, text).await?;
        self.corrupt.remove(&key);
        self.bus.emit(Signal::Updated(key));
        Ok(())
    }

    fn reload_from_value(
        &mut self,
        key: Collection,
        value: serde_json::Value,
    ) -> Result<(), PersistError> {
        fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, PersistError> {
            Ok(serde_json::from_value(value)?)
        }
        match key {
            Collection::Party => self.party = decode(value)?,
            Collection::Stash => self.stash = decode(value)?,
            Collection::Npcs => self.npcs = decode(value)?,
            Collection::Quests => self.quests = decode(value)?,
            Collection::Notes => self.notes = decode(value)?,
            Collection::Logs => self.log = decode(value)?,
            Collection::Lore => self.lore = decode(value)?,
            Collection::Playlists => self.soundboard = decode(value)?,
            Collection::Combat => self.combat = decode(value)?,
            Collection::ActiveLocation => self.active_location = decode(value)?,
            Collection::Settings => {
                self.settings = decode(value)?;
                self.rebuild_generator();
            }
            Collection::TravelState => match decode::<Option<TravelState>>(value)? {
                Some(state) => self.travel.resume(state),
                None => {
                    self.travel.abort();
                }
            },
        }
        Ok(())
    }
}

fn generator_config(settings: &Settings, retry: RetryPolicy) -> crate::generate::GeneratorConfig {
    crate::generate::GeneratorConfig {
        retry,
        ..settings.generator_config()
    }
}
