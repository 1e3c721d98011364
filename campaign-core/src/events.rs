//! Typed signal bus connecting the campaign panels.
//!
//! Emission is fire-and-forget: sending with nobody listening is fine.
//! Every receiver sees signals in emission order. A receiver that falls
//! more than the channel capacity behind skips the oldest signals and logs
//! a warning. Consumers re-read canonical state from the [`Campaign`] on
//! receipt rather than trusting payloads as the source of truth.
//!
//! [`Campaign`]: crate::Campaign

use crate::combat::Combatant;
use crate::ids::RecordId;
use crate::npc::CampaignNpc;
use crate::party::{Holder, InventoryItem, Wallet};
use crate::quest::FullQuest;
use crate::store::Collection;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

const DEFAULT_CAPACITY: usize = 256;

/// Front-end views a signal can switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Party,
    Npcs,
    Quests,
    Location,
    Travel,
    Combat,
    Notes,
    Soundboard,
    Gallery,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

/// Items and coin going into the shared stash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StashDeposit {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub coins: Wallet,
}

/// Move an item between holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveItem {
    pub from: Holder,
    pub to: Holder,
    pub item: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// XP for some members; everyone when `targets` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub amount: u32,
    #[serde(default)]
    pub targets: Vec<RecordId>,
}

/// A generated image saved to the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImageRef {
    pub id: RecordId,
    pub prompt: String,
}

/// Cross-panel signal vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Signal {
    AddNpc(CampaignNpc),
    AddQuest(FullQuest),
    AddToStash(StashDeposit),
    GiveItem(GiveItem),
    AddXp(XpAward),
    AddCombatant(Combatant),
    SwitchTab(Tab),
    OpenSettings,
    ImageGenerated(GeneratedImageRef),
    Toast(Toast),
    /// A collection changed; listeners should re-read it.
    Updated(Collection),
}

impl Signal {
    /// Wire name, as used in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::AddNpc(_) => "add-npc",
            Signal::AddQuest(_) => "add-quest",
            Signal::AddToStash(_) => "add-to-stash",
            Signal::GiveItem(_) => "give-item",
            Signal::AddXp(_) => "add-xp",
            Signal::AddCombatant(_) => "add-combatant",
            Signal::SwitchTab(_) => "switch-tab",
            Signal::OpenSettings => "open-settings",
            Signal::ImageGenerated(_) => "image-generated",
            Signal::Toast(_) => "toast",
            Signal::Updated(_) => "updated",
        }
    }
}

/// Broadcast channel of [`Signal`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Signal>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send a signal. Returns how many receivers got it (0 is not an error).
    pub fn emit(&self, signal: Signal) -> usize {
        tracing::trace!(signal = signal.name(), "emit");
        self.sender.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> SignalReceiver {
        SignalReceiver {
            inner: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct SignalReceiver {
    inner: broadcast::Receiver<Signal>,
}

impl SignalReceiver {
    /// Wait for the next signal. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            match self.inner.recv().await {
                Ok(signal) => return Some(signal),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "signal receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next signal if one is already queued.
    pub fn try_recv(&mut self) -> Option<Signal> {
        loop {
            match self.inner.try_recv() {
                Ok(signal) => return Some(signal),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "signal receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently queued, in emission order.
    pub fn drain(&mut self) -> Vec<Signal> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(Signal::OpenSettings), 0);
    }

    #[test]
    fn test_receivers_see_emission_order() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(Signal::SwitchTab(Tab::Combat));
        bus.emit(Signal::Toast(Toast::info("hello")));

        for receiver in [&mut a, &mut b] {
            let names: Vec<_> = receiver.drain().iter().map(|s| s.name()).collect();
            assert_eq!(names, ["switch-tab", "toast"]);
        }
    }

    #[test]
    fn test_lagged_receiver_skips_ahead() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();
        for i in 0..5 {
            bus.emit(Signal::Toast(Toast::info(format!("{i}"))));
        }
        let seen = receiver.drain();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], Signal::Toast(Toast::info("4")));
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        bus.emit(Signal::OpenSettings);
        drop(bus);
        assert_eq!(receiver.recv().await, Some(Signal::OpenSettings));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(Signal::SwitchTab(Tab::Combat)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "switch-tab", "payload": "combat"}));

        let json = serde_json::to_value(Signal::Updated(Collection::TravelState)).unwrap();
        assert_eq!(json["type"], "updated");
        assert_eq!(json["payload"], "travel_state");

        let json = serde_json::to_value(Signal::OpenSettings).unwrap();
        assert_eq!(json["type"], "open-settings");

        let award: Signal =
            serde_json::from_str(r#"{"type": "add-xp", "payload": {"amount": 300}}"#).unwrap();
        assert_eq!(
            award,
            Signal::AddXp(XpAward {
                amount: 300,
                targets: vec![]
            })
        );
    }

    #[test]
    fn test_signal_names_match_wire() {
        let signals = [
            Signal::OpenSettings,
            Signal::SwitchTab(Tab::Travel),
            Signal::Toast(Toast::warning("x")),
            Signal::Updated(Collection::Party),
            Signal::AddXp(XpAward {
                amount: 1,
                targets: vec![],
            }),
        ];
        for signal in signals {
            let json = serde_json::to_value(&signal).unwrap();
            assert_eq!(json["type"], signal.name());
        }
    }
}
