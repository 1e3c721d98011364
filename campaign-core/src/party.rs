//! Party roster, inventories, coin and the shared stash.

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// XP needed to reach each level (index 0 is level 1).
const XP_THRESHOLDS: [u32; 20] = [
    0, 300, 900, 2_700, 6_500, 14_000, 23_000, 34_000, 48_000, 64_000, 85_000, 100_000, 120_000,
    140_000, 165_000, 195_000, 225_000, 265_000, 305_000, 355_000,
];

/// Errors from wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Insufficient funds: need {needed_cp} cp, have {available_cp} cp")]
    Insufficient { needed_cp: u64, available_cp: u64 },
}

/// Errors from moving items between holders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("Unknown party member: {0}")]
    UnknownMember(RecordId),

    #[error("'{0}' not found")]
    ItemNotFound(String),

    #[error("Source and destination are the same")]
    SameHolder,
}

// ============================================================================
// Coin
// ============================================================================

/// Coins held by a member or the stash. 1 gp = 10 sp = 100 cp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub gp: u32,
    #[serde(default)]
    pub sp: u32,
    #[serde(default)]
    pub cp: u32,
}

impl Wallet {
    pub fn new(gp: u32, sp: u32, cp: u32) -> Self {
        Self { gp, sp, cp }
    }

    /// Value of the wallet in copper.
    pub fn total_cp(&self) -> u64 {
        self.gp as u64 * 100 + self.sp as u64 * 10 + self.cp as u64
    }

    pub fn is_empty(&self) -> bool {
        self.total_cp() == 0
    }

    pub fn deposit(&mut self, other: Wallet) {
        self.gp = self.gp.saturating_add(other.gp);
        self.sp = self.sp.saturating_add(other.sp);
        self.cp = self.cp.saturating_add(other.cp);
    }

    /// Remove `amount` from the wallet.
    ///
    /// Coins are paid denomination for denomination first; any shortfall is
    /// covered by the smallest remaining coins, breaking larger coins into
    /// change when needed. The wallet is untouched on error.
    pub fn withdraw(&mut self, amount: Wallet) -> Result<(), WalletError> {
        let available_cp = self.total_cp();
        let needed_cp = amount.total_cp();
        if needed_cp > available_cp {
            return Err(WalletError::Insufficient {
                needed_cp,
                available_cp,
            });
        }

        let direct_gp = self.gp.min(amount.gp);
        let direct_sp = self.sp.min(amount.sp);
        let direct_cp = self.cp.min(amount.cp);
        self.gp -= direct_gp;
        self.sp -= direct_sp;
        self.cp -= direct_cp;

        let mut owed = (amount.gp - direct_gp) as u64 * 100
            + (amount.sp - direct_sp) as u64 * 10
            + (amount.cp - direct_cp) as u64;

        let use_cp = owed.min(self.cp as u64);
        self.cp -= use_cp as u32;
        owed -= use_cp;

        if owed > 0 {
            let use_sp = owed.div_ceil(10).min(self.sp as u64);
            self.sp -= use_sp as u32;
            let paid = use_sp * 10;
            if paid >= owed {
                self.cp += (paid - owed) as u32;
                owed = 0;
            } else {
                owed -= paid;
            }
        }

        if owed > 0 {
            let use_gp = owed.div_ceil(100).min(self.gp as u64);
            self.gp -= use_gp as u32;
            let change = use_gp * 100 - owed;
            self.sp += (change / 10) as u32;
            self.cp += (change % 10) as u32;
        }

        Ok(())
    }
}

// ============================================================================
// Items
// ============================================================================

/// An item carried by a member or kept in the stash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
    /// Free-text value ("25 gp", "priceless").
    #[serde(default)]
    pub value: String,
}

fn default_quantity() -> u32 {
    1
}

impl InventoryItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            quantity: 1,
            description: String::new(),
            value: String::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    fn same_kind(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Add an item to a list, stacking onto an existing entry of the same name.
fn stack_item(items: &mut Vec<InventoryItem>, item: InventoryItem) {
    match items.iter_mut().find(|i| i.same_kind(&item.name)) {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
        None => items.push(item),
    }
}

/// Remove up to `quantity` of the named item from a list.
fn take_item(items: &mut Vec<InventoryItem>, name: &str, quantity: u32) -> Option<InventoryItem> {
    let index = items.iter().position(|i| i.same_kind(name))?;
    let quantity = quantity.max(1);

    if items[index].quantity <= quantity {
        return Some(items.remove(index));
    }

    let entry = &mut items[index];
    entry.quantity -= quantity;
    Some(InventoryItem {
        id: RecordId::new(),
        quantity,
        ..entry.clone()
    })
}

// ============================================================================
// Members
// ============================================================================

/// A player character in the party roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMember {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub class: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub hp: i32,
    #[serde(default)]
    pub max_hp: i32,
    #[serde(default)]
    pub ac: u8,
    #[serde(default)]
    pub perception: u8,
    #[serde(default)]
    pub wallet: Wallet,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
}

fn default_level() -> u8 {
    1
}

impl PartyMember {
    pub fn new(name: impl Into<String>, race: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            race: race.into(),
            class: class.into(),
            level: 1,
            xp: 0,
            hp: 10,
            max_hp: 10,
            ac: 10,
            perception: 10,
            wallet: Wallet::default(),
            inventory: Vec::new(),
        }
    }

    pub fn with_stats(mut self, max_hp: i32, ac: u8, perception: u8) -> Self {
        self.hp = max_hp;
        self.max_hp = max_hp;
        self.ac = ac;
        self.perception = perception;
        self
    }

    /// Add XP and return the new total. Level is left to the game master.
    pub fn award_xp(&mut self, amount: u32) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        self.xp
    }

    /// XP still needed for the next level, or `None` at the cap.
    pub fn xp_to_next_level(&self) -> Option<u32> {
        let next = XP_THRESHOLDS.get(self.level as usize)?;
        Some(next.saturating_sub(self.xp))
    }

    /// Whether the member has enough XP for a higher level than they have.
    pub fn can_level_up(&self) -> bool {
        level_for_xp(self.xp) > self.level
    }

    pub fn add_item(&mut self, item: InventoryItem) {
        stack_item(&mut self.inventory, item);
    }

    pub fn take_item(&mut self, name: &str, quantity: u32) -> Option<InventoryItem> {
        take_item(&mut self.inventory, name, quantity)
    }
}

/// The level a character with `xp` experience qualifies for.
pub fn level_for_xp(xp: u32) -> u8 {
    XP_THRESHOLDS.iter().take_while(|&&t| xp >= t).count() as u8
}

// ============================================================================
// Stash
// ============================================================================

/// Shared party inventory and purse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stash {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub wallet: Wallet,
}

impl Stash {
    pub fn add_item(&mut self, item: InventoryItem) {
        stack_item(&mut self.items, item);
    }

    pub fn take_item(&mut self, name: &str, quantity: u32) -> Option<InventoryItem> {
        take_item(&mut self.items, name, quantity)
    }
}

// ============================================================================
// Roster
// ============================================================================

/// Where an item lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Holder {
    Stash,
    Member(RecordId),
}

/// The party roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Party {
    members: Vec<PartyMember>,
}

impl Party {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[PartyMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member, or replace the one with the same id.
    pub fn upsert(&mut self, member: PartyMember) {
        match self.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&PartyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&PartyMember> {
        let name = name.trim().to_lowercase();
        self.members
            .iter()
            .find(|m| m.name.trim().to_lowercase() == name)
    }

    /// Remove a member. Only ever called on explicit user action.
    pub fn remove(&mut self, id: RecordId) -> Option<PartyMember> {
        let index = self.members.iter().position(|m| m.id == id)?;
        Some(self.members.remove(index))
    }

    /// Award XP to the listed members, or to everyone when `targets` is empty.
    ///
    /// Returns how many members received it. Unknown ids are ignored.
    pub fn award_xp(&mut self, amount: u32, targets: &[RecordId]) -> usize {
        let mut awarded = 0;
        for member in &mut self.members {
            if targets.is_empty() || targets.contains(&member.id) {
                member.award_xp(amount);
                awarded += 1;
            }
        }
        awarded
    }

    /// Move an item between the stash and members.
    pub fn transfer(
        &mut self,
        stash: &mut Stash,
        from: Holder,
        to: Holder,
        name: &str,
        quantity: u32,
    ) -> Result<InventoryItem, TransferError> {
        if from == to {
            return Err(TransferError::SameHolder);
        }
        // Validate the destination before taking anything out.
        if let Holder::Member(id) = to {
            if self.get(id).is_none() {
                return Err(TransferError::UnknownMember(id));
            }
        }

        let item = match from {
            Holder::Stash => stash.take_item(name, quantity),
            Holder::Member(id) => self
                .get_mut(id)
                .ok_or(TransferError::UnknownMember(id))?
                .take_item(name, quantity),
        }
        .ok_or_else(|| TransferError::ItemNotFound(name.to_string()))?;

        match to {
            Holder::Stash => stash.add_item(item.clone()),
            Holder::Member(id) => {
                if let Some(member) = self.get_mut(id) {
                    member.add_item(item.clone());
                }
            }
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_total() {
        assert_eq!(Wallet::new(1, 2, 3).total_cp(), 123);
        assert!(Wallet::default().is_empty());
    }

    #[test]
    fn test_withdraw_exact_denominations() {
        let mut wallet = Wallet::new(5, 5, 5);
        wallet.withdraw(Wallet::new(2, 1, 3)).unwrap();
        assert_eq!(wallet, Wallet::new(3, 4, 2));
    }

    #[test]
    fn test_withdraw_breaks_gold_for_change() {
        let mut wallet = Wallet::new(1, 0, 0);
        wallet.withdraw(Wallet::new(0, 0, 5)).unwrap();
        assert_eq!(wallet, Wallet::new(0, 9, 5));
        assert_eq!(wallet.total_cp(), 95);
    }

    #[test]
    fn test_withdraw_pays_gold_with_copper() {
        let mut wallet = Wallet::new(0, 0, 500);
        wallet.withdraw(Wallet::new(1, 0, 0)).unwrap();
        assert_eq!(wallet, Wallet::new(0, 0, 400));
    }

    #[test]
    fn test_withdraw_insufficient_leaves_wallet_alone() {
        let mut wallet = Wallet::new(0, 3, 0);
        let err = wallet.withdraw(Wallet::new(1, 0, 0)).unwrap_err();
        assert_eq!(
            err,
            WalletError::Insufficient {
                needed_cp: 100,
                available_cp: 30
            }
        );
        assert_eq!(wallet, Wallet::new(0, 3, 0));
    }

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(299), 1);
        assert_eq!(level_for_xp(300), 2);
        assert_eq!(level_for_xp(355_000), 20);
        assert_eq!(level_for_xp(u32::MAX), 20);
    }

    #[test]
    fn test_award_xp_does_not_auto_level() {
        let mut member = PartyMember::new("Ilya", "Human", "Fighter");
        member.award_xp(350);
        assert_eq!(member.xp, 350);
        assert_eq!(member.level, 1);
        assert!(member.can_level_up());
        assert_eq!(member.xp_to_next_level(), Some(0));
    }

    #[test]
    fn test_items_stack_by_name() {
        let mut member = PartyMember::new("Vera", "Elf", "Ranger");
        member.add_item(InventoryItem::new("Arrow").with_quantity(20));
        member.add_item(InventoryItem::new("arrow ").with_quantity(5));
        assert_eq!(member.inventory.len(), 1);
        assert_eq!(member.inventory[0].quantity, 25);

        let taken = member.take_item("Arrow", 10).unwrap();
        assert_eq!(taken.quantity, 10);
        assert_eq!(member.inventory[0].quantity, 15);

        let rest = member.take_item("Arrow", 99).unwrap();
        assert_eq!(rest.quantity, 15);
        assert!(member.inventory.is_empty());
    }

    #[test]
    fn test_cyrillic_names_ignore_case() {
        let mut party = Party::new();
        let member = PartyMember::new("Ярослава", "Human", "Paladin");
        let id = member.id;
        party.upsert(member);
        assert_eq!(party.find_by_name("ЯРОСЛАВА").unwrap().id, id);

        let mut stash = Stash::default();
        stash.add_item(InventoryItem::new("Зелье лечения"));
        stash.add_item(InventoryItem::new("зелье лечения"));
        assert_eq!(stash.items.len(), 1);
        assert_eq!(stash.items[0].quantity, 2);

        let moved = party
            .transfer(&mut stash, Holder::Stash, Holder::Member(id), "ЗЕЛЬЕ ЛЕЧЕНИЯ", 1)
            .unwrap();
        assert_eq!(moved.quantity, 1);
        assert_eq!(stash.items[0].quantity, 1);
    }

    #[test]
    fn test_award_xp_targets() {
        let mut party = Party::new();
        let a = PartyMember::new("A", "Human", "Cleric");
        let b = PartyMember::new("B", "Dwarf", "Fighter");
        let a_id = a.id;
        party.upsert(a);
        party.upsert(b);

        assert_eq!(party.award_xp(100, &[]), 2);
        assert_eq!(party.award_xp(50, &[a_id]), 1);
        assert_eq!(party.get(a_id).unwrap().xp, 150);
        assert_eq!(party.find_by_name("b").unwrap().xp, 100);
    }

    #[test]
    fn test_transfer_stash_to_member() {
        let mut party = Party::new();
        let member = PartyMember::new("Mara", "Halfling", "Rogue");
        let id = member.id;
        party.upsert(member);

        let mut stash = Stash::default();
        stash.add_item(InventoryItem::new("Potion of Healing").with_quantity(3));

        let moved = party
            .transfer(&mut stash, Holder::Stash, Holder::Member(id), "potion of healing", 1)
            .unwrap();

        assert_eq!(moved.quantity, 1);
        assert_eq!(stash.items[0].quantity, 2);
        assert_eq!(party.get(id).unwrap().inventory[0].name, "Potion of Healing");
    }

    #[test]
    fn test_transfer_errors() {
        let mut party = Party::new();
        let mut stash = Stash::default();
        let ghost = RecordId::new();

        assert_eq!(
            party.transfer(&mut stash, Holder::Stash, Holder::Stash, "x", 1),
            Err(TransferError::SameHolder)
        );
        assert_eq!(
            party.transfer(&mut stash, Holder::Stash, Holder::Member(ghost), "x", 1),
            Err(TransferError::UnknownMember(ghost))
        );

        let member = PartyMember::new("Oleg", "Human", "Wizard");
        let id = member.id;
        party.upsert(member);
        assert_eq!(
            party.transfer(&mut stash, Holder::Stash, Holder::Member(id), "Wand", 1),
            Err(TransferError::ItemNotFound("Wand".to_string()))
        );
    }

    #[test]
    fn test_member_defaults_from_sparse_json() {
        let member: PartyMember = serde_json::from_str(r#"{"name": "Sparse"}"#).unwrap();
        assert_eq!(member.level, 1);
        assert!(member.inventory.is_empty());
        assert!(member.wallet.is_empty());
    }
}
