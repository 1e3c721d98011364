//! QA tests for campaign bookkeeping and the signal bus.
//!
//! These tests verify:
//! - Signals from one panel change state owned by another
//! - Party, stash, NPC, quest and combat operations persist
//! - Image and audio blobs land in the object store
//!
//! Run with: `cargo test -p campaign-core --test qa_campaign`

use ai_gateway::AspectRatio;
use campaign_core::combat::Combatant;
use campaign_core::events::{GiveItem, StashDeposit, Tab, XpAward};
use campaign_core::generate::{LootBrief, NpcBrief};
use campaign_core::journal::LogKind;
use campaign_core::npc::{CampaignNpc, NpcStatus};
use campaign_core::party::{Holder, InventoryItem, PartyMember, Wallet};
use campaign_core::quest::{FullQuest, QuestStatus};
use campaign_core::soundboard::{Mood, TrackSource};
use campaign_core::store::Bucket;
use campaign_core::testing::{assert_signal, TestHarness};
use campaign_core::{CampaignError, Collection, Signal};

async fn party_of_two(h: &mut TestHarness) -> (PartyMember, PartyMember) {
    let mira = PartyMember::new("Mira", "Elf", "Ranger").with_stats(24, 15, 16);
    let dorn = PartyMember::new("Dorn", "Dwarf", "Cleric").with_stats(30, 18, 12);
    h.campaign.upsert_member(mira.clone()).await.unwrap();
    h.campaign.upsert_member(dorn.clone()).await.unwrap();
    (mira, dorn)
}

// =============================================================================
// SIGNALS
// =============================================================================

#[tokio::test]
async fn test_signals_apply_across_panels() {
    let mut h = TestHarness::new().await.unwrap();
    let (mira, _) = party_of_two(&mut h).await;

    h.campaign
        .emit(Signal::AddNpc(CampaignNpc::new("Old Hesk").with_location("Millbrook")));
    h.campaign.emit(Signal::AddQuest(
        FullQuest::new("Missing miller").with_objective("Find the mill key"),
    ));
    h.campaign.emit(Signal::AddToStash(StashDeposit {
        items: vec![InventoryItem::new("Rope").with_quantity(2)],
        coins: Wallet::new(10, 0, 0),
    }));
    h.campaign.emit(Signal::GiveItem(GiveItem {
        from: Holder::Stash,
        to: Holder::Member(mira.id),
        item: "rope".to_string(),
        quantity: 1,
    }));
    h.campaign.emit(Signal::AddXp(XpAward {
        amount: 300,
        targets: vec![],
    }));
    h.campaign.emit(Signal::SwitchTab(Tab::Npcs));

    let applied = h.campaign.process_signals().await.unwrap();
    assert_eq!(applied, 5);

    let campaign = &h.campaign;
    assert_eq!(campaign.npcs().len(), 1);
    assert_eq!(campaign.quests().len(), 1);
    assert_eq!(campaign.stash().wallet, Wallet::new(10, 0, 0));
    assert_eq!(campaign.stash().items[0].quantity, 1);
    let mira = campaign.party().get(mira.id).unwrap();
    assert_eq!(mira.inventory[0].name, "Rope");
    assert_eq!(mira.xp, 300);
    assert!(mira.can_level_up());
    assert_eq!(mira.level, 1);
}

#[tokio::test]
async fn test_bad_give_item_becomes_a_warning() {
    let mut h = TestHarness::new().await.unwrap();
    let (mira, dorn) = party_of_two(&mut h).await;
    h.take_signals();

    h.campaign.emit(Signal::GiveItem(GiveItem {
        from: Holder::Member(mira.id),
        to: Holder::Member(dorn.id),
        item: "Vorpal Sword".to_string(),
        quantity: 1,
    }));
    assert_eq!(h.campaign.process_signals().await.unwrap(), 0);
    assert_signal(&h.take_signals(), "toast");
}

#[tokio::test]
async fn test_updates_are_announced() {
    let mut h = TestHarness::new().await.unwrap();
    h.campaign.add_note("Session 1", "Met the baron").await.unwrap();

    let signals = h.take_signals();
    assert!(signals.contains(&Signal::Updated(Collection::Notes)));
}

// =============================================================================
// PARTY AND STASH
// =============================================================================

#[tokio::test]
async fn test_stash_withdraw_and_overdraw() {
    let mut h = TestHarness::new().await.unwrap();
    h.campaign
        .deposit_to_stash(vec![], Wallet::new(1, 0, 0))
        .await
        .unwrap();

    h.campaign.withdraw_from_stash(Wallet::new(0, 5, 0)).await.unwrap();
    assert_eq!(h.campaign.stash().wallet.total_cp(), 50);

    let err = h
        .campaign
        .withdraw_from_stash(Wallet::new(1, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::Wallet(_)));
    assert_eq!(h.campaign.stash().wallet.total_cp(), 50);
}

#[tokio::test]
async fn test_generated_loot_goes_to_stash() {
    let mut h = TestHarness::new().await.unwrap();
    h.model.push_text(
        r#"{"items": [{"name": "Silver Locket", "quantity": "2", "value": "10 gp"}, {"name": ""}]}"#,
    );

    let brief = LootBrief {
        source: "the drowned shrine".to_string(),
        party_level: 3,
        count: 2,
    };
    let items = h.campaign.generate_loot(&brief).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert!(h.campaign.stash().items.iter().any(|i| i.name == "Silver Locket"));
}

#[tokio::test]
async fn test_targeted_xp_is_logged() {
    let mut h = TestHarness::new().await.unwrap();
    let (mira, dorn) = party_of_two(&mut h).await;

    let awarded = h.campaign.award_xp(50, &[dorn.id]).await.unwrap();
    assert_eq!(awarded, 1);
    assert_eq!(h.campaign.party().get(dorn.id).unwrap().xp, 50);
    assert_eq!(h.campaign.party().get(mira.id).unwrap().xp, 0);

    let last = h.campaign.log().entries().last().unwrap();
    assert_eq!(last.kind, LogKind::Party);
}

#[tokio::test]
async fn test_remove_unknown_member() {
    let mut h = TestHarness::new().await.unwrap();
    let err = h
        .campaign
        .remove_member(campaign_core::RecordId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::NotFound(_)));
}

// =============================================================================
// NPCS AND QUESTS
// =============================================================================

#[tokio::test]
async fn test_generated_npc_merges_by_name_and_place() {
    let mut h = TestHarness::new().await.unwrap();
    let npc = r#"{"name": "Brannoc", "race": "Dwarf", "role": "Ferryman", "attitude": "friendly"}"#;
    let brief = NpcBrief {
        location: Some("Black River".to_string()),
        hint: Some("a ferryman".to_string()),
    };

    h.model.push_text(npc);
    let first = h.campaign.generate_npc(&brief).await.unwrap();
    h.model.push_text(npc);
    h.campaign.generate_npc(&brief).await.unwrap();

    assert_eq!(h.campaign.npcs().len(), 1);
    assert_eq!(h.campaign.npcs().all()[0].id, first.id);

    h.campaign
        .set_npc_status(first.id, NpcStatus::Dead)
        .await
        .unwrap();
    assert_eq!(h.campaign.npcs().get(first.id).unwrap().status, NpcStatus::Dead);
}

#[tokio::test]
async fn test_quest_status_changes_are_logged_once() {
    let mut h = TestHarness::new().await.unwrap();
    let quest = FullQuest::new("Rats in the cellar")
        .with_objective("Clear the cellar")
        .with_objective("Report to the innkeeper");
    let id = quest.id;
    h.campaign.add_quest(quest).await.unwrap();

    assert!(h.campaign.toggle_objective(id, 0).await.unwrap());
    assert_eq!(h.campaign.quests().get(id).unwrap().progress(), (1, 2));

    assert!(h
        .campaign
        .set_quest_status(id, QuestStatus::Completed)
        .await
        .unwrap());
    assert!(!h
        .campaign
        .set_quest_status(id, QuestStatus::Completed)
        .await
        .unwrap());

    let quest_entries: Vec<&str> = h
        .campaign
        .log()
        .entries()
        .iter()
        .filter(|e| e.kind == LogKind::Quest)
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(
        quest_entries,
        ["New quest: Rats in the cellar", "Quest 'Rats in the cellar' completed"]
    );
}

// =============================================================================
// COMBAT
// =============================================================================

#[tokio::test]
async fn test_combat_round_trip() {
    let mut h = TestHarness::new().await.unwrap();
    let goblin = Combatant::new("Goblin", 7, 15, 14);
    let ogre = Combatant::new("Ogre", 59, 11, 8);
    let goblin_id = goblin.id;
    h.campaign.add_combatant(ogre).await.unwrap();
    h.campaign.add_combatant(goblin).await.unwrap();

    // The goblin sorts first, but the ogre keeps the turn it already had.
    let names: Vec<&str> = h
        .campaign
        .combat()
        .combatants()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, ["Goblin", "Ogre"]);
    assert_eq!(h.campaign.combat().current().unwrap().name, "Ogre");

    assert_eq!(h.campaign.damage(goblin_id, 10).await.unwrap(), 0);
    assert_eq!(h.campaign.heal(goblin_id, 100).await.unwrap(), 7);

    let current = h.campaign.next_turn().await.unwrap().unwrap();
    assert_eq!(current.name, "Goblin");
    assert_eq!(h.campaign.combat().round(), 2);

    h.campaign.end_combat().await.unwrap();
    assert!(h.campaign.combat().is_empty());
    assert_eq!(h.campaign.log().entries().last().unwrap().kind, LogKind::Combat);
}

// =============================================================================
// BLOBS
// =============================================================================

#[tokio::test]
async fn test_generated_image_lands_in_gallery() {
    let mut h = TestHarness::new().await.unwrap();
    let id = h
        .campaign
        .generate_image("A ruined watchtower at dusk", AspectRatio::Landscape)
        .await
        .unwrap();

    let bytes = h
        .campaign
        .store()
        .objects()
        .get(Bucket::Images, id)
        .await
        .unwrap()
        .unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
    assert_eq!(h.images.prompts(), ["A ruined watchtower at dusk"]);
    assert_signal(&h.take_signals(), "image-generated");
}

#[tokio::test]
async fn test_uploaded_track_removal_deletes_audio() {
    let mut h = TestHarness::new().await.unwrap();
    let id = h
        .campaign
        .upload_track(Mood::Tavern, "Lute jig", b"ID3fake")
        .await
        .unwrap();

    let object = match &h.campaign.soundboard().find(id).unwrap().source {
        TrackSource::Blob(object) => *object,
        other => panic!("expected a blob track, got {other:?}"),
    };
    let playlist = h.campaign.soundboard().playlist(Mood::Tavern);
    assert_eq!(playlist.last().unwrap().id, id);

    h.campaign.remove_track(id).await.unwrap();
    let objects = h.campaign.store().objects();
    assert!(objects.get(Bucket::Audio, object).await.unwrap().is_none());
    assert!(h.campaign.soundboard().find(id).is_none());
}
