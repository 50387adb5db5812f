use std::sync::Arc;

use guildcore::guild::moveitem::NO_SLOT;
use guildcore::guild::rank::{tab_rights, BankTabRights};
use guildcore::guild::GUILD_BANK_MONEY_LOGS_TAB;
use guildcore::storage::CharacterRecord;
use guildcore::{
    BasicPlayer, Guild, GuildConfig, GuildError, GuildPlayer, GuildRegistry, GuildStore, Item,
    MemoryStore,
};

fn seed_character(store: &mut MemoryStore, guid: u64, name: &str) {
    store.put_character(CharacterRecord {
        guid,
        name: name.into(),
        level: 60,
        class: 1,
        gender: 0,
        zone_id: 1519,
        account_id: guid as u32,
        logout_time: 0,
    });
}

/// Registry, store and a freshly created guild with one purchased tab and
/// a leader holding plenty of money.
fn setup_guild() -> (GuildRegistry, MemoryStore, BasicPlayer, u32) {
    let cfg = Arc::new(GuildConfig::default());
    let mut reg = GuildRegistry::new(cfg);
    let mut store = MemoryStore::new();
    let mut leader = BasicPlayer::new(10, "Uther");
    leader.set_money(100_000_000);
    seed_character(&mut store, 10, "Uther");
    let id = reg.create_guild(&mut store, "Silver Hand", &mut leader).unwrap();
    reg.guild_mut(id)
        .unwrap()
        .handle_buy_bank_tab(&mut store, &mut leader, 0)
        .unwrap();
    (reg, store, leader, id)
}

fn join(guild: &mut Guild, store: &mut MemoryStore, guid: u64, name: &str) -> BasicPlayer {
    let mut player = BasicPlayer::new(guid, name);
    seed_character(store, guid, name);
    player.set_invited_guild(guild.id());
    guild.handle_accept_member(store, &mut player).unwrap();
    player
}

#[test]
fn test_deposit_item_into_bank() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    leader.put_item(0, Item::new(2589, 20, 20)); // linen cloth

    guild
        .swap_items_with_inventory(&mut store, &mut leader, false, 0, 3, 0, 0, 0)
        .unwrap();

    assert!(leader.item_at(0, 0).is_none());
    let contents = guild.bank_tab_contents(0).unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].0, 3);
    assert_eq!(contents[0].1.entry, 2589);
    assert_eq!(contents[0].1.count, 20);
    assert_eq!(store.bank_item_count(id), 1);

    let log: Vec<_> = guild.bank_log(0).unwrap().collect();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].item_entry, 2589);
    assert_eq!(log[0].item_count, 20);
}

#[test]
fn test_withdraw_consumes_slot_quota() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    let mut member = join(guild, &mut store, 20, "Squire");

    // Two stacks in the bank
    leader.put_item(0, Item::new(100, 1, 1));
    leader.put_item(1, Item::new(101, 1, 1));
    for slot in 0..2 {
        guild
            .swap_items_with_inventory(&mut store, &mut leader, false, 0, slot, 0, slot, 0)
            .unwrap();
    }

    // Initiates may view and pull one stack per day
    let mut tabs = [BankTabRights::default(); 6];
    tabs[0] = BankTabRights::new(tab_rights::VIEW, 1);
    let rank_id = guild.member(20).unwrap().rank_id;
    let rank_name = guild.rank(rank_id).unwrap().name().to_string();
    let rank_rights = guild.rank(rank_id).unwrap().rights();
    guild
        .handle_set_rank_info(&mut store, 10, rank_id, &rank_name, rank_rights, 0, tabs)
        .unwrap();

    guild
        .swap_items_with_inventory(&mut store, &mut member, true, 0, 0, 0, NO_SLOT, 0)
        .unwrap();
    assert_eq!(member.item_at(0, 0).map(|i| i.entry), Some(100));

    // Second withdrawal the same day is out of quota
    let before = store.write_count;
    let result = guild.swap_items_with_inventory(&mut store, &mut member, true, 0, 1, 0, NO_SLOT, 0);
    assert!(matches!(result, Err(GuildError::PermissionDenied)));
    assert_eq!(store.write_count, before, "denied move must not write");
    assert!(guild.bank_tab(0).unwrap().item(1).is_some());

    // The daily reset restores the allowance
    guild.reset_times(&mut store).unwrap();
    guild
        .swap_items_with_inventory(&mut store, &mut member, true, 0, 1, 0, NO_SLOT, 0)
        .unwrap();
}

#[test]
fn test_cross_tab_move_without_rights_leaves_state_untouched() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    guild.handle_buy_bank_tab(&mut store, &mut leader, 1).unwrap();

    leader.put_item(0, Item::new(100, 5, 20));
    guild
        .swap_items_with_inventory(&mut store, &mut leader, false, 0, 0, 0, 0, 0)
        .unwrap();

    // Member can see tab 0 but may not deposit into tab 1
    let mut member = join(guild, &mut store, 20, "Squire");
    let mut tabs = [BankTabRights::default(); 6];
    tabs[0] = BankTabRights::new(tab_rights::VIEW, 10);
    let rank_id = guild.member(20).unwrap().rank_id;
    let rank_name = guild.rank(rank_id).unwrap().name().to_string();
    let rank_rights = guild.rank(rank_id).unwrap().rights();
    guild
        .handle_set_rank_info(&mut store, 10, rank_id, &rank_name, rank_rights, 0, tabs)
        .unwrap();

    let before = store.write_count;
    let result = guild.swap_items(&mut store, &mut member, 0, 0, 1, 0, 0);
    assert!(matches!(result, Err(GuildError::PermissionDenied)));
    assert_eq!(store.write_count, before);
    assert_eq!(guild.bank_tab(0).unwrap().item(0).map(|i| i.entry), Some(100));
    assert!(guild.bank_tab(1).unwrap().item(0).is_none());
}

#[test]
fn test_same_tab_rearrange_needs_no_rights() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    leader.put_item(0, Item::new(100, 5, 20));
    guild
        .swap_items_with_inventory(&mut store, &mut leader, false, 0, 0, 0, 0, 0)
        .unwrap();

    // No tab rights at all, rearranging within the tab still works
    let mut member = join(guild, &mut store, 20, "Squire");
    guild.swap_items(&mut store, &mut member, 0, 0, 0, 7, 0).unwrap();
    assert!(guild.bank_tab(0).unwrap().item(0).is_none());
    assert_eq!(guild.bank_tab(0).unwrap().item(7).map(|i| i.entry), Some(100));
}

#[test]
fn test_split_stack_in_bank() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    leader.put_item(0, Item::new(100, 10, 20));
    guild
        .swap_items_with_inventory(&mut store, &mut leader, false, 0, 0, 0, 0, 0)
        .unwrap();

    guild.swap_items(&mut store, &mut leader, 0, 0, 0, 1, 4).unwrap();
    let tab = guild.bank_tab(0).unwrap();
    assert_eq!(tab.item(0).map(|i| i.count), Some(6));
    assert_eq!(tab.item(1).map(|i| i.count), Some(4));
    assert_ne!(tab.item(0).map(|i| i.guid), tab.item(1).map(|i| i.guid));

    // Splitting more than the stack holds is rejected
    let result = guild.swap_items(&mut store, &mut leader, 0, 0, 0, 2, 99);
    assert!(matches!(result, Err(GuildError::InvalidState(_))));
}

#[test]
fn test_merge_and_swap_fallback() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    leader.put_item(0, Item::new(100, 15, 20));
    leader.put_item(1, Item::new(100, 10, 20));
    leader.put_item(2, Item::new(200, 1, 1));
    for slot in 0..3 {
        guild
            .swap_items_with_inventory(&mut store, &mut leader, false, 0, slot, 0, slot, 0)
            .unwrap();
    }

    // Merge: 10 onto 15 caps the target at 20 and leaves 5 behind
    guild.swap_items(&mut store, &mut leader, 0, 1, 0, 0, 0).unwrap();
    let tab = guild.bank_tab(0).unwrap();
    assert_eq!(tab.item(0).map(|i| i.count), Some(20));
    assert_eq!(tab.item(1).map(|i| i.count), Some(5));

    // Swap: different entries trade places
    guild.swap_items(&mut store, &mut leader, 0, 2, 0, 0, 0).unwrap();
    let tab = guild.bank_tab(0).unwrap();
    assert_eq!(tab.item(0).map(|i| i.entry), Some(200));
    assert_eq!(tab.item(2).map(|i| i.entry), Some(100));
    assert_eq!(tab.item(2).map(|i| i.count), Some(20));
}

#[test]
fn test_full_tab_rejects_deposit_without_side_effects() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();

    // Unstackable items, one per slot, until the tab is full
    for n in 0..98u32 {
        leader.put_item(0, Item::new(1000 + n, 1, 1));
        guild
            .swap_items_with_inventory(&mut store, &mut leader, false, 0, NO_SLOT, 0, 0, 0)
            .unwrap();
    }
    assert_eq!(store.bank_item_count(id), 98);

    leader.put_item(0, Item::new(9999, 1, 1));
    let before = store.write_count;
    let result = guild.swap_items_with_inventory(&mut store, &mut leader, false, 0, NO_SLOT, 0, 0, 0);
    assert!(matches!(result, Err(GuildError::CapacityExceeded(_))));
    assert_eq!(store.write_count, before);
    assert_eq!(leader.item_at(0, 0).map(|i| i.entry), Some(9999));
    assert_eq!(store.bank_item_count(id), 98);
}

#[test]
fn test_soulbound_item_stays_out_of_bank() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    let mut item = Item::new(100, 1, 1);
    item.soulbound = true;
    leader.put_item(0, item);

    // Soulbound source resolves as absent, so the move is a silent no-op
    guild
        .swap_items_with_inventory(&mut store, &mut leader, false, 0, 0, 0, 0, 0)
        .unwrap();
    assert!(guild.bank_tab(0).unwrap().item(0).is_none());
    assert!(leader.item_at(0, 0).is_some());
}

#[test]
fn test_tab_text_idempotence_via_write_counter() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    let guild = reg.guild_mut(id).unwrap();
    let _ = leader;
    guild.set_bank_tab_text(&mut store, 10, 0, "free mats for raiders").unwrap();
    let after_first = store.write_count;
    guild.set_bank_tab_text(&mut store, 10, 0, "free mats for raiders").unwrap();
    assert_eq!(store.write_count, after_first, "unchanged text must not write");
}

#[test]
fn test_guild_survives_reload() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    {
        let guild = reg.guild_mut(id).unwrap();
        let member = join(guild, &mut store, 20, "Squire");
        guild
            .handle_set_member_note(&mut store, 10, 20, "new recruit", false)
            .unwrap();
        guild.handle_set_motd(&mut store, 10, "onward").unwrap();
        guild
            .handle_member_deposit_money(&mut store, &mut leader, 12_345)
            .unwrap();
        leader.put_item(0, Item::new(2589, 20, 20));
        guild
            .swap_items_with_inventory(&mut store, &mut leader, false, 0, 5, 0, 0, 0)
            .unwrap();
        let _ = member.guild_id();
    }

    let mut fresh = GuildRegistry::new(Arc::new(GuildConfig::default()));
    assert!(fresh.load_guild(&mut store, id).unwrap());
    let reloaded = fresh.guild(id).unwrap();

    assert_eq!(reloaded.name(), "Silver Hand");
    assert_eq!(reloaded.motd(), "onward");
    assert_eq!(reloaded.leader_guid(), 10);
    assert_eq!(reloaded.bank_money(), 12_345);
    assert_eq!(reloaded.member_count(), 2);
    assert_eq!(reloaded.member(20).unwrap().public_note(), "new recruit");
    assert_eq!(reloaded.purchased_tabs(), 1);
    let contents = reloaded.bank_tab_contents(0).unwrap();
    assert_eq!(contents, vec![(5u8, reloaded.bank_tab(0).unwrap().item(5).unwrap())]);
    assert_eq!(contents[0].1.entry, 2589);

    // Logs came back too
    assert!(reloaded.event_log_entries().count() >= 2);
    assert_eq!(reloaded.bank_log(GUILD_BANK_MONEY_LOGS_TAB).unwrap().count(), 1);
    assert_eq!(reloaded.bank_log(0).unwrap().count(), 1);
}

#[test]
fn test_bank_log_ring_survives_reload_bounded() {
    let cfg = Arc::new(GuildConfig {
        bank_event_log_count: 2,
        ..GuildConfig::default()
    });
    let mut reg = GuildRegistry::new(cfg.clone());
    let mut store = MemoryStore::new();
    let mut leader = BasicPlayer::new(10, "Uther");
    leader.set_money(1_000_000);
    seed_character(&mut store, 10, "Uther");
    let id = reg.create_guild(&mut store, "Misers", &mut leader).unwrap();

    let guild = reg.guild_mut(id).unwrap();
    for amount in [100u64, 200, 300] {
        guild
            .handle_member_deposit_money(&mut store, &mut leader, amount)
            .unwrap();
    }
    // Ring of two: the first deposit has been evicted and overwritten
    let amounts: Vec<u64> = guild
        .bank_log(GUILD_BANK_MONEY_LOGS_TAB)
        .unwrap()
        .map(|e| e.money)
        .collect();
    assert_eq!(amounts, vec![200, 300]);

    let mut fresh = GuildRegistry::new(cfg);
    assert!(fresh.load_guild(&mut store, id).unwrap());
    let reloaded = fresh.guild(id).unwrap();
    let mut amounts: Vec<u64> = reloaded
        .bank_log(GUILD_BANK_MONEY_LOGS_TAB)
        .unwrap()
        .map(|e| e.money)
        .collect();
    amounts.sort_unstable();
    assert_eq!(amounts, vec![200, 300]);
}

#[test]
fn test_disband_purges_everything() {
    let (mut reg, mut store, mut leader, id) = setup_guild();
    {
        let guild = reg.guild_mut(id).unwrap();
        leader.put_item(0, Item::new(100, 5, 20));
        guild
            .swap_items_with_inventory(&mut store, &mut leader, false, 0, 0, 0, 0, 0)
            .unwrap();
    }
    reg.disband_guild(&mut store, id).unwrap();
    assert!(reg.guild(id).is_none());
    assert!(store.load_guild(id).unwrap().is_none());
    assert!(store.load_ranks(id).unwrap().is_empty());
    assert!(store.load_members(id).unwrap().is_empty());
    assert!(store.load_bank_tabs(id).unwrap().is_empty());
    assert_eq!(store.bank_item_count(id), 0);
    assert!(store.load_event_log(id, 100).unwrap().is_empty());
}
