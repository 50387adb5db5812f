//! Player collaborator contract.
//!
//! The guild subsystem never owns character state. Handlers reach the
//! acting player through this trait for identity, money and the inventory
//! half of bank moves. [`BasicPlayer`] is a plain single-bag implementation
//! for tests and offline tooling.

use crate::error::GuildError;
use crate::guild::moveitem::SlotReservation;
use crate::item::Item;
use crate::storage::{Statement, Transaction};
use crate::{GuildId, PlayerGuid};

/// Character money cap in copper.
pub const PLAYER_MONEY_CAP: u64 = 0x7FFF_FFFF;

/// The acting character, as the guild aggregate sees it.
pub trait GuildPlayer {
    fn guid(&self) -> PlayerGuid;
    fn name(&self) -> &str;
    fn level(&self) -> u8;
    fn class(&self) -> u8;
    fn gender(&self) -> u8;
    fn zone_id(&self) -> u32;
    fn account_id(&self) -> u32;

    fn guild_id(&self) -> GuildId;
    fn set_guild(&mut self, guild_id: GuildId, rank_id: u8);
    fn invited_guild_id(&self) -> GuildId;
    fn set_invited_guild(&mut self, guild_id: GuildId);

    fn money(&self) -> u64;
    /// Apply a signed delta; callers check the bounds first.
    fn modify_money(&mut self, delta: i64);
    /// Stage the money row write into the same transaction as the guild's.
    fn stage_money_save(&self, trans: &mut Transaction) {
        trans.append(Statement::SavePlayerMoney {
            player_guid: self.guid(),
            money: self.money(),
        });
    }

    /// Item at an inventory position, if any.
    fn item_at(&self, bag: u8, slot: u8) -> Option<&Item>;
    /// Check where `item` would go, without mutating anything. `swap` is
    /// the position being vacated by the other half of a swap, usable as a
    /// destination.
    fn can_store_item(
        &self,
        bag: u8,
        slot: u8,
        item: &Item,
        swap: Option<(u8, u8)>,
    ) -> Result<Vec<SlotReservation>, GuildError>;
    /// Shrink the stack at a position by `count`; removes it at zero.
    fn remove_item_count(&mut self, bag: u8, slot: u8, count: u32);
    /// Take the whole item out of a position.
    fn take_item(&mut self, bag: u8, slot: u8) -> Option<Item>;
    /// Place an item into the reserved positions.
    fn store_item(&mut self, reserved: &[SlotReservation], item: Item);
    fn stage_inventory_save(&self, trans: &mut Transaction) {
        trans.append(Statement::SavePlayerInventory {
            player_guid: self.guid(),
        });
    }
}

/// Single-bag in-memory player. Bag id is ignored; `slot` indexes one
/// fixed-size backpack.
#[derive(Debug)]
pub struct BasicPlayer {
    guid: PlayerGuid,
    name: String,
    pub level: u8,
    pub class: u8,
    pub gender: u8,
    pub zone_id: u32,
    pub account_id: u32,
    guild_id: GuildId,
    rank_id: u8,
    invited_guild_id: GuildId,
    money: u64,
    slots: Vec<Option<Item>>,
}

impl BasicPlayer {
    pub const BAG_SLOTS: usize = 16;

    pub fn new(guid: PlayerGuid, name: &str) -> Self {
        Self {
            guid,
            name: name.to_string(),
            level: 60,
            class: 1,
            gender: 0,
            zone_id: 0,
            account_id: 1,
            guild_id: 0,
            rank_id: 0,
            invited_guild_id: 0,
            money: 0,
            slots: vec![None; Self::BAG_SLOTS],
        }
    }

    pub fn rank_id(&self) -> u8 {
        self.rank_id
    }

    pub fn set_money(&mut self, money: u64) {
        self.money = money;
    }

    pub fn put_item(&mut self, slot: u8, item: Item) {
        if let Some(s) = self.slots.get_mut(slot as usize) {
            *s = Some(item);
        }
    }
}

impl GuildPlayer for BasicPlayer {
    fn guid(&self) -> PlayerGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> u8 {
        self.level
    }

    fn class(&self) -> u8 {
        self.class
    }

    fn gender(&self) -> u8 {
        self.gender
    }

    fn zone_id(&self) -> u32 {
        self.zone_id
    }

    fn account_id(&self) -> u32 {
        self.account_id
    }

    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn set_guild(&mut self, guild_id: GuildId, rank_id: u8) {
        self.guild_id = guild_id;
        self.rank_id = rank_id;
    }

    fn invited_guild_id(&self) -> GuildId {
        self.invited_guild_id
    }

    fn set_invited_guild(&mut self, guild_id: GuildId) {
        self.invited_guild_id = guild_id;
    }

    fn money(&self) -> u64 {
        self.money
    }

    fn modify_money(&mut self, delta: i64) {
        if delta >= 0 {
            self.money = self.money.saturating_add(delta as u64);
        } else {
            self.money = self.money.saturating_sub(delta.unsigned_abs());
        }
    }

    fn item_at(&self, _bag: u8, slot: u8) -> Option<&Item> {
        self.slots.get(slot as usize).and_then(|s| s.as_ref())
    }

    fn can_store_item(
        &self,
        _bag: u8,
        slot: u8,
        item: &Item,
        swap: Option<(u8, u8)>,
    ) -> Result<Vec<SlotReservation>, GuildError> {
        // Exact slot requested: free, mergeable, or vacated by the swap.
        if let Some(existing) = self.slots.get(slot as usize) {
            let vacated = swap.map(|(_, s)| s) == Some(slot);
            match existing {
                None => {
                    return Ok(vec![SlotReservation {
                        slot,
                        count: item.count,
                    }])
                }
                Some(occupant) => {
                    if vacated {
                        return Ok(vec![SlotReservation {
                            slot,
                            count: item.count,
                        }]);
                    }
                    if occupant.entry == item.entry && occupant.free_space() >= item.count {
                        return Ok(vec![SlotReservation {
                            slot,
                            count: item.count,
                        }]);
                    }
                }
            }
        }
        // Otherwise first free slot takes the whole stack.
        for (i, existing) in self.slots.iter().enumerate() {
            let vacated = swap.map(|(_, s)| s as usize) == Some(i);
            if existing.is_none() || vacated {
                return Ok(vec![SlotReservation {
                    slot: i as u8,
                    count: item.count,
                }]);
            }
        }
        Err(GuildError::CapacityExceeded("inventory is full"))
    }

    fn remove_item_count(&mut self, _bag: u8, slot: u8, count: u32) {
        if let Some(s) = self.slots.get_mut(slot as usize) {
            if let Some(item) = s {
                if item.count > count {
                    item.count -= count;
                } else {
                    *s = None;
                }
            }
        }
    }

    fn take_item(&mut self, _bag: u8, slot: u8) -> Option<Item> {
        self.slots.get_mut(slot as usize).and_then(|s| s.take())
    }

    fn store_item(&mut self, reserved: &[SlotReservation], item: Item) {
        for r in reserved {
            let Some(s) = self.slots.get_mut(r.slot as usize) else {
                continue;
            };
            match s {
                Some(existing) if existing.entry == item.entry => {
                    existing.count = existing.count.saturating_add(r.count);
                }
                _ => {
                    *s = Some(item.clone_with_count(r.count));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_money_saturates() {
        let mut p = BasicPlayer::new(1, "Arthas");
        p.modify_money(-100);
        assert_eq!(p.money(), 0);
        p.modify_money(500);
        assert_eq!(p.money(), 500);
    }

    #[test]
    fn test_can_store_finds_free_slot() {
        let mut p = BasicPlayer::new(1, "Arthas");
        p.put_item(0, Item::new(10, 1, 1));
        let reserved = p.can_store_item(0, 0, &Item::new(11, 1, 1), None).unwrap();
        assert_eq!(reserved[0].slot, 1);
    }

    #[test]
    fn test_can_store_merges_same_entry() {
        let mut p = BasicPlayer::new(1, "Arthas");
        p.put_item(2, Item::new(10, 5, 20));
        let reserved = p.can_store_item(0, 2, &Item::new(10, 10, 20), None).unwrap();
        assert_eq!(reserved[0].slot, 2);
        assert_eq!(reserved[0].count, 10);
    }

    #[test]
    fn test_can_store_full_inventory_fails() {
        let mut p = BasicPlayer::new(1, "Arthas");
        for slot in 0..BasicPlayer::BAG_SLOTS as u8 {
            p.put_item(slot, Item::new(100 + slot as u32, 1, 1));
        }
        let result = p.can_store_item(0, 0, &Item::new(999, 1, 1), None);
        assert!(matches!(result, Err(GuildError::CapacityExceeded(_))));
    }

    #[test]
    fn test_store_merges_into_reserved_slot() {
        let mut p = BasicPlayer::new(1, "Arthas");
        p.put_item(0, Item::new(10, 5, 20));
        let incoming = Item::new(10, 3, 20);
        p.store_item(&[SlotReservation { slot: 0, count: 3 }], incoming);
        assert_eq!(p.item_at(0, 0).map(|i| i.count), Some(8));
    }
}
