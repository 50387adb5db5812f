//! Rank ladder, rights bitmasks and per-tab bank rights.
//!
//! Rank id doubles as ladder position: 0 is the guildmaster, higher ids are
//! lower ranks. The guildmaster rank is re-forced to full rights and
//! unlimited quotas on every mutation so no command can lock the leader out.

use crate::config::GUILD_BANK_MAX_TABS;
use crate::storage::{GuildStore, RankRecord, Statement, StoreError, Transaction};
use crate::GuildId;

/// Rank rights bitmask values.
pub mod rights {
    pub const EMPTY: u32 = 0;
    pub const CHAT_LISTEN: u32 = 0x0001;
    pub const CHAT_SPEAK: u32 = 0x0002;
    pub const OFFCHAT_LISTEN: u32 = 0x0004;
    pub const OFFCHAT_SPEAK: u32 = 0x0008;
    pub const INVITE: u32 = 0x0010;
    pub const REMOVE: u32 = 0x0020;
    pub const PROMOTE: u32 = 0x0040;
    pub const DEMOTE: u32 = 0x0080;
    pub const SET_MOTD: u32 = 0x0100;
    pub const EDIT_PUBLIC_NOTE: u32 = 0x0200;
    pub const VIEW_OFFICER_NOTE: u32 = 0x0400;
    pub const EDIT_OFFICER_NOTE: u32 = 0x0800;
    pub const MODIFY_GUILD_INFO: u32 = 0x1000;
    pub const WITHDRAW_GOLD_LOCK: u32 = 0x2000;
    pub const WITHDRAW_REPAIR: u32 = 0x4000;
    pub const WITHDRAW_GOLD: u32 = 0x8000;
    pub const ALL: u32 = 0xFFFF;
}

/// Per-tab bank rights bitmask values.
pub mod tab_rights {
    pub const VIEW: u8 = 0x01;
    pub const DEPOSIT: u8 = 0x02;
    pub const UPDATE_TEXT: u8 = 0x04;
    pub const FULL: u8 = 0xFF;
}

/// The guildmaster always sits at the top of the ladder.
pub const RANK_GUILDMASTER: u8 = 0;

/// Sentinel for a quota that is never checked or counted.
pub const WITHDRAW_UNLIMITED: u32 = u32::MAX;

/// Smallest and largest legal ladder sizes.
pub const GUILD_RANKS_MIN_COUNT: usize = 5;
pub const GUILD_RANKS_MAX_COUNT: usize = 10;

/// One tab's rights and daily slot quota for one rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankTabRights {
    pub rights: u8,
    pub slots_per_day: u32,
}

impl BankTabRights {
    pub fn new(rights: u8, slots_per_day: u32) -> Self {
        Self {
            rights,
            slots_per_day,
        }
    }

    pub fn full() -> Self {
        Self {
            rights: tab_rights::FULL,
            slots_per_day: WITHDRAW_UNLIMITED,
        }
    }
}

/// One rung of the rank ladder.
#[derive(Debug, Clone)]
pub struct RankInfo {
    pub guild_id: GuildId,
    pub rank_id: u8,
    name: String,
    rights: u32,
    money_per_day: u32,
    /// Per-tab rights; None until the tab row has been seen or created.
    tabs: [Option<BankTabRights>; GUILD_BANK_MAX_TABS],
}

impl RankInfo {
    pub fn new(guild_id: GuildId, rank_id: u8, name: String, rights: u32, money_per_day: u32) -> Self {
        let mut rank = Self {
            guild_id,
            rank_id,
            name,
            rights,
            money_per_day,
            tabs: [None; GUILD_BANK_MAX_TABS],
        };
        rank.force_guildmaster();
        rank
    }

    pub fn from_record(record: &RankRecord) -> Self {
        Self::new(
            record.guild_id,
            record.rank_id,
            record.name.clone(),
            record.rights,
            record.money_per_day,
        )
    }

    fn force_guildmaster(&mut self) {
        if self.rank_id == RANK_GUILDMASTER {
            self.rights = rights::ALL;
            self.money_per_day = WITHDRAW_UNLIMITED;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rights(&self) -> u32 {
        self.rights
    }

    pub fn has_right(&self, right: u32) -> bool {
        self.rights & right == right
    }

    pub fn bank_money_per_day(&self) -> u32 {
        if self.rank_id == RANK_GUILDMASTER {
            WITHDRAW_UNLIMITED
        } else {
            self.money_per_day
        }
    }

    pub fn bank_tab_rights(&self, tab_id: u8) -> u8 {
        match self.tabs.get(tab_id as usize) {
            Some(Some(tab)) => tab.rights,
            _ => 0,
        }
    }

    pub fn bank_tab_slots_per_day(&self, tab_id: u8) -> u32 {
        match self.tabs.get(tab_id as usize) {
            Some(Some(tab)) => tab.slots_per_day,
            _ => 0,
        }
    }

    /// Absorb a `guild_bank_right` row during hydration.
    pub fn load_bank_tab_rights(&mut self, tab_id: u8, tab: BankTabRights) {
        if let Some(slot) = self.tabs.get_mut(tab_id as usize) {
            *slot = Some(tab);
        }
    }

    /// Rename the rank, skipping the write when nothing changes.
    pub fn set_name(&mut self, store: &mut dyn GuildStore, name: &str) -> Result<(), StoreError> {
        if self.name == name {
            return Ok(());
        }
        self.name = name.to_string();
        store.execute(Statement::UpdateRankName {
            guild_id: self.guild_id,
            rank_id: self.rank_id,
            name: self.name.clone(),
        })
    }

    pub fn set_rights(&mut self, store: &mut dyn GuildStore, rights: u32) -> Result<(), StoreError> {
        // The guildmaster's rights never change.
        if self.rank_id == RANK_GUILDMASTER || self.rights == rights {
            return Ok(());
        }
        self.rights = rights;
        store.execute(Statement::UpdateRankRights {
            guild_id: self.guild_id,
            rank_id: self.rank_id,
            rights,
        })
    }

    pub fn set_bank_money_per_day(
        &mut self,
        store: &mut dyn GuildStore,
        money_per_day: u32,
    ) -> Result<(), StoreError> {
        if self.rank_id == RANK_GUILDMASTER || self.money_per_day == money_per_day {
            return Ok(());
        }
        self.money_per_day = money_per_day;
        store.execute(Statement::UpdateRankMoney {
            guild_id: self.guild_id,
            rank_id: self.rank_id,
            money_per_day,
        })
    }

    pub fn set_bank_tab_rights(
        &mut self,
        store: &mut dyn GuildStore,
        tab_id: u8,
        mut tab: BankTabRights,
    ) -> Result<(), StoreError> {
        let Some(slot) = self.tabs.get_mut(tab_id as usize) else {
            return Ok(());
        };
        if self.rank_id == RANK_GUILDMASTER {
            tab = BankTabRights::full();
        }
        if *slot == Some(tab) {
            return Ok(());
        }
        *slot = Some(tab);
        store.execute(Statement::InsertBankRight {
            guild_id: self.guild_id,
            tab_id,
            rank_id: self.rank_id,
            rights: tab.rights,
            slots_per_day: tab.slots_per_day,
        })
    }

    /// Create rights rows for purchased tabs this rank has none for yet.
    /// Runs after loading and after a tab purchase.
    pub fn create_missing_tab_rights(&mut self, trans: &mut Transaction, purchased_tabs: u8) {
        for tab_id in 0..purchased_tabs.min(GUILD_BANK_MAX_TABS as u8) {
            let slot = &mut self.tabs[tab_id as usize];
            if slot.is_some() {
                continue;
            }
            let tab = if self.rank_id == RANK_GUILDMASTER {
                BankTabRights::full()
            } else {
                BankTabRights::default()
            };
            *slot = Some(tab);
            trans.append(Statement::InsertBankRight {
                guild_id: self.guild_id,
                tab_id,
                rank_id: self.rank_id,
                rights: tab.rights,
                slots_per_day: tab.slots_per_day,
            });
        }
    }

    /// Stage the `guild_rank` insert plus existing tab rights rows.
    pub fn stage_insert(&self, trans: &mut Transaction) {
        trans.append(Statement::InsertRank {
            guild_id: self.guild_id,
            rank_id: self.rank_id,
            name: self.name.clone(),
            rights: self.rights,
            money_per_day: self.money_per_day,
        });
        for (tab_id, tab) in self.tabs.iter().enumerate() {
            if let Some(tab) = tab {
                trans.append(Statement::InsertBankRight {
                    guild_id: self.guild_id,
                    tab_id: tab_id as u8,
                    rank_id: self.rank_id,
                    rights: tab.rights,
                    slots_per_day: tab.slots_per_day,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_guildmaster_rank_is_pinned_at_creation() {
        let rank = RankInfo::new(1, RANK_GUILDMASTER, "Guild Master".into(), rights::EMPTY, 5);
        assert_eq!(rank.rights(), rights::ALL);
        assert_eq!(rank.bank_money_per_day(), WITHDRAW_UNLIMITED);
    }

    #[test]
    fn test_guildmaster_rights_cannot_be_lowered() {
        let mut store = MemoryStore::new();
        let mut rank = RankInfo::new(1, RANK_GUILDMASTER, "Guild Master".into(), rights::ALL, 0);
        rank.set_rights(&mut store, rights::CHAT_LISTEN).unwrap();
        assert_eq!(rank.rights(), rights::ALL);
        assert_eq!(store.write_count, 0, "pinned rank must not hit the store");
    }

    #[test]
    fn test_guildmaster_tab_rights_forced_full() {
        let mut store = MemoryStore::new();
        let mut rank = RankInfo::new(1, RANK_GUILDMASTER, "Guild Master".into(), rights::ALL, 0);
        rank.set_bank_tab_rights(&mut store, 0, BankTabRights::new(tab_rights::VIEW, 3))
            .unwrap();
        assert_eq!(rank.bank_tab_rights(0), tab_rights::FULL);
        assert_eq!(rank.bank_tab_slots_per_day(0), WITHDRAW_UNLIMITED);
    }

    #[test]
    fn test_unchanged_setter_skips_store() {
        let mut store = MemoryStore::new();
        let mut rank = RankInfo::new(1, 3, "Member".into(), rights::CHAT_LISTEN, 10);
        rank.set_name(&mut store, "Member").unwrap();
        rank.set_bank_money_per_day(&mut store, 10).unwrap();
        assert_eq!(store.write_count, 0);
        rank.set_name(&mut store, "Veteran").unwrap();
        assert_eq!(store.write_count, 1);
    }

    #[test]
    fn test_create_missing_tab_rights() {
        let mut rank = RankInfo::new(1, 2, "Officer".into(), rights::ALL, 100);
        let mut trans = Transaction::new();
        rank.create_missing_tab_rights(&mut trans, 2);
        assert_eq!(trans.statements().len(), 2);
        assert_eq!(rank.bank_tab_rights(0), 0);
        // Already-present tabs are not re-staged
        let mut trans2 = Transaction::new();
        rank.create_missing_tab_rights(&mut trans2, 2);
        assert!(trans2.is_empty());
    }

    #[test]
    fn test_out_of_range_tab_is_ignored() {
        let rank = RankInfo::new(1, 1, "Officer".into(), rights::ALL, 0);
        assert_eq!(rank.bank_tab_rights(6), 0);
        assert_eq!(rank.bank_tab_slots_per_day(100), 0);
    }
}
