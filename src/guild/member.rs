//! Guild member with cached character stats and withdrawal counters.

use crate::guild::rank::{RANK_GUILDMASTER, WITHDRAW_UNLIMITED};
use crate::storage::{
    CharacterRecord, GuildStore, MemberRecord, Statement, StoreError, Transaction, WITHDRAW_SLOTS,
};
use crate::{GuildId, PlayerGuid};

/// Online status flags, mirrored into the roster view.
pub mod status {
    pub const NONE: u8 = 0;
    pub const ONLINE: u8 = 0x01;
    pub const AFK: u8 = 0x02;
    pub const DND: u8 = 0x04;
}

/// Index of the money counter in the withdraw array.
pub const WITHDRAW_MONEY_SLOT: usize = WITHDRAW_SLOTS - 1;

/// One roster entry. Character stats are cached here so the roster can be
/// served while the member is offline.
#[derive(Debug, Clone)]
pub struct Member {
    pub guild_id: GuildId,
    pub guid: PlayerGuid,
    pub rank_id: u8,
    pub name: String,
    pub level: u8,
    pub class: u8,
    pub gender: u8,
    pub zone_id: u32,
    pub account_id: u32,
    pub logout_time: i64,
    pub flags: u8,
    public_note: String,
    officer_note: String,
    /// Slots (or copper, last entry) withdrawn since the daily reset.
    bank_withdraw: [u32; WITHDRAW_SLOTS],
}

impl Member {
    pub fn new(guild_id: GuildId, guid: PlayerGuid, rank_id: u8) -> Self {
        Self {
            guild_id,
            guid,
            rank_id,
            name: String::new(),
            level: 0,
            class: 0,
            gender: 0,
            zone_id: 0,
            account_id: 0,
            logout_time: 0,
            flags: status::NONE,
            public_note: String::new(),
            officer_note: String::new(),
            bank_withdraw: [0; WITHDRAW_SLOTS],
        }
    }

    pub fn from_record(record: &MemberRecord) -> Self {
        Self {
            guild_id: record.guild_id,
            guid: record.player_guid,
            rank_id: record.rank_id,
            name: record.name.clone(),
            level: record.level,
            class: record.class,
            gender: record.gender,
            zone_id: record.zone_id,
            account_id: record.account_id,
            logout_time: record.logout_time,
            flags: status::NONE,
            public_note: record.public_note.clone(),
            officer_note: record.officer_note.clone(),
            bank_withdraw: record.withdraw,
        }
    }

    /// Fill the cached stats from a character row.
    pub fn set_stats(&mut self, record: &CharacterRecord) {
        self.name = record.name.clone();
        self.level = record.level;
        self.class = record.class;
        self.gender = record.gender;
        self.zone_id = record.zone_id;
        self.account_id = record.account_id;
        self.logout_time = record.logout_time;
    }

    /// Loaded stats must be sane or the member is dropped at load.
    pub fn check_stats(&self) -> bool {
        if self.level < 1 {
            tracing::error!(
                "[guild] member {} ({}) has level below 1, deleting from roster",
                self.name,
                self.guid
            );
            return false;
        }
        if self.class < 1 || self.class > 11 {
            tracing::error!(
                "[guild] member {} ({}) has bad class {}, deleting from roster",
                self.name,
                self.guid,
                self.class
            );
            return false;
        }
        true
    }

    pub fn is_online(&self) -> bool {
        self.flags & status::ONLINE != 0
    }

    pub fn is_rank(&self, rank_id: u8) -> bool {
        self.rank_id == rank_id
    }

    /// Lower rank id means higher standing.
    pub fn is_rank_not_lower_than(&self, rank_id: u8) -> bool {
        self.rank_id <= rank_id
    }

    pub fn public_note(&self) -> &str {
        &self.public_note
    }

    pub fn officer_note(&self) -> &str {
        &self.officer_note
    }

    pub fn change_rank(&mut self, store: &mut dyn GuildStore, rank_id: u8) -> Result<(), StoreError> {
        if self.rank_id == rank_id {
            return Ok(());
        }
        self.rank_id = rank_id;
        store.execute(Statement::UpdateMemberRank {
            player_guid: self.guid,
            rank_id,
        })
    }

    pub fn set_public_note(
        &mut self,
        store: &mut dyn GuildStore,
        note: &str,
    ) -> Result<(), StoreError> {
        if self.public_note == note {
            return Ok(());
        }
        self.public_note = note.to_string();
        store.execute(Statement::UpdateMemberPublicNote {
            player_guid: self.guid,
            note: self.public_note.clone(),
        })
    }

    pub fn set_officer_note(
        &mut self,
        store: &mut dyn GuildStore,
        note: &str,
    ) -> Result<(), StoreError> {
        if self.officer_note == note {
            return Ok(());
        }
        self.officer_note = note.to_string();
        store.execute(Statement::UpdateMemberOfficerNote {
            player_guid: self.guid,
            note: self.officer_note.clone(),
        })
    }

    /// Count a withdrawal against today's allowance and stage the row.
    pub fn update_bank_withdraw_value(&mut self, trans: &mut Transaction, slot: usize, amount: u32) {
        if let Some(counter) = self.bank_withdraw.get_mut(slot) {
            *counter = counter.saturating_add(amount);
        }
        trans.append(Statement::UpsertMemberWithdraw {
            player_guid: self.guid,
            withdraw: self.bank_withdraw,
        });
    }

    /// Daily reset: zero all counters.
    pub fn reset_values(&mut self, trans: &mut Transaction) {
        self.bank_withdraw = [0; WITHDRAW_SLOTS];
        trans.append(Statement::UpsertMemberWithdraw {
            player_guid: self.guid,
            withdraw: self.bank_withdraw,
        });
    }

    /// Today's consumed allowance for one tab (or the money slot).
    /// The guildmaster never consumes allowance.
    pub fn bank_withdraw_value(&self, slot: usize) -> u32 {
        if self.rank_id == RANK_GUILDMASTER {
            return WITHDRAW_UNLIMITED;
        }
        self.bank_withdraw.get(slot).copied().unwrap_or(0)
    }

    /// Stage the `guild_member` insert.
    pub fn stage_insert(&self, trans: &mut Transaction) {
        trans.append(Statement::InsertMember {
            guild_id: self.guild_id,
            player_guid: self.guid,
            rank_id: self.rank_id,
            public_note: self.public_note.clone(),
            officer_note: self.officer_note.clone(),
        });
    }
}
