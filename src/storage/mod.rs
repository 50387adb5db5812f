//! Persistent store contract for the guild subsystem.
//!
//! Handlers never build SQL. They describe row writes with [`Statement`]
//! values, either fired individually through [`GuildStore::execute`] or
//! batched into a [`Transaction`] committed all-or-nothing. Hydration goes
//! the other way through the `load_*` queries, which return plain record
//! structs the aggregate rebuilds itself from.

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

use thiserror::Error;

use crate::guild::emblem::EmblemInfo;
use crate::item::Item;
use crate::{GuildId, PlayerGuid};

/// Per-tab slot in the member withdrawal counter array: six item tabs plus
/// the money counter at the last index.
pub const WITHDRAW_SLOTS: usize = 7;

/// Why a store operation failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQL driver error.
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Store-level failure with no driver cause (memory store, audits).
    #[error("{0}")]
    Failed(String),
}

/// One row write against the guild schema.
///
/// Statements carry owned values so a batch can outlive the aggregate
/// borrow that produced it.
#[derive(Debug, Clone)]
pub enum Statement {
    // guild
    InsertGuild {
        id: GuildId,
        name: String,
        leader_guid: PlayerGuid,
        info: String,
        motd: String,
        created: i64,
        emblem: EmblemInfo,
        bank_money: u64,
    },
    DeleteGuild {
        id: GuildId,
    },
    UpdateGuildName {
        id: GuildId,
        name: String,
    },
    UpdateGuildMotd {
        id: GuildId,
        motd: String,
    },
    UpdateGuildInfo {
        id: GuildId,
        info: String,
    },
    UpdateGuildLeader {
        id: GuildId,
        leader_guid: PlayerGuid,
    },
    UpdateGuildEmblem {
        id: GuildId,
        emblem: EmblemInfo,
    },
    UpdateGuildBankMoney {
        id: GuildId,
        bank_money: u64,
    },

    // guild_rank
    InsertRank {
        guild_id: GuildId,
        rank_id: u8,
        name: String,
        rights: u32,
        money_per_day: u32,
    },
    DeleteRanks {
        guild_id: GuildId,
    },
    /// Delete every rank with id >= `rank_id` (ladder truncation).
    DeleteRanksFrom {
        guild_id: GuildId,
        rank_id: u8,
    },
    UpdateRankName {
        guild_id: GuildId,
        rank_id: u8,
        name: String,
    },
    UpdateRankRights {
        guild_id: GuildId,
        rank_id: u8,
        rights: u32,
    },
    UpdateRankMoney {
        guild_id: GuildId,
        rank_id: u8,
        money_per_day: u32,
    },

    // guild_bank_right
    InsertBankRight {
        guild_id: GuildId,
        tab_id: u8,
        rank_id: u8,
        rights: u8,
        slots_per_day: u32,
    },
    DeleteBankRights {
        guild_id: GuildId,
    },
    DeleteBankRightsForRank {
        guild_id: GuildId,
        rank_id: u8,
    },

    // guild_member
    InsertMember {
        guild_id: GuildId,
        player_guid: PlayerGuid,
        rank_id: u8,
        public_note: String,
        officer_note: String,
    },
    DeleteMember {
        player_guid: PlayerGuid,
    },
    DeleteMembers {
        guild_id: GuildId,
    },
    UpdateMemberRank {
        player_guid: PlayerGuid,
        rank_id: u8,
    },
    UpdateMemberPublicNote {
        player_guid: PlayerGuid,
        note: String,
    },
    UpdateMemberOfficerNote {
        player_guid: PlayerGuid,
        note: String,
    },
    UpsertMemberWithdraw {
        player_guid: PlayerGuid,
        withdraw: [u32; WITHDRAW_SLOTS],
    },

    // guild_bank_tab
    InsertBankTab {
        guild_id: GuildId,
        tab_id: u8,
    },
    DeleteBankTabs {
        guild_id: GuildId,
    },
    UpdateBankTabInfo {
        guild_id: GuildId,
        tab_id: u8,
        name: String,
        icon: String,
    },
    UpdateBankTabText {
        guild_id: GuildId,
        tab_id: u8,
        text: String,
    },

    // guild_bank_item
    /// Upsert: replaces whatever occupies the slot.
    InsertBankItem {
        guild_id: GuildId,
        tab_id: u8,
        slot_id: u8,
        item: Item,
    },
    DeleteBankItem {
        guild_id: GuildId,
        tab_id: u8,
        slot_id: u8,
    },
    DeleteBankItems {
        guild_id: GuildId,
    },

    // guild_eventlog
    DeleteEventLog {
        guild_id: GuildId,
        guid: u32,
    },
    InsertEventLog(EventLogRecord),
    DeleteEventLogs {
        guild_id: GuildId,
    },

    // guild_bank_eventlog
    DeleteBankEventLog {
        guild_id: GuildId,
        tab_id: u8,
        guid: u32,
    },
    InsertBankEventLog(BankEventLogRecord),
    DeleteBankEventLogs {
        guild_id: GuildId,
    },

    // character side-effects the bank protocol triggers
    SavePlayerMoney {
        player_guid: PlayerGuid,
        money: u64,
    },
    /// Marker for the player-side half of an item move; the character
    /// server owns the actual inventory rows.
    SavePlayerInventory {
        player_guid: PlayerGuid,
    },
}

/// A batch of statements committed atomically.
#[derive(Debug, Default)]
pub struct Transaction {
    statements: Vec<Statement>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, stmt: Statement) {
        self.statements.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

// ============================================
// Hydration records
// ============================================

/// `guild` row.
#[derive(Debug, Clone)]
pub struct GuildRecord {
    pub id: GuildId,
    pub name: String,
    pub leader_guid: PlayerGuid,
    pub info: String,
    pub motd: String,
    pub created: i64,
    pub emblem: EmblemInfo,
    pub bank_money: u64,
    /// Tab count derived from `guild_bank_tab` rows.
    pub purchased_tabs: u8,
}

/// `guild_rank` row.
#[derive(Debug, Clone)]
pub struct RankRecord {
    pub guild_id: GuildId,
    pub rank_id: u8,
    pub name: String,
    pub rights: u32,
    pub money_per_day: u32,
}

/// `guild_bank_right` row.
#[derive(Debug, Clone)]
pub struct BankRightRecord {
    pub guild_id: GuildId,
    pub tab_id: u8,
    pub rank_id: u8,
    pub rights: u8,
    pub slots_per_day: u32,
}

/// `guild_member` row joined with the cached character columns.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub guild_id: GuildId,
    pub player_guid: PlayerGuid,
    pub rank_id: u8,
    pub public_note: String,
    pub officer_note: String,
    pub name: String,
    pub level: u8,
    pub class: u8,
    pub gender: u8,
    pub zone_id: u32,
    pub account_id: u32,
    pub logout_time: i64,
    pub withdraw: [u32; WITHDRAW_SLOTS],
}

/// `guild_bank_tab` row.
#[derive(Debug, Clone)]
pub struct BankTabRecord {
    pub guild_id: GuildId,
    pub tab_id: u8,
    pub name: String,
    pub icon: String,
    pub text: String,
}

/// `guild_bank_item` row.
#[derive(Debug, Clone)]
pub struct BankItemRecord {
    pub guild_id: GuildId,
    pub tab_id: u8,
    pub slot_id: u8,
    pub item: Item,
}

/// `guild_eventlog` row.
#[derive(Debug, Clone)]
pub struct EventLogRecord {
    pub guild_id: GuildId,
    pub guid: u32,
    pub event_type: u8,
    pub player_guid_1: PlayerGuid,
    pub player_guid_2: PlayerGuid,
    pub new_rank: u8,
    pub timestamp: i64,
}

/// `guild_bank_eventlog` row. `tab_id` 100 holds the money log.
#[derive(Debug, Clone)]
pub struct BankEventLogRecord {
    pub guild_id: GuildId,
    pub guid: u32,
    pub tab_id: u8,
    pub event_type: u8,
    pub player_guid: PlayerGuid,
    pub item_entry: u32,
    pub item_count: u32,
    pub dest_tab_id: u8,
    pub money: u64,
    pub timestamp: i64,
}

/// Character stats fetched when adding an offline member.
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub guid: PlayerGuid,
    pub name: String,
    pub level: u8,
    pub class: u8,
    pub gender: u8,
    pub zone_id: u32,
    pub account_id: u32,
    pub logout_time: i64,
}

/// Blocking store the guild aggregate persists through.
///
/// Queries take `&self`, writes take `&mut self`; the single-writer rule
/// for the aggregate extends to its store handle.
pub trait GuildStore {
    /// Fire one statement outside any transaction.
    fn execute(&mut self, stmt: Statement) -> Result<(), StoreError>;

    /// Commit a batch atomically.
    fn commit(&mut self, trans: Transaction) -> Result<(), StoreError>;

    fn load_guild(&self, guild_id: GuildId) -> Result<Option<GuildRecord>, StoreError>;
    fn load_ranks(&self, guild_id: GuildId) -> Result<Vec<RankRecord>, StoreError>;
    fn load_bank_rights(&self, guild_id: GuildId) -> Result<Vec<BankRightRecord>, StoreError>;
    fn load_members(&self, guild_id: GuildId) -> Result<Vec<MemberRecord>, StoreError>;
    fn load_bank_tabs(&self, guild_id: GuildId) -> Result<Vec<BankTabRecord>, StoreError>;
    fn load_bank_items(&self, guild_id: GuildId) -> Result<Vec<BankItemRecord>, StoreError>;

    /// Event log rows newest-first, at most `limit` of them.
    fn load_event_log(
        &self,
        guild_id: GuildId,
        limit: u32,
    ) -> Result<Vec<EventLogRecord>, StoreError>;

    /// Bank event log rows for one tab newest-first, at most `limit`.
    fn load_bank_event_log(
        &self,
        guild_id: GuildId,
        tab_id: u8,
        limit: u32,
    ) -> Result<Vec<BankEventLogRecord>, StoreError>;

    /// Character stats for invite-while-offline and stat refresh.
    fn character_for_guild(
        &self,
        player_guid: PlayerGuid,
    ) -> Result<Option<CharacterRecord>, StoreError>;
}
