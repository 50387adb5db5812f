//! In-memory store backing tests and offline tools.
//!
//! Keeps one map per table and counts applied writes so tests can observe
//! that unchanged setters skip the store entirely.

use std::collections::{BTreeMap, HashMap};

use super::{
    BankEventLogRecord, BankItemRecord, BankRightRecord, BankTabRecord, CharacterRecord,
    EventLogRecord, GuildRecord, GuildStore, MemberRecord, RankRecord, Statement, StoreError,
    Transaction, WITHDRAW_SLOTS,
};
use crate::guild::emblem::EmblemInfo;
use crate::item::Item;
use crate::{GuildId, PlayerGuid};

#[derive(Debug, Clone)]
struct GuildRow {
    name: String,
    leader_guid: PlayerGuid,
    info: String,
    motd: String,
    created: i64,
    emblem: EmblemInfo,
    bank_money: u64,
}

#[derive(Debug, Clone)]
struct MemberRow {
    guild_id: GuildId,
    rank_id: u8,
    public_note: String,
    officer_note: String,
}

/// Map-backed [`GuildStore`]. Writes are infallible.
#[derive(Debug, Default)]
pub struct MemoryStore {
    guilds: BTreeMap<GuildId, GuildRow>,
    ranks: BTreeMap<(GuildId, u8), RankRecord>,
    bank_rights: BTreeMap<(GuildId, u8, u8), BankRightRecord>,
    members: BTreeMap<PlayerGuid, MemberRow>,
    member_withdraw: HashMap<PlayerGuid, [u32; WITHDRAW_SLOTS]>,
    bank_tabs: BTreeMap<(GuildId, u8), BankTabRecord>,
    bank_items: BTreeMap<(GuildId, u8, u8), Item>,
    event_logs: BTreeMap<(GuildId, u32), EventLogRecord>,
    bank_event_logs: BTreeMap<(GuildId, u8, u32), BankEventLogRecord>,
    characters: HashMap<PlayerGuid, CharacterRecord>,
    /// Applied statement count, for observing write suppression in tests.
    pub write_count: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a character row so `character_for_guild` can resolve it.
    pub fn put_character(&mut self, record: CharacterRecord) {
        self.characters.insert(record.guid, record);
    }

    /// Number of bank item rows currently stored for a guild.
    pub fn bank_item_count(&self, guild_id: GuildId) -> usize {
        self.bank_items
            .keys()
            .filter(|(gid, _, _)| *gid == guild_id)
            .count()
    }

    fn apply(&mut self, stmt: Statement) {
        self.write_count += 1;
        match stmt {
            Statement::InsertGuild {
                id,
                name,
                leader_guid,
                info,
                motd,
                created,
                emblem,
                bank_money,
            } => {
                self.guilds.insert(
                    id,
                    GuildRow {
                        name,
                        leader_guid,
                        info,
                        motd,
                        created,
                        emblem,
                        bank_money,
                    },
                );
            }
            Statement::DeleteGuild { id } => {
                self.guilds.remove(&id);
            }
            Statement::UpdateGuildName { id, name } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.name = name;
                }
            }
            Statement::UpdateGuildMotd { id, motd } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.motd = motd;
                }
            }
            Statement::UpdateGuildInfo { id, info } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.info = info;
                }
            }
            Statement::UpdateGuildLeader { id, leader_guid } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.leader_guid = leader_guid;
                }
            }
            Statement::UpdateGuildEmblem { id, emblem } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.emblem = emblem;
                }
            }
            Statement::UpdateGuildBankMoney { id, bank_money } => {
                if let Some(row) = self.guilds.get_mut(&id) {
                    row.bank_money = bank_money;
                }
            }

            Statement::InsertRank {
                guild_id,
                rank_id,
                name,
                rights,
                money_per_day,
            } => {
                self.ranks.insert(
                    (guild_id, rank_id),
                    RankRecord {
                        guild_id,
                        rank_id,
                        name,
                        rights,
                        money_per_day,
                    },
                );
            }
            Statement::DeleteRanks { guild_id } => {
                self.ranks.retain(|(gid, _), _| *gid != guild_id);
            }
            Statement::DeleteRanksFrom { guild_id, rank_id } => {
                self.ranks
                    .retain(|(gid, rid), _| *gid != guild_id || *rid < rank_id);
            }
            Statement::UpdateRankName {
                guild_id,
                rank_id,
                name,
            } => {
                if let Some(row) = self.ranks.get_mut(&(guild_id, rank_id)) {
                    row.name = name;
                }
            }
            Statement::UpdateRankRights {
                guild_id,
                rank_id,
                rights,
            } => {
                if let Some(row) = self.ranks.get_mut(&(guild_id, rank_id)) {
                    row.rights = rights;
                }
            }
            Statement::UpdateRankMoney {
                guild_id,
                rank_id,
                money_per_day,
            } => {
                if let Some(row) = self.ranks.get_mut(&(guild_id, rank_id)) {
                    row.money_per_day = money_per_day;
                }
            }

            Statement::InsertBankRight {
                guild_id,
                tab_id,
                rank_id,
                rights,
                slots_per_day,
            } => {
                self.bank_rights.insert(
                    (guild_id, tab_id, rank_id),
                    BankRightRecord {
                        guild_id,
                        tab_id,
                        rank_id,
                        rights,
                        slots_per_day,
                    },
                );
            }
            Statement::DeleteBankRights { guild_id } => {
                self.bank_rights.retain(|(gid, _, _), _| *gid != guild_id);
            }
            Statement::DeleteBankRightsForRank { guild_id, rank_id } => {
                self.bank_rights
                    .retain(|(gid, _, rid), _| *gid != guild_id || *rid != rank_id);
            }

            Statement::InsertMember {
                guild_id,
                player_guid,
                rank_id,
                public_note,
                officer_note,
            } => {
                self.members.insert(
                    player_guid,
                    MemberRow {
                        guild_id,
                        rank_id,
                        public_note,
                        officer_note,
                    },
                );
            }
            Statement::DeleteMember { player_guid } => {
                self.members.remove(&player_guid);
                self.member_withdraw.remove(&player_guid);
            }
            Statement::DeleteMembers { guild_id } => {
                let gone: Vec<PlayerGuid> = self
                    .members
                    .iter()
                    .filter(|(_, row)| row.guild_id == guild_id)
                    .map(|(guid, _)| *guid)
                    .collect();
                for guid in gone {
                    self.members.remove(&guid);
                    self.member_withdraw.remove(&guid);
                }
            }
            Statement::UpdateMemberRank {
                player_guid,
                rank_id,
            } => {
                if let Some(row) = self.members.get_mut(&player_guid) {
                    row.rank_id = rank_id;
                }
            }
            Statement::UpdateMemberPublicNote { player_guid, note } => {
                if let Some(row) = self.members.get_mut(&player_guid) {
                    row.public_note = note;
                }
            }
            Statement::UpdateMemberOfficerNote { player_guid, note } => {
                if let Some(row) = self.members.get_mut(&player_guid) {
                    row.officer_note = note;
                }
            }
            Statement::UpsertMemberWithdraw {
                player_guid,
                withdraw,
            } => {
                self.member_withdraw.insert(player_guid, withdraw);
            }

            Statement::InsertBankTab { guild_id, tab_id } => {
                self.bank_tabs.insert(
                    (guild_id, tab_id),
                    BankTabRecord {
                        guild_id,
                        tab_id,
                        name: String::new(),
                        icon: String::new(),
                        text: String::new(),
                    },
                );
            }
            Statement::DeleteBankTabs { guild_id } => {
                self.bank_tabs.retain(|(gid, _), _| *gid != guild_id);
            }
            Statement::UpdateBankTabInfo {
                guild_id,
                tab_id,
                name,
                icon,
            } => {
                if let Some(row) = self.bank_tabs.get_mut(&(guild_id, tab_id)) {
                    row.name = name;
                    row.icon = icon;
                }
            }
            Statement::UpdateBankTabText {
                guild_id,
                tab_id,
                text,
            } => {
                if let Some(row) = self.bank_tabs.get_mut(&(guild_id, tab_id)) {
                    row.text = text;
                }
            }

            Statement::InsertBankItem {
                guild_id,
                tab_id,
                slot_id,
                item,
            } => {
                self.bank_items.insert((guild_id, tab_id, slot_id), item);
            }
            Statement::DeleteBankItem {
                guild_id,
                tab_id,
                slot_id,
            } => {
                self.bank_items.remove(&(guild_id, tab_id, slot_id));
            }
            Statement::DeleteBankItems { guild_id } => {
                self.bank_items.retain(|(gid, _, _), _| *gid != guild_id);
            }

            Statement::DeleteEventLog { guild_id, guid } => {
                self.event_logs.remove(&(guild_id, guid));
            }
            Statement::InsertEventLog(record) => {
                self.event_logs
                    .insert((record.guild_id, record.guid), record);
            }
            Statement::DeleteEventLogs { guild_id } => {
                self.event_logs.retain(|(gid, _), _| *gid != guild_id);
            }

            Statement::DeleteBankEventLog {
                guild_id,
                tab_id,
                guid,
            } => {
                self.bank_event_logs.remove(&(guild_id, tab_id, guid));
            }
            Statement::InsertBankEventLog(record) => {
                self.bank_event_logs
                    .insert((record.guild_id, record.tab_id, record.guid), record);
            }
            Statement::DeleteBankEventLogs { guild_id } => {
                self.bank_event_logs
                    .retain(|(gid, _, _), _| *gid != guild_id);
            }

            Statement::SavePlayerMoney { .. } | Statement::SavePlayerInventory { .. } => {
                // Character rows live elsewhere; nothing to mirror here.
            }
        }
    }
}

impl GuildStore for MemoryStore {
    fn execute(&mut self, stmt: Statement) -> Result<(), StoreError> {
        self.apply(stmt);
        Ok(())
    }

    fn commit(&mut self, trans: Transaction) -> Result<(), StoreError> {
        for stmt in trans.statements() {
            self.apply(stmt.clone());
        }
        Ok(())
    }

    fn load_guild(&self, guild_id: GuildId) -> Result<Option<GuildRecord>, StoreError> {
        let purchased_tabs = self
            .bank_tabs
            .keys()
            .filter(|(gid, _)| *gid == guild_id)
            .count() as u8;
        Ok(self.guilds.get(&guild_id).map(|row| GuildRecord {
            id: guild_id,
            name: row.name.clone(),
            leader_guid: row.leader_guid,
            info: row.info.clone(),
            motd: row.motd.clone(),
            created: row.created,
            emblem: row.emblem.clone(),
            bank_money: row.bank_money,
            purchased_tabs,
        }))
    }

    fn load_ranks(&self, guild_id: GuildId) -> Result<Vec<RankRecord>, StoreError> {
        Ok(self
            .ranks
            .range((guild_id, 0)..=(guild_id, u8::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn load_bank_rights(&self, guild_id: GuildId) -> Result<Vec<BankRightRecord>, StoreError> {
        Ok(self
            .bank_rights
            .iter()
            .filter(|((gid, _, _), _)| *gid == guild_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn load_members(&self, guild_id: GuildId) -> Result<Vec<MemberRecord>, StoreError> {
        let mut records = Vec::new();
        for (guid, row) in &self.members {
            if row.guild_id != guild_id {
                continue;
            }
            // Members whose character row is gone surface with zeroed
            // stats and get dropped by guild validation.
            let stats = self.characters.get(guid);
            let withdraw = self
                .member_withdraw
                .get(guid)
                .copied()
                .unwrap_or([0; WITHDRAW_SLOTS]);
            records.push(MemberRecord {
                guild_id,
                player_guid: *guid,
                rank_id: row.rank_id,
                public_note: row.public_note.clone(),
                officer_note: row.officer_note.clone(),
                name: stats.map(|c| c.name.clone()).unwrap_or_default(),
                level: stats.map(|c| c.level).unwrap_or(0),
                class: stats.map(|c| c.class).unwrap_or(0),
                gender: stats.map(|c| c.gender).unwrap_or(0),
                zone_id: stats.map(|c| c.zone_id).unwrap_or(0),
                account_id: stats.map(|c| c.account_id).unwrap_or(0),
                logout_time: stats.map(|c| c.logout_time).unwrap_or(0),
                withdraw,
            });
        }
        Ok(records)
    }

    fn load_bank_tabs(&self, guild_id: GuildId) -> Result<Vec<BankTabRecord>, StoreError> {
        Ok(self
            .bank_tabs
            .range((guild_id, 0)..=(guild_id, u8::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn load_bank_items(&self, guild_id: GuildId) -> Result<Vec<BankItemRecord>, StoreError> {
        Ok(self
            .bank_items
            .iter()
            .filter(|((gid, _, _), _)| *gid == guild_id)
            .map(|((_, tab_id, slot_id), item)| BankItemRecord {
                guild_id,
                tab_id: *tab_id,
                slot_id: *slot_id,
                item: item.clone(),
            })
            .collect())
    }

    fn load_event_log(
        &self,
        guild_id: GuildId,
        limit: u32,
    ) -> Result<Vec<EventLogRecord>, StoreError> {
        let mut rows: Vec<EventLogRecord> = self
            .event_logs
            .range((guild_id, 0)..=(guild_id, u32::MAX))
            .map(|(_, row)| row.clone())
            .collect();
        // Ring guids wrap, so recency is timestamp first
        rows.sort_by(|a, b| (b.timestamp, b.guid).cmp(&(a.timestamp, a.guid)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    fn load_bank_event_log(
        &self,
        guild_id: GuildId,
        tab_id: u8,
        limit: u32,
    ) -> Result<Vec<BankEventLogRecord>, StoreError> {
        let mut rows: Vec<BankEventLogRecord> = self
            .bank_event_logs
            .iter()
            .filter(|((gid, tid, _), _)| *gid == guild_id && *tid == tab_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by(|a, b| (b.timestamp, b.guid).cmp(&(a.timestamp, a.guid)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    fn character_for_guild(
        &self,
        player_guid: PlayerGuid,
    ) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.characters.get(&player_guid).cloned())
    }
}
