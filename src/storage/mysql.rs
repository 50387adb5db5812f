//! MySQL store for the guild schema.
//!
//! The aggregate is synchronous, so this store owns a dedicated
//! current-thread tokio runtime and blocks on every pool call. Pool
//! connections are bound to a reactor; reusing the same runtime keeps pool
//! I/O registered with the correct reactor.

use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{MySqlPool, Row};
use tokio::runtime::Runtime;

use super::{
    BankEventLogRecord, BankItemRecord, BankRightRecord, BankTabRecord, CharacterRecord,
    EventLogRecord, GuildRecord, GuildStore, MemberRecord, RankRecord, Statement, StoreError,
    Transaction, WITHDRAW_SLOTS,
};
use crate::guild::emblem::EmblemInfo;
use crate::item::Item;
use crate::{GuildId, PlayerGuid};

/// [`GuildStore`] backed by the character database.
pub struct MySqlStore {
    rt: Runtime,
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect to the character database.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Failed(format!("runtime init failed: {}", e)))?;
        let pool = rt.block_on(MySqlPool::connect(url))?;
        tracing::info!("[guild_db] connected to character database");
        Ok(Self { rt, pool })
    }
}

async fn exec(conn: &mut MySqlConnection, stmt: &Statement) -> Result<(), sqlx::Error> {
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
            sqlx::query(
                "INSERT INTO guild (guildid, name, leaderguid, info, motd, createdate, \
                 EmblemStyle, EmblemColor, BorderStyle, BorderColor, BackgroundColor, BankMoney) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(leader_guid)
            .bind(info)
            .bind(motd)
            .bind(created)
            .bind(emblem.style)
            .bind(emblem.color)
            .bind(emblem.border_style)
            .bind(emblem.border_color)
            .bind(emblem.background_color)
            .bind(bank_money)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteGuild { id } => {
            sqlx::query("DELETE FROM guild WHERE guildid = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateGuildName { id, name } => {
            sqlx::query("UPDATE guild SET name = ? WHERE guildid = ?")
                .bind(name)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateGuildMotd { id, motd } => {
            sqlx::query("UPDATE guild SET motd = ? WHERE guildid = ?")
                .bind(motd)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateGuildInfo { id, info } => {
            sqlx::query("UPDATE guild SET info = ? WHERE guildid = ?")
                .bind(info)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateGuildLeader { id, leader_guid } => {
            sqlx::query("UPDATE guild SET leaderguid = ? WHERE guildid = ?")
                .bind(leader_guid)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateGuildEmblem { id, emblem } => {
            sqlx::query(
                "UPDATE guild SET EmblemStyle = ?, EmblemColor = ?, BorderStyle = ?, \
                 BorderColor = ?, BackgroundColor = ? WHERE guildid = ?",
            )
            .bind(emblem.style)
            .bind(emblem.color)
            .bind(emblem.border_style)
            .bind(emblem.border_color)
            .bind(emblem.background_color)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        }
        Statement::UpdateGuildBankMoney { id, bank_money } => {
            sqlx::query("UPDATE guild SET BankMoney = ? WHERE guildid = ?")
                .bind(bank_money)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::InsertRank {
            guild_id,
            rank_id,
            name,
            rights,
            money_per_day,
        } => {
            sqlx::query(
                "REPLACE INTO guild_rank (guildid, rid, rname, rights, BankMoneyPerDay) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(guild_id)
            .bind(rank_id)
            .bind(name)
            .bind(rights)
            .bind(money_per_day)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteRanks { guild_id } => {
            sqlx::query("DELETE FROM guild_rank WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::DeleteRanksFrom { guild_id, rank_id } => {
            sqlx::query("DELETE FROM guild_rank WHERE guildid = ? AND rid >= ?")
                .bind(guild_id)
                .bind(rank_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateRankName {
            guild_id,
            rank_id,
            name,
        } => {
            sqlx::query("UPDATE guild_rank SET rname = ? WHERE guildid = ? AND rid = ?")
                .bind(name)
                .bind(guild_id)
                .bind(rank_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateRankRights {
            guild_id,
            rank_id,
            rights,
        } => {
            sqlx::query("UPDATE guild_rank SET rights = ? WHERE guildid = ? AND rid = ?")
                .bind(rights)
                .bind(guild_id)
                .bind(rank_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateRankMoney {
            guild_id,
            rank_id,
            money_per_day,
        } => {
            sqlx::query("UPDATE guild_rank SET BankMoneyPerDay = ? WHERE guildid = ? AND rid = ?")
                .bind(money_per_day)
                .bind(guild_id)
                .bind(rank_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::InsertBankRight {
            guild_id,
            tab_id,
            rank_id,
            rights,
            slots_per_day,
        } => {
            sqlx::query(
                "REPLACE INTO guild_bank_right (guildid, TabId, rid, gbright, SlotPerDay) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(guild_id)
            .bind(tab_id)
            .bind(rank_id)
            .bind(rights)
            .bind(slots_per_day)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteBankRights { guild_id } => {
            sqlx::query("DELETE FROM guild_bank_right WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::DeleteBankRightsForRank { guild_id, rank_id } => {
            sqlx::query("DELETE FROM guild_bank_right WHERE guildid = ? AND rid = ?")
                .bind(guild_id)
                .bind(rank_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::InsertMember {
            guild_id,
            player_guid,
            rank_id,
            public_note,
            officer_note,
        } => {
            sqlx::query(
                "INSERT INTO guild_member (guildid, guid, `rank`, pnote, offnote) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(guild_id)
            .bind(player_guid)
            .bind(rank_id)
            .bind(public_note)
            .bind(officer_note)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteMember { player_guid } => {
            sqlx::query("DELETE FROM guild_member WHERE guid = ?")
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM guild_member_withdraw WHERE guid = ?")
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::DeleteMembers { guild_id } => {
            sqlx::query(
                "DELETE FROM guild_member_withdraw \
                 WHERE guid IN (SELECT guid FROM guild_member WHERE guildid = ?)",
            )
            .bind(guild_id)
            .execute(&mut *conn)
            .await?;
            sqlx::query("DELETE FROM guild_member WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateMemberRank {
            player_guid,
            rank_id,
        } => {
            sqlx::query("UPDATE guild_member SET `rank` = ? WHERE guid = ?")
                .bind(rank_id)
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateMemberPublicNote { player_guid, note } => {
            sqlx::query("UPDATE guild_member SET pnote = ? WHERE guid = ?")
                .bind(note)
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateMemberOfficerNote { player_guid, note } => {
            sqlx::query("UPDATE guild_member SET offnote = ? WHERE guid = ?")
                .bind(note)
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpsertMemberWithdraw {
            player_guid,
            withdraw,
        } => {
            sqlx::query(
                "REPLACE INTO guild_member_withdraw (guid, tab0, tab1, tab2, tab3, tab4, tab5, money) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(player_guid)
            .bind(withdraw[0])
            .bind(withdraw[1])
            .bind(withdraw[2])
            .bind(withdraw[3])
            .bind(withdraw[4])
            .bind(withdraw[5])
            .bind(withdraw[6])
            .execute(&mut *conn)
            .await?;
        }

        Statement::InsertBankTab { guild_id, tab_id } => {
            sqlx::query(
                "INSERT INTO guild_bank_tab (guildid, TabId, TabName, TabIcon, TabText) \
                 VALUES (?, ?, '', '', '')",
            )
            .bind(guild_id)
            .bind(tab_id)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteBankTabs { guild_id } => {
            sqlx::query("DELETE FROM guild_bank_tab WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }
        Statement::UpdateBankTabInfo {
            guild_id,
            tab_id,
            name,
            icon,
        } => {
            sqlx::query(
                "UPDATE guild_bank_tab SET TabName = ?, TabIcon = ? WHERE guildid = ? AND TabId = ?",
            )
            .bind(name)
            .bind(icon)
            .bind(guild_id)
            .bind(tab_id)
            .execute(&mut *conn)
            .await?;
        }
        Statement::UpdateBankTabText {
            guild_id,
            tab_id,
            text,
        } => {
            sqlx::query("UPDATE guild_bank_tab SET TabText = ? WHERE guildid = ? AND TabId = ?")
                .bind(text)
                .bind(guild_id)
                .bind(tab_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::InsertBankItem {
            guild_id,
            tab_id,
            slot_id,
            item,
        } => {
            sqlx::query(
                "REPLACE INTO guild_bank_item \
                 (guildid, TabId, SlotId, item_guid, item_entry, item_count, max_stack, soulbound, duration) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(guild_id)
            .bind(tab_id)
            .bind(slot_id)
            .bind(item.guid)
            .bind(item.entry)
            .bind(item.count)
            .bind(item.max_stack)
            .bind(item.soulbound)
            .bind(item.duration)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteBankItem {
            guild_id,
            tab_id,
            slot_id,
        } => {
            sqlx::query(
                "DELETE FROM guild_bank_item WHERE guildid = ? AND TabId = ? AND SlotId = ?",
            )
            .bind(guild_id)
            .bind(tab_id)
            .bind(slot_id)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteBankItems { guild_id } => {
            sqlx::query("DELETE FROM guild_bank_item WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::DeleteEventLog { guild_id, guid } => {
            sqlx::query("DELETE FROM guild_eventlog WHERE guildid = ? AND LogGuid = ?")
                .bind(guild_id)
                .bind(guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::InsertEventLog(record) => {
            sqlx::query(
                "INSERT INTO guild_eventlog \
                 (guildid, LogGuid, EventType, PlayerGuid1, PlayerGuid2, NewRank, TimeStamp) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.guild_id)
            .bind(record.guid)
            .bind(record.event_type)
            .bind(record.player_guid_1)
            .bind(record.player_guid_2)
            .bind(record.new_rank)
            .bind(record.timestamp)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteEventLogs { guild_id } => {
            sqlx::query("DELETE FROM guild_eventlog WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::DeleteBankEventLog {
            guild_id,
            tab_id,
            guid,
        } => {
            sqlx::query(
                "DELETE FROM guild_bank_eventlog WHERE guildid = ? AND TabId = ? AND LogGuid = ?",
            )
            .bind(guild_id)
            .bind(tab_id)
            .bind(guid)
            .execute(&mut *conn)
            .await?;
        }
        Statement::InsertBankEventLog(record) => {
            sqlx::query(
                "INSERT INTO guild_bank_eventlog \
                 (guildid, LogGuid, TabId, EventType, PlayerGuid, ItemEntry, ItemStackCount, \
                 DestTabId, Money, TimeStamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.guild_id)
            .bind(record.guid)
            .bind(record.tab_id)
            .bind(record.event_type)
            .bind(record.player_guid)
            .bind(record.item_entry)
            .bind(record.item_count)
            .bind(record.dest_tab_id)
            .bind(record.money)
            .bind(record.timestamp)
            .execute(&mut *conn)
            .await?;
        }
        Statement::DeleteBankEventLogs { guild_id } => {
            sqlx::query("DELETE FROM guild_bank_eventlog WHERE guildid = ?")
                .bind(guild_id)
                .execute(&mut *conn)
                .await?;
        }

        Statement::SavePlayerMoney { player_guid, money } => {
            sqlx::query("UPDATE characters SET money = ? WHERE guid = ?")
                .bind(money)
                .bind(player_guid)
                .execute(&mut *conn)
                .await?;
        }
        Statement::SavePlayerInventory { .. } => {
            // Inventory rows are owned by the character server; the marker
            // only orders the move inside the same transaction.
        }
    }
    Ok(())
}

fn member_from_row(row: &MySqlRow, guild_id: GuildId) -> Result<MemberRecord, sqlx::Error> {
    let mut withdraw = [0u32; WITHDRAW_SLOTS];
    for (i, slot) in withdraw.iter_mut().enumerate() {
        *slot = row.try_get::<Option<u32>, _>(12 + i)?.unwrap_or(0);
    }
    Ok(MemberRecord {
        guild_id,
        player_guid: row.try_get(0)?,
        rank_id: row.try_get(1)?,
        public_note: row.try_get(2)?,
        officer_note: row.try_get(3)?,
        name: row.try_get::<Option<String>, _>(4)?.unwrap_or_default(),
        level: row.try_get::<Option<u8>, _>(5)?.unwrap_or(0),
        class: row.try_get::<Option<u8>, _>(6)?.unwrap_or(0),
        gender: row.try_get::<Option<u8>, _>(7)?.unwrap_or(0),
        zone_id: row.try_get::<Option<u32>, _>(8)?.unwrap_or(0),
        account_id: row.try_get::<Option<u32>, _>(9)?.unwrap_or(0),
        logout_time: row.try_get::<Option<i64>, _>(10)?.unwrap_or(0),
        withdraw,
    })
    // index 11 is the withdraw-row guid, skipped
}

impl GuildStore for MySqlStore {
    fn execute(&mut self, stmt: Statement) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut conn = self.pool.acquire().await?;
            exec(&mut conn, &stmt).await
        })?;
        Ok(())
    }

    fn commit(&mut self, trans: Transaction) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for stmt in trans.statements() {
                exec(&mut *tx, stmt).await?;
            }
            tx.commit().await
        })?;
        Ok(())
    }

    fn load_guild(&self, guild_id: GuildId) -> Result<Option<GuildRecord>, StoreError> {
        let row = self.rt.block_on(
            sqlx::query(
                "SELECT name, leaderguid, info, motd, createdate, EmblemStyle, EmblemColor, \
                 BorderStyle, BorderColor, BackgroundColor, BankMoney, \
                 (SELECT COUNT(*) FROM guild_bank_tab t WHERE t.guildid = g.guildid) \
                 FROM guild g WHERE guildid = ?",
            )
            .bind(guild_id)
            .fetch_optional(&self.pool),
        )?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(GuildRecord {
            id: guild_id,
            name: row.try_get(0)?,
            leader_guid: row.try_get(1)?,
            info: row.try_get(2)?,
            motd: row.try_get(3)?,
            created: row.try_get(4)?,
            emblem: EmblemInfo {
                style: row.try_get(5)?,
                color: row.try_get(6)?,
                border_style: row.try_get(7)?,
                border_color: row.try_get(8)?,
                background_color: row.try_get(9)?,
            },
            bank_money: row.try_get(10)?,
            purchased_tabs: row.try_get::<i64, _>(11)? as u8,
        }))
    }

    fn load_ranks(&self, guild_id: GuildId) -> Result<Vec<RankRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT rid, rname, rights, BankMoneyPerDay FROM guild_rank \
                 WHERE guildid = ? ORDER BY rid",
            )
            .bind(guild_id)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(RankRecord {
                guild_id,
                rank_id: row.try_get(0)?,
                name: row.try_get(1)?,
                rights: row.try_get(2)?,
                money_per_day: row.try_get(3)?,
            });
        }
        Ok(records)
    }

    fn load_bank_rights(&self, guild_id: GuildId) -> Result<Vec<BankRightRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT TabId, rid, gbright, SlotPerDay FROM guild_bank_right WHERE guildid = ?",
            )
            .bind(guild_id)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(BankRightRecord {
                guild_id,
                tab_id: row.try_get(0)?,
                rank_id: row.try_get(1)?,
                rights: row.try_get(2)?,
                slots_per_day: row.try_get(3)?,
            });
        }
        Ok(records)
    }

    fn load_members(&self, guild_id: GuildId) -> Result<Vec<MemberRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT m.guid, m.`rank`, m.pnote, m.offnote, \
                 c.name, c.level, c.class, c.gender, c.zone, c.account, c.logout_time, \
                 w.guid, w.tab0, w.tab1, w.tab2, w.tab3, w.tab4, w.tab5, w.money \
                 FROM guild_member m \
                 LEFT JOIN characters c ON c.guid = m.guid \
                 LEFT JOIN guild_member_withdraw w ON w.guid = m.guid \
                 WHERE m.guildid = ?",
            )
            .bind(guild_id)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(member_from_row(&row, guild_id)?);
        }
        Ok(records)
    }

    fn load_bank_tabs(&self, guild_id: GuildId) -> Result<Vec<BankTabRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT TabId, TabName, TabIcon, TabText FROM guild_bank_tab \
                 WHERE guildid = ? ORDER BY TabId",
            )
            .bind(guild_id)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(BankTabRecord {
                guild_id,
                tab_id: row.try_get(0)?,
                name: row.try_get(1)?,
                icon: row.try_get(2)?,
                text: row.try_get(3)?,
            });
        }
        Ok(records)
    }

    fn load_bank_items(&self, guild_id: GuildId) -> Result<Vec<BankItemRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT TabId, SlotId, item_guid, item_entry, item_count, max_stack, \
                 soulbound, duration FROM guild_bank_item WHERE guildid = ?",
            )
            .bind(guild_id)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(BankItemRecord {
                guild_id,
                tab_id: row.try_get(0)?,
                slot_id: row.try_get(1)?,
                item: Item {
                    guid: row.try_get(2)?,
                    entry: row.try_get(3)?,
                    count: row.try_get(4)?,
                    max_stack: row.try_get(5)?,
                    soulbound: row.try_get(6)?,
                    duration: row.try_get(7)?,
                },
            });
        }
        Ok(records)
    }

    fn load_event_log(
        &self,
        guild_id: GuildId,
        limit: u32,
    ) -> Result<Vec<EventLogRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT LogGuid, EventType, PlayerGuid1, PlayerGuid2, NewRank, TimeStamp \
                 FROM guild_eventlog WHERE guildid = ? \
                 ORDER BY TimeStamp DESC, LogGuid DESC LIMIT ?",
            )
            .bind(guild_id)
            .bind(limit)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(EventLogRecord {
                guild_id,
                guid: row.try_get(0)?,
                event_type: row.try_get(1)?,
                player_guid_1: row.try_get(2)?,
                player_guid_2: row.try_get(3)?,
                new_rank: row.try_get(4)?,
                timestamp: row.try_get(5)?,
            });
        }
        Ok(records)
    }

    fn load_bank_event_log(
        &self,
        guild_id: GuildId,
        tab_id: u8,
        limit: u32,
    ) -> Result<Vec<BankEventLogRecord>, StoreError> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT LogGuid, EventType, PlayerGuid, ItemEntry, ItemStackCount, DestTabId, \
                 Money, TimeStamp FROM guild_bank_eventlog \
                 WHERE guildid = ? AND TabId = ? \
                 ORDER BY TimeStamp DESC, LogGuid DESC LIMIT ?",
            )
            .bind(guild_id)
            .bind(tab_id)
            .bind(limit)
            .fetch_all(&self.pool),
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(BankEventLogRecord {
                guild_id,
                guid: row.try_get(0)?,
                tab_id,
                event_type: row.try_get(1)?,
                player_guid: row.try_get(2)?,
                item_entry: row.try_get(3)?,
                item_count: row.try_get(4)?,
                dest_tab_id: row.try_get(5)?,
                money: row.try_get(6)?,
                timestamp: row.try_get(7)?,
            });
        }
        Ok(records)
    }

    fn character_for_guild(
        &self,
        player_guid: PlayerGuid,
    ) -> Result<Option<CharacterRecord>, StoreError> {
        let row = self.rt.block_on(
            sqlx::query(
                "SELECT name, level, class, gender, zone, account, logout_time \
                 FROM characters WHERE guid = ?",
            )
            .bind(player_guid)
            .fetch_optional(&self.pool),
        )?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(CharacterRecord {
            guid: player_guid,
            name: row.try_get(0)?,
            level: row.try_get(1)?,
            class: row.try_get(2)?,
            gender: row.try_get(3)?,
            zone_id: row.try_get(4)?,
            account_id: row.try_get(5)?,
            logout_time: row.try_get(6)?,
        }))
    }
}
