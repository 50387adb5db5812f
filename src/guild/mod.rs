//! The guild aggregate.
//!
//! One `Guild` owns its roster, rank ladder, bank tabs and audit logs, and
//! is driven by session-level handlers. Handlers validate rights first,
//! stage row writes through the store, and queue broadcasts the session
//! layer drains after the call returns. A single caller drives each guild;
//! there is no internal locking.

pub mod bank;
pub mod emblem;
pub mod log;
pub mod member;
pub mod moveitem;
pub mod rank;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{GuildConfig, GUILD_BANK_MAX_TABS};
use crate::error::GuildError;
use crate::events::{GuildBroadcast, GuildEventKind};
use crate::item::Item;
use crate::player::{GuildPlayer, PLAYER_MONEY_CAP};
use crate::storage::{GuildStore, Statement, Transaction};
use crate::{GuildId, PlayerGuid};

use bank::BankTab;
use emblem::EmblemInfo;
use log::{
    BankEventLogEntry, BankEventLogType, EventLogEntry, GuildEventLogType, LogHolder,
};
use member::{status, Member, WITHDRAW_MONEY_SLOT};
use rank::{
    rights, tab_rights, BankTabRights, RankInfo, GUILD_RANKS_MAX_COUNT, GUILD_RANKS_MIN_COUNT,
    RANK_GUILDMASTER, WITHDRAW_UNLIMITED,
};

/// Tab id under which money log rows are persisted.
pub const GUILD_BANK_MONEY_LOGS_TAB: u8 = 100;

/// Longest accepted guild name, in characters.
pub const MAX_GUILD_NAME_LEN: usize = 24;

const MAX_MOTD_LEN: usize = 128;
const MAX_INFO_LEN: usize = 500;

/// One row of the roster view.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub guid: PlayerGuid,
    pub name: String,
    pub rank_id: u8,
    pub rank_name: String,
    pub level: u8,
    pub class: u8,
    pub gender: u8,
    pub zone_id: u32,
    pub flags: u8,
    pub logout_time: i64,
    pub public_note: String,
    pub officer_note: String,
}

/// What one tab allows the asking member today.
#[derive(Debug, Clone, Copy)]
pub struct TabPermission {
    pub rights: u8,
    pub remaining_slots: u32,
}

/// Rank rights and per-tab allowances for one member.
#[derive(Debug, Clone)]
pub struct Permissions {
    pub rank_id: u8,
    pub rights: u32,
    pub purchased_tabs: u8,
    pub remaining_money: u32,
    pub tabs: Vec<TabPermission>,
}

/// Bank balance plus the asking member's remaining daily money.
#[derive(Debug, Clone, Copy)]
pub struct MoneyInfo {
    pub bank_money: u64,
    pub remaining_today: u32,
}

pub struct Guild {
    cfg: Arc<GuildConfig>,
    id: GuildId,
    name: String,
    leader_guid: PlayerGuid,
    emblem: EmblemInfo,
    info: String,
    motd: String,
    created: i64,
    bank_money: u64,
    ranks: Vec<RankInfo>,
    bank_tabs: Vec<BankTab>,
    members: BTreeMap<PlayerGuid, Member>,
    event_log: LogHolder<EventLogEntry>,
    /// One holder per possible tab plus the money log at the last index.
    bank_event_log: Vec<LogHolder<BankEventLogEntry>>,
    broadcasts: Vec<GuildBroadcast>,
}

impl Guild {
    // ============================================
    // Lifecycle
    // ============================================

    /// Create and persist a new guild with `leader` as guildmaster.
    pub fn create(
        cfg: Arc<GuildConfig>,
        store: &mut dyn GuildStore,
        id: GuildId,
        name: &str,
        leader: &mut dyn GuildPlayer,
    ) -> Result<Self, GuildError> {
        validate_guild_name(name)?;
        if leader.guild_id() != 0 {
            return Err(GuildError::Conflict("already in a guild"));
        }
        let mut guild = Self::empty(cfg, id);
        guild.name = name.to_string();
        guild.leader_guid = leader.guid();
        guild.created = Utc::now().timestamp();

        let mut trans = Transaction::new();
        // Clear any stale rows a crashed disband may have left.
        trans.append(Statement::DeleteMembers { guild_id: id });
        trans.append(Statement::InsertGuild {
            id,
            name: guild.name.clone(),
            leader_guid: guild.leader_guid,
            info: String::new(),
            motd: String::new(),
            created: guild.created,
            emblem: EmblemInfo::default(),
            bank_money: 0,
        });
        guild.create_default_ranks(&mut trans);
        for tab_id in 0..guild.cfg.initial_bank_tabs {
            guild.stage_new_bank_tab(&mut trans, tab_id);
        }
        store.commit(trans)?;

        tracing::info!("[guild] created guild {} '{}'", id, guild.name);
        guild.add_member(store, leader, RANK_GUILDMASTER)?;
        Ok(guild)
    }

    fn empty(cfg: Arc<GuildConfig>, id: GuildId) -> Self {
        let event_log = LogHolder::new(cfg.event_log_count);
        let bank_event_log = (0..=GUILD_BANK_MAX_TABS)
            .map(|_| LogHolder::new(cfg.bank_event_log_count))
            .collect();
        Self {
            cfg,
            id,
            name: String::new(),
            leader_guid: 0,
            emblem: EmblemInfo::default(),
            info: String::new(),
            motd: String::new(),
            created: 0,
            bank_money: 0,
            ranks: Vec::new(),
            bank_tabs: Vec::new(),
            members: BTreeMap::new(),
            event_log,
            bank_event_log,
            broadcasts: Vec::new(),
        }
    }

    /// Hydrate a guild from the store. Returns None when the row is gone
    /// or the loaded state fails validation beyond repair.
    pub fn load(
        cfg: Arc<GuildConfig>,
        store: &mut dyn GuildStore,
        guild_id: GuildId,
    ) -> Result<Option<Self>, GuildError> {
        let Some(record) = store.load_guild(guild_id)? else {
            return Ok(None);
        };
        let mut guild = Self::empty(cfg, guild_id);
        guild.name = record.name;
        guild.leader_guid = record.leader_guid;
        guild.info = record.info;
        guild.motd = record.motd;
        guild.created = record.created;
        guild.emblem = record.emblem;
        guild.bank_money = record.bank_money;

        let mut ranks = store.load_ranks(guild_id)?;
        ranks.sort_by_key(|r| r.rank_id);
        guild.ranks = ranks.iter().map(RankInfo::from_record).collect();
        for right in store.load_bank_rights(guild_id)? {
            if let Some(rank) = guild.ranks.get_mut(right.rank_id as usize) {
                rank.load_bank_tab_rights(
                    right.tab_id,
                    BankTabRights::new(right.rights, right.slots_per_day),
                );
            }
        }

        let mut tabs = store.load_bank_tabs(guild_id)?;
        tabs.sort_by_key(|t| t.tab_id);
        if tabs.len() > GUILD_BANK_MAX_TABS {
            tracing::error!(
                "[guild] guild {} has {} bank tab rows, keeping the first {}",
                guild_id,
                tabs.len(),
                GUILD_BANK_MAX_TABS
            );
            tabs.truncate(GUILD_BANK_MAX_TABS);
        }
        guild.bank_tabs = tabs.iter().map(BankTab::from_record).collect();
        for row in store.load_bank_items(guild_id)? {
            if let Some(tab) = guild.bank_tabs.get_mut(row.tab_id as usize) {
                tab.load_item(row.slot_id, row.item);
            }
        }

        for record in store.load_members(guild_id)? {
            let member = Member::from_record(&record);
            if !member.check_stats() {
                store.execute(Statement::DeleteMember {
                    player_guid: member.guid,
                })?;
                continue;
            }
            guild.members.insert(member.guid, member);
        }

        for row in store.load_event_log(guild_id, guild.cfg.event_log_count)? {
            if let Some(entry) = EventLogEntry::from_record(&row) {
                guild.event_log.load_event(entry);
            }
        }
        let limit = guild.cfg.bank_event_log_count;
        for tab_id in 0..guild.bank_tabs.len() as u8 {
            for row in store.load_bank_event_log(guild_id, tab_id, limit)? {
                if let Some(entry) = BankEventLogEntry::from_record(&row) {
                    guild.bank_event_log[tab_id as usize].load_event(entry);
                }
            }
        }
        for row in store.load_bank_event_log(guild_id, GUILD_BANK_MONEY_LOGS_TAB, limit)? {
            if let Some(entry) = BankEventLogEntry::from_record(&row) {
                guild.bank_event_log[GUILD_BANK_MAX_TABS].load_event(entry);
            }
        }

        if !guild.validate(store)? {
            return Ok(None);
        }
        Ok(Some(guild))
    }

    /// Self-heal loaded state. Returns false when the guild is empty and
    /// has been disbanded instead.
    pub fn validate(&mut self, store: &mut dyn GuildStore) -> Result<bool, GuildError> {
        // A ladder outside the legal size, or with holes in the id
        // sequence, is beyond repair; rebuild it.
        let gapped = self
            .ranks
            .iter()
            .enumerate()
            .any(|(i, r)| r.rank_id as usize != i);
        if self.ranks.len() < GUILD_RANKS_MIN_COUNT
            || self.ranks.len() > GUILD_RANKS_MAX_COUNT
            || gapped
        {
            tracing::error!(
                "[guild] guild {} has broken rank ladder ({} ranks), rebuilding defaults",
                self.id,
                self.ranks.len()
            );
            let mut trans = Transaction::new();
            trans.append(Statement::DeleteBankRights { guild_id: self.id });
            trans.append(Statement::DeleteRanks { guild_id: self.id });
            self.ranks.clear();
            self.create_default_ranks(&mut trans);
            store.commit(trans)?;
        }

        let purchased = self.bank_tabs.len() as u8;
        let mut trans = Transaction::new();
        for rank in &mut self.ranks {
            rank.create_missing_tab_rights(&mut trans, purchased);
        }

        // Members holding a rank that no longer exists drop to the bottom.
        let lowest = self.lowest_rank_id();
        let ranks_len = self.ranks.len() as u8;
        for member in self.members.values_mut() {
            if member.rank_id >= ranks_len {
                member.rank_id = lowest;
                trans.append(Statement::UpdateMemberRank {
                    player_guid: member.guid,
                    rank_id: lowest,
                });
            }
        }

        // Repair the leader: promote a survivor, or disband when nobody
        // is left to lead.
        if !self.members.contains_key(&self.leader_guid) {
            let successor = self
                .members
                .values()
                .min_by_key(|m| m.rank_id)
                .map(|m| m.guid);
            match successor {
                None => {
                    store.commit(trans)?;
                    self.disband(store)?;
                    return Ok(false);
                }
                Some(guid) => {
                    self.leader_guid = guid;
                    trans.append(Statement::UpdateGuildLeader {
                        id: self.id,
                        leader_guid: guid,
                    });
                    if let Some(member) = self.members.get_mut(&guid) {
                        member.rank_id = RANK_GUILDMASTER;
                        trans.append(Statement::UpdateMemberRank {
                            player_guid: guid,
                            rank_id: RANK_GUILDMASTER,
                        });
                    }
                }
            }
        } else if let Some(leader) = self.members.get_mut(&self.leader_guid) {
            if !leader.is_rank(RANK_GUILDMASTER) {
                leader.rank_id = RANK_GUILDMASTER;
                trans.append(Statement::UpdateMemberRank {
                    player_guid: leader.guid,
                    rank_id: RANK_GUILDMASTER,
                });
            }
        }

        // Only the leader holds the guildmaster rank, unless configured
        // otherwise.
        if !self.cfg.allow_multiple_guildmasters {
            let leader_guid = self.leader_guid;
            for member in self.members.values_mut() {
                if member.guid != leader_guid && member.is_rank(RANK_GUILDMASTER) {
                    member.rank_id = RANK_GUILDMASTER + 1;
                    trans.append(Statement::UpdateMemberRank {
                        player_guid: member.guid,
                        rank_id: RANK_GUILDMASTER + 1,
                    });
                }
            }
        }

        if !trans.is_empty() {
            store.commit(trans)?;
        }
        Ok(true)
    }

    /// Tear the guild down and delete every row it owns.
    pub fn disband(&mut self, store: &mut dyn GuildStore) -> Result<(), GuildError> {
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::Disbanded));
        self.members.clear();
        let mut trans = Transaction::new();
        trans.append(Statement::DeleteGuild { id: self.id });
        trans.append(Statement::DeleteRanks { guild_id: self.id });
        trans.append(Statement::DeleteBankRights { guild_id: self.id });
        trans.append(Statement::DeleteMembers { guild_id: self.id });
        trans.append(Statement::DeleteBankTabs { guild_id: self.id });
        trans.append(Statement::DeleteBankItems { guild_id: self.id });
        trans.append(Statement::DeleteEventLogs { guild_id: self.id });
        trans.append(Statement::DeleteBankEventLogs { guild_id: self.id });
        store.commit(trans)?;
        tracing::info!("[guild] disbanded guild {} '{}'", self.id, self.name);
        Ok(())
    }

    // ============================================
    // Accessors
    // ============================================

    pub fn id(&self) -> GuildId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leader_guid(&self) -> PlayerGuid {
        self.leader_guid
    }

    pub fn motd(&self) -> &str {
        &self.motd
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn emblem(&self) -> &EmblemInfo {
        &self.emblem
    }

    pub fn bank_money(&self) -> u64 {
        self.bank_money
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, guid: PlayerGuid) -> Option<&Member> {
        self.members.get(&guid)
    }

    pub fn ranks_len(&self) -> u8 {
        self.ranks.len() as u8
    }

    pub fn rank(&self, rank_id: u8) -> Option<&RankInfo> {
        self.ranks.get(rank_id as usize)
    }

    pub fn purchased_tabs(&self) -> u8 {
        self.bank_tabs.len() as u8
    }

    pub fn bank_tab(&self, tab_id: u8) -> Option<&BankTab> {
        self.bank_tabs.get(tab_id as usize)
    }

    pub(crate) fn bank_tab_mut(&mut self, tab_id: u8) -> Option<&mut BankTab> {
        self.bank_tabs.get_mut(tab_id as usize)
    }

    fn lowest_rank_id(&self) -> u8 {
        (self.ranks.len().saturating_sub(1)) as u8
    }

    /// Leadership check: the stored leader, or any member sitting at the
    /// guildmaster rank (only possible with multiple guildmasters
    /// configured, validation demotes extras otherwise).
    fn is_leader(&self, guid: PlayerGuid) -> bool {
        guid == self.leader_guid
            || self
                .members
                .get(&guid)
                .is_some_and(|m| m.is_rank(RANK_GUILDMASTER))
    }

    fn member_has_right(&self, guid: PlayerGuid, right: u32) -> bool {
        self.members
            .get(&guid)
            .and_then(|m| self.ranks.get(m.rank_id as usize))
            .map(|r| r.has_right(right))
            .unwrap_or(false)
    }

    pub(crate) fn member_has_tab_rights(&self, guid: PlayerGuid, tab_id: u8, rights: u8) -> bool {
        self.members
            .get(&guid)
            .and_then(|m| self.ranks.get(m.rank_id as usize))
            .map(|r| r.bank_tab_rights(tab_id) & rights == rights)
            .unwrap_or(false)
    }

    /// Slots this member may still withdraw from a tab today.
    pub fn member_remaining_slots(&self, member: &Member, tab_id: u8) -> u32 {
        if member.is_rank(RANK_GUILDMASTER) {
            return WITHDRAW_UNLIMITED;
        }
        let Some(rank) = self.ranks.get(member.rank_id as usize) else {
            return 0;
        };
        if rank.bank_tab_rights(tab_id) & tab_rights::VIEW == 0 {
            return 0;
        }
        let per_day = rank.bank_tab_slots_per_day(tab_id);
        if per_day == WITHDRAW_UNLIMITED {
            return WITHDRAW_UNLIMITED;
        }
        per_day.saturating_sub(member.bank_withdraw_value(tab_id as usize))
    }

    /// Copper this member may still withdraw today.
    pub fn member_remaining_money(&self, member: &Member) -> u32 {
        if member.is_rank(RANK_GUILDMASTER) {
            return WITHDRAW_UNLIMITED;
        }
        let Some(rank) = self.ranks.get(member.rank_id as usize) else {
            return 0;
        };
        if !rank.has_right(rights::WITHDRAW_GOLD) && !rank.has_right(rights::WITHDRAW_REPAIR) {
            return 0;
        }
        let per_day = rank.bank_money_per_day();
        if per_day == WITHDRAW_UNLIMITED {
            return WITHDRAW_UNLIMITED;
        }
        per_day.saturating_sub(member.bank_withdraw_value(WITHDRAW_MONEY_SLOT))
    }

    pub(crate) fn update_member_withdraw_slots(
        &mut self,
        trans: &mut Transaction,
        guid: PlayerGuid,
        tab_id: u8,
    ) {
        if let Some(member) = self.members.get_mut(&guid) {
            if !member.is_rank(RANK_GUILDMASTER) {
                member.update_bank_withdraw_value(trans, tab_id as usize, 1);
            }
        }
    }

    // ============================================
    // Broadcast outbox
    // ============================================

    pub(crate) fn queue_broadcast(&mut self, broadcast: GuildBroadcast) {
        self.broadcasts.push(broadcast);
    }

    /// Hand all queued broadcasts to the session layer.
    pub fn drain_broadcasts(&mut self) -> Vec<GuildBroadcast> {
        std::mem::take(&mut self.broadcasts)
    }

    // ============================================
    // Metadata handlers
    // ============================================

    pub fn handle_set_motd(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        motd: &str,
    ) -> Result<(), GuildError> {
        if motd.chars().count() > MAX_MOTD_LEN {
            return Err(GuildError::InvalidState("message of the day is too long"));
        }
        if !self.member_has_right(actor, rights::SET_MOTD) {
            return Err(GuildError::PermissionDenied);
        }
        if self.motd != motd {
            self.motd = motd.to_string();
            store.execute(Statement::UpdateGuildMotd {
                id: self.id,
                motd: self.motd.clone(),
            })?;
            self.queue_broadcast(GuildBroadcast::Event {
                kind: GuildEventKind::MotdChanged,
                guid: None,
                params: vec![self.motd.clone()],
            });
        }
        Ok(())
    }

    pub fn handle_set_info(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        info: &str,
    ) -> Result<(), GuildError> {
        if info.chars().count() > MAX_INFO_LEN {
            return Err(GuildError::InvalidState("guild info text is too long"));
        }
        if !self.member_has_right(actor, rights::MODIFY_GUILD_INFO) {
            return Err(GuildError::PermissionDenied);
        }
        if self.info != info {
            self.info = info.to_string();
            store.execute(Statement::UpdateGuildInfo {
                id: self.id,
                info: self.info.clone(),
            })?;
        }
        Ok(())
    }

    /// Rename the guild. Administrative path with no actor check; callers
    /// go through the registry, which keeps names unique.
    pub fn set_name(&mut self, store: &mut dyn GuildStore, name: &str) -> Result<(), GuildError> {
        validate_guild_name(name)?;
        if self.name == name {
            return Ok(());
        }
        self.name = name.to_string();
        store.execute(Statement::UpdateGuildName {
            id: self.id,
            name: self.name.clone(),
        })?;
        Ok(())
    }

    /// Change the tabard. Leader only, and the emblem price is charged to
    /// the leader's own purse.
    pub fn handle_set_emblem(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        emblem: EmblemInfo,
    ) -> Result<(), GuildError> {
        if !self.is_leader(player.guid()) {
            return Err(GuildError::PermissionDenied);
        }
        let cost = self.cfg.emblem_cost;
        if player.money() < cost {
            return Err(GuildError::InvalidState("not enough money"));
        }
        if self.emblem == emblem {
            return Ok(());
        }
        let mut trans = Transaction::new();
        trans.append(Statement::UpdateGuildEmblem {
            id: self.id,
            emblem: emblem.clone(),
        });
        player.modify_money(-(cost as i64));
        player.stage_money_save(&mut trans);
        store.commit(trans)?;
        self.emblem = emblem;
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::TabardChanged));
        Ok(())
    }

    pub fn handle_set_leader(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        new_leader: PlayerGuid,
    ) -> Result<(), GuildError> {
        if !self.is_leader(actor) {
            return Err(GuildError::PermissionDenied);
        }
        if !self.members.contains_key(&new_leader) {
            return Err(GuildError::NotFound("member"));
        }
        if actor == new_leader {
            return Ok(());
        }
        let mut trans = Transaction::new();
        if let Some(old) = self.members.get_mut(&actor) {
            old.rank_id = RANK_GUILDMASTER + 1;
            trans.append(Statement::UpdateMemberRank {
                player_guid: actor,
                rank_id: RANK_GUILDMASTER + 1,
            });
        }
        let (old_name, new_name) = (
            self.members.get(&actor).map(|m| m.name.clone()).unwrap_or_default(),
            self.members
                .get(&new_leader)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
        );
        if let Some(member) = self.members.get_mut(&new_leader) {
            member.rank_id = RANK_GUILDMASTER;
            trans.append(Statement::UpdateMemberRank {
                player_guid: new_leader,
                rank_id: RANK_GUILDMASTER,
            });
        }
        self.leader_guid = new_leader;
        trans.append(Statement::UpdateGuildLeader {
            id: self.id,
            leader_guid: new_leader,
        });
        store.commit(trans)?;
        self.queue_broadcast(GuildBroadcast::Event {
            kind: GuildEventKind::LeaderChanged,
            guid: Some(new_leader),
            params: vec![old_name, new_name],
        });
        Ok(())
    }

    pub fn handle_set_member_note(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        target: PlayerGuid,
        note: &str,
        officer: bool,
    ) -> Result<(), GuildError> {
        let required = if officer {
            rights::EDIT_OFFICER_NOTE
        } else {
            rights::EDIT_PUBLIC_NOTE
        };
        if !self.member_has_right(actor, required) {
            return Err(GuildError::PermissionDenied);
        }
        let Some(member) = self.members.get_mut(&target) else {
            return Err(GuildError::NotFound("member"));
        };
        if officer {
            member.set_officer_note(store, note)?;
        } else {
            member.set_public_note(store, note)?;
        }
        Ok(())
    }

    // ============================================
    // Rank handlers
    // ============================================

    #[allow(clippy::too_many_arguments)]
    pub fn handle_set_rank_info(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        rank_id: u8,
        name: &str,
        rank_rights: u32,
        money_per_day: u32,
        tab_rights: [BankTabRights; GUILD_BANK_MAX_TABS],
    ) -> Result<(), GuildError> {
        if !self.is_leader(actor) {
            return Err(GuildError::PermissionDenied);
        }
        let Some(rank) = self.ranks.get_mut(rank_id as usize) else {
            return Err(GuildError::NotFound("rank"));
        };
        rank.set_name(store, name)?;
        rank.set_rights(store, rank_rights)?;
        rank.set_bank_money_per_day(store, money_per_day)?;
        let purchased = self.bank_tabs.len() as u8;
        for tab_id in 0..purchased {
            if let Some(rank) = self.ranks.get_mut(rank_id as usize) {
                rank.set_bank_tab_rights(store, tab_id, tab_rights[tab_id as usize])?;
            }
        }
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::RankUpdated));
        Ok(())
    }

    pub fn handle_add_new_rank(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        name: &str,
    ) -> Result<(), GuildError> {
        if !self.is_leader(actor) {
            return Err(GuildError::PermissionDenied);
        }
        if self.ranks.len() >= GUILD_RANKS_MAX_COUNT {
            return Err(GuildError::CapacityExceeded("rank ladder is full"));
        }
        let mut trans = Transaction::new();
        self.stage_new_rank(
            &mut trans,
            name,
            rights::CHAT_LISTEN | rights::CHAT_SPEAK,
        );
        store.commit(trans)?;
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::RankCreated));
        Ok(())
    }

    /// Remove `rank_id` and everything below it. Members left holding a
    /// removed rank keep the stale id until the next validation pass
    /// demotes them.
    pub fn handle_remove_rank(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        rank_id: u8,
    ) -> Result<(), GuildError> {
        if !self.is_leader(actor) {
            return Err(GuildError::PermissionDenied);
        }
        if self.ranks.len() <= GUILD_RANKS_MIN_COUNT {
            return Err(GuildError::InvalidState("rank ladder is at minimum size"));
        }
        if rank_id as usize >= self.ranks.len() {
            return Err(GuildError::NotFound("rank"));
        }
        let mut trans = Transaction::new();
        for removed in rank_id..self.ranks.len() as u8 {
            trans.append(Statement::DeleteBankRightsForRank {
                guild_id: self.id,
                rank_id: removed,
            });
        }
        trans.append(Statement::DeleteRanksFrom {
            guild_id: self.id,
            rank_id,
        });
        self.ranks.truncate(rank_id as usize);
        store.commit(trans)?;
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::RankDeleted));
        Ok(())
    }

    pub fn handle_remove_lowest_rank(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
    ) -> Result<(), GuildError> {
        let lowest = self.lowest_rank_id();
        self.handle_remove_rank(store, actor, lowest)
    }

    // ============================================
    // Membership handlers
    // ============================================

    pub fn handle_invite_member(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        invitee: &mut dyn GuildPlayer,
    ) -> Result<(), GuildError> {
        if !self.member_has_right(actor, rights::INVITE) {
            return Err(GuildError::PermissionDenied);
        }
        if invitee.guild_id() != 0 {
            return Err(GuildError::Conflict("already in a guild"));
        }
        if invitee.invited_guild_id() != 0 {
            return Err(GuildError::Conflict("already has a pending invite"));
        }
        if self.cfg.member_limit != 0 && self.members.len() as u32 >= self.cfg.member_limit {
            return Err(GuildError::CapacityExceeded("guild is full"));
        }
        invitee.set_invited_guild(self.id);
        self.log_event(
            store,
            GuildEventLogType::InvitePlayer,
            actor,
            invitee.guid(),
            0,
        )?;
        Ok(())
    }

    /// Accept a pending invite; the player joins at the lowest rank.
    pub fn handle_accept_member(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
    ) -> Result<(), GuildError> {
        if player.invited_guild_id() != self.id {
            return Err(GuildError::InvalidState("no pending invite for this guild"));
        }
        if player.guild_id() != 0 {
            return Err(GuildError::Conflict("already in a guild"));
        }
        player.set_invited_guild(0);
        let lowest = self.lowest_rank_id();
        self.add_member(store, player, lowest)
    }

    pub fn add_member(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        rank_id: u8,
    ) -> Result<(), GuildError> {
        let guid = player.guid();
        if self.members.contains_key(&guid) {
            return Err(GuildError::Conflict("already a member"));
        }
        let mut member = Member::new(self.id, guid, rank_id);
        member.name = player.name().to_string();
        member.level = player.level();
        member.class = player.class();
        member.gender = player.gender();
        member.zone_id = player.zone_id();
        member.account_id = player.account_id();
        member.flags = status::ONLINE;
        if !member.check_stats() {
            return Err(GuildError::InvalidState("character stats are invalid"));
        }

        let mut trans = Transaction::new();
        member.stage_insert(&mut trans);
        store.commit(trans)?;
        let name = member.name.clone();
        self.members.insert(guid, member);
        player.set_guild(self.id, rank_id);

        self.log_event(store, GuildEventLogType::JoinGuild, guid, 0, rank_id)?;
        self.queue_broadcast(GuildBroadcast::player_event(
            GuildEventKind::PlayerJoined,
            guid,
            &name,
        ));
        tracing::debug!("[guild] {} joined guild {} at rank {}", name, self.id, rank_id);
        Ok(())
    }

    /// Add an offline character by guid; stats come from the store's
    /// character query instead of a live player.
    pub fn add_member_offline(
        &mut self,
        store: &mut dyn GuildStore,
        guid: PlayerGuid,
        rank_id: u8,
    ) -> Result<(), GuildError> {
        if self.members.contains_key(&guid) {
            return Err(GuildError::Conflict("already a member"));
        }
        let Some(record) = store.character_for_guild(guid)? else {
            return Err(GuildError::NotFound("character"));
        };
        let mut member = Member::new(self.id, guid, rank_id);
        member.set_stats(&record);
        if !member.check_stats() {
            return Err(GuildError::InvalidState("character stats are invalid"));
        }
        let mut trans = Transaction::new();
        member.stage_insert(&mut trans);
        store.commit(trans)?;
        let name = member.name.clone();
        self.members.insert(guid, member);
        self.log_event(store, GuildEventLogType::JoinGuild, guid, 0, rank_id)?;
        self.queue_broadcast(GuildBroadcast::player_event(
            GuildEventKind::PlayerJoined,
            guid,
            &name,
        ));
        Ok(())
    }

    /// Voluntary leave. The leader may only leave a guild of one, which
    /// disbands it.
    pub fn handle_leave_member(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
    ) -> Result<bool, GuildError> {
        let guid = player.guid();
        let Some(member) = self.members.get(&guid) else {
            return Err(GuildError::NotFound("member"));
        };
        if guid == self.leader_guid {
            if self.members.len() > 1 {
                return Err(GuildError::InvalidState(
                    "the guildmaster must pass leadership on first",
                ));
            }
            player.set_guild(0, 0);
            self.disband(store)?;
            return Ok(true);
        }
        let name = member.name.clone();
        self.log_event(store, GuildEventLogType::LeaveGuild, guid, 0, 0)?;
        self.queue_broadcast(GuildBroadcast::player_event(
            GuildEventKind::PlayerLeft,
            guid,
            &name,
        ));
        self.delete_member(store, guid)?;
        player.set_guild(0, 0);
        Ok(false)
    }

    /// Kick a lower-ranked member.
    pub fn handle_remove_member(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<(), GuildError> {
        if !self.member_has_right(actor, rights::REMOVE) {
            return Err(GuildError::PermissionDenied);
        }
        let Some(target_member) = self.members.get(&target) else {
            return Err(GuildError::NotFound("member"));
        };
        if target == self.leader_guid {
            return Err(GuildError::InvalidState("the guildmaster cannot be kicked"));
        }
        let actor_rank = self
            .members
            .get(&actor)
            .map(|m| m.rank_id)
            .ok_or(GuildError::NotFound("member"))?;
        if target_member.is_rank_not_lower_than(actor_rank) {
            return Err(GuildError::RankTooHigh);
        }
        let name = target_member.name.clone();
        self.log_event(store, GuildEventLogType::UninvitePlayer, actor, target, 0)?;
        self.queue_broadcast(GuildBroadcast::player_event(
            GuildEventKind::PlayerRemoved,
            target,
            &name,
        ));
        self.delete_member(store, target)?;
        Ok(())
    }

    /// Drop one member row. Removing the leader hands the guild to the
    /// best-ranked survivor, or disbands it when nobody is left. Returns
    /// false when the guild was disbanded.
    pub fn delete_member(
        &mut self,
        store: &mut dyn GuildStore,
        guid: PlayerGuid,
    ) -> Result<bool, GuildError> {
        let removed = self.members.remove(&guid);
        if guid != self.leader_guid {
            store.execute(Statement::DeleteMember { player_guid: guid })?;
            return Ok(true);
        }
        let successor = self
            .members
            .values()
            .min_by_key(|m| m.rank_id)
            .map(|m| (m.guid, m.name.clone()));
        let Some((new_leader, new_name)) = successor else {
            store.execute(Statement::DeleteMember { player_guid: guid })?;
            self.disband(store)?;
            return Ok(false);
        };
        let mut trans = Transaction::new();
        trans.append(Statement::DeleteMember { player_guid: guid });
        self.leader_guid = new_leader;
        trans.append(Statement::UpdateGuildLeader {
            id: self.id,
            leader_guid: new_leader,
        });
        if let Some(member) = self.members.get_mut(&new_leader) {
            member.rank_id = RANK_GUILDMASTER;
            trans.append(Statement::UpdateMemberRank {
                player_guid: new_leader,
                rank_id: RANK_GUILDMASTER,
            });
        }
        store.commit(trans)?;
        let old_name = removed.map(|m| m.name).unwrap_or_default();
        self.queue_broadcast(GuildBroadcast::Event {
            kind: GuildEventKind::LeaderChanged,
            guid: Some(new_leader),
            params: vec![old_name, new_name],
        });
        Ok(true)
    }

    /// Promote (one rung up) or demote (one rung down) a member.
    pub fn handle_update_member_rank(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        target: PlayerGuid,
        demote: bool,
    ) -> Result<(), GuildError> {
        let required = if demote { rights::DEMOTE } else { rights::PROMOTE };
        if !self.member_has_right(actor, required) {
            return Err(GuildError::PermissionDenied);
        }
        if actor == target {
            return Err(GuildError::InvalidState("cannot change own rank"));
        }
        let actor_rank = self
            .members
            .get(&actor)
            .map(|m| m.rank_id)
            .ok_or(GuildError::NotFound("member"))?;
        let Some(target_member) = self.members.get(&target) else {
            return Err(GuildError::NotFound("member"));
        };
        let target_rank = target_member.rank_id;
        let target_name = target_member.name.clone();

        let new_rank = if demote {
            // Can only demote someone strictly below the actor, and not
            // off the bottom of the ladder.
            if target_member.is_rank_not_lower_than(actor_rank) {
                return Err(GuildError::RankTooHigh);
            }
            if target_rank >= self.lowest_rank_id() {
                return Err(GuildError::RankTooLow);
            }
            target_rank + 1
        } else {
            // Promotion may only land strictly below the actor's rank.
            if target_member.is_rank_not_lower_than(actor_rank + 1) {
                return Err(GuildError::RankTooHigh);
            }
            target_rank - 1
        };

        if let Some(member) = self.members.get_mut(&target) {
            member.change_rank(store, new_rank)?;
        }
        let event_type = if demote {
            GuildEventLogType::DemotePlayer
        } else {
            GuildEventLogType::PromotePlayer
        };
        self.log_event(store, event_type, actor, target, new_rank)?;
        let kind = if demote {
            GuildEventKind::Demotion
        } else {
            GuildEventKind::Promotion
        };
        let rank_name = self
            .ranks
            .get(new_rank as usize)
            .map(|r| r.name().to_string())
            .unwrap_or_default();
        self.queue_broadcast(GuildBroadcast::Event {
            kind,
            guid: Some(target),
            params: vec![target_name, rank_name],
        });
        Ok(())
    }

    // ============================================
    // Presence
    // ============================================

    /// Refresh cached stats and mark the member online.
    pub fn handle_member_login(&mut self, player: &dyn GuildPlayer) {
        let guid = player.guid();
        let (name, present) = match self.members.get_mut(&guid) {
            Some(member) => {
                member.name = player.name().to_string();
                member.level = player.level();
                member.class = player.class();
                member.gender = player.gender();
                member.zone_id = player.zone_id();
                member.flags |= status::ONLINE;
                (member.name.clone(), true)
            }
            None => (String::new(), false),
        };
        if present {
            self.queue_broadcast(GuildBroadcast::player_event(
                GuildEventKind::SignedOn,
                guid,
                &name,
            ));
        }
    }

    pub fn handle_member_logout(&mut self, guid: PlayerGuid) {
        let name = match self.members.get_mut(&guid) {
            Some(member) => {
                member.flags &= !status::ONLINE;
                member.logout_time = Utc::now().timestamp();
                Some(member.name.clone())
            }
            None => None,
        };
        if let Some(name) = name {
            self.queue_broadcast(GuildBroadcast::player_event(
                GuildEventKind::SignedOff,
                guid,
                &name,
            ));
        }
    }

    // ============================================
    // Bank money
    // ============================================

    pub fn handle_member_deposit_money(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        amount: u64,
    ) -> Result<(), GuildError> {
        if amount == 0 {
            return Err(GuildError::InvalidState("deposit amount is zero"));
        }
        if !self.members.contains_key(&player.guid()) {
            return Err(GuildError::NotFound("member"));
        }
        if player.money() < amount {
            return Err(GuildError::InvalidState("not enough money"));
        }
        let new_balance = self
            .bank_money
            .checked_add(amount)
            .filter(|b| *b <= self.cfg.bank_money_limit)
            .ok_or(GuildError::CapacityExceeded("bank money limit reached"))?;

        let mut trans = Transaction::new();
        trans.append(Statement::UpdateGuildBankMoney {
            id: self.id,
            bank_money: new_balance,
        });
        player.modify_money(-(amount as i64));
        player.stage_money_save(&mut trans);
        self.stage_bank_event(
            &mut trans,
            BankEventLogType::DepositMoney,
            0,
            player.guid(),
            0,
            0,
            0,
            amount,
        );
        store.commit(trans)?;
        // The cached balance only moves once the store has the new one.
        self.bank_money = new_balance;
        self.queue_broadcast(GuildBroadcast::Event {
            kind: GuildEventKind::BankMoneySet,
            guid: Some(player.guid()),
            params: vec![new_balance.to_string()],
        });
        Ok(())
    }

    /// Withdraw money, either into the player's purse or as a repair
    /// payment that never touches the purse.
    pub fn handle_member_withdraw_money(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        amount: u64,
        repair: bool,
    ) -> Result<(), GuildError> {
        if amount == 0 {
            return Err(GuildError::InvalidState("withdraw amount is zero"));
        }
        if amount > self.bank_money {
            return Err(GuildError::InvalidState("not enough money in the bank"));
        }
        let guid = player.guid();
        let Some(member) = self.members.get(&guid) else {
            return Err(GuildError::NotFound("member"));
        };
        let required = if repair {
            rights::WITHDRAW_REPAIR
        } else {
            rights::WITHDRAW_GOLD
        };
        let rank_ok = self
            .ranks
            .get(member.rank_id as usize)
            .map(|r| r.has_right(required))
            .unwrap_or(false);
        if !member.is_rank(RANK_GUILDMASTER) && !rank_ok {
            return Err(GuildError::PermissionDenied);
        }
        let remaining = self.member_remaining_money(member) as u64;
        if remaining < amount {
            return Err(GuildError::QuotaExceeded);
        }
        if !repair && player.money().saturating_add(amount) > PLAYER_MONEY_CAP {
            return Err(GuildError::CapacityExceeded("money cap reached"));
        }
        let new_balance = self.bank_money - amount;

        let mut trans = Transaction::new();
        if let Some(member) = self.members.get_mut(&guid) {
            if !member.is_rank(RANK_GUILDMASTER) {
                member.update_bank_withdraw_value(&mut trans, WITHDRAW_MONEY_SLOT, amount as u32);
            }
        }
        trans.append(Statement::UpdateGuildBankMoney {
            id: self.id,
            bank_money: new_balance,
        });
        if !repair {
            player.modify_money(amount as i64);
            player.stage_money_save(&mut trans);
        }
        let event_type = if repair {
            BankEventLogType::RepairMoney
        } else {
            BankEventLogType::WithdrawMoney
        };
        self.stage_bank_event(&mut trans, event_type, 0, guid, 0, 0, 0, amount);
        store.commit(trans)?;
        self.bank_money = new_balance;
        self.queue_broadcast(GuildBroadcast::Event {
            kind: GuildEventKind::BankMoneySet,
            guid: Some(guid),
            params: vec![new_balance.to_string()],
        });
        Ok(())
    }

    // ============================================
    // Bank tabs
    // ============================================

    /// Buy the next tab in sequence, charging the configured price.
    pub fn handle_buy_bank_tab(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        tab_id: u8,
    ) -> Result<(), GuildError> {
        if !self.members.contains_key(&player.guid()) {
            return Err(GuildError::NotFound("member"));
        }
        // Tabs are bought strictly in order.
        if tab_id != self.purchased_tabs() {
            return Err(GuildError::InvalidState("tabs must be bought in order"));
        }
        let Some(cost) = self.cfg.tab_cost(tab_id) else {
            return Err(GuildError::CapacityExceeded("all bank tabs are purchased"));
        };
        if player.money() < cost {
            return Err(GuildError::InvalidState("not enough money"));
        }
        let mut trans = Transaction::new();
        self.stage_new_bank_tab(&mut trans, tab_id);
        let purchased = self.bank_tabs.len() as u8;
        for rank in &mut self.ranks {
            rank.create_missing_tab_rights(&mut trans, purchased);
        }
        player.modify_money(-(cost as i64));
        player.stage_money_save(&mut trans);
        store.commit(trans)?;
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::BankTabPurchased));
        Ok(())
    }

    pub fn handle_set_bank_tab_info(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        tab_id: u8,
        name: &str,
        icon: &str,
    ) -> Result<(), GuildError> {
        if !self.is_leader(actor) {
            return Err(GuildError::PermissionDenied);
        }
        let Some(tab) = self.bank_tabs.get_mut(tab_id as usize) else {
            return Err(GuildError::NotFound("bank tab"));
        };
        if tab.set_info(store, name, icon)? {
            self.queue_broadcast(GuildBroadcast::event(GuildEventKind::BankTabUpdated));
        }
        Ok(())
    }

    pub fn set_bank_tab_text(
        &mut self,
        store: &mut dyn GuildStore,
        actor: PlayerGuid,
        tab_id: u8,
        text: &str,
    ) -> Result<(), GuildError> {
        if !self.member_has_tab_rights(actor, tab_id, tab_rights::UPDATE_TEXT) {
            return Err(GuildError::PermissionDenied);
        }
        let Some(tab) = self.bank_tabs.get_mut(tab_id as usize) else {
            return Err(GuildError::NotFound("bank tab"));
        };
        if tab.set_text(store, text)? {
            self.queue_broadcast(GuildBroadcast::Event {
                kind: GuildEventKind::BankTextChanged,
                guid: None,
                params: vec![tab_id.to_string()],
            });
        }
        Ok(())
    }

    // ============================================
    // Read models
    // ============================================

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.members
            .values()
            .map(|m| RosterEntry {
                guid: m.guid,
                name: m.name.clone(),
                rank_id: m.rank_id,
                rank_name: self
                    .ranks
                    .get(m.rank_id as usize)
                    .map(|r| r.name().to_string())
                    .unwrap_or_default(),
                level: m.level,
                class: m.class,
                gender: m.gender,
                zone_id: m.zone_id,
                flags: m.flags,
                logout_time: m.logout_time,
                public_note: m.public_note().to_string(),
                officer_note: m.officer_note().to_string(),
            })
            .collect()
    }

    pub fn permissions(&self, guid: PlayerGuid) -> Option<Permissions> {
        let member = self.members.get(&guid)?;
        let rank = self.ranks.get(member.rank_id as usize)?;
        let tabs = (0..self.purchased_tabs())
            .map(|tab_id| TabPermission {
                rights: rank.bank_tab_rights(tab_id),
                remaining_slots: self.member_remaining_slots(member, tab_id),
            })
            .collect();
        Some(Permissions {
            rank_id: member.rank_id,
            rights: rank.rights(),
            purchased_tabs: self.purchased_tabs(),
            remaining_money: self.member_remaining_money(member),
            tabs,
        })
    }

    pub fn money_info(&self, guid: PlayerGuid) -> Option<MoneyInfo> {
        let member = self.members.get(&guid)?;
        Some(MoneyInfo {
            bank_money: self.bank_money,
            remaining_today: self.member_remaining_money(member),
        })
    }

    /// Roster event log, oldest first.
    pub fn event_log_entries(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.event_log.iter()
    }

    /// Bank log for one tab, or the money log for the sentinel tab id.
    pub fn bank_log(&self, tab_id: u8) -> Option<impl Iterator<Item = &BankEventLogEntry>> {
        let index = if tab_id == GUILD_BANK_MONEY_LOGS_TAB {
            GUILD_BANK_MAX_TABS
        } else if tab_id < self.purchased_tabs() {
            tab_id as usize
        } else {
            return None;
        };
        self.bank_event_log.get(index).map(|log| log.iter())
    }

    /// Occupied slots of one tab.
    pub fn bank_tab_contents(&self, tab_id: u8) -> Option<Vec<(u8, &Item)>> {
        let tab = self.bank_tab(tab_id)?;
        Some(
            tab.items()
                .iter()
                .enumerate()
                .filter_map(|(slot, item)| item.as_ref().map(|i| (slot as u8, i)))
                .collect(),
        )
    }

    // ============================================
    // Daily reset
    // ============================================

    /// Zero every member's withdrawal counters. Driven by an external
    /// daily timer.
    pub fn reset_times(&mut self, store: &mut dyn GuildStore) -> Result<(), GuildError> {
        let mut trans = Transaction::new();
        for member in self.members.values_mut() {
            member.reset_values(&mut trans);
        }
        store.commit(trans)?;
        self.queue_broadcast(GuildBroadcast::event(GuildEventKind::BankTabUpdated));
        Ok(())
    }

    // ============================================
    // Internals
    // ============================================

    fn create_default_ranks(&mut self, trans: &mut Transaction) {
        let chat = rights::CHAT_LISTEN | rights::CHAT_SPEAK;
        self.stage_new_rank(trans, "Guild Master", rights::ALL);
        self.stage_new_rank(trans, "Officer", rights::ALL);
        self.stage_new_rank(trans, "Veteran", chat);
        self.stage_new_rank(trans, "Member", chat);
        self.stage_new_rank(trans, "Initiate", chat);
    }

    fn stage_new_rank(&mut self, trans: &mut Transaction, name: &str, rank_rights: u32) {
        let rank_id = self.ranks.len() as u8;
        let mut rank = RankInfo::new(self.id, rank_id, name.to_string(), rank_rights, 0);
        rank.create_missing_tab_rights(trans, self.bank_tabs.len() as u8);
        rank.stage_insert(trans);
        self.ranks.push(rank);
    }

    fn stage_new_bank_tab(&mut self, trans: &mut Transaction, tab_id: u8) {
        trans.append(Statement::InsertBankTab {
            guild_id: self.id,
            tab_id,
        });
        self.bank_tabs.push(BankTab::new(self.id, tab_id));
    }

    /// Append one roster event in its own transaction.
    fn log_event(
        &mut self,
        store: &mut dyn GuildStore,
        event_type: GuildEventLogType,
        guid_1: PlayerGuid,
        guid_2: PlayerGuid,
        new_rank: u8,
    ) -> Result<(), GuildError> {
        let mut trans = Transaction::new();
        let entry = EventLogEntry::new(
            self.id,
            self.event_log.next_guid(),
            event_type,
            guid_1,
            guid_2,
            new_rank,
        );
        self.event_log.add_event(&mut trans, entry);
        store.commit(trans)?;
        Ok(())
    }

    /// Stage one bank event into the right holder. Money events share a
    /// single log persisted under the sentinel tab id.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn stage_bank_event(
        &mut self,
        trans: &mut Transaction,
        event_type: BankEventLogType,
        tab_id: u8,
        player_guid: PlayerGuid,
        item_entry: u32,
        item_count: u32,
        dest_tab_id: u8,
        money: u64,
    ) {
        let (index, db_tab) = if event_type.is_money_event() {
            (GUILD_BANK_MAX_TABS, GUILD_BANK_MONEY_LOGS_TAB)
        } else {
            (tab_id as usize, tab_id)
        };
        let Some(holder) = self.bank_event_log.get_mut(index) else {
            return;
        };
        let entry = BankEventLogEntry::new(
            self.id,
            holder.next_guid(),
            db_tab,
            event_type,
            player_guid,
            item_entry,
            item_count,
            dest_tab_id,
            money,
        );
        holder.add_event(trans, entry);
    }
}

fn validate_guild_name(name: &str) -> Result<(), GuildError> {
    if name.is_empty() {
        return Err(GuildError::InvalidState("guild name is empty"));
    }
    if name.chars().count() > MAX_GUILD_NAME_LEN {
        return Err(GuildError::InvalidState("guild name is too long"));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        return Err(GuildError::InvalidState("guild name has invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::BasicPlayer;
    use crate::storage::MemoryStore;

    fn setup() -> (Arc<GuildConfig>, MemoryStore, BasicPlayer) {
        let cfg = Arc::new(GuildConfig::default());
        let store = MemoryStore::new();
        let leader = BasicPlayer::new(10, "Uther");
        (cfg, store, leader)
    }

    fn guild_with_leader() -> (Guild, MemoryStore, BasicPlayer) {
        let (cfg, mut store, mut leader) = setup();
        let guild = Guild::create(cfg, &mut store, 1, "Silver Hand", &mut leader).unwrap();
        (guild, store, leader)
    }

    #[test]
    fn test_create_builds_default_ladder() {
        let (guild, _, leader) = guild_with_leader();
        assert_eq!(guild.ranks_len() as usize, GUILD_RANKS_MIN_COUNT);
        assert_eq!(guild.rank(0).unwrap().name(), "Guild Master");
        assert_eq!(guild.rank(4).unwrap().name(), "Initiate");
        assert_eq!(guild.leader_guid(), leader.guid());
        assert_eq!(guild.member(10).unwrap().rank_id, RANK_GUILDMASTER);
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let (cfg, mut store, mut leader) = setup();
        for name in ["", "x".repeat(25).as_str(), "Bad!Name"] {
            let result = Guild::create(cfg.clone(), &mut store, 1, name, &mut leader);
            assert!(matches!(result, Err(GuildError::InvalidState(_))), "{}", name);
        }
    }

    #[test]
    fn test_set_motd_requires_right() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut initiate = BasicPlayer::new(20, "Squire");
        initiate.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut initiate).unwrap();
        let result = guild.handle_set_motd(&mut store, 20, "onward");
        assert!(matches!(result, Err(GuildError::PermissionDenied)));
        guild.handle_set_motd(&mut store, 10, "onward").unwrap();
        assert_eq!(guild.motd(), "onward");
    }

    #[test]
    fn test_promote_and_demote_guards() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        assert_eq!(guild.member(20).unwrap().rank_id, 4);

        // Promote twice
        guild.handle_update_member_rank(&mut store, 10, 20, false).unwrap();
        guild.handle_update_member_rank(&mut store, 10, 20, false).unwrap();
        assert_eq!(guild.member(20).unwrap().rank_id, 2);

        // Self-promotion rejected
        let result = guild.handle_update_member_rank(&mut store, 10, 10, false);
        assert!(matches!(result, Err(GuildError::InvalidState(_))));

        // Demote below the ladder rejected at the bottom
        guild.handle_update_member_rank(&mut store, 10, 20, true).unwrap();
        guild.handle_update_member_rank(&mut store, 10, 20, true).unwrap();
        let result = guild.handle_update_member_rank(&mut store, 10, 20, true);
        assert!(matches!(result, Err(GuildError::RankTooLow)));
    }

    #[test]
    fn test_leader_cannot_leave_populated_guild() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        let result = guild.handle_leave_member(&mut store, &mut leader);
        assert!(matches!(result, Err(GuildError::InvalidState(_))));
        assert_eq!(guild.member_count(), 2);
    }

    #[test]
    fn test_leader_leaving_alone_disbands() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        let disbanded = guild.handle_leave_member(&mut store, &mut leader).unwrap();
        assert!(disbanded);
        assert_eq!(leader.guild_id(), 0);
        assert!(store.load_guild(1).unwrap().is_none());
    }

    #[test]
    fn test_add_member_offline_uses_character_row() {
        let (mut guild, mut store, _) = guild_with_leader();
        let result = guild.add_member_offline(&mut store, 30, 4);
        assert!(matches!(result, Err(GuildError::NotFound("character"))));
        store.put_character(crate::storage::CharacterRecord {
            guid: 30,
            name: "Mograine".into(),
            level: 58,
            class: 2,
            gender: 0,
            zone_id: 28,
            account_id: 3,
            logout_time: 1_000,
        });
        guild.add_member_offline(&mut store, 30, 4).unwrap();
        let member = guild.member(30).unwrap();
        assert_eq!(member.name, "Mograine");
        assert_eq!(member.level, 58);
        assert_eq!(member.rank_id, 4);
    }

    #[test]
    fn test_kick_guards() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut officer = BasicPlayer::new(20, "Tirion");
        officer.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut officer).unwrap();
        // Raise to officer
        for _ in 0..3 {
            guild.handle_update_member_rank(&mut store, 10, 20, false).unwrap();
        }
        // Officer cannot kick the guildmaster
        let result = guild.handle_remove_member(&mut store, 20, 10);
        assert!(matches!(result, Err(GuildError::InvalidState(_))));
        // Leader kicks the officer
        guild.handle_remove_member(&mut store, 10, 20).unwrap();
        assert!(guild.member(20).is_none());
    }

    #[test]
    fn test_deposit_money_updates_balance_and_log() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        leader.set_money(10_000);
        guild
            .handle_member_deposit_money(&mut store, &mut leader, 4_000)
            .unwrap();
        assert_eq!(guild.bank_money(), 4_000);
        assert_eq!(leader.money(), 6_000);
        assert_eq!(store.load_guild(1).unwrap().unwrap().bank_money, 4_000);
        let log: Vec<_> = guild.bank_log(GUILD_BANK_MONEY_LOGS_TAB).unwrap().collect();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_type, BankEventLogType::DepositMoney);
        assert_eq!(log[0].money, 4_000);
    }

    #[test]
    fn test_deposit_over_limit_rejected() {
        let (cfg, mut store, mut leader) = setup();
        let cfg = Arc::new(GuildConfig {
            bank_money_limit: 1_000,
            ..(*cfg).clone()
        });
        let mut guild = Guild::create(cfg, &mut store, 1, "Misers", &mut leader).unwrap();
        leader.set_money(5_000);
        let result = guild.handle_member_deposit_money(&mut store, &mut leader, 2_000);
        assert!(matches!(result, Err(GuildError::CapacityExceeded(_))));
        assert_eq!(guild.bank_money(), 0);
        assert_eq!(leader.money(), 5_000);
    }

    #[test]
    fn test_withdraw_respects_quota() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        leader.set_money(100_000);
        guild
            .handle_member_deposit_money(&mut store, &mut leader, 50_000)
            .unwrap();

        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        // Initiates get no withdraw right at all
        let result = guild.handle_member_withdraw_money(&mut store, &mut member, 100, false);
        assert!(matches!(result, Err(GuildError::PermissionDenied)));

        // Grant gold withdrawal with a 500 copper daily allowance
        let rank_id = guild.member(20).unwrap().rank_id;
        let rank = guild.ranks.get_mut(rank_id as usize).unwrap();
        rank.set_rights(&mut store, rights::CHAT_LISTEN | rights::WITHDRAW_GOLD)
            .unwrap();
        rank.set_bank_money_per_day(&mut store, 500).unwrap();

        guild
            .handle_member_withdraw_money(&mut store, &mut member, 300, false)
            .unwrap();
        assert_eq!(member.money(), 300);
        assert_eq!(guild.bank_money(), 49_700);

        let result = guild.handle_member_withdraw_money(&mut store, &mut member, 300, false);
        assert!(matches!(result, Err(GuildError::QuotaExceeded)));
        assert_eq!(guild.bank_money(), 49_700, "failed withdraw must not move money");

        // Daily reset restores the allowance
        guild.reset_times(&mut store).unwrap();
        guild
            .handle_member_withdraw_money(&mut store, &mut member, 300, false)
            .unwrap();
        assert_eq!(member.money(), 600);
    }

    #[test]
    fn test_guildmaster_withdraw_is_unlimited() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        leader.set_money(1_000_000);
        guild
            .handle_member_deposit_money(&mut store, &mut leader, 900_000)
            .unwrap();
        for _ in 0..3 {
            guild
                .handle_member_withdraw_money(&mut store, &mut leader, 200_000, false)
                .unwrap();
        }
        assert_eq!(guild.bank_money(), 300_000);
    }

    #[test]
    fn test_remove_rank_three_of_six_keeps_top_three() {
        let (mut guild, mut store, _) = guild_with_leader();
        guild.handle_add_new_rank(&mut store, 10, "Peon").unwrap();
        assert_eq!(guild.ranks_len(), 6);
        guild.handle_remove_rank(&mut store, 10, 3).unwrap();
        assert_eq!(guild.ranks_len(), 3);
        let ids: Vec<u8> = store
            .load_ranks(1)
            .unwrap()
            .iter()
            .map(|r| r.rank_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_rank_leaves_stale_members_for_validation() {
        let (mut guild, mut store, _) = guild_with_leader();
        guild.handle_add_new_rank(&mut store, 10, "Peon").unwrap();
        guild.handle_add_new_rank(&mut store, 10, "Grunt").unwrap();
        assert_eq!(guild.ranks_len(), 7);

        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        assert_eq!(guild.member(20).unwrap().rank_id, 6);

        guild.handle_remove_rank(&mut store, 10, 5).unwrap();
        assert_eq!(guild.ranks_len(), 5);
        assert_eq!(store.load_ranks(1).unwrap().len(), 5);
        // The stale id survives until the validation pass demotes it
        assert_eq!(guild.member(20).unwrap().rank_id, 6);
        assert!(guild.validate(&mut store).unwrap());
        assert_eq!(guild.member(20).unwrap().rank_id, 4);
    }

    #[test]
    fn test_second_guildmaster_passes_leader_checks() {
        let (cfg, mut store, mut leader) = setup();
        let cfg = Arc::new(GuildConfig {
            allow_multiple_guildmasters: true,
            ..(*cfg).clone()
        });
        let mut guild = Guild::create(cfg, &mut store, 1, "Twin Crowns", &mut leader).unwrap();
        let mut member = BasicPlayer::new(20, "Tirion");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        // Plain members stay locked out
        let result = guild.handle_add_new_rank(&mut store, 20, "Peon");
        assert!(matches!(result, Err(GuildError::PermissionDenied)));
        // A co-guildmaster passes every leader gate
        guild.members.get_mut(&20).unwrap().rank_id = RANK_GUILDMASTER;
        guild.handle_add_new_rank(&mut store, 20, "Peon").unwrap();
        assert_eq!(guild.ranks_len(), 6);
    }

    #[test]
    fn test_delete_member_hands_leadership_to_best_rank() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut officer = BasicPlayer::new(20, "Tirion");
        officer.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut officer).unwrap();
        let mut initiate = BasicPlayer::new(30, "Squire");
        initiate.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut initiate).unwrap();
        for _ in 0..3 {
            guild.handle_update_member_rank(&mut store, 10, 20, false).unwrap();
        }
        assert!(guild.delete_member(&mut store, 10).unwrap());
        assert_eq!(guild.leader_guid(), 20);
        assert_eq!(guild.member(20).unwrap().rank_id, RANK_GUILDMASTER);
        assert!(guild.member(10).is_none());
        assert_eq!(store.load_guild(1).unwrap().unwrap().leader_guid, 20);
    }

    #[test]
    fn test_delete_member_disbands_when_nobody_is_left() {
        let (mut guild, mut store, _) = guild_with_leader();
        assert!(!guild.delete_member(&mut store, 10).unwrap());
        assert!(store.load_guild(1).unwrap().is_none());
    }

    #[test]
    fn test_set_name_validates_and_skips_noop() {
        let (mut guild, mut store, _) = guild_with_leader();
        let result = guild.set_name(&mut store, "Bad!Name");
        assert!(matches!(result, Err(GuildError::InvalidState(_))));
        let before = store.write_count;
        guild.set_name(&mut store, "Silver Hand").unwrap();
        assert_eq!(store.write_count, before);
        guild.set_name(&mut store, "Argent Dawn").unwrap();
        assert_eq!(guild.name(), "Argent Dawn");
        assert_eq!(store.load_guild(1).unwrap().unwrap().name, "Argent Dawn");
    }

    #[test]
    fn test_remove_rank_guards() {
        let (mut guild, mut store, _) = guild_with_leader();
        // Ladder is already at minimum
        let result = guild.handle_remove_lowest_rank(&mut store, 10);
        assert!(matches!(result, Err(GuildError::InvalidState(_))));
        // Non-leader rejected
        guild.handle_add_new_rank(&mut store, 10, "Peon").unwrap();
        let result = guild.handle_remove_lowest_rank(&mut store, 99);
        assert!(matches!(result, Err(GuildError::PermissionDenied)));
    }

    #[test]
    fn test_buy_bank_tab_in_order() {
        let (mut guild, mut store, mut leader) = guild_with_leader();
        leader.set_money(10_000_000);
        let result = guild.handle_buy_bank_tab(&mut store, &mut leader, 1);
        assert!(matches!(result, Err(GuildError::InvalidState(_))));
        guild.handle_buy_bank_tab(&mut store, &mut leader, 0).unwrap();
        assert_eq!(guild.purchased_tabs(), 1);
        assert_eq!(leader.money(), 9_000_000);
        // Guildmaster rank got full rights on the new tab
        assert_eq!(guild.rank(0).unwrap().bank_tab_rights(0), tab_rights::FULL);
    }

    #[test]
    fn test_validate_demotes_orphaned_ranks() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        // Simulate a stale row pointing past the ladder
        guild.members.get_mut(&20).unwrap().rank_id = 9;
        assert!(guild.validate(&mut store).unwrap());
        assert_eq!(guild.member(20).unwrap().rank_id, guild.lowest_rank_id());
    }

    #[test]
    fn test_validate_promotes_survivor_when_leader_is_gone() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        guild.members.remove(&10);
        assert!(guild.validate(&mut store).unwrap());
        assert_eq!(guild.leader_guid(), 20);
        assert_eq!(guild.member(20).unwrap().rank_id, RANK_GUILDMASTER);
    }

    #[test]
    fn test_validate_disbands_empty_guild() {
        let (mut guild, mut store, _) = guild_with_leader();
        guild.members.clear();
        assert!(!guild.validate(&mut store).unwrap());
        assert!(store.load_guild(1).unwrap().is_none());
    }

    #[test]
    fn test_validate_rebuilds_gapped_ladder() {
        let (mut guild, mut store, _) = guild_with_leader();
        // Simulate a gapped row set surviving hydration
        guild.ranks[4].rank_id = 5;
        assert!(guild.validate(&mut store).unwrap());
        assert_eq!(guild.ranks_len() as usize, GUILD_RANKS_MIN_COUNT);
        let ids: Vec<u8> = store
            .load_ranks(1)
            .unwrap()
            .iter()
            .map(|r| r.rank_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(guild.rank(4).unwrap().name(), "Initiate");
    }

    #[test]
    fn test_load_drops_excess_bank_tab_rows() {
        let (guild, mut store, _) = guild_with_leader();
        drop(guild);
        store.put_character(crate::storage::CharacterRecord {
            guid: 10,
            name: "Uther".into(),
            level: 60,
            class: 2,
            gender: 0,
            zone_id: 0,
            account_id: 1,
            logout_time: 0,
        });
        for tab_id in 0..8u8 {
            store
                .execute(Statement::InsertBankTab {
                    guild_id: 1,
                    tab_id,
                })
                .unwrap();
        }
        store
            .execute(Statement::InsertBankEventLog(
                crate::storage::BankEventLogRecord {
                    guild_id: 1,
                    guid: 0,
                    tab_id: 7,
                    event_type: BankEventLogType::DepositItem as u8,
                    player_guid: 10,
                    item_entry: 2589,
                    item_count: 5,
                    dest_tab_id: 0,
                    money: 0,
                    timestamp: 1_700_000_000,
                },
            ))
            .unwrap();
        let loaded = Guild::load(Arc::new(GuildConfig::default()), &mut store, 1)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.purchased_tabs() as usize, GUILD_BANK_MAX_TABS);
        assert!(loaded.bank_log(7).is_none());
        assert!(loaded.bank_log(GUILD_BANK_MONEY_LOGS_TAB).is_some());
    }

    #[test]
    fn test_set_leader_swaps_ranks() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Tirion");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        guild.handle_set_leader(&mut store, 10, 20).unwrap();
        assert_eq!(guild.leader_guid(), 20);
        assert_eq!(guild.member(20).unwrap().rank_id, RANK_GUILDMASTER);
        assert_eq!(guild.member(10).unwrap().rank_id, RANK_GUILDMASTER + 1);
    }

    #[test]
    fn test_event_log_records_membership_changes() {
        let (mut guild, mut store, _) = guild_with_leader();
        let mut member = BasicPlayer::new(20, "Squire");
        member.set_invited_guild(1);
        guild.handle_accept_member(&mut store, &mut member).unwrap();
        guild.handle_update_member_rank(&mut store, 10, 20, false).unwrap();
        let types: Vec<_> = guild
            .event_log_entries()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                GuildEventLogType::JoinGuild,
                GuildEventLogType::JoinGuild,
                GuildEventLogType::PromotePlayer
            ]
        );
    }

    #[test]
    fn test_broadcast_outbox_drains() {
        let (mut guild, mut store, _) = guild_with_leader();
        guild.handle_set_motd(&mut store, 10, "first").unwrap();
        let broadcasts = guild.drain_broadcasts();
        assert!(broadcasts
            .iter()
            .any(|b| matches!(b, GuildBroadcast::Event { kind: GuildEventKind::MotdChanged, .. })));
        assert!(guild.drain_broadcasts().is_empty());
    }
}
