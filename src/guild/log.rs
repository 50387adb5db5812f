//! Bounded audit logs with persisted ring cursors.
//!
//! Each guild keeps one roster event log and one bank event log per tab
//! (plus a money log). Entries are keyed by a small ring GUID that wraps at
//! the configured capacity, so persisting a new entry overwrites the row of
//! the entry it evicts.

use std::collections::VecDeque;

use chrono::Utc;

use crate::storage::{BankEventLogRecord, EventLogRecord, Statement, Transaction};
use crate::{GuildId, PlayerGuid};

/// An entry that can stage its own row writes.
pub trait LogEntry {
    fn guid(&self) -> u32;
    /// Stage the delete-then-insert pair for this entry's GUID slot.
    fn stage(&self, trans: &mut Transaction);
}

/// Fixed-capacity FIFO over one log table.
#[derive(Debug)]
pub struct LogHolder<E: LogEntry> {
    max_records: u32,
    /// GUID of the most recently committed entry; None until the first
    /// entry is seen (loaded or committed).
    next_guid: Option<u32>,
    log: VecDeque<E>,
}

impl<E: LogEntry> LogHolder<E> {
    pub fn new(max_records: u32) -> Self {
        Self {
            max_records,
            next_guid: None,
            log: VecDeque::with_capacity(max_records as usize),
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn can_insert(&self) -> bool {
        (self.log.len() as u32) < self.max_records
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.log.iter()
    }

    /// Absorb one entry during hydration. Rows arrive newest-first, so each
    /// loaded entry goes to the front and the first row seeds the cursor.
    pub fn load_event(&mut self, entry: E) {
        if !self.can_insert() {
            return;
        }
        if self.next_guid.is_none() {
            self.next_guid = Some(entry.guid());
        }
        self.log.push_front(entry);
    }

    /// GUID the next committed entry will take.
    pub fn next_guid(&self) -> u32 {
        match self.next_guid {
            None => 0,
            Some(guid) => (guid + 1) % self.max_records,
        }
    }

    /// Commit a new entry: stage its rows, evict the oldest when full.
    /// The caller builds the entry with [`LogHolder::next_guid`].
    pub fn add_event(&mut self, trans: &mut Transaction, entry: E) {
        if !self.can_insert() {
            self.log.pop_front();
        }
        self.next_guid = Some(entry.guid());
        entry.stage(trans);
        self.log.push_back(entry);
    }
}

/// Roster event types, stored as `EventType` in `guild_eventlog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildEventLogType {
    InvitePlayer = 1,
    JoinGuild = 2,
    PromotePlayer = 3,
    DemotePlayer = 4,
    UninvitePlayer = 5,
    LeaveGuild = 6,
}

impl GuildEventLogType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::InvitePlayer),
            2 => Some(Self::JoinGuild),
            3 => Some(Self::PromotePlayer),
            4 => Some(Self::DemotePlayer),
            5 => Some(Self::UninvitePlayer),
            6 => Some(Self::LeaveGuild),
            _ => None,
        }
    }
}

/// One roster event.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub guild_id: GuildId,
    pub guid: u32,
    pub event_type: GuildEventLogType,
    pub player_guid_1: PlayerGuid,
    pub player_guid_2: PlayerGuid,
    pub new_rank: u8,
    pub timestamp: i64,
}

impl EventLogEntry {
    pub fn new(
        guild_id: GuildId,
        guid: u32,
        event_type: GuildEventLogType,
        player_guid_1: PlayerGuid,
        player_guid_2: PlayerGuid,
        new_rank: u8,
    ) -> Self {
        Self {
            guild_id,
            guid,
            event_type,
            player_guid_1,
            player_guid_2,
            new_rank,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn from_record(record: &EventLogRecord) -> Option<Self> {
        Some(Self {
            guild_id: record.guild_id,
            guid: record.guid,
            event_type: GuildEventLogType::from_u8(record.event_type)?,
            player_guid_1: record.player_guid_1,
            player_guid_2: record.player_guid_2,
            new_rank: record.new_rank,
            timestamp: record.timestamp,
        })
    }
}

impl LogEntry for EventLogEntry {
    fn guid(&self) -> u32 {
        self.guid
    }

    fn stage(&self, trans: &mut Transaction) {
        trans.append(Statement::DeleteEventLog {
            guild_id: self.guild_id,
            guid: self.guid,
        });
        trans.append(Statement::InsertEventLog(EventLogRecord {
            guild_id: self.guild_id,
            guid: self.guid,
            event_type: self.event_type as u8,
            player_guid_1: self.player_guid_1,
            player_guid_2: self.player_guid_2,
            new_rank: self.new_rank,
            timestamp: self.timestamp,
        }));
    }
}

/// Bank event types, stored as `EventType` in `guild_bank_eventlog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankEventLogType {
    DepositItem = 1,
    WithdrawItem = 2,
    MoveItem = 3,
    DepositMoney = 4,
    WithdrawMoney = 5,
    RepairMoney = 6,
    MoveItem2 = 7,
}

impl BankEventLogType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::DepositItem),
            2 => Some(Self::WithdrawItem),
            3 => Some(Self::MoveItem),
            4 => Some(Self::DepositMoney),
            5 => Some(Self::WithdrawMoney),
            6 => Some(Self::RepairMoney),
            7 => Some(Self::MoveItem2),
            _ => None,
        }
    }

    /// Money events live in the money log, never in a tab log.
    pub fn is_money_event(self) -> bool {
        matches!(
            self,
            Self::DepositMoney | Self::WithdrawMoney | Self::RepairMoney
        )
    }
}

/// One bank event. `tab_id` is the log's tab (or the money sentinel).
#[derive(Debug, Clone)]
pub struct BankEventLogEntry {
    pub guild_id: GuildId,
    pub guid: u32,
    pub tab_id: u8,
    pub event_type: BankEventLogType,
    pub player_guid: PlayerGuid,
    pub item_entry: u32,
    pub item_count: u32,
    pub dest_tab_id: u8,
    pub money: u64,
    pub timestamp: i64,
}

impl BankEventLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        guild_id: GuildId,
        guid: u32,
        tab_id: u8,
        event_type: BankEventLogType,
        player_guid: PlayerGuid,
        item_entry: u32,
        item_count: u32,
        dest_tab_id: u8,
        money: u64,
    ) -> Self {
        Self {
            guild_id,
            guid,
            tab_id,
            event_type,
            player_guid,
            item_entry,
            item_count,
            dest_tab_id,
            money,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn from_record(record: &BankEventLogRecord) -> Option<Self> {
        Some(Self {
            guild_id: record.guild_id,
            guid: record.guid,
            tab_id: record.tab_id,
            event_type: BankEventLogType::from_u8(record.event_type)?,
            player_guid: record.player_guid,
            item_entry: record.item_entry,
            item_count: record.item_count,
            dest_tab_id: record.dest_tab_id,
            money: record.money,
            timestamp: record.timestamp,
        })
    }
}

impl LogEntry for BankEventLogEntry {
    fn guid(&self) -> u32 {
        self.guid
    }

    fn stage(&self, trans: &mut Transaction) {
        trans.append(Statement::DeleteBankEventLog {
            guild_id: self.guild_id,
            tab_id: self.tab_id,
            guid: self.guid,
        });
        trans.append(Statement::InsertBankEventLog(BankEventLogRecord {
            guild_id: self.guild_id,
            guid: self.guid,
            tab_id: self.tab_id,
            event_type: self.event_type as u8,
            player_guid: self.player_guid,
            item_entry: self.item_entry,
            item_count: self.item_count,
            dest_tab_id: self.dest_tab_id,
            money: self.money,
            timestamp: self.timestamp,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(guild_id: GuildId, guid: u32) -> EventLogEntry {
        EventLogEntry::new(guild_id, guid, GuildEventLogType::JoinGuild, guid as u64, 0, 0)
    }

    #[test]
    fn test_next_guid_starts_at_zero() {
        let holder: LogHolder<EventLogEntry> = LogHolder::new(5);
        assert_eq!(holder.next_guid(), 0);
    }

    #[test]
    fn test_eviction_keeps_capacity_and_order() {
        let mut holder: LogHolder<EventLogEntry> = LogHolder::new(3);
        let mut trans = Transaction::new();
        for _ in 0..5 {
            let guid = holder.next_guid();
            holder.add_event(&mut trans, entry(1, guid));
        }
        assert_eq!(holder.len(), 3);
        // Five inserts into a ring of three wrap to guids 3, 4 mod 3
        let guids: Vec<u32> = holder.iter().map(|e| e.guid).collect();
        assert_eq!(guids, vec![2, 0, 1]);
    }

    #[test]
    fn test_load_seeds_cursor_from_newest() {
        let mut holder: LogHolder<EventLogEntry> = LogHolder::new(10);
        // Hydration order is newest first
        holder.load_event(entry(1, 4));
        holder.load_event(entry(1, 3));
        assert_eq!(holder.next_guid(), 5);
        let guids: Vec<u32> = holder.iter().map(|e| e.guid).collect();
        assert_eq!(guids, vec![3, 4]);
    }

    #[test]
    fn test_load_stops_at_capacity() {
        let mut holder: LogHolder<EventLogEntry> = LogHolder::new(2);
        holder.load_event(entry(1, 1));
        holder.load_event(entry(1, 0));
        holder.load_event(entry(1, 5));
        assert_eq!(holder.len(), 2);
    }

    #[test]
    fn test_money_event_classification() {
        assert!(BankEventLogType::DepositMoney.is_money_event());
        assert!(BankEventLogType::RepairMoney.is_money_event());
        assert!(!BankEventLogType::MoveItem.is_money_event());
    }

    #[test]
    fn test_add_event_stages_delete_then_insert() {
        let mut holder: LogHolder<EventLogEntry> = LogHolder::new(5);
        let mut trans = Transaction::new();
        holder.add_event(&mut trans, entry(7, holder.next_guid()));
        assert_eq!(trans.statements().len(), 2);
        assert!(matches!(
            trans.statements()[0],
            Statement::DeleteEventLog { guild_id: 7, guid: 0 }
        ));
        assert!(matches!(
            trans.statements()[1],
            Statement::InsertEventLog(_)
        ));
    }
}
