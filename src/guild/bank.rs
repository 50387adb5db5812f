//! One guild bank tab: metadata plus a fixed grid of item slots.

use crate::item::Item;
use crate::storage::{BankTabRecord, GuildStore, Statement, StoreError, Transaction};
use crate::GuildId;

/// Item slots per tab.
pub const GUILD_BANK_MAX_SLOTS: usize = 98;

/// Longest tab text the client accepts; longer input is truncated.
pub const MAX_BANK_TAB_TEXT_LEN: usize = 500;

#[derive(Debug)]
pub struct BankTab {
    pub guild_id: GuildId,
    pub tab_id: u8,
    name: String,
    icon: String,
    text: String,
    items: Vec<Option<Item>>,
}

impl BankTab {
    pub fn new(guild_id: GuildId, tab_id: u8) -> Self {
        Self {
            guild_id,
            tab_id,
            name: String::new(),
            icon: String::new(),
            text: String::new(),
            items: vec![None; GUILD_BANK_MAX_SLOTS],
        }
    }

    pub fn from_record(record: &BankTabRecord) -> Self {
        let mut tab = Self::new(record.guild_id, record.tab_id);
        tab.name = record.name.clone();
        tab.icon = record.icon.clone();
        tab.text = record.text.clone();
        tab
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn item(&self, slot_id: u8) -> Option<&Item> {
        self.items.get(slot_id as usize).and_then(|s| s.as_ref())
    }

    pub fn items(&self) -> &[Option<Item>] {
        &self.items
    }

    /// Place an item during hydration, without staging any write.
    pub fn load_item(&mut self, slot_id: u8, item: Item) {
        if let Some(slot) = self.items.get_mut(slot_id as usize) {
            *slot = Some(item);
        }
    }

    pub fn set_info(
        &mut self,
        store: &mut dyn GuildStore,
        name: &str,
        icon: &str,
    ) -> Result<bool, StoreError> {
        if self.name == name && self.icon == icon {
            return Ok(false);
        }
        self.name = name.to_string();
        self.icon = icon.to_string();
        store.execute(Statement::UpdateBankTabInfo {
            guild_id: self.guild_id,
            tab_id: self.tab_id,
            name: self.name.clone(),
            icon: self.icon.clone(),
        })?;
        Ok(true)
    }

    pub fn set_text(&mut self, store: &mut dyn GuildStore, text: &str) -> Result<bool, StoreError> {
        let text = truncate_utf8(text, MAX_BANK_TAB_TEXT_LEN);
        if self.text == text {
            return Ok(false);
        }
        self.text = text.to_string();
        store.execute(Statement::UpdateBankTabText {
            guild_id: self.guild_id,
            tab_id: self.tab_id,
            text: self.text.clone(),
        })?;
        Ok(true)
    }

    /// Put `item` (or clear) into a slot and stage the row writes.
    pub fn set_item(&mut self, trans: &mut Transaction, slot_id: u8, item: Option<Item>) {
        let Some(slot) = self.items.get_mut(slot_id as usize) else {
            return;
        };
        *slot = item.clone();
        trans.append(Statement::DeleteBankItem {
            guild_id: self.guild_id,
            tab_id: self.tab_id,
            slot_id,
        });
        if let Some(item) = item {
            trans.append(Statement::InsertBankItem {
                guild_id: self.guild_id,
                tab_id: self.tab_id,
                slot_id,
                item,
            });
        }
    }
}

/// Cut at a char boundary so truncation never splits a code point.
fn truncate_utf8(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
