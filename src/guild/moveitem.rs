//! Transactional item moves between bank tabs and player inventories.
//!
//! A move validates both directions before touching anything: resolve the
//! source stack, check rights and quotas, reserve destination space, and
//! only then stage removals, placements and log entries into one store
//! transaction. A swap repeats the rights checks in the reverse direction.

use crate::error::GuildError;
use crate::events::GuildBroadcast;
use crate::guild::bank::GUILD_BANK_MAX_SLOTS;
use crate::guild::log::BankEventLogType;
use crate::guild::rank::tab_rights;
use crate::item::Item;
use crate::player::GuildPlayer;
use crate::storage::{GuildStore, Transaction};
use crate::Guild;

/// Wildcard slot: let the bank pick where the stack lands.
pub const NO_SLOT: u8 = 0xFF;

/// Space reserved in one destination slot for part of a moving stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotReservation {
    pub slot: u8,
    pub count: u32,
}

/// One end of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveLocation {
    Bank { tab: u8, slot: u8 },
    Player { bag: u8, slot: u8 },
}

impl MoveLocation {
    fn is_bank(&self) -> bool {
        matches!(self, MoveLocation::Bank { .. })
    }

    fn bank_tab(&self) -> Option<u8> {
        match self {
            MoveLocation::Bank { tab, .. } => Some(*tab),
            MoveLocation::Player { .. } => None,
        }
    }
}

/// Ephemeral per-move state for one end: the resolved stack and the
/// destination space reserved for the incoming one.
#[derive(Debug)]
pub(crate) struct MoveItemData {
    loc: MoveLocation,
    item: Option<Item>,
    reserved: Vec<SlotReservation>,
}

impl MoveItemData {
    pub(crate) fn bank(tab: u8, slot: u8) -> Self {
        Self {
            loc: MoveLocation::Bank { tab, slot },
            item: None,
            reserved: Vec::new(),
        }
    }

    pub(crate) fn player(bag: u8, slot: u8) -> Self {
        Self {
            loc: MoveLocation::Player { bag, slot },
            item: None,
            reserved: Vec::new(),
        }
    }

    fn loc(&self) -> MoveLocation {
        self.loc
    }

    /// Resolve the stack at this end. Soulbound items never leave a player
    /// inventory through the bank, so they resolve as absent.
    fn init_item(&mut self, guild: &Guild, player: &dyn GuildPlayer) -> bool {
        self.item = match self.loc {
            MoveLocation::Bank { tab, slot } => {
                if slot == NO_SLOT {
                    None
                } else {
                    guild.bank_tab(tab).and_then(|t| t.item(slot)).cloned()
                }
            }
            MoveLocation::Player { bag, slot } => player
                .item_at(bag, slot)
                .filter(|item| !item.soulbound)
                .cloned(),
        };
        self.item.is_some()
    }

    /// Validate the split amount against the resolved stack. A split of
    /// the whole stack degenerates to a plain move.
    fn check_item(&self, split: &mut u32) -> bool {
        let Some(item) = &self.item else {
            return false;
        };
        if *split > item.count {
            return false;
        }
        if *split == item.count {
            *split = 0;
        }
        true
    }

    /// May the actor deposit into this end, given where the item comes
    /// from? Rearranging within one tab needs no rights.
    fn has_store_rights(&self, guild: &Guild, player: &dyn GuildPlayer, other: &MoveItemData) -> bool {
        match self.loc {
            MoveLocation::Player { .. } => true,
            MoveLocation::Bank { tab, .. } => {
                if other.loc.bank_tab() == Some(tab) {
                    return true;
                }
                guild.member_has_tab_rights(player.guid(), tab, tab_rights::DEPOSIT)
            }
        }
    }

    /// May the actor withdraw from this end, given where the item goes?
    fn has_withdraw_rights(
        &self,
        guild: &Guild,
        player: &dyn GuildPlayer,
        other: &MoveItemData,
    ) -> bool {
        match self.loc {
            MoveLocation::Player { .. } => true,
            MoveLocation::Bank { tab, .. } => {
                if other.loc.bank_tab() == Some(tab) {
                    return true;
                }
                match guild.member(player.guid()) {
                    Some(member) => guild.member_remaining_slots(member, tab) != 0,
                    None => false,
                }
            }
        }
    }

    /// Plan where `item` would land at this end, filling `reserved`.
    /// `swap` marks this end's own slot as being vacated.
    fn can_store(
        &mut self,
        guild: &Guild,
        player: &dyn GuildPlayer,
        item: &Item,
        swap: bool,
    ) -> Result<(), GuildError> {
        self.reserved.clear();
        match self.loc {
            MoveLocation::Player { bag, slot } => {
                let vacated = swap.then_some((bag, slot));
                self.reserved = player.can_store_item(bag, slot, item, vacated)?;
                Ok(())
            }
            MoveLocation::Bank { tab, slot } => {
                if item.soulbound {
                    return Err(GuildError::InvalidState(
                        "soulbound items cannot enter the guild bank",
                    ));
                }
                if item.duration > 0 {
                    return Err(GuildError::InvalidState(
                        "expiring items cannot enter the guild bank",
                    ));
                }
                let Some(bank_tab) = guild.bank_tab(tab) else {
                    return Err(GuildError::NotFound("bank tab"));
                };
                let mut count = item.count;
                if slot != NO_SLOT {
                    let mut occupant = bank_tab.item(slot);
                    if swap || occupant.map(|o| o.guid) == Some(item.guid) {
                        occupant = None;
                    }
                    if !self.reserve_space(slot, item, occupant, &mut count) {
                        return Err(GuildError::InvalidState("stacks cannot be combined"));
                    }
                    if count == 0 {
                        return Ok(());
                    }
                }
                // Merge into existing stacks first, then take empty slots.
                if item.max_stack > 1 {
                    self.scan_tab(bank_tab.items(), slot, item, true, &mut count);
                    if count == 0 {
                        return Ok(());
                    }
                }
                self.scan_tab(bank_tab.items(), slot, item, false, &mut count);
                if count == 0 {
                    return Ok(());
                }
                Err(GuildError::CapacityExceeded("bank tab is full"))
            }
        }
    }

    /// Reserve room in one slot. `occupant` is what already sits there.
    fn reserve_space(
        &mut self,
        slot: u8,
        item: &Item,
        occupant: Option<&Item>,
        count: &mut u32,
    ) -> bool {
        let mut required = item.max_stack;
        if let Some(occupant) = occupant {
            if occupant.entry != item.entry || occupant.count >= item.max_stack {
                return false;
            }
            required -= occupant.count;
        }
        let required = required.min(*count);
        if !self.reserved.iter().any(|r| r.slot == slot) {
            self.reserved.push(SlotReservation {
                slot,
                count: required,
            });
            *count -= required;
        }
        true
    }

    /// One pass over the tab: merge pass takes matching stacks, free pass
    /// takes empty slots. `skip_slot` was already handled explicitly.
    fn scan_tab(
        &mut self,
        slots: &[Option<Item>],
        skip_slot: u8,
        item: &Item,
        merge: bool,
        count: &mut u32,
    ) {
        for (slot_id, occupant) in slots.iter().enumerate() {
            if *count == 0 {
                break;
            }
            if slot_id as u8 == skip_slot {
                continue;
            }
            let occupant = occupant.as_ref().filter(|o| o.guid != item.guid);
            if occupant.is_some() != merge {
                continue;
            }
            self.reserve_space(slot_id as u8, item, occupant, count);
        }
    }

    /// Take the moving stack (or `split` of it) out of this end and stage
    /// the row writes. Cross-container bank withdrawals consume quota.
    fn remove_item(
        &mut self,
        guild: &mut Guild,
        player: &mut dyn GuildPlayer,
        trans: &mut Transaction,
        other_loc: MoveLocation,
        split: u32,
    ) {
        match self.loc {
            MoveLocation::Bank { tab, slot } => {
                if split > 0 {
                    if let Some(item) = &self.item {
                        let mut remaining = item.clone();
                        remaining.count -= split;
                        if let Some(bank_tab) = guild.bank_tab_mut(tab) {
                            bank_tab.set_item(trans, slot, Some(remaining));
                        }
                    }
                } else {
                    if let Some(bank_tab) = guild.bank_tab_mut(tab) {
                        bank_tab.set_item(trans, slot, None);
                    }
                    self.item = None;
                }
                if other_loc.bank_tab() != Some(tab) {
                    guild.update_member_withdraw_slots(trans, player.guid(), tab);
                }
            }
            MoveLocation::Player { bag, slot } => {
                if split > 0 {
                    player.remove_item_count(bag, slot, split);
                } else {
                    player.take_item(bag, slot);
                    self.item = None;
                }
                player.stage_inventory_save(trans);
            }
        }
    }

    /// Place `item` into the reserved slots and stage the row writes.
    fn store_item(
        &self,
        guild: &mut Guild,
        player: &mut dyn GuildPlayer,
        trans: &mut Transaction,
        item: Item,
    ) {
        match self.loc {
            MoveLocation::Bank { tab, .. } => {
                let Some(bank_tab) = guild.bank_tab_mut(tab) else {
                    return;
                };
                for r in &self.reserved {
                    match bank_tab.item(r.slot) {
                        Some(occupant) if occupant.entry == item.entry => {
                            let mut merged = occupant.clone();
                            merged.count = merged.count.saturating_add(r.count);
                            bank_tab.set_item(trans, r.slot, Some(merged));
                        }
                        _ => {
                            bank_tab.set_item(trans, r.slot, Some(item.clone_with_count(r.count)));
                        }
                    }
                }
            }
            MoveLocation::Player { .. } => {
                player.store_item(&self.reserved, item);
                player.stage_inventory_save(trans);
            }
        }
    }

    /// Log the arrival of `count` of `entry` at this end, coming from
    /// `from_loc`. Tab-to-tab moves land in the source tab's log.
    fn log_bank_event(
        &self,
        guild: &mut Guild,
        trans: &mut Transaction,
        player: &dyn GuildPlayer,
        from_loc: MoveLocation,
        entry: u32,
        count: u32,
    ) {
        match (self.loc, from_loc) {
            (MoveLocation::Bank { tab: dest_tab, .. }, MoveLocation::Bank { tab: src_tab, .. }) => {
                guild.stage_bank_event(
                    trans,
                    BankEventLogType::MoveItem,
                    src_tab,
                    player.guid(),
                    entry,
                    count,
                    dest_tab,
                    0,
                );
            }
            (MoveLocation::Bank { tab, .. }, MoveLocation::Player { .. }) => {
                guild.stage_bank_event(
                    trans,
                    BankEventLogType::DepositItem,
                    tab,
                    player.guid(),
                    entry,
                    count,
                    tab,
                    0,
                );
            }
            (MoveLocation::Player { .. }, MoveLocation::Bank { tab, .. }) => {
                guild.stage_bank_event(
                    trans,
                    BankEventLogType::WithdrawItem,
                    tab,
                    player.guid(),
                    entry,
                    count,
                    tab,
                    0,
                );
            }
            (MoveLocation::Player { .. }, MoveLocation::Player { .. }) => {}
        }
    }
}

impl Guild {
    /// Move or swap a stack between two bank positions.
    pub fn swap_items(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        tab_id: u8,
        slot_id: u8,
        dest_tab_id: u8,
        dest_slot_id: u8,
        split: u32,
    ) -> Result<(), GuildError> {
        let purchased = self.purchased_tabs();
        if tab_id >= purchased
            || dest_tab_id >= purchased
            || slot_id as usize >= GUILD_BANK_MAX_SLOTS
            || dest_slot_id as usize >= GUILD_BANK_MAX_SLOTS
        {
            return Err(GuildError::NotFound("bank slot"));
        }
        if tab_id == dest_tab_id && slot_id == dest_slot_id {
            return Err(GuildError::InvalidState(
                "source and destination are the same slot",
            ));
        }
        self.move_items(
            store,
            player,
            MoveItemData::bank(tab_id, slot_id),
            MoveItemData::bank(dest_tab_id, dest_slot_id),
            split,
        )
    }

    /// Move or swap a stack between a bank tab and the actor's inventory.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_items_with_inventory(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        to_player: bool,
        tab_id: u8,
        slot_id: u8,
        bag: u8,
        player_slot_id: u8,
        split: u32,
    ) -> Result<(), GuildError> {
        if (slot_id as usize >= GUILD_BANK_MAX_SLOTS && slot_id != NO_SLOT)
            || tab_id >= self.purchased_tabs()
        {
            return Err(GuildError::NotFound("bank slot"));
        }
        let bank = MoveItemData::bank(tab_id, slot_id);
        let inventory = MoveItemData::player(bag, player_slot_id);
        if to_player {
            self.move_items(store, player, bank, inventory, split)
        } else {
            self.move_items(store, player, inventory, bank, split)
        }
    }

    fn move_items(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        mut src: MoveItemData,
        mut dest: MoveItemData,
        mut split: u32,
    ) -> Result<(), GuildError> {
        // 1. Resolve the source stack; an empty source is a no-op.
        if !src.init_item(self, player) {
            return Ok(());
        }
        // 2. Validate the split amount.
        if !src.check_item(&mut split) {
            return Err(GuildError::InvalidState("split exceeds stack count"));
        }
        // 3. + 4. Rights in the move direction.
        if !dest.has_store_rights(self, player, &src) {
            return Err(GuildError::PermissionDenied);
        }
        if !src.has_withdraw_rights(self, player, &dest) {
            return Err(GuildError::PermissionDenied);
        }
        if split > 0 {
            // 5. Split: move the clone, never swap.
            self.do_items_move(store, player, &mut src, &mut dest, split)?;
        } else {
            // 6. Whole stack: try a plain move or merge first.
            match self.do_items_move(store, player, &mut src, &mut dest, 0) {
                Ok(()) => {}
                Err(err @ GuildError::Store(_)) => return Err(err),
                Err(merge_err) => {
                    // 6.2 Fall back to a swap; rights must also hold in
                    // the reverse direction.
                    if !dest.init_item(self, player) {
                        return Err(merge_err);
                    }
                    if !src.has_store_rights(self, player, &dest) {
                        return Err(GuildError::PermissionDenied);
                    }
                    if !dest.has_withdraw_rights(self, player, &src) {
                        return Err(GuildError::PermissionDenied);
                    }
                    self.do_items_move(store, player, &mut src, &mut dest, 0)?;
                }
            }
        }
        // 7. Tell viewers which slots changed.
        self.send_bank_content_update(src.loc());
        self.send_bank_content_update(dest.loc());
        Ok(())
    }

    /// Plan both directions, then stage and commit the whole move. Nothing
    /// is mutated unless every check passes.
    fn do_items_move(
        &mut self,
        store: &mut dyn GuildStore,
        player: &mut dyn GuildPlayer,
        src: &mut MoveItemData,
        dest: &mut MoveItemData,
        split: u32,
    ) -> Result<(), GuildError> {
        // The destination stack only exists after a swap fallback
        // resolved it.
        let swap = dest.item.is_some();
        let dest_item = dest.item.clone();
        let src_item = match (&src.item, split) {
            (Some(item), 0) => item.clone(),
            (Some(item), n) => item.clone_with_count(n),
            (None, _) => return Err(GuildError::NotFound("item")),
        };

        dest.can_store(self, player, &src_item, swap)?;
        if let Some(dest_item) = &dest_item {
            src.can_store(self, player, dest_item, true)?;
        }

        let mut trans = Transaction::new();
        dest.log_bank_event(self, &mut trans, player, src.loc(), src_item.entry, src_item.count);
        if let Some(dest_item) = &dest_item {
            src.log_bank_event(self, &mut trans, player, dest.loc(), dest_item.entry, dest_item.count);
        }

        src.remove_item(self, player, &mut trans, dest.loc(), split);
        if swap {
            dest.remove_item(self, player, &mut trans, src.loc(), 0);
        }
        dest.store_item(self, player, &mut trans, src_item);
        if let Some(dest_item) = dest_item {
            src.store_item(self, player, &mut trans, dest_item);
        }
        store.commit(trans)?;
        Ok(())
    }

    fn send_bank_content_update(&mut self, loc: MoveLocation) {
        if let MoveLocation::Bank { tab, slot } = loc {
            let slots = if slot == NO_SLOT { vec![] } else { vec![slot] };
            self.queue_broadcast(GuildBroadcast::BankContentUpdate { tab_id: tab, slots });
        }
    }
}
