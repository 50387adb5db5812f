//! Item value object.
//!
//! Bank tab slots and player inventories both hold these. Guids are unique
//! per item instance; splitting a stack mints a new guid for the clone.

use std::sync::atomic::{AtomicU64, Ordering};

/// High range reserved for instances minted at runtime, so freshly cloned
/// stacks never collide with guids hydrated from the database.
static NEXT_ITEM_GUID: AtomicU64 = AtomicU64::new(1 << 32);

/// A stack of items occupying one bank or inventory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Instance guid, unique across bank and inventories.
    pub guid: u64,
    /// Item template entry.
    pub entry: u32,
    /// Current stack count, always >= 1 while the item exists.
    pub count: u32,
    /// Largest stack this template allows in one slot.
    pub max_stack: u32,
    /// Soulbound items may not enter the guild bank.
    pub soulbound: bool,
    /// Remaining duration in seconds; > 0 means the item expires and
    /// may not enter the guild bank.
    pub duration: i32,
}

impl Item {
    /// Create a new item instance with a freshly minted guid.
    pub fn new(entry: u32, count: u32, max_stack: u32) -> Self {
        Self {
            guid: next_item_guid(),
            entry,
            count,
            max_stack,
            soulbound: false,
            duration: 0,
        }
    }

    /// How many more of this template fit into this stack.
    pub fn free_space(&self) -> u32 {
        self.max_stack.saturating_sub(self.count)
    }

    /// Clone this item as a new instance carrying `count` units.
    pub fn clone_with_count(&self, count: u32) -> Self {
        let mut cloned = self.clone();
        cloned.guid = next_item_guid();
        cloned.count = count;
        cloned
    }
}

/// Mint a runtime item guid.
pub fn next_item_guid() -> u64 {
    NEXT_ITEM_GUID.fetch_add(1, Ordering::Relaxed)
}
