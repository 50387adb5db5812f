//! Guild subsystem for a persistent-world game server.
//!
//! Owns guild lifecycle, membership and ranks, the shared multi-tab guild
//! bank with per-rank withdrawal quotas, and the bounded audit logs. The
//! session transport, player inventory and relational store are
//! collaborators reached through the traits in [`player`] and [`storage`].

/// Guild limits and prices, parsed from YAML
pub mod config;
/// Command result codes
pub mod error;
/// Broadcast payloads handed back to the session layer
pub mod events;
/// The guild aggregate and its parts
pub mod guild;
/// Item value object shared between bank tabs and inventories
pub mod item;
/// Player/inventory collaborator contract
pub mod player;
/// Guild id generation and id/name resolution
pub mod registry;
/// Persistent store contract plus memory and MySQL backends
pub mod storage;

pub use config::GuildConfig;
pub use error::GuildError;
pub use events::{GuildBroadcast, GuildEventKind};
pub use guild::Guild;
pub use item::Item;
pub use player::{BasicPlayer, GuildPlayer};
pub use registry::GuildRegistry;
pub use storage::{GuildStore, MemoryStore, Statement, StoreError, Transaction};

/// Guild identifier as stored in the `guild` table.
pub type GuildId = u32;
/// Character guid as stored in the `characters` table.
pub type PlayerGuid = u64;
