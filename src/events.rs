//! Broadcast payloads queued by guild handlers.
//!
//! The aggregate never talks to sockets. Successful commands push these
//! plain structs onto an outbox the session layer drains and encodes
//! however its protocol requires.

use crate::PlayerGuid;

/// What happened, from the point of view of every online guild member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildEventKind {
    Promotion,
    Demotion,
    MotdChanged,
    PlayerJoined,
    PlayerLeft,
    PlayerRemoved,
    LeaderChanged,
    Disbanded,
    TabardChanged,
    RankUpdated,
    RankCreated,
    RankDeleted,
    SignedOn,
    SignedOff,
    /// Bank balance changed; carries the new total in `params`.
    BankMoneySet,
    /// A purchased tab changed contents or metadata.
    BankTabUpdated,
    BankTabPurchased,
    BankTextChanged,
}

/// One entry in a guild's broadcast outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuildBroadcast {
    /// A roster-wide notification.
    Event {
        kind: GuildEventKind,
        /// Player the event is about, when there is one.
        guid: Option<PlayerGuid>,
        /// Display strings in protocol order (names, amounts).
        params: Vec<String>,
    },
    /// Slots in one bank tab changed and viewers should refresh them.
    BankContentUpdate { tab_id: u8, slots: Vec<u8> },
}

impl GuildBroadcast {
    /// Shorthand for an event with no subject and no params.
    pub fn event(kind: GuildEventKind) -> Self {
        GuildBroadcast::Event {
            kind,
            guid: None,
            params: Vec::new(),
        }
    }

    /// Shorthand for an event about one player.
    pub fn player_event(kind: GuildEventKind, guid: PlayerGuid, name: &str) -> Self {
        GuildBroadcast::Event {
            kind,
            guid: Some(guid),
            params: vec![name.to_string()],
        }
    }
}
