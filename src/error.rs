//! Guild command result codes.
//!
//! Every handler on the guild aggregate returns `Result<_, GuildError>`.
//! Expected rejections (missing rights, full tab, exhausted quota) are
//! ordinary `Err` values the session layer translates into client result
//! codes; only store failures carry an underlying cause.

use thiserror::Error;

use crate::storage::StoreError;

/// Why a guild command was rejected.
#[derive(Debug, Error)]
pub enum GuildError {
    /// Actor lacks the rank right or tab right the command requires.
    #[error("permission denied")]
    PermissionDenied,

    /// Referenced guild, member, rank, tab or item does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A bounded collection is full (member limit, tab count, bank slots).
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    /// The command is valid in general but not in the current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Daily withdrawal allowance (slots or money) is exhausted.
    #[error("withdrawal quota exceeded")]
    QuotaExceeded,

    /// The target is already in the requested state or otherwise taken.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    /// Rank-ladder guard: the target outranks or equals the actor.
    #[error("target rank is too high")]
    RankTooHigh,

    /// Rank-ladder guard: the target is already at the bottom of the ladder.
    #[error("target rank is too low")]
    RankTooLow,

    /// The backing store rejected or failed the write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
