// Rejections and failures surfaced by game operations.

use thiserror::Error;

use crate::rate_limit::RateLimitError;

/// Domain rejections are raised before any state changes; `Storage` is the
/// only variant that means the request could not be served at all.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("not enough essence: need {need}, have {have}")]
    InsufficientFunds { need: i64, have: i64 },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("core recharging: try again in {remaining}")]
    CooldownActive { remaining: Wait },

    #[error("already a member of guild {0}")]
    AlreadyInGuild(String),

    #[error("only the guild owner can do that")]
    NotOwner,

    #[error("the owner cannot kick themselves; disband the guild instead")]
    SelfKick,

    #[error("{0} not found")]
    NotFound(String),

    #[error("guild name {0} is already taken")]
    NameTaken(String),

    #[error("guild requires {need} essence to join, you have {have}")]
    RequirementNotMet { need: i64, have: i64 },

    #[error("you are not in a guild")]
    NoGuild,

    #[error("guild vault holds {have}, item costs {need}")]
    InsufficientVault { need: i64, have: i64 },

    #[error("the owner cannot leave; disband the guild instead")]
    OwnerCannotLeave,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    RateLimited(#[from] RateLimitError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl GameError {
    /// Stable machine-readable kind, used in API error bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::InsufficientFunds { .. } => "insufficient_funds",
            GameError::InvalidSelection(_) => "invalid_selection",
            GameError::CooldownActive { .. } => "cooldown_active",
            GameError::AlreadyInGuild(_) => "already_in_guild",
            GameError::NotOwner => "not_owner",
            GameError::SelfKick => "self_kick",
            GameError::NotFound(_) => "not_found",
            GameError::NameTaken(_) => "name_taken",
            GameError::RequirementNotMet { .. } => "requirement_not_met",
            GameError::NoGuild => "no_guild",
            GameError::InsufficientVault { .. } => "insufficient_vault",
            GameError::OwnerCannotLeave => "owner_cannot_leave",
            GameError::InvalidRequest(_) => "invalid_request",
            GameError::RateLimited(_) => "rate_limited",
            GameError::Storage(_) => "storage",
        }
    }
}

/// A remaining wait in milliseconds. Displays as `Xh Ym`, or `Ym Zs`
/// under an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait(pub i64);

impl std::fmt::Display for Wait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = (self.0.max(0) + 999) / 1000;
        let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if h > 0 {
            write!(f, "{h}h {m}m")
        } else {
            write!(f, "{m}m {s}s")
        }
    }
}
