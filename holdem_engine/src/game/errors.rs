//! Error types for the game engine.
//!
//! Errors fall into three families that are handled very differently:
//!
//! - [`ActionError`]: a client sent an action that doesn't apply to the
//!   current state. Reported back to that client only; nothing changes.
//! - [`InvariantError`]: the engine reached a state it should never reach.
//!   The hand is aborted and stacks are restored to their pre-hand values.
//! - [`SeatError`] / [`ConfigError`]: a join or table creation was rejected
//!   before touching any table state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{Chips, SeatIndex};

/// Rejected player actions.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum ActionError {
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("not your turn")]
    NotPlayerTurn,
    #[error("need ${required} but only have ${available}")]
    InsufficientChips { required: Chips, available: Chips },
}

impl ActionError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidAction(reason.into())
    }

    /// Short machine-readable kind for outbound error notifications.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => "invalid_action",
            Self::NotPlayerTurn => "not_player_turn",
            Self::InsufficientChips { .. } => "insufficient_chips",
        }
    }
}

/// Internal consistency failures. Always fatal to the current hand.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum InvariantError {
    #[error("deck exhausted")]
    EmptyDeck,
    #[error("pot {pot} has no eligible contender")]
    NoEligibleContender { pot: usize },
}

/// Seat lifecycle rejections.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum SeatError {
    #[error("seat {0} does not exist")]
    SeatOutOfRange(SeatIndex),
    #[error("seat {0} is taken")]
    SeatTaken(SeatIndex),
    #[error("player already seated")]
    AlreadySeated,
    #[error("table is full")]
    TableFull,
    #[error("buy-in must be between ${min} and ${max}")]
    BuyInOutOfRange { min: Chips, max: Chips },
    #[error("not seated")]
    NotSeated,
}

/// Invalid table configuration.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum ConfigError {
    #[error("big blind must be greater than the small blind")]
    BlindOrder,
    #[error("small blind must be positive")]
    ZeroBlind,
    #[error("max players must be between {min} and {max}")]
    PlayerCount { min: usize, max: usize },
    #[error("buy-in range must satisfy big blind <= min <= max")]
    BuyInRange,
    #[error("action timeout must be positive")]
    ZeroTimeout,
    #[error("rake must be at most 100%")]
    Rake,
}

/// Umbrella error for session operations.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error(transparent)]
    Seat(#[from] SeatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("need 2+ players")]
    NotEnoughPlayers,
    #[error("hand already in progress")]
    HandInProgress,
}
