//! Table actor message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::game::{
    GameEvent, GameError, TimeoutKey,
    entities::{
        Action, ActionChoices, AppliedAction, Chips, HandId, Phase, PlayerId, SeatIndex, TableId,
        TableView,
    },
    errors::ConfigError,
};

/// Failures talking to a table or the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table {0} not found")]
    NotFound(TableId),
    #[error("table is closed")]
    Closed,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Messages that can be sent to a TableActor
#[derive(Debug)]
pub enum TableMessage {
    /// Sit down at `seat`, or the lowest free seat
    Join {
        player: PlayerId,
        seat: Option<SeatIndex>,
        buy_in: Chips,
        response: oneshot::Sender<TableResponse>,
    },

    /// Leave now, or at the end of the current hand
    Leave {
        player: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// Player action (fold, check, call, bet, raise, all-in)
    Action {
        player: PlayerId,
        action: Action,
        response: oneshot::Sender<TableResponse>,
    },

    /// Transport lost the player's connection
    Disconnected {
        player: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    Reconnected {
        player: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// View of the table for one player (or a seatless observer)
    GetView {
        player: Option<PlayerId>,
        response: oneshot::Sender<TableView>,
    },

    /// Summary snapshot
    GetState {
        response: oneshot::Sender<TableStateResponse>,
    },

    /// Start a hand now instead of waiting for auto-start
    StartHand {
        response: oneshot::Sender<TableResponse>,
    },

    /// Close table
    Close {
        response: oneshot::Sender<TableResponse>,
    },

    /// Subscribe to notifications for one player
    Subscribe {
        player: PlayerId,
        sender: mpsc::Sender<Notification>,
    },

    /// Unsubscribe from notifications
    Unsubscribe { player: PlayerId },

    /// Internal: a turn timer fired
    Timeout(TimeoutKey),

    /// Internal: the delay after hand `after` ran out
    AutoStart { after: HandId },
}

/// Outbound message to one subscriber. Sent fire-and-forget; a full
/// subscriber channel drops the message instead of stalling the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// Fresh view after a committed change
    State(TableView),
    Event(GameEvent),
    /// The acting seat must respond before `deadline`
    ActionRequired {
        seat: SeatIndex,
        choices: ActionChoices,
        deadline: DateTime<Utc>,
    },
    /// Sent only to the player whose request was rejected
    Error {
        seat: Option<SeatIndex>,
        kind: String,
        message: String,
    },
}

/// Response from table operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableResponse {
    /// Operation succeeded
    Success,

    Seated(SeatIndex),

    /// `cash_out` is `None` while the seat finishes the current hand
    Left { cash_out: Option<Chips> },

    ActionApplied(AppliedAction),

    /// The action arrived after the seat's timer had already acted for it
    Discarded,

    HandStarted(HandId),

    /// The game rejected the request; nothing changed
    Rejected(GameError),

    /// Player not at table
    NotAtTable,
}

/// Table state response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStateResponse {
    /// Table ID
    pub table_id: TableId,

    /// Table name
    pub table_name: String,

    /// Current player count
    pub player_count: usize,

    /// Maximum players
    pub max_players: usize,

    pub small_blind: Chips,
    pub big_blind: Chips,

    /// Chips in the middle
    pub pot_size: Chips,

    /// Current game phase
    pub phase: Phase,

    /// Hands dealt so far
    pub hand_count: HandId,

    /// Player ids at table, by seat
    pub players: Vec<PlayerId>,

    /// Table speed
    pub speed: String,
}

impl TableResponse {
    /// Check if response is success
    pub fn is_success(&self) -> bool {
        !matches!(self, TableResponse::Rejected(_) | TableResponse::NotAtTable)
    }

    /// Get error message if response is error
    pub fn error_message(&self) -> Option<String> {
        match self {
            TableResponse::Rejected(err) => Some(err.to_string()),
            TableResponse::NotAtTable => Some("Not at table".to_string()),
            _ => None,
        }
    }
}
