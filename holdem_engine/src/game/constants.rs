//! Table-wide limits and card constants.

use super::entities::{Chips, Value};

/// Fewest seats a table may be configured with.
pub const MIN_PLAYERS: usize = 2;

/// Most seats a table may be configured with.
pub const MAX_PLAYERS: usize = 9;

/// Player ids are truncated to this many characters.
pub const MAX_PLAYER_ID_LENGTH: usize = 32;

pub const DECK_SIZE: usize = 52;
pub const HOLE_CARDS: usize = 2;
pub const BOARD_SIZE: usize = 5;

pub const TWO: Value = 2;
pub const JACK: Value = 11;
pub const QUEEN: Value = 12;
pub const KING: Value = 13;
pub const ACE: Value = 14;

/// Aces play low in a wheel (A-2-3-4-5).
pub const WHEEL_HIGH: Value = 5;

pub const DEFAULT_SMALL_BLIND: Chips = 5;
pub const DEFAULT_BIG_BLIND: Chips = 10;
pub const DEFAULT_MIN_BUY_IN: Chips = 20 * DEFAULT_BIG_BLIND;
pub const DEFAULT_MAX_BUY_IN: Chips = 100 * DEFAULT_BIG_BLIND;

/// Basis points in 100%, used by rake.
pub const BASIS_POINTS: u64 = 10_000;
