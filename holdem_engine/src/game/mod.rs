//! Poker game engine: cards, hand evaluation, pots, and betting rules.
//!
//! This module provides the table-local game implementation including:
//! - Card and deck model with seeded shuffling
//! - Pure seven-card hand evaluation
//! - Contribution-level pot layering for side pots
//! - The betting-round state machine (legal actions, turn order, streets)
//! - [`GameSession`], which runs one table across consecutive hands and
//!   produces per-observer views and events

// Submodules
pub mod constants;
pub mod entities;
pub mod errors;
pub mod functional;
pub mod pot;
pub mod session;
pub mod state_machine;

pub use errors::{ActionError, ConfigError, GameError, InvariantError, SeatError};
pub use pot::{Pot, PotAward, PotManager, Rake, Settlement};
pub use session::{ActionOutcome, GameEvent, GameSession, Revealed, TimeoutKey};
pub use state_machine::BettingRound;
