//! # Hold'em Engine
//!
//! A multiplayer Texas Hold'em table engine: rules, hand evaluation, side
//! pots, and the turn/timeout policy that keeps a table moving with
//! untrusted or disconnecting clients.
//!
//! ## Architecture
//!
//! The crate is split in two layers:
//!
//! - [`game`]: synchronous, I/O-free game logic. A [`GameSession`] owns one
//!   table's seats and hands; every mutation is validated, applied, and
//!   turned into [`GameEvent`]s and per-observer [`TableView`]s.
//! - [`table`]: the async layer. Each table runs as a Tokio actor with an
//!   mpsc inbox processed serially, a cancellable turn timer, and
//!   fire-and-forget notifications to subscribers. The [`TableManager`]
//!   is an explicit registry that creates tables on first join and tears
//!   them down once empty.
//!
//! A hand runs `Preflop → Flop → Turn → River → Showdown → HandComplete`,
//! or ends early in `HandAbortedAllButOneFolded` when everyone else folds.
//!
//! ## Example
//!
//! ```
//! use holdem_engine::{GameSession, PlayerId, TableConfig, entities::Action};
//!
//! let mut session = GameSession::with_seed(1, TableConfig::default(), 42).unwrap();
//! session.join(PlayerId::new("alice"), None, 500).unwrap();
//! session.join(PlayerId::new("bob"), None, 500).unwrap();
//! session.start_hand().unwrap();
//!
//! let acting = session.acting_seat().unwrap();
//! session.apply_action(acting, &Action::Fold).unwrap();
//! assert_eq!(session.chips_in_play(), 1000);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    ActionOutcome, GameEvent, GameSession, TimeoutKey,
    constants::{self, MAX_PLAYERS, MIN_PLAYERS},
    entities::{self, PlayerId, TableView},
    errors, functional,
};

/// Async table actors and the table registry.
pub mod table;
pub use table::{TableConfig, TableHandle, TableManager};
