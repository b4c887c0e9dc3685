//! Table configuration models.

use serde::{Deserialize, Serialize};

use crate::game::{
    constants::{
        BASIS_POINTS, DEFAULT_BIG_BLIND, DEFAULT_MAX_BUY_IN, DEFAULT_MIN_BUY_IN,
        DEFAULT_SMALL_BLIND, MAX_PLAYERS, MIN_PLAYERS,
    },
    entities::{Blinds, Chips, SeatIndex},
    errors::ConfigError,
    pot::Rake,
    state_machine::clockwise,
};

/// Table speed variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSpeed {
    Normal,
    Turbo,
    Hyper,
}

impl TableSpeed {
    /// Action timeout for this speed, in milliseconds.
    #[must_use]
    pub fn action_timeout_ms(&self) -> u64 {
        match self {
            TableSpeed::Normal => 30_000,
            TableSpeed::Turbo => 15_000,
            TableSpeed::Hyper => 5_000,
        }
    }
}

impl std::fmt::Display for TableSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSpeed::Normal => write!(f, "normal"),
            TableSpeed::Turbo => write!(f, "turbo"),
            TableSpeed::Hyper => write!(f, "hyper"),
        }
    }
}

/// Who gets the leftover chip when a pot doesn't split evenly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddChipRule {
    /// First tied winner clockwise from the button.
    #[default]
    LeftOfButton,
    LowestSeatIndex,
}

impl OddChipRule {
    /// Seat priority for odd chips.
    #[must_use]
    pub fn order(&self, num_seats: usize, button: SeatIndex) -> Vec<SeatIndex> {
        match self {
            OddChipRule::LeftOfButton => clockwise(num_seats, button).collect(),
            OddChipRule::LowestSeatIndex => (0..num_seats).collect(),
        }
    }
}

/// Table configuration, fixed for the table's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Number of seats (2-9)
    pub max_players: usize,

    pub small_blind: Chips,
    pub big_blind: Chips,

    /// Smallest stack a player may sit down with
    pub min_buy_in: Chips,

    /// Largest stack a player may sit down with
    pub max_buy_in: Chips,

    /// Table speed the action timeout was derived from
    pub speed: TableSpeed,

    /// Time the acting seat has before it's auto-checked or auto-folded
    pub action_timeout_ms: u64,

    /// Pause between the end of one hand and the start of the next
    pub next_hand_delay_ms: u64,

    pub odd_chip_rule: OddChipRule,

    /// House rake, if any
    pub rake: Option<Rake>,
}

impl Default for TableConfig {
    fn default() -> Self {
        let speed = TableSpeed::Normal;
        Self {
            name: "Default Table".to_string(),
            max_players: MAX_PLAYERS,
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            min_buy_in: DEFAULT_MIN_BUY_IN,
            max_buy_in: DEFAULT_MAX_BUY_IN,
            speed,
            action_timeout_ms: speed.action_timeout_ms(),
            next_hand_delay_ms: 3_000,
            odd_chip_rule: OddChipRule::default(),
            rake: None,
        }
    }
}

impl TableConfig {
    /// Switch speed and take its action timeout.
    #[must_use]
    pub fn with_speed(mut self, speed: TableSpeed) -> Self {
        self.speed = speed;
        self.action_timeout_ms = speed.action_timeout_ms();
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.small_blind == 0 {
            return Err(ConfigError::ZeroBlind);
        }

        if self.big_blind <= self.small_blind {
            return Err(ConfigError::BlindOrder);
        }

        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(ConfigError::PlayerCount {
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
            });
        }

        if self.min_buy_in < self.big_blind || self.max_buy_in < self.min_buy_in {
            return Err(ConfigError::BuyInRange);
        }

        if self.action_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self
            .rake
            .is_some_and(|rake| u64::from(rake.bps) > BASIS_POINTS)
        {
            return Err(ConfigError::Rake);
        }

        Ok(())
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.small_blind,
            big: self.big_blind,
        }
    }
}
