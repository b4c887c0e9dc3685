//! One table's game across consecutive hands.
//!
//! [`GameSession`] owns the seats, the deck, the pots, and the current
//! [`BettingRound`]. Every public mutation runs to completion before
//! returning: it validates, applies, advances streets (dealing the run-out
//! when betting is over), settles, and queues the resulting
//! [`GameEvent`]s. The owner drains those events after each call and
//! broadcasts them; the session itself never does I/O.
//!
//! Invariant failures don't propagate as panics. The hand is aborted,
//! every stack is restored to its pre-hand value, and a
//! [`GameEvent::HandAborted`] is queued.

use log::{debug, error, info, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};

use super::{
    constants::HOLE_CARDS,
    entities::{
        Action, ActionChoices, AppliedAction, Card, Chips, Deck, HandId, Phase, PlayerId, Seat,
        SeatIndex, SeatStatus, SeatView, TableId, TableView,
    },
    errors::{ActionError, GameError, InvariantError, SeatError},
    functional::{self, HandRanking},
    pot::{PotAward, PotManager, Rake, Settlement},
    state_machine::{BettingRound, clockwise, next_seat},
};
use crate::table::config::TableConfig;

/// Identifies one turn. A timer fires with the key it was armed with and
/// is ignored unless that exact turn is still pending.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TimeoutKey {
    pub table_id: TableId,
    pub hand_id: HandId,
    pub seat: SeatIndex,
    pub action_seq: u64,
}

/// What became of a player's action.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ActionOutcome {
    Applied(AppliedAction),
    /// The seat's turn already ended on its timer. Dropped without effect.
    Discarded,
}

/// A contender's hand shown at showdown.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Revealed {
    pub seat: SeatIndex,
    pub player: PlayerId,
    pub cards: Vec<Card>,
    pub ranking: HandRanking,
}

/// Things that happened at the table, in order.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameEvent {
    SeatJoined {
        seat: SeatIndex,
        player: PlayerId,
        chips: Chips,
    },
    /// `chips` is what the player cashes out with.
    SeatLeft {
        seat: SeatIndex,
        player: PlayerId,
        chips: Chips,
    },
    Disconnected {
        seat: SeatIndex,
    },
    Reconnected {
        seat: SeatIndex,
    },
    HandStarted {
        hand_id: HandId,
        button: SeatIndex,
        small_blind_seat: SeatIndex,
        big_blind_seat: SeatIndex,
        dealt: Vec<SeatIndex>,
    },
    /// `cards` are the community cards this phase revealed.
    PhaseChanged {
        phase: Phase,
        cards: Vec<Card>,
        board: Vec<Card>,
    },
    ActionApplied {
        seat: SeatIndex,
        action: AppliedAction,
        timed_out: bool,
    },
    ActionRequired {
        seat: SeatIndex,
        choices: ActionChoices,
        key: TimeoutKey,
    },
    HandEnded {
        hand_id: HandId,
        awards: Vec<PotAward>,
        payouts: BTreeMap<SeatIndex, Chips>,
        /// Empty when everyone else folded.
        revealed: Vec<Revealed>,
        rake: Chips,
        uncalled: Option<(SeatIndex, Chips)>,
    },
    HandAborted {
        hand_id: HandId,
        reason: InvariantError,
    },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeatJoined { seat, player, chips } => {
                write!(f, "{player} sat down at seat {seat} with ${chips}")
            }
            Self::SeatLeft { seat, player, chips } => {
                write!(f, "{player} left seat {seat} with ${chips}")
            }
            Self::Disconnected { seat } => write!(f, "seat {seat} disconnected"),
            Self::Reconnected { seat } => write!(f, "seat {seat} reconnected"),
            Self::HandStarted {
                hand_id, button, ..
            } => write!(f, "hand #{hand_id} started, button at seat {button}"),
            Self::PhaseChanged { phase, board, .. } => {
                let board = board
                    .iter()
                    .map(|card| card.to_string().trim().to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{phase} [{board}]")
            }
            Self::ActionApplied {
                seat,
                action,
                timed_out,
            } => {
                let suffix = if *timed_out { " (timed out)" } else { "" };
                write!(f, "seat {seat} {action}{suffix}")
            }
            Self::ActionRequired { seat, choices, .. } => {
                write!(f, "seat {seat} to act: {choices}")
            }
            Self::HandEnded {
                hand_id, payouts, ..
            } => {
                let winners = payouts
                    .iter()
                    .map(|(seat, amount)| format!("seat {seat} won ${amount}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "hand #{hand_id} ended: {winners}")
            }
            Self::HandAborted { hand_id, reason } => {
                write!(f, "hand #{hand_id} aborted ({reason}), stacks restored")
            }
        }
    }
}

#[derive(Debug)]
pub struct GameSession {
    table_id: TableId,
    config: TableConfig,
    seats: Vec<Option<Seat>>,
    deck: Deck,
    rng: StdRng,
    pots: PotManager,
    /// Betting state of the current (or just finished) hand. Kept after
    /// the hand ends so the final board stays visible.
    round: Option<BettingRound>,
    phase: Phase,
    hand_id: HandId,
    button: Option<SeatIndex>,
    action_seq: u64,
    pending: Option<TimeoutKey>,
    /// Last turn the timer acted for, until that seat is asked again.
    timed_out: Option<TimeoutKey>,
    pre_hand_stacks: BTreeMap<SeatIndex, Chips>,
    /// Showdown hands, visible to everyone until the next hand starts.
    revealed: BTreeMap<SeatIndex, Revealed>,
    events: VecDeque<GameEvent>,
    rake_collected: Chips,
}

impl GameSession {
    /// # Errors
    ///
    /// Any [`ConfigError`](super::errors::ConfigError) from validation.
    pub fn new(table_id: TableId, config: TableConfig) -> Result<Self, GameError> {
        Self::with_rng(table_id, config, StdRng::from_os_rng())
    }

    /// Same as [`GameSession::new`] but with reproducible shuffles.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`](super::errors::ConfigError) from validation.
    pub fn with_seed(table_id: TableId, config: TableConfig, seed: u64) -> Result<Self, GameError> {
        Self::with_rng(table_id, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(table_id: TableId, config: TableConfig, rng: StdRng) -> Result<Self, GameError> {
        config.validate()?;
        Ok(Self {
            table_id,
            seats: vec![None; config.max_players],
            config,
            deck: Deck::new(),
            rng,
            pots: PotManager::new(),
            round: None,
            phase: Phase::WaitingForPlayers,
            hand_id: 0,
            button: None,
            action_seq: 0,
            pending: None,
            timed_out: None,
            pre_hand_stacks: BTreeMap::new(),
            revealed: BTreeMap::new(),
            events: VecDeque::new(),
            rake_collected: 0,
        })
    }

    // === Seat management ===

    /// Seat a player, at `seat` if given or the lowest free seat.
    ///
    /// # Errors
    ///
    /// A [`SeatError`] if the player is already seated, the buy-in is out
    /// of range, or no suitable seat is free. The table is unchanged.
    pub fn join(
        &mut self,
        player: PlayerId,
        seat: Option<SeatIndex>,
        buy_in: Chips,
    ) -> Result<SeatIndex, SeatError> {
        if self.seat_of(&player).is_some() {
            return Err(SeatError::AlreadySeated);
        }
        if !(self.config.min_buy_in..=self.config.max_buy_in).contains(&buy_in) {
            return Err(SeatError::BuyInOutOfRange {
                min: self.config.min_buy_in,
                max: self.config.max_buy_in,
            });
        }
        let seat_idx = match seat {
            Some(idx) if idx >= self.seats.len() => return Err(SeatError::SeatOutOfRange(idx)),
            Some(idx) if self.seats[idx].is_some() => return Err(SeatError::SeatTaken(idx)),
            Some(idx) => idx,
            None => self
                .seats
                .iter()
                .position(Option::is_none)
                .ok_or(SeatError::TableFull)?,
        };
        info!(
            "table {}: {player} joined seat {seat_idx} with ${buy_in}",
            self.table_id
        );
        self.seats[seat_idx] = Some(Seat::new(player.clone(), buy_in));
        self.events.push_back(GameEvent::SeatJoined {
            seat: seat_idx,
            player,
            chips: buy_in,
        });
        Ok(seat_idx)
    }

    /// Leave the table. Returns the cash-out amount if the seat was freed
    /// right away, or `None` if the seat is in the current hand; it is
    /// folded now and freed when the hand ends.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotSeated`] if the seat is empty.
    pub fn leave(&mut self, seat_idx: SeatIndex) -> Result<Option<Chips>, SeatError> {
        let seat = self
            .seats
            .get_mut(seat_idx)
            .and_then(Option::as_mut)
            .ok_or(SeatError::NotSeated)?;
        if !self.phase.is_betting() || seat.status == SeatStatus::SittingOut {
            return self.remove_seat(seat_idx).map(Some);
        }

        seat.leaving = true;
        let in_hand = seat.in_hand();
        debug!(
            "table {}: seat {seat_idx} leaving after hand {}",
            self.table_id, self.hand_id
        );
        if in_hand && let Some(round) = self.round.as_mut() {
            if round.acting == Some(seat_idx) {
                self.pending = None;
            }
            round.fold_out_of_turn(&mut self.seats, &mut self.pots, seat_idx);
            self.events.push_back(GameEvent::ActionApplied {
                seat: seat_idx,
                action: AppliedAction::Fold,
                timed_out: false,
            });
            self.progress();
        }
        Ok(None)
    }

    fn remove_seat(&mut self, seat_idx: SeatIndex) -> Result<Chips, SeatError> {
        let seat = self
            .seats
            .get_mut(seat_idx)
            .and_then(Option::take)
            .ok_or(SeatError::NotSeated)?;
        self.revealed.remove(&seat_idx);
        info!(
            "table {}: {} left seat {seat_idx} with ${}",
            self.table_id, seat.player, seat.chips
        );
        self.events.push_back(GameEvent::SeatLeft {
            seat: seat_idx,
            player: seat.player,
            chips: seat.chips,
        });
        Ok(seat.chips)
    }

    fn remove_leavers(&mut self) {
        let leavers: Vec<SeatIndex> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, seat)| seat.as_ref().is_some_and(|seat| seat.leaving))
            .map(|(idx, _)| idx)
            .collect();
        for seat_idx in leavers {
            if let Err(err) = self.remove_seat(seat_idx) {
                warn!("table {}: couldn't free seat {seat_idx}: {err}", self.table_id);
            }
        }
    }

    /// Flag a seat as disconnected. It stays in the current hand and is
    /// acted for by the turn timer; its pending timeout is untouched.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotSeated`] if the seat is empty.
    pub fn mark_disconnected(&mut self, seat_idx: SeatIndex) -> Result<(), SeatError> {
        let seat = self.seat_mut(seat_idx)?;
        if !seat.disconnected {
            seat.disconnected = true;
            info!("table {}: seat {seat_idx} disconnected", self.table_id);
            self.events
                .push_back(GameEvent::Disconnected { seat: seat_idx });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// [`SeatError::NotSeated`] if the seat is empty.
    pub fn mark_reconnected(&mut self, seat_idx: SeatIndex) -> Result<(), SeatError> {
        let seat = self.seat_mut(seat_idx)?;
        if seat.disconnected {
            seat.disconnected = false;
            info!("table {}: seat {seat_idx} reconnected", self.table_id);
            self.events
                .push_back(GameEvent::Reconnected { seat: seat_idx });
        }
        Ok(())
    }

    fn seat_mut(&mut self, seat_idx: SeatIndex) -> Result<&mut Seat, SeatError> {
        self.seats
            .get_mut(seat_idx)
            .and_then(Option::as_mut)
            .ok_or(SeatError::NotSeated)
    }

    // === Hand lifecycle ===

    /// Seats that would be dealt into a hand started now.
    #[must_use]
    pub fn eligible_seats(&self) -> Vec<SeatIndex> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(_, seat)| {
                seat.as_ref()
                    .is_some_and(|seat| seat.chips > 0 && !seat.disconnected && !seat.leaving)
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    #[must_use]
    pub fn can_start_hand(&self) -> bool {
        !self.is_hand_in_progress() && self.eligible_seats().len() >= 2
    }

    /// The seats a new hand would be dealt to. The live deck is untouched
    /// on failure.
    fn check_can_start(&self) -> Result<Vec<SeatIndex>, GameError> {
        if self.is_hand_in_progress() {
            return Err(GameError::HandInProgress);
        }
        let eligible = self.eligible_seats();
        if eligible.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        Ok(eligible)
    }

    /// Shuffle and deal a new hand.
    ///
    /// # Errors
    ///
    /// [`GameError::HandInProgress`], [`GameError::NotEnoughPlayers`], or
    /// the [`InvariantError`] that aborted the hand.
    pub fn start_hand(&mut self) -> Result<HandId, GameError> {
        self.check_can_start()?;
        let mut deck = std::mem::take(&mut self.deck);
        deck.shuffle(&mut self.rng);
        self.start_hand_with_deck(deck)
    }

    /// Deal a new hand from `deck` as given, without shuffling. Cards go
    /// out one at a time clockwise from the seat left of the button, then
    /// the flop, turn and river.
    ///
    /// # Errors
    ///
    /// Same as [`GameSession::start_hand`].
    pub fn start_hand_with_deck(&mut self, deck: Deck) -> Result<HandId, GameError> {
        let eligible = self.check_can_start()?;
        self.deck = deck;

        self.revealed.clear();
        self.pots = PotManager::new();
        self.pre_hand_stacks = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(idx, seat)| seat.as_ref().map(|seat| (idx, seat.chips)))
            .collect();
        for seat in self.seats.iter_mut().flatten() {
            seat.reset();
        }
        for idx in &eligible {
            if let Some(seat) = self.seats[*idx].as_mut() {
                seat.status = SeatStatus::Active;
            }
        }

        let last = self.button.unwrap_or(self.seats.len() - 1);
        let button = next_seat(&self.seats, last, |seat| seat.status == SeatStatus::Active)
            .unwrap_or(eligible[0]);
        self.button = Some(button);
        self.hand_id += 1;
        self.action_seq = 0;
        self.pending = None;
        self.timed_out = None;
        self.phase = Phase::Preflop;

        let round = BettingRound::preflop(
            &mut self.seats,
            &mut self.pots,
            button,
            &self.config.blinds(),
        );
        info!(
            "table {}: hand {} started, button {button}, blinds {} ({} seats)",
            self.table_id,
            self.hand_id,
            self.config.blinds(),
            eligible.len()
        );
        self.events.push_back(GameEvent::HandStarted {
            hand_id: self.hand_id,
            button,
            small_blind_seat: round.small_blind_seat,
            big_blind_seat: round.big_blind_seat,
            dealt: eligible,
        });
        self.round = Some(round);

        if let Err(err) = self.deal_hole_cards(button) {
            self.abort(err.clone());
            return Err(err.into());
        }
        self.events.push_back(GameEvent::PhaseChanged {
            phase: Phase::Preflop,
            cards: Vec::new(),
            board: Vec::new(),
        });
        self.progress();
        Ok(self.hand_id)
    }

    fn deal_hole_cards(&mut self, button: SeatIndex) -> Result<(), InvariantError> {
        for _ in 0..HOLE_CARDS {
            for idx in clockwise(self.seats.len(), button) {
                if let Some(seat) = self.seats[idx].as_mut()
                    && seat.in_hand()
                {
                    seat.hole_cards.push(self.deck.draw()?);
                }
            }
        }
        Ok(())
    }

    /// Apply an action for the acting seat and run the table forward.
    ///
    /// An action from a seat whose turn just ran out on its timer is
    /// [`ActionOutcome::Discarded`] until that seat is asked to act again.
    ///
    /// # Errors
    ///
    /// An [`ActionError`] if the action is rejected. Nothing changes and
    /// nothing is broadcast in that case.
    pub fn apply_action(
        &mut self,
        seat_idx: SeatIndex,
        action: &Action,
    ) -> Result<ActionOutcome, ActionError> {
        if self
            .timed_out
            .is_some_and(|key| key.seat == seat_idx && key.hand_id == self.hand_id)
        {
            debug!(
                "table {}: seat {seat_idx} acted after its timeout, discarding {action}",
                self.table_id
            );
            return Ok(ActionOutcome::Discarded);
        }
        self.act(seat_idx, action, false).map(ActionOutcome::Applied)
    }

    fn act(
        &mut self,
        seat_idx: SeatIndex,
        action: &Action,
        timed_out: bool,
    ) -> Result<AppliedAction, ActionError> {
        let Some(round) = self.round.as_mut().filter(|round| round.phase.is_betting()) else {
            return Err(ActionError::NotPlayerTurn);
        };
        let applied = round
            .apply(&mut self.seats, &mut self.pots, seat_idx, action)
            .inspect_err(|err| {
                debug!(
                    "table {}: seat {seat_idx} rejected {action}: {err}",
                    self.table_id
                );
            })?;
        debug!("table {}: seat {seat_idx} {applied}", self.table_id);
        self.pending = None;
        self.events.push_back(GameEvent::ActionApplied {
            seat: seat_idx,
            action: applied.clone(),
            timed_out,
        });
        self.progress();
        Ok(applied)
    }

    /// The turn currently waiting on a timer, if any.
    #[must_use]
    pub fn pending_timeout(&self) -> Option<TimeoutKey> {
        self.pending
    }

    /// Act for a seat whose timer expired: check if checking is legal,
    /// fold otherwise. Keys for turns that already ended are ignored.
    pub fn handle_timeout(&mut self, key: TimeoutKey) -> Option<AppliedAction> {
        if self.pending != Some(key) {
            debug!("table {}: ignoring stale timeout {key:?}", self.table_id);
            return None;
        }
        let round = self.round.as_ref()?;
        let action = if round.legal_actions(&self.seats, key.seat).can_check() {
            Action::Check
        } else {
            Action::Fold
        };
        info!(
            "table {}: seat {} timed out and {action}",
            self.table_id, key.seat
        );
        // Recorded first: acting may ask the same seat again straight away.
        self.timed_out = Some(key);
        match self.act(key.seat, &action, true) {
            Ok(applied) => Some(applied),
            Err(err) => {
                self.timed_out = None;
                warn!("table {}: timeout action failed: {err}", self.table_id);
                None
            }
        }
    }

    fn progress(&mut self) {
        if let Err(err) = self.try_progress() {
            self.abort(err);
        }
    }

    /// Ask the next seat to act, deal streets whose betting is closed, or
    /// finish the hand.
    fn try_progress(&mut self) -> Result<(), InvariantError> {
        loop {
            let Some(round) = self.round.as_mut() else {
                return Ok(());
            };
            if !round.phase.is_betting() {
                return Ok(());
            }
            let in_hand: Vec<SeatIndex> = self
                .seats
                .iter()
                .enumerate()
                .filter(|(_, seat)| seat.as_ref().is_some_and(Seat::in_hand))
                .map(|(idx, _)| idx)
                .collect();
            match in_hand[..] {
                [] => return Err(InvariantError::NoEligibleContender { pot: 0 }),
                [winner] => return self.finish_uncontested(winner),
                _ => {}
            }
            if let Some(seat_idx) = round.acting {
                self.request_action(seat_idx);
                return Ok(());
            }
            if round.phase == Phase::River {
                return self.showdown();
            }
            if let Some(cards) = round.advance(&mut self.seats, &mut self.deck)? {
                self.phase = round.phase;
                debug!("table {}: {}", self.table_id, round.summary());
                self.events.push_back(GameEvent::PhaseChanged {
                    phase: round.phase,
                    cards,
                    board: round.board.clone(),
                });
            }
        }
    }

    fn request_action(&mut self, seat_idx: SeatIndex) {
        if self.pending.is_some_and(|key| key.seat == seat_idx) {
            return;
        }
        if self.timed_out.is_some_and(|key| key.seat == seat_idx) {
            self.timed_out = None;
        }
        let Some(round) = self.round.as_ref() else {
            return;
        };
        self.action_seq += 1;
        let key = TimeoutKey {
            table_id: self.table_id,
            hand_id: self.hand_id,
            seat: seat_idx,
            action_seq: self.action_seq,
        };
        self.pending = Some(key);
        self.events.push_back(GameEvent::ActionRequired {
            seat: seat_idx,
            choices: round.legal_actions(&self.seats, seat_idx),
            key,
        });
    }

    fn return_uncalled(&mut self) -> Option<(SeatIndex, Chips)> {
        let (seat_idx, amount) = self.pots.return_uncalled()?;
        if let Some(seat) = self.seats[seat_idx].as_mut() {
            seat.chips += amount;
            seat.hand_contribution -= amount;
            seat.round_contribution = seat.round_contribution.saturating_sub(amount);
        }
        Some((seat_idx, amount))
    }

    /// No flop, no drop.
    fn rake_for_hand(&self) -> Option<Rake> {
        self.round
            .as_ref()
            .filter(|round| !round.board.is_empty())
            .and(self.config.rake)
    }

    fn finish_uncontested(&mut self, winner: SeatIndex) -> Result<(), InvariantError> {
        let uncalled = self.return_uncalled();
        let settlement = self.pots.award_all(winner, self.rake_for_hand().as_ref());
        self.phase = Phase::HandAbortedAllButOneFolded;
        self.conclude(settlement, Vec::new(), uncalled);
        Ok(())
    }

    fn showdown(&mut self) -> Result<(), InvariantError> {
        self.phase = Phase::Showdown;
        let (board, button) = match self.round.as_mut() {
            Some(round) => {
                round.phase = Phase::Showdown;
                round.acting = None;
                (round.board.clone(), round.button)
            }
            None => return Ok(()),
        };
        self.events.push_back(GameEvent::PhaseChanged {
            phase: Phase::Showdown,
            cards: Vec::new(),
            board: board.clone(),
        });

        let uncalled = self.return_uncalled();
        let mut rankings = BTreeMap::new();
        let mut revealed = Vec::new();
        for (idx, seat) in self.seats.iter().enumerate() {
            let Some(seat) = seat.as_ref().filter(|seat| seat.in_hand()) else {
                continue;
            };
            let mut cards = seat.hole_cards.clone();
            cards.extend(board.iter().copied());
            let ranking = functional::eval(&cards);
            rankings.insert(idx, ranking.clone());
            revealed.push(Revealed {
                seat: idx,
                player: seat.player.clone(),
                cards: seat.hole_cards.clone(),
                ranking,
            });
        }

        let order = self.config.odd_chip_rule.order(self.seats.len(), button);
        let settlement = self
            .pots
            .settle(&rankings, &order, self.rake_for_hand().as_ref())?;
        self.revealed = revealed
            .iter()
            .map(|revealed| (revealed.seat, revealed.clone()))
            .collect();
        self.phase = Phase::HandComplete;
        self.conclude(settlement, revealed, uncalled);
        Ok(())
    }

    fn conclude(
        &mut self,
        settlement: Settlement,
        revealed: Vec<Revealed>,
        uncalled: Option<(SeatIndex, Chips)>,
    ) {
        for (seat_idx, amount) in &settlement.payouts {
            if let Some(seat) = self.seats[*seat_idx].as_mut() {
                seat.chips += amount;
            }
        }
        self.rake_collected += settlement.rake;
        self.pending = None;
        self.pots = PotManager::new();
        if let Some(round) = self.round.as_mut() {
            round.acting = None;
        }
        info!(
            "table {}: hand {} ended ({}), paid {:?}, rake ${}",
            self.table_id, self.hand_id, self.phase, settlement.payouts, settlement.rake
        );
        self.events.push_back(GameEvent::HandEnded {
            hand_id: self.hand_id,
            awards: settlement.awards,
            payouts: settlement.payouts,
            revealed,
            rake: settlement.rake,
            uncalled,
        });
        self.remove_leavers();
    }

    /// Throw the hand away and put every stack back where it started.
    pub(crate) fn abort(&mut self, reason: InvariantError) {
        error!(
            "table {}: aborting hand {}: {reason}; session dump: {self:?}",
            self.table_id, self.hand_id
        );
        for (seat_idx, chips) in &self.pre_hand_stacks {
            if let Some(seat) = self.seats.get_mut(*seat_idx).and_then(Option::as_mut) {
                seat.chips = *chips;
            }
        }
        for seat in self.seats.iter_mut().flatten() {
            seat.reset();
        }
        self.pots = PotManager::new();
        self.round = None;
        self.phase = Phase::WaitingForPlayers;
        self.pending = None;
        self.revealed.clear();
        self.events.push_back(GameEvent::HandAborted {
            hand_id: self.hand_id,
            reason,
        });
        self.remove_leavers();
    }

    // === Views and accessors ===

    /// What `observer` may see. Hole cards are only shown to their owner,
    /// except hands revealed at showdown, which everyone sees until the
    /// next hand.
    #[must_use]
    pub fn state_view(&self, observer: Option<&PlayerId>) -> TableView {
        let observer_seat = observer.and_then(|player| self.seat_of(player));
        let seats = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(idx, seat)| seat.as_ref().map(|seat| (idx, seat)))
            .map(|(idx, seat)| {
                let revealed = self.revealed.get(&idx);
                let cards = if let Some(revealed) = revealed {
                    Some(revealed.cards.clone())
                } else if observer_seat == Some(idx) && !seat.hole_cards.is_empty() {
                    Some(seat.hole_cards.clone())
                } else {
                    None
                };
                SeatView {
                    seat: idx,
                    player: seat.player.clone(),
                    chips: seat.chips,
                    status: seat.status,
                    disconnected: seat.disconnected,
                    round_contribution: seat.round_contribution,
                    hand_contribution: seat.hand_contribution,
                    card_count: if seat.in_hand() {
                        seat.hole_cards.len()
                    } else {
                        0
                    },
                    cards,
                    ranking: revealed.map(|revealed| revealed.ranking.clone()),
                }
            })
            .collect();

        let round = self.round.as_ref();
        let acting_seat = round.and_then(|round| round.acting);
        let action_choices = match (observer_seat, acting_seat, round) {
            (Some(observer), Some(acting), Some(round)) if observer == acting => {
                Some(round.legal_actions(&self.seats, acting))
            }
            _ => None,
        };
        TableView {
            table_id: self.table_id,
            hand_id: (self.hand_id > 0).then_some(self.hand_id),
            phase: self.phase,
            blinds: self.config.blinds(),
            button: self.button,
            board: round.map(|round| round.board.clone()).unwrap_or_default(),
            pots: self.pots.pots(),
            pot_total: self.pots.total(),
            current_bet: round.map_or(0, |round| round.current_bet),
            min_raise: round.map_or(self.config.big_blind, |round| round.min_raise),
            acting_seat,
            seats,
            observer_seat,
            action_choices,
        }
    }

    /// Legal actions for a seat right now (empty unless it's acting).
    #[must_use]
    pub fn legal_actions(&self, seat_idx: SeatIndex) -> ActionChoices {
        self.round
            .as_ref()
            .filter(|round| round.phase.is_betting())
            .map(|round| round.legal_actions(&self.seats, seat_idx))
            .unwrap_or_default()
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn is_hand_in_progress(&self) -> bool {
        self.phase.is_betting()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Id of the current or most recent hand; 0 before the first.
    #[must_use]
    pub fn hand_id(&self) -> HandId {
        self.hand_id
    }

    #[must_use]
    pub fn button(&self) -> Option<SeatIndex> {
        self.button
    }

    #[must_use]
    pub fn acting_seat(&self) -> Option<SeatIndex> {
        self.round
            .as_ref()
            .filter(|round| round.phase.is_betting())
            .and_then(|round| round.acting)
    }

    #[must_use]
    pub fn seat(&self, seat_idx: SeatIndex) -> Option<&Seat> {
        self.seats.get(seat_idx).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn seat_of(&self, player: &PlayerId) -> Option<SeatIndex> {
        self.seats
            .iter()
            .position(|seat| seat.as_ref().is_some_and(|seat| &seat.player == player))
    }

    #[must_use]
    pub fn num_seated(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    /// Chips on the table: every stack plus everything in the pots.
    #[must_use]
    pub fn chips_in_play(&self) -> Chips {
        self.seats.iter().flatten().map(|seat| seat.chips).sum::<Chips>() + self.pots.total()
    }

    /// Rake taken over the table's lifetime.
    #[must_use]
    pub fn rake_collected(&self) -> Chips {
        self.rake_collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        entities::{ActionChoice, Suit},
        functional::HandCategory,
    };

    fn config() -> TableConfig {
        TableConfig {
            min_buy_in: 10,
            max_buy_in: 1_000,
            ..TableConfig::default()
        }
    }

    fn session(stacks: &[Chips]) -> GameSession {
        let mut session = GameSession::with_seed(1, config(), 7).unwrap();
        for (idx, chips) in stacks.iter().enumerate() {
            session
                .join(PlayerId::new(&format!("p{idx}")), Some(idx), *chips)
                .unwrap();
        }
        session.drain_events();
        session
    }

    fn c(value: u8, suit: Suit) -> Card {
        Card(value, suit)
    }

    /// Deck dealing `holes` in seat order starting left of `button`, then
    /// the board.
    fn deck(holes: &[[Card; 2]], button: SeatIndex, board: [Card; 5]) -> Deck {
        let num_seats = holes.len();
        let mut top = Vec::new();
        for pass in 0..2 {
            for idx in clockwise(num_seats, button) {
                top.push(holes[idx][pass]);
            }
        }
        top.extend(board);
        Deck::stacked(&top).unwrap()
    }

    fn dry_board() -> [Card; 5] {
        [
            c(2, Suit::Club),
            c(7, Suit::Diamond),
            c(9, Suit::Heart),
            c(11, Suit::Spade),
            c(13, Suit::Club),
        ]
    }

    // === Seat Management Tests ===

    #[test]
    fn test_join_rejections_leave_table_unchanged() {
        let mut session = session(&[100]);
        assert_eq!(
            session.join(PlayerId::new("p0"), None, 100),
            Err(SeatError::AlreadySeated)
        );
        assert_eq!(
            session.join(PlayerId::new("x"), None, 5),
            Err(SeatError::BuyInOutOfRange { min: 10, max: 1000 })
        );
        assert_eq!(
            session.join(PlayerId::new("x"), Some(0), 100),
            Err(SeatError::SeatTaken(0))
        );
        assert_eq!(
            session.join(PlayerId::new("x"), Some(9), 100),
            Err(SeatError::SeatOutOfRange(9))
        );
        assert_eq!(session.num_seated(), 1);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_table_full() {
        let mut session = session(&[100; 9]);
        assert_eq!(
            session.join(PlayerId::new("late"), None, 100),
            Err(SeatError::TableFull)
        );
    }

    #[test]
    fn test_start_needs_two_players() {
        let mut session = session(&[100]);
        assert_eq!(session.start_hand(), Err(GameError::NotEnoughPlayers));
        assert_eq!(session.phase(), Phase::WaitingForPlayers);
    }

    #[test]
    fn test_start_hand_deals_and_requests_action() {
        let mut session = session(&[100, 100, 100]);
        assert_eq!(session.start_hand(), Ok(1));
        assert_eq!(session.start_hand(), Err(GameError::HandInProgress));
        assert_eq!(session.phase(), Phase::Preflop);
        assert!(
            (0..3).all(|idx| session.seat(idx).unwrap().hole_cards.len() == HOLE_CARDS)
        );
        let events: Vec<_> = session.drain_events().into_iter().collect();
        assert!(matches!(events[0], GameEvent::HandStarted { hand_id: 1, .. }));
        let Some(GameEvent::ActionRequired { seat, key, .. }) = events.last() else {
            panic!("expected an action request, got {events:?}");
        };
        assert_eq!(Some(*key), session.pending_timeout());
        assert_eq!(session.acting_seat(), Some(*seat));
    }

    #[test]
    fn test_rejected_start_keeps_live_deck() {
        let mut session = session(&[100, 100, 100]);
        let holes = [
            [c(2, Suit::Club), c(2, Suit::Diamond)],
            [c(2, Suit::Heart), c(2, Suit::Spade)],
            [c(3, Suit::Club), c(3, Suit::Diamond)],
        ];
        let board = [
            c(7, Suit::Diamond),
            c(9, Suit::Heart),
            c(11, Suit::Spade),
            c(13, Suit::Club),
            c(4, Suit::Heart),
        ];
        session.start_hand_with_deck(deck(&holes, 0, board)).unwrap();

        assert_eq!(
            session.start_hand_with_deck(Deck::new()),
            Err(GameError::HandInProgress)
        );
        assert_eq!(session.start_hand(), Err(GameError::HandInProgress));

        session.apply_action(0, &Action::Call).unwrap();
        session.apply_action(1, &Action::Call).unwrap();
        session.apply_action(2, &Action::Check).unwrap();
        assert_eq!(session.phase(), Phase::Flop);
        let view = session.state_view(None);
        assert_eq!(view.board, board[..3].to_vec());
        assert!(
            view.board
                .iter()
                .all(|card| holes.iter().flatten().all(|hole| hole != card))
        );
    }

    // === Betting Flow Tests ===

    #[test]
    fn test_fold_around_awards_blinds() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        // Button 0, blinds on 1 and 2.
        session.apply_action(0, &Action::Fold).unwrap();
        session.apply_action(1, &Action::Fold).unwrap();
        assert_eq!(session.phase(), Phase::HandAbortedAllButOneFolded);
        assert_eq!(session.seat(2).unwrap().chips, 105);
        assert_eq!(session.chips_in_play(), 300);
        assert_eq!(session.pending_timeout(), None);
        let ended = session
            .drain_events()
            .into_iter()
            .find(|event| matches!(event, GameEvent::HandEnded { .. }));
        let Some(GameEvent::HandEnded {
            revealed, uncalled, ..
        }) = ended
        else {
            panic!("hand didn't end");
        };
        assert!(revealed.is_empty());
        assert_eq!(uncalled, Some((2, 5)));
    }

    #[test]
    fn test_check_facing_bet_leaves_view_unchanged() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        let observer = PlayerId::new("p0");
        let before = serde_json::to_string(&session.state_view(Some(&observer))).unwrap();
        session.drain_events();
        assert!(matches!(
            session.apply_action(0, &Action::Check),
            Err(ActionError::InvalidAction(_))
        ));
        let after = serde_json::to_string(&session.state_view(Some(&observer))).unwrap();
        assert_eq!(before, after);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_showdown_with_side_pots() {
        let mut session = session(&[50, 150, 300]);
        // Rotation moves the button to seat 2, so the big stack acts first.
        session.button = Some(1);
        let holes = [
            [c(14, Suit::Spade), c(14, Suit::Heart)],
            [c(12, Suit::Spade), c(12, Suit::Heart)],
            [c(3, Suit::Spade), c(4, Suit::Heart)],
        ];
        session
            .start_hand_with_deck(deck(&holes, 2, dry_board()))
            .unwrap();
        assert_eq!(session.button(), Some(2));
        // Seat 2 shoves, both blinds call all-in.
        session.apply_action(2, &Action::AllIn).unwrap();
        session.apply_action(0, &Action::Call).unwrap();
        let view = session.state_view(None);
        assert_eq!(view.pot_total, 360);
        session.apply_action(1, &Action::Call).unwrap();

        assert_eq!(session.phase(), Phase::HandComplete);
        assert_eq!(session.seat(0).unwrap().chips, 150);
        assert_eq!(session.seat(1).unwrap().chips, 200);
        assert_eq!(session.seat(2).unwrap().chips, 150);
        assert_eq!(session.chips_in_play(), 500);

        let view = session.state_view(None);
        assert_eq!(view.board, dry_board().to_vec());
        assert_eq!(
            view.seats[0].ranking.as_ref().map(|r| r.category),
            Some(HandCategory::OnePair)
        );
        assert_eq!(view.seats[2].cards, Some(holes[2].to_vec()));
    }

    #[test]
    fn test_timeout_checks_when_possible_and_ignores_stale_keys() {
        let mut session = session(&[100, 100]);
        session.start_hand().unwrap();
        // Heads-up: button 0 is small blind and acts first.
        session.apply_action(0, &Action::Call).unwrap();
        let key = session.pending_timeout().unwrap();
        assert_eq!(key.seat, 1);
        assert_eq!(session.handle_timeout(key), Some(AppliedAction::Check));
        assert_eq!(session.phase(), Phase::Flop);
        // Replaying the same key is a no-op.
        assert_eq!(session.handle_timeout(key), None);
    }

    #[test]
    fn test_timeout_folds_facing_bet() {
        let mut session = session(&[100, 100]);
        session.start_hand().unwrap();
        let key = session.pending_timeout().unwrap();
        assert_eq!(session.handle_timeout(key), Some(AppliedAction::Fold));
        assert_eq!(session.phase(), Phase::HandAbortedAllButOneFolded);
    }

    #[test]
    fn test_action_losing_race_to_timeout_is_discarded() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        let key = session.pending_timeout().unwrap();
        assert_eq!(key.seat, 0);
        assert_eq!(session.handle_timeout(key), Some(AppliedAction::Fold));
        session.drain_events();
        let before = session.state_view(None);

        assert_eq!(
            session.apply_action(0, &Action::Call),
            Ok(ActionOutcome::Discarded)
        );
        assert_eq!(session.state_view(None), before);
        assert!(session.drain_events().is_empty());
        // Other seats are still held to turn order.
        assert_eq!(
            session.apply_action(2, &Action::Check),
            Err(ActionError::NotPlayerTurn)
        );
    }

    #[test]
    fn test_seat_asked_again_after_timeout_acts_normally() {
        let mut session = session(&[100, 100]);
        session.start_hand().unwrap();
        // Heads-up: button 0 completes, big blind times out and checks.
        session.apply_action(0, &Action::Call).unwrap();
        let key = session.pending_timeout().unwrap();
        assert_eq!(session.handle_timeout(key), Some(AppliedAction::Check));
        // Seat 1 acts first on the flop.
        assert_eq!(session.acting_seat(), Some(1));
        assert_eq!(
            session.apply_action(1, &Action::Check),
            Ok(ActionOutcome::Applied(AppliedAction::Check))
        );
    }

    // === Disconnect / Leave Tests ===

    #[test]
    fn test_disconnected_seat_sits_out_next_hand() {
        let mut session = session(&[100, 100, 100]);
        session.mark_disconnected(1).unwrap();
        session.start_hand().unwrap();
        assert_eq!(session.seat(1).unwrap().status, SeatStatus::SittingOut);
        session.mark_reconnected(1).unwrap();
        let events = session.drain_events();
        assert!(events.contains(&GameEvent::Disconnected { seat: 1 }));
        assert!(events.contains(&GameEvent::Reconnected { seat: 1 }));
    }

    #[test]
    fn test_leave_mid_hand_is_deferred() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        assert_eq!(session.leave(1), Ok(None));
        assert_eq!(session.seat(1).unwrap().status, SeatStatus::Folded);
        session.apply_action(0, &Action::Fold).unwrap();
        // Seat 2 wins uncontested; the leaver is then freed.
        assert!(session.seat(1).is_none());
        let events = session.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::SeatLeft {
                seat: 1,
                chips: 95,
                ..
            }
        )));
        assert_eq!(session.chips_in_play(), 300 - 95);
    }

    #[test]
    fn test_leave_between_hands_is_immediate() {
        let mut session = session(&[100, 100]);
        assert_eq!(session.leave(0), Ok(Some(100)));
        assert_eq!(session.leave(0), Err(SeatError::NotSeated));
    }

    // === View Tests ===

    #[test]
    fn test_view_hides_other_hole_cards() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        let view = session.state_view(Some(&PlayerId::new("p1")));
        assert_eq!(view.observer_seat, Some(1));
        for seat in &view.seats {
            assert_eq!(seat.card_count, 2);
            assert_eq!(seat.cards.is_some(), seat.seat == 1);
        }
        assert!(view.action_choices.is_none());

        let acting = session.state_view(Some(&PlayerId::new("p0")));
        assert_eq!(
            acting.action_choices.map(|choices| choices.0[0].clone()),
            Some(ActionChoice::Fold)
        );
    }

    #[test]
    fn test_view_is_byte_identical_without_mutation() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        let observer = PlayerId::new("p2");
        let a = serde_json::to_vec(&session.state_view(Some(&observer))).unwrap();
        let b = serde_json::to_vec(&session.state_view(Some(&observer))).unwrap();
        assert_eq!(a, b);
    }

    // === Abort Tests ===

    #[test]
    fn test_abort_restores_pre_hand_stacks() {
        let mut session = session(&[100, 100, 100]);
        session.start_hand().unwrap();
        session.apply_action(0, &Action::Raise(40)).unwrap();
        session.drain_events();
        session.abort(InvariantError::EmptyDeck);
        assert!((0..3).all(|idx| session.seat(idx).unwrap().chips == 100));
        assert_eq!(session.phase(), Phase::WaitingForPlayers);
        assert_eq!(session.pending_timeout(), None);
        assert_eq!(
            session.drain_events().pop_back(),
            Some(GameEvent::HandAborted {
                hand_id: 1,
                reason: InvariantError::EmptyDeck
            })
        );
        // The table carries on with the next hand.
        assert_eq!(session.start_hand(), Ok(2));
    }
}
