//! Betting round state machine.
//!
//! A [`BettingRound`] lives for one hand. It owns the public betting state
//! (board, current bet, minimum raise, acting seat) and mutates seats and
//! the [`PotManager`] only through [`BettingRound::apply`] and the street
//! transitions. Every inbound action is validated against the same legal
//! action set that's offered to the client, so a rejected action never
//! leaves a partial change behind.

use std::fmt::Write;

use super::{
    constants::BOARD_SIZE,
    entities::{
        Action, ActionChoice, ActionChoices, AppliedAction, Blinds, Card, Chips, Deck, Phase,
        Seat, SeatIndex, SeatStatus,
    },
    errors::{ActionError, InvariantError},
    pot::PotManager,
};

/// Seat indices clockwise starting left of `from`, ending with `from`.
pub(crate) fn clockwise(num_seats: usize, from: SeatIndex) -> impl Iterator<Item = SeatIndex> {
    (1..=num_seats).map(move |offset| (from + offset) % num_seats.max(1))
}

/// First occupied seat left of `from` that satisfies `pred`.
pub(crate) fn next_seat(
    seats: &[Option<Seat>],
    from: SeatIndex,
    pred: impl Fn(&Seat) -> bool,
) -> Option<SeatIndex> {
    clockwise(seats.len(), from).find(|idx| seats[*idx].as_ref().is_some_and(&pred))
}

fn occupied(seats: &[Option<Seat>]) -> impl Iterator<Item = (SeatIndex, &Seat)> {
    seats
        .iter()
        .enumerate()
        .filter_map(|(idx, seat)| seat.as_ref().map(|seat| (idx, seat)))
}

#[derive(Clone, Debug)]
pub struct BettingRound {
    pub phase: Phase,
    pub board: Vec<Card>,
    /// Highest round contribution a seat must match.
    pub current_bet: Chips,
    /// Smallest legal raise increment: the last full raise, or the big
    /// blind at the start of a street.
    pub min_raise: Chips,
    pub acting: Option<SeatIndex>,
    pub last_aggressor: Option<SeatIndex>,
    pub button: SeatIndex,
    pub small_blind_seat: SeatIndex,
    pub big_blind_seat: SeatIndex,
    big_blind: Chips,
}

impl BettingRound {
    /// Post blinds for a fresh hand and pick the first seat to act.
    ///
    /// Seats dealt into the hand must already be [`SeatStatus::Active`].
    /// With two seats the button posts the small blind. A seat that can't
    /// cover its blind posts what it has and is all-in.
    pub fn preflop(
        seats: &mut [Option<Seat>],
        pots: &mut PotManager,
        button: SeatIndex,
        blinds: &Blinds,
    ) -> Self {
        let dealt = |seat: &Seat| seat.status == SeatStatus::Active;
        let num_dealt = occupied(seats).filter(|(_, seat)| dealt(seat)).count();
        let small_blind_seat = if num_dealt == 2 {
            button
        } else {
            next_seat(seats, button, dealt).unwrap_or(button)
        };
        let big_blind_seat = next_seat(seats, small_blind_seat, dealt).unwrap_or(button);

        for (idx, amount) in [(small_blind_seat, blinds.small), (big_blind_seat, blinds.big)] {
            if let Some(seat) = seats[idx].as_mut() {
                let moved = seat.commit(amount);
                pots.contribute(idx, moved);
            }
        }

        let mut round = Self {
            phase: Phase::Preflop,
            board: Vec::with_capacity(BOARD_SIZE),
            current_bet: blinds.big,
            min_raise: blinds.big,
            acting: None,
            last_aggressor: None,
            button,
            small_blind_seat,
            big_blind_seat,
            big_blind: blinds.big,
        };
        round.acting = round.next_to_act(seats, big_blind_seat);
        round
    }

    /// Every seat that can still act has matched the current bet since the
    /// last full raise, or nobody is left to respond.
    #[must_use]
    pub fn is_complete(&self, seats: &[Option<Seat>]) -> bool {
        if occupied(seats).filter(|(_, seat)| seat.in_hand()).count() <= 1 {
            return true;
        }
        let actors: Vec<&Seat> = occupied(seats)
            .map(|(_, seat)| seat)
            .filter(|seat| seat.can_act())
            .collect();
        match actors[..] {
            [] => true,
            [only] => only.round_contribution >= self.current_bet,
            _ => actors
                .iter()
                .all(|seat| seat.acted && seat.round_contribution == self.current_bet),
        }
    }

    /// Next seat clockwise of `from` that owes a decision, or `None` when
    /// the round is over.
    #[must_use]
    pub fn next_to_act(&self, seats: &[Option<Seat>], from: SeatIndex) -> Option<SeatIndex> {
        if self.is_complete(seats) {
            return None;
        }
        next_seat(seats, from, |seat| {
            seat.can_act() && (!seat.acted || seat.round_contribution < self.current_bet)
        })
    }

    /// Whether betting is over for the rest of the hand: at most one seat
    /// can still act and it has nothing left to call.
    #[must_use]
    pub fn is_run_out(&self, seats: &[Option<Seat>]) -> bool {
        let actors = occupied(seats).filter(|(_, seat)| seat.can_act()).count();
        actors <= 1 && self.is_complete(seats)
    }

    /// Legal actions for `seat_idx` in canonical order: fold, check or
    /// call, bet or raise, all-in.
    #[must_use]
    pub fn legal_actions(&self, seats: &[Option<Seat>], seat_idx: SeatIndex) -> ActionChoices {
        let Some(seat) = seats.get(seat_idx).and_then(Option::as_ref) else {
            return ActionChoices::default();
        };
        if self.acting != Some(seat_idx) || !seat.can_act() {
            return ActionChoices::default();
        }

        let to_call = self.current_bet.saturating_sub(seat.round_contribution);
        let max_total = seat.round_contribution + seat.chips;
        let can_raise = self.can_raise(seats, seat_idx, seat);

        let mut choices = vec![ActionChoice::Fold];
        if to_call == 0 {
            choices.push(ActionChoice::Check);
        } else {
            choices.push(ActionChoice::Call(to_call.min(seat.chips)));
        }
        if can_raise {
            let min_to = self.min_raise_to();
            if max_total > min_to.max(self.current_bet) {
                if self.current_bet == 0 {
                    choices.push(ActionChoice::Bet {
                        min: min_to,
                        max: max_total,
                    });
                } else {
                    choices.push(ActionChoice::Raise {
                        min: min_to,
                        max: max_total,
                    });
                }
            }
        }
        if max_total <= self.current_bet
            || can_raise
            || !self.others_can_respond(seats, seat_idx)
        {
            choices.push(ActionChoice::AllIn(seat.chips));
        }
        ActionChoices(choices)
    }

    /// Resolve an inbound action into what it would do, without mutating.
    ///
    /// # Errors
    ///
    /// - [`ActionError::NotPlayerTurn`] if `seat_idx` isn't acting.
    /// - [`ActionError::InsufficientChips`] for a bet or raise beyond the
    ///   seat's stack.
    /// - [`ActionError::InvalidAction`] for anything else the current
    ///   state doesn't allow.
    pub fn validate(
        &self,
        seats: &[Option<Seat>],
        seat_idx: SeatIndex,
        action: &Action,
    ) -> Result<AppliedAction, ActionError> {
        if !self.phase.is_betting() || self.acting != Some(seat_idx) {
            return Err(ActionError::NotPlayerTurn);
        }
        let seat = seats
            .get(seat_idx)
            .and_then(Option::as_ref)
            .ok_or(ActionError::NotPlayerTurn)?;

        let to_call = self.current_bet.saturating_sub(seat.round_contribution);
        let max_total = seat.round_contribution + seat.chips;
        let can_raise = self.can_raise(seats, seat_idx, seat);

        match action {
            Action::Fold => Ok(AppliedAction::Fold),
            Action::Check if to_call == 0 => Ok(AppliedAction::Check),
            Action::Check => Err(ActionError::invalid(format!(
                "can't check facing a bet of ${}",
                self.current_bet
            ))),
            Action::Call if to_call == 0 => Err(ActionError::invalid("nothing to call")),
            Action::Call => Ok(AppliedAction::Call {
                amount: to_call.min(seat.chips),
                all_in: to_call >= seat.chips,
            }),
            Action::Bet(_) if self.current_bet > 0 => {
                Err(ActionError::invalid("can't bet facing a bet, raise instead"))
            }
            Action::Raise(_) if self.current_bet == 0 => {
                Err(ActionError::invalid("nothing to raise, bet instead"))
            }
            Action::Bet(to) | Action::Raise(to) => {
                if !can_raise {
                    return Err(ActionError::invalid("betting isn't open to you"));
                }
                if *to > max_total {
                    return Err(ActionError::InsufficientChips {
                        required: to - seat.round_contribution,
                        available: seat.chips,
                    });
                }
                if *to <= self.current_bet {
                    return Err(ActionError::invalid(format!(
                        "must raise above ${}",
                        self.current_bet
                    )));
                }
                let all_in = *to == max_total;
                if *to < self.min_raise_to() && !all_in {
                    return Err(ActionError::invalid(format!(
                        "must go to at least ${}",
                        self.min_raise_to()
                    )));
                }
                Ok(if self.current_bet == 0 {
                    AppliedAction::Bet { to: *to, all_in }
                } else {
                    AppliedAction::Raise { to: *to, all_in }
                })
            }
            Action::AllIn if seat.chips == 0 => Err(ActionError::invalid("no chips left")),
            Action::AllIn if max_total <= self.current_bet => Ok(AppliedAction::Call {
                amount: seat.chips,
                all_in: true,
            }),
            // With nobody left to respond, the shove stands and the part
            // nobody matched is returned as uncalled at the end of the hand.
            Action::AllIn if !can_raise && self.others_can_respond(seats, seat_idx) => {
                Err(ActionError::invalid("betting isn't open to you, call or fold"))
            }
            Action::AllIn if self.current_bet == 0 => Ok(AppliedAction::Bet {
                to: max_total,
                all_in: true,
            }),
            Action::AllIn => Ok(AppliedAction::Raise {
                to: max_total,
                all_in: true,
            }),
        }
    }

    /// Validate and apply an action, then move the turn along.
    ///
    /// # Errors
    ///
    /// Same as [`BettingRound::validate`]. Nothing is mutated on error.
    pub fn apply(
        &mut self,
        seats: &mut [Option<Seat>],
        pots: &mut PotManager,
        seat_idx: SeatIndex,
        action: &Action,
    ) -> Result<AppliedAction, ActionError> {
        let applied = self.validate(seats, seat_idx, action)?;
        let seat = seats[seat_idx].as_mut().ok_or(ActionError::NotPlayerTurn)?;
        match &applied {
            AppliedAction::Fold => {
                seat.status = SeatStatus::Folded;
                pots.fold(seat_idx);
            }
            AppliedAction::Check => {}
            AppliedAction::Call { amount, .. } => {
                let moved = seat.commit(*amount);
                pots.contribute(seat_idx, moved);
            }
            AppliedAction::Bet { to, .. } | AppliedAction::Raise { to, .. } => {
                let moved = seat.commit(to - seat.round_contribution);
                pots.contribute(seat_idx, moved);
                let increment = to - self.current_bet;
                self.current_bet = *to;
                self.last_aggressor = Some(seat_idx);
                // Only a full raise re-opens betting to seats that already acted.
                if increment >= self.min_raise {
                    self.min_raise = increment;
                    for (idx, other) in seats.iter_mut().enumerate() {
                        if let Some(other) = other
                            && idx != seat_idx
                        {
                            other.acted = false;
                        }
                    }
                }
            }
        }
        if let Some(seat) = seats[seat_idx].as_mut() {
            seat.acted = true;
        }
        self.acting = self.next_to_act(seats, seat_idx);
        Ok(applied)
    }

    /// Fold a seat out of turn, e.g. when its player leaves mid-hand.
    pub fn fold_out_of_turn(
        &mut self,
        seats: &mut [Option<Seat>],
        pots: &mut PotManager,
        seat_idx: SeatIndex,
    ) {
        if let Some(seat) = seats[seat_idx].as_mut()
            && seat.in_hand()
        {
            seat.status = SeatStatus::Folded;
            pots.fold(seat_idx);
            if self.acting == Some(seat_idx) {
                self.acting = self.next_to_act(seats, seat_idx);
            } else if self.is_complete(seats) {
                self.acting = None;
            }
        }
    }

    /// Close the current street and deal the next one.
    ///
    /// Returns the cards dealt, or `None` if the river was already out.
    ///
    /// # Errors
    ///
    /// [`InvariantError::EmptyDeck`] if the deck runs dry.
    pub fn advance(
        &mut self,
        seats: &mut [Option<Seat>],
        deck: &mut Deck,
    ) -> Result<Option<Vec<Card>>, InvariantError> {
        let Some((phase, num_cards)) = self.phase.next_street() else {
            return Ok(None);
        };
        let dealt = (0..num_cards)
            .map(|_| deck.draw())
            .collect::<Result<Vec<Card>, InvariantError>>()?;
        self.board.extend(dealt.iter().copied());
        self.phase = phase;
        self.current_bet = 0;
        self.min_raise = self.big_blind;
        self.last_aggressor = None;
        for seat in seats.iter_mut().flatten() {
            seat.round_contribution = 0;
            seat.acted = false;
        }
        self.acting = self.next_to_act(seats, self.button);
        Ok(Some(dealt))
    }

    /// Smallest "raise to" total for a full raise (or opening bet).
    #[must_use]
    pub fn min_raise_to(&self) -> Chips {
        self.current_bet + self.min_raise
    }

    /// A seat may bet or raise when it hasn't acted since the last full
    /// raise, some other seat could still respond, and it has chips beyond
    /// a call.
    fn can_raise(&self, seats: &[Option<Seat>], seat_idx: SeatIndex, seat: &Seat) -> bool {
        !seat.acted
            && self.others_can_respond(seats, seat_idx)
            && seat.round_contribution + seat.chips > self.current_bet
    }

    fn others_can_respond(&self, seats: &[Option<Seat>], seat_idx: SeatIndex) -> bool {
        occupied(seats).any(|(idx, other)| idx != seat_idx && other.can_act())
    }

    /// Compact one-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut repr = format!(
            "{} bet=${} min_raise=${} acting={:?} board=[",
            self.phase, self.current_bet, self.min_raise, self.acting
        );
        for card in &self.board {
            let _ = write!(repr, "{}", card.to_string().trim());
            repr.push(' ');
        }
        repr.push(']');
        repr
    }
}
