use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::{
    constants::{self, DECK_SIZE},
    errors::InvariantError,
    functional::HandRanking,
    pot::Pot,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values (two=2u8 ... ace=14u8).
pub type Value = u8;

/// A card is a tuple of a value and a suit. Cards order by value first,
/// then suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    #[must_use]
    pub fn value(&self) -> Value {
        self.0
    }

    #[must_use]
    pub fn suit(&self) -> Suit {
        self.1
    }

    /// Whether the value is one a deck holds (two through ace).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (constants::TWO..=constants::ACE).contains(&self.0)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            constants::ACE => "A",
            constants::KING => "K",
            constants::QUEEN => "Q",
            constants::JACK => "J",
            v => &v.to_string(),
        };
        let repr = format!("{value}/{}", self.1);
        write!(f, "{repr:>4}")
    }
}

/// A 52-card deck. Cards are drawn from the top by advancing `deck_idx`,
/// so a drawn card can't come back until the next shuffle.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: [Card; DECK_SIZE],
    deck_idx: usize,
}

impl Deck {
    /// All 52 cards in canonical order (twos first, aces last).
    #[must_use]
    pub fn new() -> Self {
        let mut cards = [Card(constants::TWO, Suit::Club); DECK_SIZE];
        for (i, value) in (constants::TWO..=constants::ACE).enumerate() {
            for (j, suit) in Suit::ALL.into_iter().enumerate() {
                cards[4 * i + j] = Card(value, suit);
            }
        }
        Self { cards, deck_idx: 0 }
    }

    /// A deck whose first draws are `top`, in order, followed by the rest
    /// of the deck in canonical order. Returns `None` if `top` repeats a
    /// card or holds more than 52 cards.
    #[must_use]
    pub fn stacked(top: &[Card]) -> Option<Self> {
        let mut deck = Self::new();
        let mut seen = std::collections::BTreeSet::new();
        for card in top {
            if !card.is_valid() || !seen.insert(*card) {
                return None;
            }
        }
        let rest = Self::new()
            .cards
            .into_iter()
            .filter(|card| !seen.contains(card));
        for (slot, card) in deck.cards.iter_mut().zip(top.iter().copied().chain(rest)) {
            *slot = card;
        }
        Some(deck)
    }

    /// Draw the top card.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::EmptyDeck`] once all 52 cards are drawn.
    /// A 9-handed hand uses at most 23 cards, so this means a bug upstream.
    pub fn draw(&mut self) -> Result<Card, InvariantError> {
        let card = *self
            .cards
            .get(self.deck_idx)
            .ok_or(InvariantError::EmptyDeck)?;
        self.deck_idx += 1;
        Ok(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        DECK_SIZE - self.deck_idx
    }

    /// Put every card back and permute with Fisher-Yates.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        self.deck_idx = 0;
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for whole chips. All bets and stacks are whole chips.
pub type Chips = u32;

/// Type alias for seat positions at a table.
pub type SeatIndex = usize;

/// Monotonic hand counter per table.
pub type HandId = u64;

/// Identifier of a table in the registry.
pub type TableId = i64;

/// External identity of a player, as handed over by the room layer.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(s: &str) -> Self {
        let mut id: String = s
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        if let Some((idx, _)) = id.char_indices().nth(constants::MAX_PLAYER_ID_LENGTH) {
            id.truncate(idx);
        }
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}/{}", self.small, self.big)
    }
}

/// An inbound action. `Bet` and `Raise` carry the total the seat wants
/// to have committed this betting round ("raise to"), not the increment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "folds"),
            Self::Check => write!(f, "checks"),
            Self::Call => write!(f, "calls"),
            Self::Bet(amount) => write!(f, "bets ${amount}"),
            Self::Raise(amount) => write!(f, "raises to ${amount}"),
            Self::AllIn => write!(f, "goes all-in"),
        }
    }
}

/// An action after validation, with the chip amounts it resolved to.
/// `AllIn` requests resolve to whichever of call/bet/raise they amount to.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AppliedAction {
    Fold,
    Check,
    /// `amount` is the chips added to the pot.
    Call { amount: Chips, all_in: bool },
    /// `to` is the seat's round contribution after betting.
    Bet { to: Chips, all_in: bool },
    Raise { to: Chips, all_in: bool },
}

impl AppliedAction {
    #[must_use]
    pub fn is_all_in(&self) -> bool {
        matches!(
            self,
            Self::Call { all_in: true, .. }
                | Self::Bet { all_in: true, .. }
                | Self::Raise { all_in: true, .. }
        )
    }
}

impl fmt::Display for AppliedAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let suffix = if self.is_all_in() { " (all-in)" } else { "" };
        match self {
            Self::Fold => write!(f, "folds"),
            Self::Check => write!(f, "checks"),
            Self::Call { amount, .. } => write!(f, "calls ${amount}{suffix}"),
            Self::Bet { to, .. } => write!(f, "bets ${to}{suffix}"),
            Self::Raise { to, .. } => write!(f, "raises to ${to}{suffix}"),
        }
    }
}

/// One legal option for the acting seat. Bet/raise bounds are round
/// totals, matching [`Action::Bet`] and [`Action::Raise`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ActionChoice {
    Fold,
    Check,
    Call(Chips),
    Bet { min: Chips, max: Chips },
    Raise { min: Chips, max: Chips },
    AllIn(Chips),
}

impl fmt::Display for ActionChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "fold"),
            Self::Check => write!(f, "check"),
            Self::Call(amount) => write!(f, "call (== ${amount})"),
            Self::Bet { min, max } => write!(f, "bet (${min}..=${max})"),
            Self::Raise { min, max } => write!(f, "raise to (${min}..=${max})"),
            Self::AllIn(amount) => write!(f, "all-in (${amount})"),
        }
    }
}

/// The legal action set for a seat, in a fixed order so views serialize
/// identically every time.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionChoices(pub Vec<ActionChoice>);

impl ActionChoices {
    /// Whether the action's kind is on offer. Amounts are validated
    /// separately by the betting state machine.
    #[must_use]
    pub fn contains(&self, action: &Action) -> bool {
        self.0.iter().any(|choice| {
            matches!(
                (choice, action),
                (ActionChoice::Fold, Action::Fold)
                    | (ActionChoice::Check, Action::Check)
                    | (ActionChoice::Call(_), Action::Call)
                    | (ActionChoice::Bet { .. }, Action::Bet(_))
                    | (ActionChoice::Raise { .. }, Action::Raise(_))
                    | (ActionChoice::AllIn(_), Action::AllIn)
            )
        })
    }

    #[must_use]
    pub fn can_check(&self) -> bool {
        self.0.contains(&ActionChoice::Check)
    }
}

impl fmt::Display for ActionChoices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num_options = self.0.len();
        let repr = self
            .0
            .iter()
            .enumerate()
            .map(|(i, action_choice)| {
                let repr = action_choice.to_string();
                match i {
                    0 if num_options == 1 => repr,
                    0 if num_options == 2 => format!("{repr} "),
                    0 if num_options >= 3 => format!("{repr}, "),
                    i if i == num_options - 1 && num_options != 1 => format!("or {repr}"),
                    _ => format!("{repr}, "),
                }
            })
            .collect::<String>();
        write!(f, "{repr}")
    }
}

/// Where a seat stands in the current hand.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SeatStatus {
    /// Dealt in and still able to act.
    Active,
    Folded,
    /// Whole stack committed; in the hand but done acting.
    AllIn,
    /// Not dealt into the current hand.
    SittingOut,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Active => "active",
            Self::Folded => "folded",
            Self::AllIn => "all-in",
            Self::SittingOut => "sitting-out",
        };
        write!(f, "{repr:11}")
    }
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub player: PlayerId,
    pub chips: Chips,
    pub hole_cards: Vec<Card>,
    pub round_contribution: Chips,
    pub hand_contribution: Chips,
    pub status: SeatStatus,
    /// Transport hint. A disconnected seat keeps its place in the hand
    /// and is acted for by the turn timer.
    pub disconnected: bool,
    /// Acted since the last full raise on this street.
    pub(crate) acted: bool,
    /// Asked to leave mid-hand; removed when the hand ends.
    pub(crate) leaving: bool,
}

impl Seat {
    #[must_use]
    pub fn new(player: PlayerId, chips: Chips) -> Self {
        Self {
            player,
            chips,
            hole_cards: Vec::with_capacity(constants::HOLE_CARDS),
            round_contribution: 0,
            hand_contribution: 0,
            status: SeatStatus::SittingOut,
            disconnected: false,
            acted: false,
            leaving: false,
        }
    }

    /// Clear per-hand state.
    pub fn reset(&mut self) {
        self.hole_cards.clear();
        self.round_contribution = 0;
        self.hand_contribution = 0;
        self.status = SeatStatus::SittingOut;
        self.acted = false;
    }

    /// Dealt in and not folded.
    #[must_use]
    pub fn in_hand(&self) -> bool {
        matches!(self.status, SeatStatus::Active | SeatStatus::AllIn)
    }

    /// Still has decisions to make this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.status == SeatStatus::Active && self.chips > 0
    }

    /// Move up to `amount` chips from the stack into this round's
    /// contribution, going all-in if the stack runs out. Returns the
    /// chips actually moved.
    pub fn commit(&mut self, amount: Chips) -> Chips {
        let moved = amount.min(self.chips);
        self.chips -= moved;
        self.round_contribution += moved;
        self.hand_contribution += moved;
        if self.chips == 0 && self.status == SeatStatus::Active {
            self.status = SeatStatus::AllIn;
        }
        moved
    }
}

/// Table phases. A hand runs Preflop through River, then ends in either
/// Showdown → HandComplete or HandAbortedAllButOneFolded.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Phase {
    WaitingForPlayers,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    HandComplete,
    HandAbortedAllButOneFolded,
}

impl Phase {
    /// Phases in which seats place bets.
    #[must_use]
    pub fn is_betting(&self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }

    /// The street after this one and how many community cards it reveals.
    #[must_use]
    pub fn next_street(&self) -> Option<(Phase, usize)> {
        match self {
            Self::Preflop => Some((Self::Flop, 3)),
            Self::Flop => Some((Self::Turn, 1)),
            Self::Turn => Some((Self::River, 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::WaitingForPlayers => "waiting for players",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::HandComplete => "hand complete",
            Self::HandAbortedAllButOneFolded => "all but one folded",
        };
        write!(f, "{repr}")
    }
}

/// A seat as one observer is allowed to see it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatView {
    pub seat: SeatIndex,
    pub player: PlayerId,
    pub chips: Chips,
    pub status: SeatStatus,
    pub disconnected: bool,
    pub round_contribution: Chips,
    pub hand_contribution: Chips,
    pub card_count: usize,
    /// Only the observer's own cards, or cards revealed at showdown.
    pub cards: Option<Vec<Card>>,
    /// Present once the seat's hand was revealed at showdown.
    pub ranking: Option<HandRanking>,
}

/// Everything one observer may see of a table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableView {
    pub table_id: TableId,
    pub hand_id: Option<HandId>,
    pub phase: Phase,
    pub blinds: Blinds,
    pub button: Option<SeatIndex>,
    pub board: Vec<Card>,
    pub pots: Vec<Pot>,
    pub pot_total: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub acting_seat: Option<SeatIndex>,
    pub seats: Vec<SeatView>,
    pub observer_seat: Option<SeatIndex>,
    /// Legal actions, only when the observer is the acting seat.
    pub action_choices: Option<ActionChoices>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    // === Card Tests ===

    #[test]
    fn test_card_ordering_by_value_then_suit() {
        assert!(Card(14, Suit::Club) > Card(13, Suit::Spade));
        assert!(Card(10, Suit::Spade) > Card(10, Suit::Club));
        assert_eq!(Card(7, Suit::Heart), Card(7, Suit::Heart));
    }

    #[test]
    fn test_card_display() {
        assert!(format!("{}", Card(14, Suit::Spade)).contains("A/♠"));
        assert!(format!("{}", Card(11, Suit::Club)).contains("J/♣"));
        assert!(format!("{}", Card(10, Suit::Heart)).contains("10/♥"));
    }

    // === Deck Tests ===

    #[test]
    fn test_new_deck_is_canonical_and_unique() {
        let mut deck = Deck::new();
        let mut seen = HashSet::new();
        let mut previous = None;
        for _ in 0..52 {
            let card = deck.draw().unwrap();
            assert!(seen.insert(card));
            if let Some(prev) = previous {
                assert!(card > prev);
            }
            previous = Some(card);
        }
        assert_eq!(seen.len(), 52);
        assert_eq!(deck.remaining(), 0);
    }

    #[test]
    fn test_draw_from_empty_deck_errors() {
        let mut deck = Deck::new();
        for _ in 0..52 {
            deck.draw().unwrap();
        }
        assert_eq!(deck.draw(), Err(InvariantError::EmptyDeck));
    }

    #[test]
    fn test_shuffle_resets_and_keeps_all_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = Deck::new();
        deck.draw().unwrap();
        deck.draw().unwrap();
        deck.shuffle(&mut rng);
        assert_eq!(deck.remaining(), 52);
        let cards: HashSet<_> = (0..52).map(|_| deck.draw().unwrap()).collect();
        assert_eq!(cards.len(), 52);
    }

    #[test]
    fn test_shuffle_is_deterministic_per_seed() {
        let mut a = Deck::new();
        let mut b = Deck::new();
        a.shuffle(&mut StdRng::seed_from_u64(42));
        b.shuffle(&mut StdRng::seed_from_u64(42));
        for _ in 0..52 {
            assert_eq!(a.draw().unwrap(), b.draw().unwrap());
        }
    }

    #[test]
    fn test_stacked_deck_draws_top_first() {
        let top = [Card(14, Suit::Spade), Card(2, Suit::Club), Card(9, Suit::Heart)];
        let mut deck = Deck::stacked(&top).unwrap();
        assert_eq!(deck.draw().unwrap(), top[0]);
        assert_eq!(deck.draw().unwrap(), top[1]);
        assert_eq!(deck.draw().unwrap(), top[2]);
        let rest: HashSet<_> = (0..49).map(|_| deck.draw().unwrap()).collect();
        assert_eq!(rest.len(), 49);
        assert!(top.iter().all(|card| !rest.contains(card)));
    }

    #[test]
    fn test_stacked_deck_rejects_duplicates() {
        assert!(Deck::stacked(&[Card(5, Suit::Heart), Card(5, Suit::Heart)]).is_none());
        assert!(Deck::stacked(&[Card(1, Suit::Heart)]).is_none());
    }

    // === PlayerId Tests ===

    #[test]
    fn test_player_id_whitespace_replacement() {
        assert_eq!(PlayerId::new("alice bob").to_string(), "alice_bob");
    }

    #[test]
    fn test_player_id_truncation() {
        let id = PlayerId::new(&"a".repeat(100));
        assert_eq!(id.as_str().len(), constants::MAX_PLAYER_ID_LENGTH);
        let unicode = PlayerId::new(&"é".repeat(100));
        assert_eq!(unicode.as_str().chars().count(), constants::MAX_PLAYER_ID_LENGTH);
    }

    // === Action Tests ===

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Raise(300).to_string(), "raises to $300");
        assert_eq!(Action::Bet(50).to_string(), "bets $50");
        assert_eq!(
            AppliedAction::Call {
                amount: 40,
                all_in: true
            }
            .to_string(),
            "calls $40 (all-in)"
        );
    }

    #[test]
    fn test_action_choices_contains_by_kind() {
        let choices = ActionChoices(vec![
            ActionChoice::Fold,
            ActionChoice::Call(20),
            ActionChoice::Raise { min: 40, max: 500 },
        ]);
        assert!(choices.contains(&Action::Fold));
        assert!(choices.contains(&Action::Call));
        assert!(choices.contains(&Action::Raise(1)));
        assert!(!choices.contains(&Action::Check));
        assert!(!choices.contains(&Action::Bet(40)));
        assert!(!choices.can_check());
    }

    #[test]
    fn test_action_choices_display() {
        let choices = ActionChoices(vec![ActionChoice::Fold, ActionChoice::Check]);
        assert_eq!(choices.to_string(), "fold or check");
        let choices = ActionChoices(vec![
            ActionChoice::Fold,
            ActionChoice::Call(10),
            ActionChoice::AllIn(90),
        ]);
        assert_eq!(choices.to_string(), "fold, call (== $10), or all-in ($90)");
    }

    // === Seat Tests ===

    #[test]
    fn test_seat_commit_caps_at_stack() {
        let mut seat = Seat::new(PlayerId::new("alice"), 50);
        seat.status = SeatStatus::Active;
        assert_eq!(seat.commit(20), 20);
        assert_eq!(seat.status, SeatStatus::Active);
        assert_eq!(seat.commit(100), 30);
        assert_eq!(seat.chips, 0);
        assert_eq!(seat.round_contribution, 50);
        assert_eq!(seat.hand_contribution, 50);
        assert_eq!(seat.status, SeatStatus::AllIn);
        assert!(seat.in_hand());
        assert!(!seat.can_act());
    }

    #[test]
    fn test_seat_reset() {
        let mut seat = Seat::new(PlayerId::new("bob"), 100);
        seat.status = SeatStatus::Folded;
        seat.hole_cards = vec![Card(2, Suit::Club), Card(3, Suit::Club)];
        seat.round_contribution = 10;
        seat.hand_contribution = 10;
        seat.reset();
        assert_eq!(seat.status, SeatStatus::SittingOut);
        assert!(seat.hole_cards.is_empty());
        assert_eq!(seat.hand_contribution, 0);
    }

    // === Phase Tests ===

    #[test]
    fn test_phase_streets() {
        assert_eq!(Phase::Preflop.next_street(), Some((Phase::Flop, 3)));
        assert_eq!(Phase::Flop.next_street(), Some((Phase::Turn, 1)));
        assert_eq!(Phase::Turn.next_street(), Some((Phase::River, 1)));
        assert_eq!(Phase::River.next_street(), None);
        assert!(Phase::River.is_betting());
        assert!(!Phase::Showdown.is_betting());
    }
}
