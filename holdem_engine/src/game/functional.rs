//! Pure hand evaluation.
//!
//! [`eval`] ranks the best five-card hand available in any set of cards
//! (normally two hole cards plus a five-card board). Rankings compare by
//! category first and then by the tiebreak values, element by element, so
//! sorting or taking the max of [`HandRanking`]s gives poker order directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    constants::{ACE, WHEEL_HIGH},
    entities::{Card, Suit, Value},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::OnePair => "pair",
            Self::TwoPair => "two pair",
            Self::ThreeOfAKind => "three of a kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full house",
            Self::FourOfAKind => "four of a kind",
            Self::StraightFlush => "straight flush",
            Self::RoyalFlush => "royal flush",
        };
        write!(f, "{repr}")
    }
}

/// The value of a best five-card hand.
///
/// `tiebreak` lists the values that matter within the category, most
/// significant first: the quad value then the kicker, trips then pair,
/// a straight's top card (5 for a wheel), and so on.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandRanking {
    pub category: HandCategory,
    pub tiebreak: Vec<Value>,
}

impl HandRanking {
    fn new(category: HandCategory, tiebreak: Vec<Value>) -> Self {
        Self { category, tiebreak }
    }
}

impl fmt::Display for HandRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .tiebreak
            .iter()
            .map(|v| match *v {
                14 => "A".to_string(),
                13 => "K".to_string(),
                12 => "Q".to_string(),
                11 => "J".to_string(),
                v => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{} ({values})", self.category)
    }
}

fn suit_idx(suit: Suit) -> usize {
    match suit {
        Suit::Club => 0,
        Suit::Diamond => 1,
        Suit::Heart => 2,
        Suit::Spade => 3,
    }
}

/// Highest card of the best straight among `values`, with the ace also
/// playing low for the wheel.
fn straight_high(values: impl IntoIterator<Item = Value>) -> Option<Value> {
    let mut mask: u16 = 0;
    for value in values {
        mask |= 1 << value;
        if value == ACE {
            mask |= 1 << 1;
        }
    }
    (WHEEL_HIGH..=ACE)
        .rev()
        .find(|high| (0..5).all(|offset| mask & (1 << (high - offset)) != 0))
}

/// Rank the best five-card hand that can be made from `cards`.
///
/// Works on any number of cards; with fewer than five, only the
/// categories that fit (pairs, trips, quads, high card) are possible and
/// the tiebreak is shorter. Cards outside two through ace are ignored.
#[must_use]
pub fn eval(cards: &[Card]) -> HandRanking {
    let mut counts = [0u8; ACE as usize + 1];
    let mut suited: [Vec<Value>; 4] = Default::default();
    for card in cards.iter().filter(|card| card.is_valid()) {
        counts[card.value() as usize] += 1;
        suited[suit_idx(card.suit())].push(card.value());
    }

    // Straight flushes outrank everything, so look at flushes first.
    let flush = suited
        .iter_mut()
        .filter(|values| values.len() >= 5)
        .map(|values| {
            values.sort_unstable_by(|a, b| b.cmp(a));
            match straight_high(values.iter().copied()) {
                Some(ACE) => HandRanking::new(HandCategory::RoyalFlush, vec![ACE]),
                Some(high) => HandRanking::new(HandCategory::StraightFlush, vec![high]),
                None => HandRanking::new(HandCategory::Flush, values[..5].to_vec()),
            }
        })
        .max();
    if let Some(ranking) = &flush
        && ranking.category > HandCategory::FourOfAKind
    {
        return ranking.clone();
    }

    // Distinct values, highest first, grouped by how often they appear.
    let present: Vec<Value> = (2..=ACE).rev().filter(|v| counts[*v as usize] > 0).collect();
    let with_count = |n: u8| -> Vec<Value> {
        present
            .iter()
            .copied()
            .filter(|v| counts[*v as usize] >= n)
            .collect()
    };
    let kickers = |exclude: &[Value], n: usize| -> Vec<Value> {
        present
            .iter()
            .copied()
            .filter(|v| !exclude.contains(v))
            .take(n)
            .collect()
    };

    let quads = with_count(4);
    if let Some(&quad) = quads.first() {
        let mut tiebreak = vec![quad];
        tiebreak.extend(kickers(&[quad], 1));
        return HandRanking::new(HandCategory::FourOfAKind, tiebreak);
    }

    let trips = with_count(3);
    let pairs = with_count(2);
    if let Some(&trip) = trips.first()
        && let Some(&pair) = pairs.iter().find(|v| **v != trip)
    {
        return HandRanking::new(HandCategory::FullHouse, vec![trip, pair]);
    }

    if let Some(ranking) = flush {
        return ranking;
    }

    if let Some(high) = straight_high(present.iter().copied()) {
        return HandRanking::new(HandCategory::Straight, vec![high]);
    }

    if let Some(&trip) = trips.first() {
        let mut tiebreak = vec![trip];
        tiebreak.extend(kickers(&[trip], 2));
        return HandRanking::new(HandCategory::ThreeOfAKind, tiebreak);
    }

    if let [high_pair, low_pair, ..] = pairs[..] {
        let mut tiebreak = vec![high_pair, low_pair];
        tiebreak.extend(kickers(&[high_pair, low_pair], 1));
        return HandRanking::new(HandCategory::TwoPair, tiebreak);
    }

    if let Some(&pair) = pairs.first() {
        let mut tiebreak = vec![pair];
        tiebreak.extend(kickers(&[pair], 3));
        return HandRanking::new(HandCategory::OnePair, tiebreak);
    }

    HandRanking::new(HandCategory::HighCard, kickers(&[], 5))
}

/// Indices of every ranking tied for best, in ascending order.
#[must_use]
pub fn argmax(rankings: &[HandRanking]) -> Vec<usize> {
    let Some(best) = rankings.iter().max() else {
        return Vec::new();
    };
    rankings
        .iter()
        .enumerate()
        .filter(|(_, ranking)| *ranking == best)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit::{Club, Diamond, Heart, Spade};

    fn hand(cards: &[(Value, Suit)]) -> Vec<Card> {
        cards.iter().map(|(v, s)| Card(*v, *s)).collect()
    }

    fn ranking(cards: &[(Value, Suit)]) -> HandRanking {
        eval(&hand(cards))
    }

    // === Category Detection Tests ===

    #[test]
    fn test_royal_flush() {
        let r = ranking(&[
            (14, Heart),
            (13, Heart),
            (12, Heart),
            (11, Heart),
            (10, Heart),
            (2, Club),
            (3, Spade),
        ]);
        assert_eq!(r.category, HandCategory::RoyalFlush);
    }

    #[test]
    fn test_straight_flush_beats_higher_plain_straight() {
        let r = ranking(&[
            (9, Spade),
            (8, Spade),
            (7, Spade),
            (6, Spade),
            (5, Spade),
            (10, Heart),
            (11, Club),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::StraightFlush, vec![9]));
    }

    #[test]
    fn test_steel_wheel() {
        let r = ranking(&[
            (14, Diamond),
            (2, Diamond),
            (3, Diamond),
            (4, Diamond),
            (5, Diamond),
            (13, Club),
            (13, Spade),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::StraightFlush, vec![5]));
    }

    #[test]
    fn test_four_of_a_kind_uses_best_kicker() {
        let r = ranking(&[
            (8, Club),
            (8, Diamond),
            (8, Heart),
            (8, Spade),
            (3, Club),
            (12, Heart),
            (12, Spade),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::FourOfAKind, vec![8, 12]));
    }

    #[test]
    fn test_full_house_from_two_trips() {
        let r = ranking(&[
            (9, Club),
            (9, Diamond),
            (9, Heart),
            (4, Spade),
            (4, Club),
            (4, Heart),
            (2, Spade),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::FullHouse, vec![9, 4]));
    }

    #[test]
    fn test_flush_takes_top_five_of_suit() {
        let r = ranking(&[
            (2, Club),
            (7, Club),
            (9, Club),
            (11, Club),
            (13, Club),
            (4, Club),
            (14, Heart),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::Flush, vec![13, 11, 9, 7, 4]));
    }

    #[test]
    fn test_wheel_straight() {
        let r = ranking(&[
            (14, Club),
            (2, Diamond),
            (3, Heart),
            (4, Spade),
            (5, Club),
            (9, Heart),
            (12, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::Straight, vec![5]));
    }

    #[test]
    fn test_ace_does_not_wrap_around() {
        // Q-K-A-2-3 is not a straight.
        let r = ranking(&[
            (12, Club),
            (13, Diamond),
            (14, Heart),
            (2, Spade),
            (3, Club),
            (7, Heart),
            (9, Diamond),
        ]);
        assert_eq!(r.category, HandCategory::HighCard);
    }

    #[test]
    fn test_six_high_straight_beats_wheel() {
        let wheel = ranking(&[(14, Club), (2, Diamond), (3, Heart), (4, Spade), (5, Club)]);
        let six_high = ranking(&[(6, Club), (2, Diamond), (3, Heart), (4, Spade), (5, Club)]);
        assert!(six_high > wheel);
    }

    #[test]
    fn test_broadway_straight() {
        let r = ranking(&[
            (10, Club),
            (11, Diamond),
            (12, Heart),
            (13, Spade),
            (14, Club),
            (14, Heart),
            (2, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::Straight, vec![14]));
    }

    #[test]
    fn test_three_of_a_kind() {
        let r = ranking(&[
            (7, Club),
            (7, Diamond),
            (7, Heart),
            (2, Spade),
            (10, Club),
            (13, Heart),
            (4, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::ThreeOfAKind, vec![7, 13, 10]));
    }

    #[test]
    fn test_two_pair_with_third_pair_as_kicker() {
        let r = ranking(&[
            (10, Club),
            (10, Diamond),
            (6, Heart),
            (6, Spade),
            (3, Club),
            (3, Heart),
            (2, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::TwoPair, vec![10, 6, 3]));
    }

    #[test]
    fn test_one_pair() {
        let r = ranking(&[
            (11, Club),
            (11, Diamond),
            (2, Heart),
            (5, Spade),
            (8, Club),
            (13, Heart),
            (4, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::OnePair, vec![11, 13, 8, 5]));
    }

    #[test]
    fn test_high_card() {
        let r = ranking(&[
            (2, Club),
            (4, Diamond),
            (6, Heart),
            (8, Spade),
            (10, Club),
            (12, Heart),
            (13, Diamond),
        ]);
        assert_eq!(r, HandRanking::new(HandCategory::HighCard, vec![13, 12, 10, 8, 6]));
    }

    // === Partial Hands ===

    #[test]
    fn test_fewer_than_five_cards() {
        let r = ranking(&[(9, Club), (9, Heart)]);
        assert_eq!(r, HandRanking::new(HandCategory::OnePair, vec![9]));
        let r = ranking(&[(9, Club), (2, Heart), (5, Heart)]);
        assert_eq!(r, HandRanking::new(HandCategory::HighCard, vec![9, 5, 2]));
        assert_eq!(eval(&[]).category, HandCategory::HighCard);
    }

    // === Comparison Tests ===

    #[test]
    fn test_category_order() {
        assert!(HandCategory::RoyalFlush > HandCategory::StraightFlush);
        assert!(HandCategory::FourOfAKind > HandCategory::FullHouse);
        assert!(HandCategory::Flush > HandCategory::Straight);
        assert!(HandCategory::OnePair > HandCategory::HighCard);
    }

    #[test]
    fn test_kicker_decides() {
        let board = [(13, Club), (13, Diamond), (7, Heart), (4, Spade), (2, Club)];
        let mut a = board.to_vec();
        a.extend([(14, Heart), (3, Diamond)]);
        let mut b = board.to_vec();
        b.extend([(12, Heart), (3, Heart)]);
        assert!(ranking(&a) > ranking(&b));
    }

    #[test]
    fn test_board_plays_is_exact_tie() {
        let board = [(10, Club), (11, Diamond), (12, Heart), (13, Spade), (14, Club)];
        let mut a = board.to_vec();
        a.extend([(2, Heart), (3, Diamond)]);
        let mut b = board.to_vec();
        b.extend([(4, Heart), (5, Diamond)]);
        assert_eq!(ranking(&a), ranking(&b));
        assert_eq!(argmax(&[ranking(&a), ranking(&b)]), vec![0, 1]);
    }

    #[test]
    fn test_flush_suit_irrelevant() {
        let hearts = ranking(&[(2, Heart), (5, Heart), (8, Heart), (10, Heart), (12, Heart)]);
        let spades = ranking(&[(2, Spade), (5, Spade), (8, Spade), (10, Spade), (12, Spade)]);
        assert_eq!(hearts, spades);
    }

    #[test]
    fn test_argmax() {
        let low = HandRanking::new(HandCategory::OnePair, vec![2, 14, 13, 12]);
        let high = HandRanking::new(HandCategory::TwoPair, vec![3, 2, 4]);
        assert_eq!(argmax(&[low.clone(), high.clone(), low]), vec![1]);
        assert!(argmax(&[]).is_empty());
    }

    #[test]
    fn test_out_of_range_values_are_ignored() {
        let pair = ranking(&[(9, Club), (9, Heart), (4, Spade)]);
        let padded = ranking(&[
            (9, Club),
            (9, Heart),
            (4, Spade),
            (0, Diamond),
            (15, Diamond),
            (16, Diamond),
            (255, Diamond),
        ]);
        assert_eq!(padded, pair);
        assert!(!Card(1, Club).is_valid());
        assert!(Card(14, Club).is_valid());
    }

    #[test]
    fn test_ranking_display() {
        let r = HandRanking::new(HandCategory::FullHouse, vec![13, 7]);
        assert_eq!(r.to_string(), "full house (K 7)");
    }
}
