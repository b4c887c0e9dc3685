//! Contribution tracking and pot settlement.
//!
//! The [`PotManager`] only records how much each seat put in over the
//! whole hand and who folded. Pots are derived from those totals on demand
//! by layering contribution levels, so the main pot and every side pot are
//! always consistent with the chips actually committed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{
    constants::BASIS_POINTS,
    entities::{Chips, SeatIndex},
    errors::InvariantError,
    functional::HandRanking,
};

/// One pot segment and the seats that can win it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible: Vec<SeatIndex>,
}

/// House cut taken from settled pots.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rake {
    /// Share of each pot in basis points (1/100th of a percent).
    pub bps: u32,
    /// Most rake taken from a single hand.
    pub cap: Chips,
}

impl Rake {
    fn of(&self, amount: Chips) -> Chips {
        let cut = u64::from(amount) * u64::from(self.bps) / BASIS_POINTS;
        Chips::try_from(cut).unwrap_or(amount).min(amount)
    }
}

/// How one pot was split.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PotAward {
    /// Index of the pot, main pot first.
    pub pot: usize,
    /// Pot size before rake.
    pub amount: Chips,
    pub rake: Chips,
    /// Winning seats and what each receives, in odd-chip order.
    pub winners: Vec<(SeatIndex, Chips)>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Settlement {
    pub awards: Vec<PotAward>,
    /// Total won per seat across all pots.
    pub payouts: BTreeMap<SeatIndex, Chips>,
    pub rake: Chips,
}

impl Settlement {
    /// Chips handed back to seats plus rake.
    #[must_use]
    pub fn total(&self) -> Chips {
        self.payouts.values().sum::<Chips>() + self.rake
    }
}

#[derive(Clone, Debug, Default)]
pub struct PotManager {
    contributions: BTreeMap<SeatIndex, Chips>,
    folded: BTreeSet<SeatIndex>,
}

impl PotManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contribute(&mut self, seat: SeatIndex, amount: Chips) {
        if amount > 0 {
            *self.contributions.entry(seat).or_default() += amount;
        }
    }

    /// Mark a seat as no longer contending. Its chips stay in the pots.
    pub fn fold(&mut self, seat: SeatIndex) {
        self.folded.insert(seat);
    }

    #[must_use]
    pub fn contribution(&self, seat: SeatIndex) -> Chips {
        self.contributions.get(&seat).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> Chips {
        self.contributions.values().sum()
    }

    /// Give back the part of the largest contribution no other seat
    /// matched. Returns the seat and amount refunded, if any.
    pub fn return_uncalled(&mut self) -> Option<(SeatIndex, Chips)> {
        let (&top_seat, &top) = self
            .contributions
            .iter()
            .max_by_key(|(seat, amount)| (**amount, std::cmp::Reverse(**seat)))?;
        let second = self
            .contributions
            .iter()
            .filter(|(seat, _)| **seat != top_seat)
            .map(|(_, amount)| *amount)
            .max()
            .unwrap_or_default();
        let excess = top - second.min(top);
        if excess == 0 {
            return None;
        }
        if let Some(amount) = self.contributions.get_mut(&top_seat) {
            *amount -= excess;
        }
        Some((top_seat, excess))
    }

    /// Main pot followed by side pots.
    ///
    /// Levels are the distinct contributions of seats that haven't folded.
    /// The pot at level `L` (previous level `P`) collects
    /// `min(c, L) - min(c, P)` from every seat, folded or not, and is
    /// eligible to the non-folded seats that reached `L`. Folded chips
    /// above the highest contender level are dead money in the top pot.
    #[must_use]
    pub fn pots(&self) -> Vec<Pot> {
        let levels: BTreeSet<Chips> = self
            .contributions
            .iter()
            .filter(|(seat, amount)| **amount > 0 && !self.folded.contains(*seat))
            .map(|(_, amount)| *amount)
            .collect();

        let Some(&top_level) = levels.last() else {
            let total = self.total();
            return if total > 0 {
                vec![Pot {
                    amount: total,
                    eligible: Vec::new(),
                }]
            } else {
                Vec::new()
            };
        };

        let mut pots: Vec<Pot> = Vec::with_capacity(levels.len());
        let mut prev = 0;
        for level in levels {
            let mut amount: Chips = self
                .contributions
                .values()
                .map(|c| (*c).min(level) - (*c).min(prev))
                .sum();
            if level == top_level {
                amount += self
                    .contributions
                    .values()
                    .map(|c| c.saturating_sub(level))
                    .sum::<Chips>();
            }
            let eligible: Vec<SeatIndex> = self
                .contributions
                .iter()
                .filter(|(seat, c)| **c >= level && !self.folded.contains(*seat))
                .map(|(seat, _)| *seat)
                .collect();
            match pots.last_mut() {
                Some(last) if last.eligible == eligible => last.amount += amount,
                _ => pots.push(Pot { amount, eligible }),
            }
            prev = level;
        }
        pots
    }

    /// Split every pot among its best-ranked eligible seats.
    ///
    /// Ties split evenly; leftover chips go one at a time to the tied
    /// winners in `odd_chip_order` (seats missing from it come last).
    /// Rake, if any, is taken from each pot before splitting until the
    /// per-hand cap is reached.
    ///
    /// # Errors
    ///
    /// [`InvariantError::NoEligibleContender`] if a pot has no eligible
    /// seat with a ranking.
    pub fn settle(
        &self,
        rankings: &BTreeMap<SeatIndex, HandRanking>,
        odd_chip_order: &[SeatIndex],
        rake: Option<&Rake>,
    ) -> Result<Settlement, InvariantError> {
        let mut settlement = Settlement::default();
        let mut rake_left = rake.map_or(0, |r| r.cap);

        for (idx, pot) in self.pots().into_iter().enumerate() {
            let best = pot
                .eligible
                .iter()
                .filter_map(|seat| rankings.get(seat))
                .max()
                .ok_or(InvariantError::NoEligibleContender { pot: idx })?;
            let mut winners: Vec<SeatIndex> = pot
                .eligible
                .iter()
                .copied()
                .filter(|seat| rankings.get(seat) == Some(best))
                .collect();
            winners.sort_by_key(|seat| {
                let position = odd_chip_order.iter().position(|s| s == seat);
                (position.unwrap_or(usize::MAX), *seat)
            });

            let taken = rake.map_or(0, |r| r.of(pot.amount)).min(rake_left);
            rake_left -= taken;
            settlement.rake += taken;

            let award = split(idx, pot.amount, taken, &winners);
            for (seat, share) in &award.winners {
                *settlement.payouts.entry(*seat).or_default() += share;
            }
            settlement.awards.push(award);
        }
        Ok(settlement)
    }

    /// Everything in the middle goes to `seat`, the last one standing.
    #[must_use]
    pub fn award_all(&self, seat: SeatIndex, rake: Option<&Rake>) -> Settlement {
        let amount = self.total();
        let taken = rake.map_or(0, |r| r.of(amount).min(r.cap));
        let award = split(0, amount, taken, &[seat]);
        Settlement {
            payouts: BTreeMap::from([(seat, amount - taken)]),
            awards: vec![award],
            rake: taken,
        }
    }
}

fn split(pot: usize, amount: Chips, rake: Chips, winners: &[SeatIndex]) -> PotAward {
    let net = amount - rake;
    let num_winners = Chips::try_from(winners.len()).unwrap_or(Chips::MAX).max(1);
    let share = net / num_winners;
    let mut remainder = net % num_winners;
    let winners = winners
        .iter()
        .map(|seat| {
            let odd_chip = Chips::from(remainder > 0);
            remainder -= odd_chip;
            (*seat, share + odd_chip)
        })
        .collect();
    PotAward {
        pot,
        amount,
        rake,
        winners,
    }
}
