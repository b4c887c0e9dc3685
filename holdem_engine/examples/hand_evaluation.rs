//! Hand Evaluation Example
//!
//! Demonstrates how to use the hand evaluation functions to compare poker hands.

use holdem_engine::{
    entities::{Card, Suit},
    functional::{argmax, eval},
};

fn main() {
    println!("=== Poker Hand Evaluation Example ===\n");

    // Same board, three different pairs of hole cards
    let board = [
        Card(14, Suit::Heart),
        Card(13, Suit::Heart),
        Card(7, Suit::Club),
        Card(7, Suit::Diamond),
        Card(2, Suit::Heart),
    ];
    let holes = [
        ("alice", [Card(12, Suit::Heart), Card(3, Suit::Heart)]),
        ("bob", [Card(7, Suit::Spade), Card(14, Suit::Spade)]),
        ("carol", [Card(5, Suit::Club), Card(4, Suit::Spade)]),
    ];

    let rankings: Vec<_> = holes
        .iter()
        .map(|(name, hole)| {
            let mut cards = hole.to_vec();
            cards.extend(board);
            let ranking = eval(&cards);
            println!("{name}: {ranking}");
            ranking
        })
        .collect();

    let winners: Vec<&str> = argmax(&rankings)
        .into_iter()
        .map(|idx| holes[idx].0)
        .collect();
    println!("\nWinner(s): {}", winners.join(", "));
}
