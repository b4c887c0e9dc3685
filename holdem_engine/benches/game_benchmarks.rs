use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use holdem_engine::{
    GameSession, PlayerId, TableConfig,
    entities::{Action, ActionChoice, Card, Suit},
    functional::{argmax, eval},
    game::PotManager,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// A session with `n_players` seated and a hand in progress.
fn setup_game_with_players(n_players: usize, seed: u64) -> GameSession {
    let mut session = GameSession::with_seed(1, TableConfig::default(), seed).unwrap();
    for i in 0..n_players {
        session
            .join(PlayerId::new(&format!("player{i}")), Some(i), 1_000)
            .unwrap();
    }
    session.start_hand().unwrap();
    session
}

/// Benchmark hand evaluation with 2 cards (pocket cards)
fn bench_hand_eval_2_cards(c: &mut Criterion) {
    let cards = vec![Card(14, Suit::Spade), Card(13, Suit::Spade)];

    c.bench_function("hand_eval_2_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark hand evaluation with 7 cards (hole cards + board)
fn bench_hand_eval_7_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spade),
        Card(13, Suit::Spade),
        Card(12, Suit::Spade),
        Card(11, Suit::Spade),
        Card(10, Suit::Spade),
        Card(2, Suit::Heart),
        Card(3, Suit::Diamond),
    ];

    c.bench_function("hand_eval_7_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark hand evaluation over 100 random 7-card hands
fn bench_hand_eval_100_iterations(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let all_hands: Vec<Vec<Card>> = (0..100)
        .map(|_| {
            let mut deck = holdem_engine::entities::Deck::new();
            deck.shuffle(&mut rng);
            (0..7).filter_map(|_| deck.draw().ok()).collect()
        })
        .collect();

    c.bench_function("hand_eval_100_iterations", |b| {
        b.iter(|| {
            all_hands
                .iter()
                .map(|cards| eval(cards))
                .collect::<Vec<_>>()
        });
    });
}

/// Benchmark hand comparison (argmax) at a full table
fn bench_hand_comparison(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let hands: Vec<_> = (0..9)
        .map(|_| {
            let mut deck = holdem_engine::entities::Deck::new();
            deck.shuffle(&mut rng);
            let cards: Vec<Card> = (0..7).filter_map(|_| deck.draw().ok()).collect();
            eval(&cards)
        })
        .collect();

    c.bench_function("hand_comparison_9_hands", |b| {
        b.iter(|| argmax(&hands));
    });
}

/// Benchmark side pot layering with every seat all-in for a different amount
fn bench_side_pots(c: &mut Criterion) {
    let mut pots = PotManager::new();
    for seat in 0..9 {
        pots.contribute(seat, 100 * (seat as u32 + 1));
    }

    c.bench_function("side_pots_9_all_ins", |b| {
        b.iter(|| pots.pots());
    });
}

/// Benchmark view generation with different player counts
fn bench_view_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_generation");

    for n_players in [2, 4, 6, 9].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_players", n_players)),
            n_players,
            |b, &n| {
                let session = setup_game_with_players(n, 3);
                let observer = PlayerId::new("player0");
                b.iter(|| session.state_view(Some(&observer)));
            },
        );
    }

    group.finish();
}

/// Benchmark whole hands played with random legal actions
fn bench_full_hand(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_hand");

    for n_players in [2, 6, 9].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_players", n_players)),
            n_players,
            |b, &n| {
                let mut rng = StdRng::seed_from_u64(5);
                b.iter(|| {
                    let mut session = setup_game_with_players(n, rng.random());
                    while let Some(seat) = session.acting_seat() {
                        let choices = session.legal_actions(seat);
                        let action = match choices.0[rng.random_range(0..choices.0.len())] {
                            ActionChoice::Fold => Action::Fold,
                            ActionChoice::Check => Action::Check,
                            ActionChoice::Call(_) => Action::Call,
                            ActionChoice::Bet { min, .. } => Action::Bet(min),
                            ActionChoice::Raise { min, .. } => Action::Raise(min),
                            ActionChoice::AllIn(_) => Action::AllIn,
                        };
                        session.apply_action(seat, &action).unwrap();
                    }
                    session.drain_events()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hand_eval_2_cards,
    bench_hand_eval_7_cards,
    bench_hand_eval_100_iterations,
    bench_hand_comparison,
    bench_side_pots,
    bench_view_generation,
    bench_full_hand,
);
criterion_main!(benches);
