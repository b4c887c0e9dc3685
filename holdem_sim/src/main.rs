//! Bot-driven load simulator for Hold'em tables.
//!
//! Spins tables up through the registry, fills them with random bots, and
//! plays a fixed number of hands per table while auditing chip totals.

mod bot;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Error, bail, ensure};
use bot::{Bot, BotReport};
use ctrlc::set_handler;
use holdem_engine::{
    PlayerId, TableConfig, TableManager, constants::MAX_PLAYERS, entities::Chips,
    game::Rake,
    table::{OddChipRule, TableResponse, TableSpeed},
};
use log::{error, info};
use pico_args::Arguments;
use tokio::{sync::mpsc, task::JoinSet};

const HELP: &str = "\
Play Hold'em tables with random bots

USAGE:
  holdem_sim [OPTIONS]

OPTIONS:
  --tables      N        Number of tables to run              [default: 4]
  --bots        N        Bots per table (2-9)                 [default: 6]
  --hands       N        Hands to play per table              [default: 100]
  --buy-in      CHIPS    Each bot's buy-in                    [default: 1000]
  --seed        N        Seed for shuffles and bot choices    [default: random]
  --silent-rate P        Chance a bot ignores its turn (0-1)  [default: 0.05]
  --timeout-ms  MS       Action timeout                       [default: 50]
  --delay-ms    MS       Pause between hands                  [default: 5]
  --rake-bps    BPS      Rake in basis points                 [default: none]
  --rake-cap    CHIPS    Per-hand rake cap                    [default: 30]

FLAGS:
  -h, --help             Print help information

ENVIRONMENT:
  RUST_LOG               Log filter (e.g. info, holdem_engine=debug)
";

struct Args {
    tables: usize,
    bots: usize,
    hands: u64,
    buy_in: Chips,
    seed: Option<u64>,
    silent_rate: f64,
    timeout_ms: u64,
    delay_ms: u64,
    rake_bps: Option<u32>,
    rake_cap: Chips,
}

impl Args {
    fn table_config(&self) -> TableConfig {
        let base = TableConfig::default().with_speed(TableSpeed::Hyper);
        TableConfig {
            name: "Simulated Table".to_string(),
            max_players: MAX_PLAYERS,
            min_buy_in: base.big_blind,
            max_buy_in: self.buy_in.max(base.big_blind),
            action_timeout_ms: self.timeout_ms,
            next_hand_delay_ms: self.delay_ms,
            odd_chip_rule: OddChipRule::LeftOfButton,
            rake: self.rake_bps.map(|bps| Rake {
                bps,
                cap: self.rake_cap,
            }),
            ..base
        }
    }
}

/// Seat `bots` bots at one new table and play it out.
async fn run_table(
    manager: TableManager,
    index: usize,
    args: Arc<Args>,
    stop: Arc<AtomicBool>,
) -> Result<Vec<BotReport>, Error> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut seated = Vec::with_capacity(args.bots);
    let mut table_id = None;

    for i in 0..args.bots {
        let player = PlayerId::new(&format!("bot-{index}-{i}"));
        let (id, response) = manager
            .join_table(table_id, player.clone(), None, args.buy_in)
            .await?;
        let TableResponse::Seated(seat) = response else {
            bail!("{player} couldn't sit at table {id}: {response:?}");
        };
        table_id = Some(id);
        seated.push((player, seat, id));
    }

    let mut bots = JoinSet::new();
    for (i, (player, seat, id)) in seated.into_iter().enumerate() {
        let (tx, rx) = mpsc::channel(1024);
        manager.subscribe(id, player.clone(), tx).await?;

        let mut bot = Bot::new(player, seat, id, seed ^ ((index * MAX_PLAYERS + i) as u64));
        bot.silent_rate = args.silent_rate;
        if i == 0 {
            bot.audit = Some(args.buy_in * args.bots as Chips);
        }
        bots.spawn(bot.run(manager.clone(), rx, args.hands, stop.clone()));
    }

    let mut reports = Vec::with_capacity(args.bots);
    while let Some(report) = bots.join_next().await {
        reports.push(report??);
    }
    Ok(reports)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        tables: pargs.opt_value_from_str("--tables")?.unwrap_or(4),
        bots: pargs.opt_value_from_str("--bots")?.unwrap_or(6),
        hands: pargs.opt_value_from_str("--hands")?.unwrap_or(100),
        buy_in: pargs.opt_value_from_str("--buy-in")?.unwrap_or(1000),
        seed: pargs.opt_value_from_str("--seed")?,
        silent_rate: pargs.opt_value_from_str("--silent-rate")?.unwrap_or(0.05),
        timeout_ms: pargs.opt_value_from_str("--timeout-ms")?.unwrap_or(50),
        delay_ms: pargs.opt_value_from_str("--delay-ms")?.unwrap_or(5),
        rake_bps: pargs.opt_value_from_str("--rake-bps")?,
        rake_cap: pargs.opt_value_from_str("--rake-cap")?.unwrap_or(30),
    };
    ensure!(
        (2..=MAX_PLAYERS).contains(&args.bots),
        "--bots must be between 2 and {MAX_PLAYERS}"
    );
    ensure!(
        (0.0..=1.0).contains(&args.silent_rate),
        "--silent-rate must be between 0 and 1"
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    // Catching signals for exit.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let mut manager = TableManager::new(args.table_config())?;
    if let Some(seed) = args.seed {
        manager = manager.with_seed(seed);
    }

    info!(
        "Playing {} tables x {} bots for {} hands",
        args.tables, args.bots, args.hands
    );

    let args = Arc::new(args);
    let mut tables = JoinSet::new();
    for index in 0..args.tables {
        tables.spawn(run_table(manager.clone(), index, args.clone(), stop.clone()));
    }

    let mut failures = 0;
    let mut total = BotReport::default();
    while let Some(result) = tables.join_next().await {
        match result? {
            Ok(reports) => {
                for report in reports {
                    total.hands_seen = total.hands_seen.max(report.hands_seen);
                    total.actions += report.actions;
                    total.silences += report.silences;
                    total.conservation_checks += report.conservation_checks;
                }
            }
            Err(err) => {
                error!("{err:#}");
                failures += 1;
            }
        }
    }

    info!(
        "Done: {} hands per table, {} actions, {} timeouts provoked, {} chip audits passed, {} tables still open",
        total.hands_seen,
        total.actions,
        total.silences,
        total.conservation_checks,
        manager.active_table_count().await
    );
    ensure!(failures == 0, "{failures} table(s) failed");
    Ok(())
}
